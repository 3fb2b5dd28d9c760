//! Read-only object store.
//!
//! This module provides a store implementation that wraps other
//! implementations and prevents write operations from executing, but
//! indicating success on return. Used for dry runs.

use async_trait::async_trait;
use std::path::Path;

use crate::{ObjectKey, ObjectStore, StoreHandle, error::Result};

/// Read-only object store.
///
/// Wraps another store and silently drops all write operations, logging an
/// [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: StoreHandle,
}
impl ReadOnlyStore {
    pub fn new(inner: StoreHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ObjectStore for ReadOnlyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn read(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()> {
        tracing::info!(store = self.inner.name(), key = %key, bytes = data.len(), "Skipping write during read-only mode");
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, local: &Path) -> Result<u64> {
        let bytes = tokio::fs::metadata(local).await.map(|m| m.len()).unwrap_or(0);
        tracing::info!(store = self.inner.name(), key = %key, bytes, "Skipping upload during read-only mode");
        Ok(bytes)
    }
}
