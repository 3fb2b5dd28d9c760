//! Read-only remote session.
//!
//! Wraps another session and prevents destructive operations from executing,
//! but indicating success on return. Used for dry runs, where nothing must be
//! removed from the source because nothing was really uploaded.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::{Connector, ConnectorHandle, RemotePath, RemoteSession, SessionHandle};

/// Connector whose sessions are wrapped in [`ReadOnlySession`].
#[derive(Clone)]
pub struct ReadOnlyConnector {
    inner: ConnectorHandle,
}
impl ReadOnlyConnector {
    pub fn new(inner: ConnectorHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Connector for ReadOnlyConnector {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn connect(&self) -> Result<SessionHandle> {
        let session = self.inner.connect().await?;
        Ok(Arc::new(ReadOnlySession::new(session)))
    }
}

/// Read-only remote session.
///
/// Listing and downloads pass through; deletes and folder removals are
/// skipped with an [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlySession {
    inner: SessionHandle,
}
impl ReadOnlySession {
    pub fn new(inner: SessionHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl RemoteSession for ReadOnlySession {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>> {
        self.inner.list(dir).await
    }

    async fn retrieve(&self, file: &RemotePath, local: &Path) -> Result<u64> {
        self.inner.retrieve(file, local).await
    }

    async fn delete(&self, file: &RemotePath) -> Result<()> {
        tracing::info!(server = self.inner.name(), path = %file, "Skipping delete during read-only mode");
        Ok(())
    }

    async fn remove_dir(&self, dir: &RemotePath) -> Result<()> {
        tracing::info!(server = self.inner.name(), path = %dir, "Skipping folder removal during read-only mode");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
