//! Object store trait and implementations.
//!
//! This module defines the `ObjectStore` trait, the destination side of the
//! mirror. It is deliberately small: existence checks are the idempotency
//! oracle, `upload` moves a staged file into the store, and `read`/`write` are
//! only needed for the small state objects (checkpoints) kept alongside the
//! mirrored data.

mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalStore;
#[cfg(feature = "mock")]
pub use self::mock::MockStore;
pub use self::ro::ReadOnlyStore;
#[cfg(feature = "s3")]
pub use self::s3::{S3Settings, S3Store};
use crate::ObjectKey;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for destination object stores.
///
/// All keys are relative to the store root (or configured prefix) and are
/// validated on construction of the [`ObjectKey`].
///
/// # Examples
///
/// ```
/// use thermo_storage::{ObjectKey, ObjectStore, error::Result};
///
/// async fn mirror_if_missing(store: &dyn ObjectStore, key: &ObjectKey, staged: &std::path::Path) -> Result<bool> {
///     if store.exists(key).await? {
///         return Ok(false);
///     }
///     store.upload(key, staged).await?;
///     Ok(true)
/// }
/// ```
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the configured store (used for logging only).
    fn name(&self) -> &str;

    /// Check if an object exists.
    ///
    /// Absence is **not** an error; only failures to find out are.
    async fn exists(&self, key: &ObjectKey) -> Result<bool>;

    /// Read object contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn read(&self, key: &ObjectKey) -> Result<Vec<u8>>;

    /// Write object contents, replacing any existing object wholesale.
    async fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()>;

    /// Upload a local file as the object's contents.
    ///
    /// The object must only become visible once the whole file has been
    /// stored; a failed upload never leaves a partial object behind.
    async fn upload(&self, key: &ObjectKey, local: &Path) -> Result<u64>;
}
