//! Local filesystem object store.
//!
//! Stores objects as files under a configured directory, accessed via
//! `tokio::fs`. Useful for development and for deployments where the
//! destination is a mounted volume.

use crate::error::{ErrorKind, Result};
use crate::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem object store.
///
/// # Examples
///
/// ```no_run
/// use thermo_storage::backend::LocalStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalStore::new("archive", "/srv/device-archive")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalStore {
    name: String,
    root: PathBuf,
}
impl LocalStore {
    /// Create a new local filesystem store rooted at an absolute directory,
    /// creating the directory if it doesn't exist yet.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Use non-async here; it only happens once at startup.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn absolute_path(&self, key: &ObjectKey) -> PathBuf {
        key.as_str().split('/').fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn create_parent(&self, path: &Path, key: &ObjectKey) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key.as_str()))?;
        }
        Ok(())
    }

    /// Sibling path used to make writes appear atomically.
    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".partial");
        path.with_file_name(name)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        let path = self.absolute_path(key);
        Ok(fs::try_exists(&path).await.map_err(|e| Self::map_io_error(e, key.as_str()))?)
    }

    async fn read(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        let path = self.absolute_path(key);
        Ok(fs::read(&path).await.map_err(|e| Self::map_io_error(e, key.as_str()))?)
    }

    async fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()> {
        let path = self.absolute_path(key);
        self.create_parent(&path, key).await?;
        let partial = Self::partial_path(&path);
        fs::write(&partial, data).await.map_err(|e| Self::map_io_error(e, key.as_str()))?;
        Ok(fs::rename(&partial, &path).await.map_err(|e| Self::map_io_error(e, key.as_str()))?)
    }

    async fn upload(&self, key: &ObjectKey, local: &Path) -> Result<u64> {
        let path = self.absolute_path(key);
        self.create_parent(&path, key).await?;
        let partial = Self::partial_path(&path);
        let copied = match fs::copy(local, &partial).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Never leave a half-written object lying around.
                _ = fs::remove_file(&partial).await;
                exn::bail!(Self::map_io_error(e, key.as_str()));
            },
        };
        fs::rename(&partial, &path).await.map_err(|e| Self::map_io_error(e, key.as_str()))?;
        Ok(copied)
    }
}
