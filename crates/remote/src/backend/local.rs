//! Mounted-folder remote session.
//!
//! Treats a local directory (typically a network mount of the drop server)
//! as the remote root. All access goes through `tokio::fs`.

use crate::backend::child_names;
use crate::error::{ErrorKind, Result};
use crate::{Connector, RemotePath, RemoteSession, SessionHandle};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Connects to a mounted folder.
///
/// # Examples
///
/// ```no_run
/// use thermo_remote::Connector;
/// use thermo_remote::backend::LocalConnector;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = LocalConnector::new("drop", "/mnt/device-drop");
/// let session = connector.connect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalConnector {
    name: String,
    root: PathBuf,
}
impl LocalConnector {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), root: root.into() }
    }
}

#[async_trait]
impl Connector for LocalConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<SessionHandle> {
        let label = self.root.display().to_string();
        let metadata = fs::metadata(&self.root).await.map_err(|e| LocalSession::map_io_error(e, &label))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::NotFound(label));
        }
        Ok(Arc::new(LocalSession { name: self.name.clone(), root: self.root.clone() }))
    }
}

/// Session over a mounted folder.
#[derive(Debug, Clone)]
pub struct LocalSession {
    name: String,
    root: PathBuf,
}
impl LocalSession {
    fn absolute_path(&self, path: &RemotePath) -> PathBuf {
        path.segments().iter().fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    fn map_io_error(e: std::io::Error, path: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_string()),
            std::io::ErrorKind::DirectoryNotEmpty => ErrorKind::NotEmpty(path.to_string()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl RemoteSession for LocalSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>> {
        let label = dir.to_string();
        let mut entries = fs::read_dir(self.absolute_path(dir)).await.map_err(|e| Self::map_io_error(e, &label))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &label))? {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!(folder = %label, name = ?raw, "Skipping entry with a non UTF-8 name"),
            }
        }
        Ok(child_names(names))
    }

    async fn retrieve(&self, file: &RemotePath, local: &Path) -> Result<u64> {
        let label = file.to_string();
        Ok(fs::copy(self.absolute_path(file), local).await.map_err(|e| Self::map_io_error(e, &label))?)
    }

    async fn delete(&self, file: &RemotePath) -> Result<()> {
        let label = file.to_string();
        Ok(fs::remove_file(self.absolute_path(file)).await.map_err(|e| Self::map_io_error(e, &label))?)
    }

    async fn remove_dir(&self, dir: &RemotePath) -> Result<()> {
        if dir.is_root() {
            exn::bail!(ErrorKind::InvalidPath(dir.to_string()));
        }
        let label = dir.to_string();
        Ok(fs::remove_dir(self.absolute_path(dir)).await.map_err(|e| Self::map_io_error(e, &label))?)
    }
}
