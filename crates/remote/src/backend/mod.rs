//! Remote session trait and implementations.
//!
//! A [`Connector`] knows how to reach a server; each successful
//! [`connect()`](Connector::connect) yields one [`RemoteSession`] that is used
//! sequentially for the rest of the run and then closed.

#[cfg(feature = "ftp")]
mod ftp;
mod local;
#[cfg(feature = "mock")]
mod mock;
mod ro;

#[cfg(feature = "ftp")]
pub use self::ftp::{FtpConnector, FtpSession, FtpSettings};
pub use self::local::{LocalConnector, LocalSession};
#[cfg(feature = "mock")]
pub use self::mock::{MockConnector, MockSession};
pub use self::ro::{ReadOnlyConnector, ReadOnlySession};
use crate::error::Result;
use crate::{RemotePath, SessionHandle};
use async_trait::async_trait;
use std::path::Path;

/// An open session on the remote file server, positioned at the configured
/// root folder.
///
/// # Examples
///
/// ```
/// use thermo_remote::{RemotePath, RemoteSession, error::Result};
///
/// async fn count_csv(session: &dyn RemoteSession, folder: &RemotePath) -> Result<usize> {
///     let names = session.list(folder).await?;
///     Ok(names.iter().filter(|n| n.ends_with(".csv")).count())
/// }
/// ```
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Name of the server (used for logging only).
    fn name(&self) -> &str;

    /// Names of the immediate children of a folder (files and folders alike,
    /// never `.` or `..`).
    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>>;

    /// Download a file into `local`, returning the number of bytes written.
    async fn retrieve(&self, file: &RemotePath, local: &Path) -> Result<u64>;

    /// Delete a file.
    async fn delete(&self, file: &RemotePath) -> Result<()>;

    /// Remove a folder. Fails with [`NotEmpty`](crate::error::ErrorKind::NotEmpty)
    /// (or a server-specific refusal) if it still has entries.
    async fn remove_dir(&self, dir: &RemotePath) -> Result<()>;

    /// Release the session. Further calls are not expected to succeed.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Establishes sessions with a remote file server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name of the server (used for logging only).
    fn name(&self) -> &str;

    /// Open one session, positioned at the root folder.
    ///
    /// Errors are classified so the caller can tell transient failures
    /// ([`is_retryable`](crate::error::ErrorKind::is_retryable)) from fatal ones.
    async fn connect(&self) -> Result<SessionHandle>;
}

/// Strip the `.`/`..` pseudo-entries and any directory prefix a server may
/// echo back in listings.
pub(crate) fn child_names(entries: impl IntoIterator<Item = String>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let trimmed = entry.trim_end_matches(['\r', '\n']).trim_end_matches('/');
            let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
            match name {
                "" | "." | ".." => None,
                name => Some(name.to_string()),
            }
        })
        .collect()
}
