//! FTP remote session.
//!
//! Uses the blocking [`suppaftp`] client in passive mode. Every command runs
//! on Tokio's blocking pool while holding the session's single control
//! connection, so calls are strictly sequential just like the server expects.
//!
//! All paths are sent to the server in absolute form (root folder + relative
//! path) so the session never depends on its current working directory.

use crate::backend::child_names;
use crate::error::{ErrorKind, Result};
use crate::{Connector, RemotePath, RemoteSession, SessionHandle};
use async_trait::async_trait;
use exn::ResultExt;
use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};

/// Connection settings for an FTP server.
#[derive(Debug, Clone)]
pub struct FtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Folder that contains one sub-folder per site.
    pub root: String,
    pub timeout: Duration,
}

/// Connects to an FTP server.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    name: String,
    settings: FtpSettings,
}
impl FtpConnector {
    pub fn new(name: impl Into<String>, settings: FtpSettings) -> Self {
        Self { name: name.into(), settings }
    }
}

#[async_trait]
impl Connector for FtpConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<SessionHandle> {
        let settings = self.settings.clone();
        let stream = tokio::task::spawn_blocking(move || -> std::result::Result<FtpStream, ErrorKind> {
            let address = (settings.host.as_str(), settings.port)
                .to_socket_addrs()
                .map_err(|e| ErrorKind::Connection(format!("resolving {}: {e}", settings.host)))?
                .next()
                .ok_or_else(|| ErrorKind::Connection(format!("no address for {}", settings.host)))?;
            let mut stream = FtpStream::connect_timeout(address, settings.timeout)
                .map_err(|e| map_ftp_error(e, &settings.host))?;
            stream
                .login(settings.username.as_str(), settings.password.as_str())
                .map_err(|e| map_login_error(e, &settings.username, &settings.host))?;
            stream.transfer_type(FileType::Binary).map_err(|e| map_ftp_error(e, &settings.host))?;
            let root = RemotePath::root().under(&settings.root);
            stream.cwd(root.as_str()).map_err(|e| map_ftp_error(e, &root))?;
            Ok(stream)
        })
        .await
        .or_raise(|| ErrorKind::Connection("FTP connection task failed".to_string()))??;
        tracing::debug!(server = %self.name, host = %self.settings.host, root = %self.settings.root, "FTP session established");
        Ok(Arc::new(FtpSession {
            name: self.name.clone(),
            root: self.settings.root.clone(),
            stream: Arc::new(Mutex::new(stream)),
        }))
    }
}

/// One logged-in FTP control connection.
pub struct FtpSession {
    name: String,
    root: String,
    stream: Arc<Mutex<FtpStream>>,
}
impl FtpSession {
    /// Run a blocking command against the control connection.
    async fn command<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> std::result::Result<T, ErrorKind> + Send + 'static,
    {
        let stream = Arc::clone(&self.stream);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = stream.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .or_raise(|| ErrorKind::Connection("FTP command task failed".to_string()))?;
        Ok(result?)
    }
}

fn map_login_error(err: FtpError, username: &str, host: &str) -> ErrorKind {
    match err {
        FtpError::UnexpectedResponse(ref response) if matches!(response.status, Status::NotLoggedIn) => {
            ErrorKind::Authentication(username.to_string())
        },
        other => map_ftp_error(other, host),
    }
}

fn map_ftp_error(err: FtpError, path: &str) -> ErrorKind {
    match err {
        FtpError::ConnectionError(e) => ErrorKind::Connection(format!("{path}: {e}")),
        FtpError::UnexpectedResponse(response) => match response.status {
            Status::FileUnavailable => ErrorKind::PermissionDenied(path.to_string()),
            Status::NotLoggedIn => ErrorKind::Authentication(path.to_string()),
            status => ErrorKind::Protocol(format!("{path}: unexpected reply {status:?}")),
        },
        other => ErrorKind::Protocol(format!("{path}: {other}")),
    }
}

#[async_trait]
impl RemoteSession for FtpSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>> {
        let absolute = dir.under(&self.root);
        self.command(move |stream| {
            stream.nlst(Some(absolute.as_str())).map(|names| child_names(names)).map_err(|e| map_ftp_error(e, &absolute))
        })
        .await
    }

    async fn retrieve(&self, file: &RemotePath, local: &Path) -> Result<u64> {
        let absolute = file.under(&self.root);
        let local: PathBuf = local.to_path_buf();
        self.command(move |stream| {
            let mut target = std::fs::File::create(&local).map_err(ErrorKind::Io)?;
            stream
                .retr(absolute.as_str(), |reader| std::io::copy(reader, &mut target).map_err(FtpError::ConnectionError))
                .map_err(|e| map_ftp_error(e, &absolute))
        })
        .await
    }

    async fn delete(&self, file: &RemotePath) -> Result<()> {
        let absolute = file.under(&self.root);
        self.command(move |stream| stream.rm(absolute.as_str()).map_err(|e| map_ftp_error(e, &absolute))).await
    }

    async fn remove_dir(&self, dir: &RemotePath) -> Result<()> {
        if dir.is_root() {
            exn::bail!(ErrorKind::InvalidPath(dir.to_string()));
        }
        let absolute = dir.under(&self.root);
        self.command(move |stream| stream.rmdir(absolute.as_str()).map_err(|e| map_ftp_error(e, &absolute))).await
    }

    async fn close(&self) -> Result<()> {
        let host = self.name.clone();
        self.command(move |stream| stream.quit().map_err(|e| map_ftp_error(e, &host))).await
    }
}
