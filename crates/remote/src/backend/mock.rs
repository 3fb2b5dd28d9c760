//! In-memory remote server for testing.

use crate::error::{ErrorKind, Result};
use crate::{Connector, RemotePath, RemoteSession, SessionHandle};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn parse(path: &str) -> RemotePath {
    let Ok(parsed) = RemotePath::from_segments(path.split('/').filter(|s| !s.is_empty())) else {
        panic!("MockSession: invalid path {path}");
    };
    parsed
}

#[derive(Default)]
struct Tree {
    files: BTreeMap<RemotePath, Vec<u8>>,
    dirs: BTreeSet<RemotePath>,
    removal_attempts: Vec<RemotePath>,
}

impl Tree {
    fn add_parents(&mut self, path: &RemotePath) {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir.is_root() {
                break;
            }
            parent = dir.parent();
            self.dirs.insert(dir);
        }
    }

    fn children(&self, dir: &RemotePath) -> Vec<String> {
        let files = self.files.keys();
        let dirs = self.dirs.iter();
        files
            .chain(dirs)
            .filter(|path| path.parent().as_ref() == Some(dir))
            .filter_map(|path| path.name().map(str::to_string))
            .collect()
    }
}

/// In-memory remote file tree for testing.
///
/// Parent folders of every file are created implicitly. Paths registered with
/// [`deny`](Self::deny) refuse listing, paths registered with
/// [`failing_retrieve`](Self::failing_retrieve) fail mid-transfer and paths
/// registered with [`failing_delete`](Self::failing_delete) refuse deletion.
/// Every folder removal is recorded, whether or not it succeeds.
///
/// # Examples
///
/// ```
/// use thermo_remote::backend::MockSession;
/// use thermo_remote::{RemotePath, RemoteSession};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = MockSession::default().with_file("site/2024-01-01/a.csv", b"t,v");
/// let names = session.list(&RemotePath::from_segments(["site"])?).await?;
/// assert_eq!(names, vec!["2024-01-01"]);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MockSession {
    tree: Mutex<Tree>,
    denied: BTreeSet<RemotePath>,
    failing_retrieve: BTreeSet<RemotePath>,
    failing_delete: BTreeSet<RemotePath>,
    closed: AtomicBool,
}

impl MockSession {
    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a file, creating its parent folders.
    pub fn with_file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        let path = parse(path);
        let tree = self.tree.get_mut().unwrap_or_else(PoisonError::into_inner);
        tree.add_parents(&path);
        tree.files.insert(path, data.into());
        self
    }

    /// Add an (empty) folder, creating its parents.
    pub fn with_dir(mut self, path: &str) -> Self {
        let path = parse(path);
        let tree = self.tree.get_mut().unwrap_or_else(PoisonError::into_inner);
        tree.add_parents(&path);
        tree.dirs.insert(path);
        self
    }

    /// Refuse to list `path`.
    pub fn deny(mut self, path: &str) -> Self {
        self.denied.insert(parse(path));
        self
    }

    /// Fail every download of `path`.
    pub fn failing_retrieve(mut self, path: &str) -> Self {
        self.failing_retrieve.insert(parse(path));
        self
    }

    /// Refuse every deletion of `path`.
    pub fn failing_delete(mut self, path: &str) -> Self {
        self.failing_delete.insert(parse(path));
        self
    }

    /// Remaining files, in sorted order.
    pub fn files(&self) -> Vec<String> {
        self.tree().files.keys().map(ToString::to_string).collect()
    }

    /// Remaining folders, in sorted order.
    pub fn dirs(&self) -> Vec<String> {
        self.tree().dirs.iter().map(ToString::to_string).collect()
    }

    /// Every folder removal requested so far, in call order.
    pub fn removal_attempts(&self) -> Vec<String> {
        self.tree().removal_attempts.iter().map(ToString::to_string).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list(&self, dir: &RemotePath) -> Result<Vec<String>> {
        if self.denied.contains(dir) {
            exn::bail!(ErrorKind::PermissionDenied(dir.to_string()));
        }
        let tree = self.tree();
        if !dir.is_root() && !tree.dirs.contains(dir) {
            exn::bail!(ErrorKind::NotFound(dir.to_string()));
        }
        Ok(tree.children(dir))
    }

    async fn retrieve(&self, file: &RemotePath, local: &Path) -> Result<u64> {
        if self.failing_retrieve.contains(file) {
            exn::bail!(ErrorKind::Protocol(format!("{file}: simulated transfer failure")));
        }
        let data = self.tree().files.get(file).cloned();
        let Some(data) = data else {
            exn::bail!(ErrorKind::NotFound(file.to_string()));
        };
        tokio::fs::write(local, &data).await.map_err(ErrorKind::Io)?;
        Ok(data.len() as u64)
    }

    async fn delete(&self, file: &RemotePath) -> Result<()> {
        if self.failing_delete.contains(file) {
            exn::bail!(ErrorKind::PermissionDenied(file.to_string()));
        }
        match self.tree().files.remove(file) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(file.to_string())),
        }
    }

    async fn remove_dir(&self, dir: &RemotePath) -> Result<()> {
        let mut tree = self.tree();
        tree.removal_attempts.push(dir.clone());
        if dir.is_root() {
            exn::bail!(ErrorKind::InvalidPath(dir.to_string()));
        }
        if !tree.dirs.contains(dir) {
            exn::bail!(ErrorKind::NotFound(dir.to_string()));
        }
        if !tree.children(dir).is_empty() {
            exn::bail!(ErrorKind::NotEmpty(dir.to_string()));
        }
        tree.dirs.remove(dir);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a shared [`MockSession`], optionally failing the first attempts.
pub struct MockConnector {
    session: Arc<MockSession>,
    transient_failures: AtomicUsize,
    rejecting: bool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(session: MockSession) -> Self {
        Self {
            session: Arc::new(session),
            transient_failures: AtomicUsize::new(0),
            rejecting: false,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fail the first `n` connection attempts with a retryable error.
    pub fn fail_first(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Reject every connection attempt with bad credentials.
    pub fn rejecting(mut self) -> Self {
        self.rejecting = true;
        self
    }

    /// Number of connection attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The session every successful connection returns.
    pub fn session(&self) -> &Arc<MockSession> {
        &self.session
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&self) -> Result<SessionHandle> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.rejecting {
            exn::bail!(ErrorKind::Authentication("mock".to_string()));
        }
        let pending = self.transient_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.transient_failures.store(pending - 1, Ordering::SeqCst);
            exn::bail!(ErrorKind::Connection(format!("simulated outage on attempt {attempt}")));
        }
        Ok(self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> RemotePath {
        parse(s)
    }

    fn sample() -> MockSession {
        MockSession::default()
            .with_file("site/2024-01-01/a.csv", b"t,v")
            .with_file("site/2024-01-01/thermal/b.png", b"png")
            .with_dir("site/2024-01-02")
    }

    #[tokio::test]
    async fn test_list() {
        let session = sample();
        assert_eq!(session.list(&RemotePath::root()).await.unwrap(), vec!["site"]);
        assert_eq!(session.list(&path("site")).await.unwrap(), vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(session.list(&path("site/2024-01-01")).await.unwrap(), vec!["a.csv", "thermal"]);
        let err = session.list(&path("other")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_denied_listing() {
        let session = sample().deny("site/2024-01-01/thermal");
        let err = session.list(&path("site/2024-01-01/thermal")).await.unwrap_err();
        assert!(err.is_inaccessible());
    }

    #[tokio::test]
    async fn test_retrieve_and_delete() {
        let staging = tempfile::tempdir().unwrap();
        let staged = staging.path().join("a.csv");
        let session = sample();
        assert_eq!(session.retrieve(&path("site/2024-01-01/a.csv"), &staged).await.unwrap(), 3);
        assert_eq!(std::fs::read(&staged).unwrap(), b"t,v");
        session.delete(&path("site/2024-01-01/a.csv")).await.unwrap();
        assert_eq!(session.files(), vec!["site/2024-01-01/thermal/b.png"]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let staging = tempfile::tempdir().unwrap();
        let session = sample().failing_retrieve("site/2024-01-01/a.csv").failing_delete("site/2024-01-01/thermal/b.png");
        let err = session.retrieve(&path("site/2024-01-01/a.csv"), &staging.path().join("a")).await;
        assert!(err.is_err());
        assert!(session.delete(&path("site/2024-01-01/thermal/b.png")).await.is_err());
        assert_eq!(session.files().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_dir_records_attempts() {
        let session = sample();
        let err = session.remove_dir(&path("site/2024-01-01")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotEmpty(_)));
        session.remove_dir(&path("site/2024-01-02")).await.unwrap();
        assert_eq!(session.removal_attempts(), vec!["site/2024-01-01", "site/2024-01-02"]);
        assert!(!session.dirs().contains(&"site/2024-01-02".to_string()));
    }

    #[tokio::test]
    async fn test_connector_transient_failures() {
        let connector = MockConnector::new(sample()).fail_first(2);
        assert!(connector.connect().await.err().unwrap().is_retryable());
        assert!(connector.connect().await.err().unwrap().is_retryable());
        let session = connector.connect().await.ok().unwrap();
        session.close().await.unwrap();
        assert_eq!(connector.attempts(), 3);
        assert!(connector.session().is_closed());
    }

    #[tokio::test]
    async fn test_connector_rejecting() {
        let connector = MockConnector::new(sample()).rejecting();
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Authentication(_)));
        assert!(!err.is_retryable());
    }
}
