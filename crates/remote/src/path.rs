//! Paths on the remote server, relative to the session root.

use crate::error::{ErrorKind, Result};
use std::fmt;

/// A path on the remote server, relative to the configured root folder.
///
/// Built one segment at a time; every segment is a single folder or file
/// name, so a path can never escape the root.
///
/// # Examples
///
/// ```
/// use thermo_remote::RemotePath;
///
/// let folder = RemotePath::root().join("site-a").unwrap().join("2024-01-02").unwrap();
/// assert_eq!(folder.to_string(), "site-a/2024-01-02");
/// assert_eq!(folder.name(), Some("2024-01-02"));
/// assert!(RemotePath::root().join("..").is_err());
/// assert!(RemotePath::root().join("a/b").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    /// The session root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from individual segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        segments.into_iter().try_fold(Self::root(), |path, segment| path.join(segment))
    }

    /// Append a single segment.
    pub fn join(&self, segment: impl AsRef<str>) -> Result<Self> {
        let segment = segment.as_ref();
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains('/')
            || segment.contains('\\')
            || segment.contains('\0')
        {
            exn::bail!(ErrorKind::InvalidPath(segment.to_string()));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Containing folder, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self { segments: rest.to_vec() })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Absolute form underneath a server-side root folder such as `/data`.
    ///
    /// The result always starts with `/`, also for a relative root like
    /// `data`, so it never depends on the server's working directory.
    pub fn under(&self, root: &str) -> String {
        let segments: Vec<&str> = root
            .split('/')
            .filter(|segment| !segment.is_empty())
            .chain(self.segments.iter().map(String::as_str))
            .collect();
        format!("/{}", segments.join("/"))
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.is_root() {
            true => f.write_str("."),
            false => f.write_str(&self.segments.join("/")),
        }
    }
}
