//! Object key validation.
//!
//! Keys mirror the layout of the source server (`site/date/thermal/file.png`)
//! and are always relative to the store root (or the configured prefix).

use crate::error::{Error, ErrorKind, Result};
use std::fmt;
use std::str::FromStr;

/// A validated, normalized object key.
///
/// Segments are separated by `/`. Empty and `.` segments are dropped, `..`
/// removes the previous segment and must never climb above the root.
///
/// > **Note:** Backslashes are **not** treated as separators. They are
/// >           perfectly valid (if unwise) characters in an object key.
///
/// # Examples
///
/// ```
/// use thermo_storage::ObjectKey;
/// // Valid keys
/// assert!(ObjectKey::new("site-a/2024-01-01/reading.csv").is_ok());
/// assert!(ObjectKey::new("a/../b.csv").is_ok()); // (never leaves the root)
/// // Invalid keys
/// assert!(ObjectKey::new("../state.json").is_err());
/// assert!(ObjectKey::new("a\0b").is_err());
/// // Keys get normalized
/// assert_eq!(
///     ObjectKey::new("/site-a//2024-01-01/./thermal/").unwrap().as_str(),
///     "site-a/2024-01-01/thermal"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl AsRef<str>) -> Result<Self> {
        let raw = key.as_ref();
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    if segments.pop().is_none() {
                        exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
                    }
                },
                s if s.contains('\0') => exn::bail!(ErrorKind::InvalidKey(raw.to_string())),
                s => segments.push(s),
            }
        }
        match segments.is_empty() {
            true => exn::bail!(ErrorKind::InvalidKey(raw.to_string())),
            false => Ok(Self(segments.join("/"))),
        }
    }

    /// Build a key from individual segments, e.g. `["site", "2024-01-01", "a.csv"]`.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments.into_iter().map(|s| s.as_ref().to_string()).collect::<Vec<_>>().join("/");
        Self::new(joined)
    }

    /// Append a relative key underneath this one.
    pub fn join(&self, child: impl AsRef<str>) -> Result<Self> {
        let child = Self::new(child)?;
        Ok(Self(format!("{}/{}", self.0, child.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl FromStr for ObjectKey {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("site/2024-01-01/a.csv", "site/2024-01-01/a.csv")]
    #[case("site//2024-01-01//a.csv", "site/2024-01-01/a.csv")]
    #[case("./site/./thermal/b.png", "site/thermal/b.png")]
    #[case("/state/ingest_checkpoint.json", "state/ingest_checkpoint.json")]
    #[case("site/thermal/", "site/thermal")]
    #[case("a/b/..", "a")]
    fn test_normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(ObjectKey::new(input).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("//")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("a\0b")]
    fn test_rejected(#[case] input: &str) {
        let err = ObjectKey::new(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidKey(_)));
    }

    #[test]
    fn test_from_segments() {
        let key = ObjectKey::from_segments(["site-a", "2024-01-02", "thermal", "cam1.png"]).unwrap();
        assert_eq!(key.as_str(), "site-a/2024-01-02/thermal/cam1.png");
    }

    #[test]
    fn test_join() {
        let prefix = ObjectKey::new("raw/").unwrap();
        assert_eq!(prefix.join("site-a/x.csv").unwrap().as_str(), "raw/site-a/x.csv");
        assert!(prefix.join("../../x.csv").is_err());
    }
}
