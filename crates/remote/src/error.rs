//! Remote Session Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A remote session error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for remote session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File or folder does not exist
    #[display("not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Access denied, or the server refused the action on that path
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Folder removal refused because it still has entries
    #[display("folder not empty: {_0}")]
    NotEmpty(#[error(not(source))] String),
    /// Could not reach the server, or the control/data connection dropped
    #[display("connection error: {_0}")]
    Connection(#[error(not(source))] String),
    /// Server rejected the credentials
    #[display("authentication failed: {_0}")]
    Authentication(#[error(not(source))] String),
    /// Server answered with something unexpected
    #[display("protocol error: {_0}")]
    Protocol(#[error(not(source))] String),
    /// Local I/O error (staging file, mounted folder)
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path segment is empty, `.`/`..`, or contains a separator
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Only transient connection failures qualify: a refused login or a root
    /// folder we aren't allowed into will be refused again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Io(_))
    }

    /// Returns `true` if the path is missing or cannot be entered.
    pub fn is_inaccessible(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::PermissionDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Connection("refused".to_string()), true)]
    #[case(ErrorKind::Io(IoError::other("broken pipe")), true)]
    #[case(ErrorKind::Authentication("530".to_string()), false)]
    #[case(ErrorKind::PermissionDenied("/data".to_string()), false)]
    #[case(ErrorKind::NotFound("/data".to_string()), false)]
    #[case(ErrorKind::Protocol("500".to_string()), false)]
    fn test_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn test_inaccessible() {
        assert!(ErrorKind::NotFound("site".to_string()).is_inaccessible());
        assert!(ErrorKind::PermissionDenied("site".to_string()).is_inaccessible());
        assert!(!ErrorKind::NotEmpty("site".to_string()).is_inaccessible());
    }
}
