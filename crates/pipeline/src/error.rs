//! Pipeline Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Only failures that abort a whole run
//! surface as errors; anything scoped to a site, folder or file is logged and
//! recorded in the [`RunReport`](crate::RunReport) instead.

use derive_more::{Display, Error};

/// A pipeline error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a pipeline failure.
///
/// ### Fatal
/// - [`ErrorKind::Connect`]
/// - [`ErrorKind::Checkpoint`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Remote`]
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Staging`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No session could be established with the remote server.
    #[display("could not connect to the remote server")]
    Connect,
    /// The checkpoint could not be loaded, decoded or saved.
    #[display("checkpoint unavailable")]
    Checkpoint,
    /// A remote session operation failed.
    #[display("remote operation failed")]
    Remote,
    /// An object store operation failed.
    #[display("object store operation failed")]
    Storage,
    /// The local staging file could not be created.
    #[display("staging area unavailable")]
    Staging,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote | Self::Storage)
    }
}
