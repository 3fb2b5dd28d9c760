//! Remote file server access.
//!
//! Field devices drop their files onto a legacy file server. This crate
//! exposes that server as an explicit [`RemoteSession`] capability obtained
//! from a [`Connector`], so the transfer pipeline never talks to a concrete
//! client directly and tests can substitute an in-memory tree.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::{Connector, RemoteSession};
pub use crate::path::RemotePath;
use std::sync::Arc;

pub type SessionHandle = Arc<dyn RemoteSession + Send + Sync>;
pub type ConnectorHandle = Arc<dyn Connector + Send + Sync>;
