//! Incremental mirroring of remote date folders into object storage.
//!
//! Each run connects once, loads the checkpoint, and for every site visits a
//! bounded batch of past date folders plus today's folder. Files are copied
//! through a local staging area and deleted from the source only once the
//! destination confirms them. Destination existence, not the checkpoint, is
//! what makes a transfer idempotent: the checkpoint only narrows the scan.
//!
//! The primary entry point is [`run`], which drives [`ingest`] into a
//! [`RunReport`].

pub mod checkpoint;
mod connect;
pub mod error;
mod plan;
mod reclaim;
mod run;
mod scan;
mod transfer;

pub use crate::checkpoint::{Checkpoint, CheckpointStore};
pub use crate::connect::{RetryPolicy, connect};
pub use crate::plan::{Plan, plan};
pub use crate::reclaim::reclaim_folder;
pub use crate::run::{RunEvent, RunReport, RunStatus, SiteReport, SiteSkip, ingest, run};
pub use crate::scan::{date_folders, parse_date};
pub use crate::transfer::{FileGroup, FileOutcome, FolderReport, transfer_folder};
use std::path::PathBuf;
use thermo_storage::ObjectKey;

/// Shape of a date folder on the remote server.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Sub-folder holding images.
    pub image_dir: String,
    pub image_extension: String,
    /// Extension of the files directly inside the date folder.
    pub measurement_extension: String,
}
impl Default for Layout {
    fn default() -> Self {
        Self {
            image_dir: "thermal".to_string(),
            image_extension: ".png".to_string(),
            measurement_extension: ".csv".to_string(),
        }
    }
}

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct Context {
    pub layout: Layout,
    /// Maximum number of past date folders visited per site and run.
    pub batch_size: usize,
    /// Where downloads are held until uploaded.
    pub staging_dir: PathBuf,
    /// Location of the checkpoint object in the store.
    pub checkpoint_key: ObjectKey,
}
