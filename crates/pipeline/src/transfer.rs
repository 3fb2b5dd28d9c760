//! Per-folder file transfer.
//!
//! Every matching file goes through the same steps: derive its destination
//! key, ask the store whether it is already there, copy it through a staging
//! file if not, and only then delete it from the source. A failure on one file
//! is logged and leaves that file on the source; the next run picks it up.

use crate::error::{ErrorKind, Result};
use crate::{Context, Layout};
use exn::ResultExt;
use serde::Serialize;
use std::path::Path;
use thermo_remote::{RemotePath, RemoteSession};
use thermo_storage::{ObjectKey, ObjectStore};
use time::Date;
use tracing::instrument;

/// The two kinds of file found in a date folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileGroup {
    /// Files in the image sub-folder.
    Image,
    /// Files directly inside the date folder.
    Measurement,
}

impl FileGroup {
    pub const ALL: [FileGroup; 2] = [FileGroup::Image, FileGroup::Measurement];

    pub fn extension<'a>(&self, layout: &'a Layout) -> &'a str {
        match self {
            Self::Image => &layout.image_extension,
            Self::Measurement => &layout.measurement_extension,
        }
    }

    /// Folder holding this group's files.
    pub fn folder(&self, layout: &Layout, date_folder: &RemotePath) -> thermo_remote::error::Result<RemotePath> {
        match self {
            Self::Image => date_folder.join(&layout.image_dir),
            Self::Measurement => Ok(date_folder.clone()),
        }
    }
}

/// What happened to a single source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Copied to the destination during this run.
    Transferred { bytes: u64, source_deleted: bool },
    /// The destination already had it; nothing was copied.
    AlreadyPresent { source_deleted: bool },
    /// Left on the source, to be retried by a later run.
    Failed,
}

impl FileOutcome {
    fn source_deleted(&self) -> bool {
        matches!(self, Self::Transferred { source_deleted: true, .. } | Self::AlreadyPresent { source_deleted: true })
    }
}

/// Counters for one processed date folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderReport {
    pub date: Date,
    pub is_today: bool,
    pub transferred: u64,
    pub bytes: u64,
    pub already_present: u64,
    pub failed: u64,
    /// Files present at the destination whose source copy could not be deleted.
    pub delete_failed: u64,
    /// Groups whose folder could not be listed.
    pub skipped_groups: Vec<FileGroup>,
    /// Source folders removed after the folder was drained.
    pub reclaimed: Vec<String>,
}

impl FolderReport {
    pub fn new(date: Date, is_today: bool) -> Self {
        Self {
            date,
            is_today,
            transferred: 0,
            bytes: 0,
            already_present: 0,
            failed: 0,
            delete_failed: 0,
            skipped_groups: Vec::new(),
            reclaimed: Vec::new(),
        }
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Transferred { bytes, .. } => {
                self.transferred += 1;
                self.bytes += bytes;
            },
            FileOutcome::AlreadyPresent { .. } => self.already_present += 1,
            FileOutcome::Failed => self.failed += 1,
        }
        if !matches!(outcome, FileOutcome::Failed) && !outcome.source_deleted() {
            self.delete_failed += 1;
        }
    }
}

/// Transfer both file groups of one date folder.
///
/// A group whose folder cannot be listed is skipped (and recorded in the
/// report); the other group is still processed. Never fails as a whole.
#[instrument(skip_all, fields(site = %site, date = %date))]
pub async fn transfer_folder(
    session: &dyn RemoteSession,
    store: &dyn ObjectStore,
    ctx: &Context,
    site: &RemotePath,
    date: Date,
    is_today: bool,
) -> FolderReport {
    let mut report = FolderReport::new(date, is_today);
    let date_folder = match site.join(date.to_string()) {
        Ok(folder) => folder,
        Err(e) => {
            tracing::warn!(error = %e, "Date folder has no valid remote path");
            report.skipped_groups.extend(FileGroup::ALL);
            return report;
        },
    };

    for group in FileGroup::ALL {
        let folder = match group.folder(&ctx.layout, &date_folder) {
            Ok(folder) => folder,
            Err(e) => {
                tracing::warn!(?group, error = %e, "Group folder has no valid remote path");
                report.skipped_groups.push(group);
                continue;
            },
        };
        let mut names = match session.list(&folder).await {
            Ok(names) => names,
            Err(e) => {
                tracing::info!(?group, folder = %folder, error = %e, "Folder missing or inaccessible; skipping group");
                report.skipped_groups.push(group);
                continue;
            },
        };
        let extension = group.extension(&ctx.layout);
        names.retain(|name| name.ends_with(extension));
        names.sort_unstable();
        tracing::debug!(?group, folder = %folder, files = names.len(), "Listed files");

        for name in names {
            let outcome = match folder.join(&name) {
                Ok(file) => transfer_file(session, store, ctx, &file).await,
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Unusable file name; leaving on source");
                    FileOutcome::Failed
                },
            };
            report.record(outcome);
        }
    }

    tracing::info!(
        transferred = report.transferred,
        already_present = report.already_present,
        failed = report.failed,
        "Date folder processed"
    );
    report
}

/// Make sure one file is at the destination, then remove it from the source.
pub(crate) async fn transfer_file(
    session: &dyn RemoteSession,
    store: &dyn ObjectStore,
    ctx: &Context,
    file: &RemotePath,
) -> FileOutcome {
    // Keys mirror the source layout: site/date[/image_dir]/name.
    let key = match ObjectKey::from_segments(file.segments()) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(file = %file, error = %e, "No valid destination key; leaving on source");
            return FileOutcome::Failed;
        },
    };

    match store.exists(&key).await {
        Ok(true) => {
            tracing::info!(key = %key, "Already at destination");
            let source_deleted = delete_source(session, file).await;
            FileOutcome::AlreadyPresent { source_deleted }
        },
        Ok(false) => match copy_via_staging(session, store, &ctx.staging_dir, file, &key).await {
            Ok(bytes) => {
                tracing::info!(key = %key, bytes, "Transferred");
                let source_deleted = delete_source(session, file).await;
                FileOutcome::Transferred { bytes, source_deleted }
            },
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "Transfer failed; leaving on source");
                FileOutcome::Failed
            },
        },
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Could not check destination; leaving on source");
            FileOutcome::Failed
        },
    }
}

/// Download into a fresh staging file and upload it from there. The staging
/// file is removed on every path.
async fn copy_via_staging(
    session: &dyn RemoteSession,
    store: &dyn ObjectStore,
    staging_dir: &Path,
    file: &RemotePath,
    key: &ObjectKey,
) -> Result<u64> {
    let staged = tempfile::Builder::new()
        .prefix("thermo-")
        .tempfile_in(staging_dir)
        .or_raise(|| ErrorKind::Staging)?;
    let result = download_then_upload(session, store, file, key, staged.path()).await;
    if let Err(e) = staged.close() {
        tracing::warn!(error = %e, "Could not remove staging file");
    }
    result
}

async fn download_then_upload(
    session: &dyn RemoteSession,
    store: &dyn ObjectStore,
    file: &RemotePath,
    key: &ObjectKey,
    staged: &Path,
) -> Result<u64> {
    let downloaded = session.retrieve(file, staged).await.or_raise(|| ErrorKind::Remote)?;
    tracing::debug!(file = %file, bytes = downloaded, "Downloaded to staging");
    store.upload(key, staged).await.or_raise(|| ErrorKind::Storage)
}

async fn delete_source(session: &dyn RemoteSession, file: &RemotePath) -> bool {
    match session.delete(file).await {
        Ok(()) => {
            tracing::debug!(file = %file, "Deleted from source");
            true
        },
        Err(e) => {
            tracing::warn!(file = %file, error = %e, "Could not delete from source");
            false
        },
    }
}
