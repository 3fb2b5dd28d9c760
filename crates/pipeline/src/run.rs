//! Run orchestration.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::connect::{RetryPolicy, connect};
use crate::error::Result;
use crate::plan::{Plan, plan};
use crate::reclaim::reclaim_folder;
use crate::scan::date_folders;
use crate::transfer::{FolderReport, transfer_folder};
use crate::Context;
use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use thermo_remote::{Connector, RemotePath, SessionHandle};
use thermo_storage::StoreHandle;
use time::Date;

/// Why a site was not processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteSkip {
    /// The site id cannot be used as a folder name.
    InvalidName,
    /// The site folder is missing or could not be listed.
    Inaccessible,
}

/// Progress events emitted by [`ingest`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) and [`CheckpointLoaded`](Self::CheckpointLoaded),
///    exactly once each.
/// 2. Per site, in configuration order: either [`SiteSkipped`](Self::SiteSkipped),
///    or [`SitePlanned`](Self::SitePlanned) followed by one
///    [`FolderProcessed`](Self::FolderProcessed) per planned folder, each past
///    folder followed by [`CheckpointAdvanced`](Self::CheckpointAdvanced).
/// 3. [`CheckpointSaved`](Self::CheckpointSaved) and [`Complete`](Self::Complete),
///    exactly once each.
///
/// A fatal error ends the stream with an `Err` item; nothing after it is
/// emitted and the checkpoint is not saved.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started { today: Date },
    CheckpointLoaded(Checkpoint),
    SiteSkipped { site: String, reason: SiteSkip },
    SitePlanned { site: String, plan: Plan },
    FolderProcessed { site: String, report: FolderReport },
    CheckpointAdvanced { site: String, date: Date },
    CheckpointSaved(Checkpoint),
    Complete,
}

/// Streams [`RunEvent`]s for one run over an already open session.
///
/// Sites are processed one after another, each planned folder in order; the
/// in-memory checkpoint moves forward after every past folder and is written
/// once, after the last site. Site, folder and file problems are logged and
/// reported through the events; only checkpoint load or save failures end
/// the stream with an error.
pub fn ingest<'a>(
    session: &'a SessionHandle,
    store: &'a StoreHandle,
    ctx: &'a Context,
    sites: &'a [String],
    today: Date,
) -> impl Stream<Item = Result<RunEvent>> + 'a {
    stream!({
        yield Ok(RunEvent::Started { today });
        tracing::info!(%today, sites = sites.len(), "Run started");

        let checkpoints = CheckpointStore::new(store.clone(), ctx.checkpoint_key.clone());
        let mut checkpoint = match checkpoints.load().await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::error!(error = %e, "Could not load checkpoint");
                yield Err(e);
                return;
            },
        };
        yield Ok(RunEvent::CheckpointLoaded(checkpoint.clone()));

        for site in sites {
            let site_folder = match RemotePath::root().join(site) {
                Ok(folder) => folder,
                Err(e) => {
                    tracing::warn!(%site, error = %e, "Site id is not a valid folder name; skipping");
                    yield Ok(RunEvent::SiteSkipped { site: site.clone(), reason: SiteSkip::InvalidName });
                    continue;
                },
            };
            let dates = match date_folders(&**session, &site_folder).await {
                Ok(dates) => dates,
                Err(e) => {
                    tracing::warn!(%site, error = %e, "Site folder missing or inaccessible; skipping");
                    yield Ok(RunEvent::SiteSkipped { site: site.clone(), reason: SiteSkip::Inaccessible });
                    continue;
                },
            };

            let previous = checkpoint.get(site);
            let plan = plan(&dates, previous, today, ctx.batch_size);
            tracing::info!(
                %site,
                found = dates.len(),
                checkpoint = ?previous,
                past = ?plan.past,
                today = plan.today.is_some(),
                "Planned site"
            );
            yield Ok(RunEvent::SitePlanned { site: site.clone(), plan: plan.clone() });

            for (date, is_today) in plan.folders() {
                let mut report = transfer_folder(&**session, &**store, ctx, &site_folder, date, is_today).await;
                if is_today {
                    yield Ok(RunEvent::FolderProcessed { site: site.clone(), report });
                    continue;
                }
                if let Ok(date_folder) = site_folder.join(date.to_string()) {
                    report.reclaimed = reclaim_folder(&**session, &ctx.layout, &date_folder).await;
                }
                yield Ok(RunEvent::FolderProcessed { site: site.clone(), report });
                if checkpoint.advance(site, date) {
                    tracing::info!(%site, %date, "Checkpoint advanced");
                    yield Ok(RunEvent::CheckpointAdvanced { site: site.clone(), date });
                }
            }
        }

        if let Err(e) = checkpoints.save(&checkpoint).await {
            tracing::error!(error = %e, "Could not save checkpoint");
            yield Err(e);
            return;
        }
        yield Ok(RunEvent::CheckpointSaved(checkpoint));
        yield Ok(RunEvent::Complete);
    })
}

/// Connect, run every site, and always close the session afterwards.
///
/// # Errors
/// Connection failures after retries, and checkpoint load/save failures.
pub async fn run(
    connector: &dyn Connector,
    store: &StoreHandle,
    ctx: &Context,
    sites: &[String],
    today: Date,
    policy: RetryPolicy,
) -> Result<RunReport> {
    let session = connect(connector, policy).await?;
    let result = collect(&session, store, ctx, sites, today).await;
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "Could not close remote session");
    }
    result
}

async fn collect(
    session: &SessionHandle,
    store: &StoreHandle,
    ctx: &Context,
    sites: &[String],
    today: Date,
) -> Result<RunReport> {
    let mut report = RunReport::new(today);
    let mut events = std::pin::pin!(ingest(session, store, ctx, sites, today));
    while let Some(event) = events.next().await {
        report.apply(event?);
    }
    tracing::info!(
        transferred = report.transferred,
        already_present = report.already_present,
        failed = report.failed,
        "Run complete"
    );
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Stopped before completing.
    Incomplete,
    Completed,
    /// No site was selected for this run.
    NoSites,
}

/// Per-site section of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub site: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SiteSkip>,
    /// Checkpoint before this run touched the site.
    pub previous_checkpoint: Option<Date>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    pub folders: Vec<FolderReport>,
}

/// Summary of a run, built from its [`RunEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub today: Date,
    /// Checkpoint as saved at the end of the run.
    pub checkpoint: Checkpoint,
    pub transferred: u64,
    pub already_present: u64,
    pub failed: u64,
    pub sites: Vec<SiteReport>,
}

impl RunReport {
    pub fn new(today: Date) -> Self {
        Self {
            status: RunStatus::Incomplete,
            today,
            checkpoint: Checkpoint::default(),
            transferred: 0,
            already_present: 0,
            failed: 0,
            sites: Vec::new(),
        }
    }

    /// Report for a run that had nothing to do.
    pub fn no_sites(today: Date) -> Self {
        Self { status: RunStatus::NoSites, ..Self::new(today) }
    }

    pub fn apply(&mut self, event: RunEvent) {
        match event {
            RunEvent::Started { today } => self.today = today,
            RunEvent::CheckpointLoaded(checkpoint) | RunEvent::CheckpointSaved(checkpoint) => {
                self.checkpoint = checkpoint;
            },
            RunEvent::SiteSkipped { site, reason } => self.sites.push(SiteReport {
                previous_checkpoint: self.checkpoint.get(&site),
                site,
                skipped: Some(reason),
                plan: None,
                folders: Vec::new(),
            }),
            RunEvent::SitePlanned { site, plan } => self.sites.push(SiteReport {
                previous_checkpoint: self.checkpoint.get(&site),
                site,
                skipped: None,
                plan: Some(plan),
                folders: Vec::new(),
            }),
            RunEvent::FolderProcessed { site, report } => {
                self.transferred += report.transferred;
                self.already_present += report.already_present;
                self.failed += report.failed;
                if let Some(entry) = self.sites.iter_mut().rev().find(|entry| entry.site == site) {
                    entry.folders.push(report);
                }
            },
            RunEvent::CheckpointAdvanced { site, date } => {
                self.checkpoint.advance(&site, date);
            },
            RunEvent::Complete => self.status = RunStatus::Completed,
        }
    }

    pub fn site(&self, site: &str) -> Option<&SiteReport> {
        self.sites.iter().find(|entry| entry.site == site)
    }
}
