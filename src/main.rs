//! Mirrors thermal camera drops from the file server into object storage.
//!
//! Invoked by a scheduler with an optional JSON trigger event. Progress is
//! logged to stderr; the run report is printed to stdout as
//! `{"statusCode": 200, "body": ...}`.

mod error;
mod event;
mod setup;

use crate::error::{ErrorKind, Result};
use crate::event::TriggerEvent;
use clap::Parser;
use exn::ResultExt;
use serde::Serialize;
use std::process::ExitCode;
use thermo_config::ConfigHandle;
use thermo_pipeline::RunReport;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Trigger event as JSON, for example `{"site_tier": "hourly"}`.
    event: Option<String>,
}

#[derive(Debug, Serialize)]
struct Response {
    #[serde(rename = "statusCode")]
    status_code: u16,
    body: RunReport,
}
impl Response {
    fn ok(body: RunReport) -> Self {
        Self { status_code: 200, body }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match execute(cli).await {
        Ok(response) => match serde_json::to_string(&response) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            },
            Err(e) => {
                tracing::error!(error = %e, "Could not serialize run report");
                ExitCode::FAILURE
            },
        },
        Err(e) => {
            tracing::error!(error = ?e, "Run failed");
            ExitCode::FAILURE
        },
    }
}

async fn execute(cli: Cli) -> Result<Response> {
    let event = TriggerEvent::parse(cli.event.as_deref()).or_raise(|| ErrorKind::Event)?;
    let config = ConfigHandle::from_env().get().or_raise(|| ErrorKind::Config)?;
    let today = OffsetDateTime::now_utc().date();

    let sites = event.select_sites(&config.sites);
    if sites.is_empty() {
        tracing::warn!(tier = ?event.site_tier, "No enabled sites selected; nothing to do");
        return Ok(Response::ok(RunReport::no_sites(today)));
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), sites = ?sites, dry_run = config.dry_run, "Starting transfer");

    let store = setup::store(&config).await?;
    let connector = setup::connector(&config)?;
    let ctx = setup::context(&config)?;
    let report = thermo_pipeline::run(&*connector, &store, &ctx, &sites, today, setup::retry_policy(&config))
        .await
        .or_raise(|| ErrorKind::Pipeline)?;
    Ok(Response::ok(report))
}
