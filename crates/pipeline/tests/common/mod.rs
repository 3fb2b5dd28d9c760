#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thermo_pipeline::error::Result;
use thermo_pipeline::{Context, Layout, RetryPolicy, RunReport, parse_date, run};
use thermo_remote::backend::{MockConnector, MockSession};
use thermo_storage::backend::MockStore;
use thermo_storage::{ObjectKey, StoreHandle};
use time::Date;

pub const CHECKPOINT_KEY: &str = "state/ingest_checkpoint.json";

pub fn day(s: &str) -> Date {
    parse_date(s).unwrap()
}

/// Consecutive `YYYY-MM-DD` names starting at `first`.
pub fn days(first: &str, count: usize) -> Vec<String> {
    std::iter::successors(Some(day(first)), |d| d.next_day()).take(count).map(|d| d.to_string()).collect()
}

pub struct Harness {
    pub connector: MockConnector,
    pub store: Arc<MockStore>,
    pub staging: TempDir,
    pub ctx: Context,
}

impl Harness {
    pub fn new(session: MockSession, store: MockStore) -> Self {
        Self::with_connector(MockConnector::new(session), store)
    }

    pub fn with_connector(connector: MockConnector, store: MockStore) -> Self {
        let staging = tempfile::tempdir().unwrap();
        let ctx = Context {
            layout: Layout::default(),
            batch_size: 2,
            staging_dir: staging.path().to_path_buf(),
            checkpoint_key: ObjectKey::new(CHECKPOINT_KEY).unwrap(),
        };
        Self { connector, store: Arc::new(store), staging, ctx }
    }

    pub fn session(&self) -> &MockSession {
        self.connector.session()
    }

    pub fn store_handle(&self) -> StoreHandle {
        self.store.clone()
    }

    pub fn policy() -> RetryPolicy {
        RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(10) }
    }

    pub async fn run(&self, sites: &[&str], today: &str) -> Result<RunReport> {
        let sites: Vec<String> = sites.iter().map(|s| s.to_string()).collect();
        run(&self.connector, &self.store_handle(), &self.ctx, &sites, day(today), Self::policy()).await
    }

    /// The checkpoint object as stored, if any.
    pub async fn saved_checkpoint(&self) -> Option<serde_json::Value> {
        let data = self.store.get(CHECKPOINT_KEY).await?;
        Some(serde_json::from_slice(&data).unwrap())
    }

    pub async fn file_keys(&self) -> Vec<String> {
        self.store.keys().await.into_iter().filter(|key| key != CHECKPOINT_KEY).collect()
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging.path()).unwrap().next().is_none()
    }
}
