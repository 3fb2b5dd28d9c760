//! Per-site checkpoint persisted as one JSON object.
//!
//! The stored shape is a flat object, `{ "<site>": "<YYYY-MM-DD>", ... }`,
//! with no entry for sites that were never checkpointed.

use crate::error::{ErrorKind, Result};
use crate::scan::parse_date;
use exn::ResultExt;
use serde::Serialize;
use std::collections::BTreeMap;
use thermo_storage::{ObjectKey, StoreHandle};
use time::Date;

/// Last fully drained past date, per site.
///
/// # Examples
///
/// ```
/// use thermo_pipeline::Checkpoint;
/// use time::macros::date;
///
/// let mut checkpoint = Checkpoint::default();
/// assert!(checkpoint.advance("north", date!(2024 - 01 - 02)));
/// assert!(!checkpoint.advance("north", date!(2024 - 01 - 01)));
/// assert_eq!(checkpoint.get("north"), Some(date!(2024 - 01 - 02)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Checkpoint(BTreeMap<String, Date>);

impl Checkpoint {
    pub fn get(&self, site: &str) -> Option<Date> {
        self.0.get(site).copied()
    }

    /// Move a site's checkpoint forward to `date`.
    ///
    /// Returns `false`, leaving the checkpoint untouched, when `date` is not
    /// strictly later than the current value.
    pub fn advance(&mut self, site: &str, date: Date) -> bool {
        match self.0.get(site) {
            Some(current) if *current >= date => false,
            _ => {
                self.0.insert(site.to_string(), date);
                true
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Date)> {
        self.0.iter().map(|(site, date)| (site.as_str(), *date))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Decode the stored object. Entries whose value is not a calendar date
    /// are dropped, so that site starts over from its oldest folder.
    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_slice(data)?;
        let entries = raw
            .into_iter()
            .filter_map(|(site, value)| match parse_date(&value) {
                Some(date) => Some((site, date)),
                None => {
                    tracing::warn!(site = %site, value = %value, "Ignoring checkpoint entry that is not a date");
                    None
                },
            })
            .collect();
        Ok(Self(entries))
    }
}

impl<S: Into<String>> FromIterator<(S, Date)> for Checkpoint {
    fn from_iter<I: IntoIterator<Item = (S, Date)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(site, date)| (site.into(), date)).collect())
    }
}

/// Loads and saves the [`Checkpoint`] object.
#[derive(Clone)]
pub struct CheckpointStore {
    store: StoreHandle,
    key: ObjectKey,
}

impl CheckpointStore {
    pub fn new(store: StoreHandle, key: ObjectKey) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// The persisted checkpoint, or an empty one if nothing was saved yet.
    ///
    /// # Errors
    /// Any failure other than the object being absent, including an object
    /// that is not a JSON map of strings.
    pub async fn load(&self) -> Result<Checkpoint> {
        match self.store.read(&self.key).await {
            Ok(data) => {
                let checkpoint = Checkpoint::from_json(&data).or_raise(|| ErrorKind::Checkpoint)?;
                tracing::info!(key = %self.key, sites = checkpoint.len(), "Checkpoint loaded");
                Ok(checkpoint)
            },
            Err(e) if e.is_not_found() => {
                tracing::info!(key = %self.key, "No checkpoint found; starting fresh");
                Ok(Checkpoint::default())
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::Checkpoint),
        }
    }

    /// Overwrite the persisted checkpoint with `checkpoint`.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let data = checkpoint.to_json().or_raise(|| ErrorKind::Checkpoint)?;
        self.store.write(&self.key, &data).await.or_raise(|| ErrorKind::Checkpoint)?;
        tracing::info!(key = %self.key, sites = checkpoint.len(), "Checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use thermo_storage::backend::MockStore;
    use time::macros::date;

    const KEY: &str = "state/ingest_checkpoint.json";

    fn checkpoint_store(store: MockStore) -> (Arc<MockStore>, CheckpointStore) {
        let store = Arc::new(store);
        let checkpoints = CheckpointStore::new(store.clone(), ObjectKey::new(KEY).unwrap());
        (store, checkpoints)
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut checkpoint = Checkpoint::default();
        assert!(checkpoint.advance("a", date!(2024 - 01 - 02)));
        assert!(!checkpoint.advance("a", date!(2024 - 01 - 02)));
        assert!(!checkpoint.advance("a", date!(2023 - 12 - 31)));
        assert!(checkpoint.advance("a", date!(2024 - 01 - 03)));
        assert_eq!(checkpoint.get("a"), Some(date!(2024 - 01 - 03)));
        assert_eq!(checkpoint.get("b"), None);
    }

    #[test]
    fn test_json_shape() {
        let checkpoint: Checkpoint = [("north", date!(2024 - 01 - 02)), ("east", date!(2023 - 11 - 30))].into_iter().collect();
        let json: serde_json::Value = serde_json::from_slice(&checkpoint.to_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({ "east": "2023-11-30", "north": "2024-01-02" }));
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let checkpoint = Checkpoint::from_json(br#"{ "north": "2024-01-02", "south": "yesterday" }"#).unwrap();
        assert_eq!(checkpoint.len(), 1);
        assert_eq!(checkpoint.get("north"), Some(date!(2024 - 01 - 02)));
        assert!(Checkpoint::from_json(b"[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let (_, checkpoints) = checkpoint_store(MockStore::default());
        assert!(checkpoints.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_is_fatal() {
        let (_, checkpoints) = checkpoint_store(MockStore::with_objects([(KEY, b"not json".to_vec())]));
        let err = checkpoints.load().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Checkpoint));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let (store, checkpoints) = checkpoint_store(MockStore::with_objects([(KEY, br#"{"old": "2020-01-01"}"#.to_vec())]));
        let checkpoint: Checkpoint = [("north", date!(2024 - 01 - 02))].into_iter().collect();
        checkpoints.save(&checkpoint).await.unwrap();
        assert_eq!(checkpoints.load().await.unwrap(), checkpoint);
        let raw = String::from_utf8(store.get(KEY).await.unwrap()).unwrap();
        assert!(!raw.contains("old"));
    }

    #[tokio::test]
    async fn test_save_failure() {
        let (_, checkpoints) = checkpoint_store(MockStore::default().failing_on(KEY));
        let err = checkpoints.save(&Checkpoint::default()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Checkpoint));
    }
}
