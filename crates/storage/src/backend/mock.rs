//! In-memory object store for testing.

use crate::error::{ErrorKind, Result};
use crate::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::sync::RwLock;

/// In-memory object store for testing.
///
/// Objects are stored in a `BTreeMap` behind a [`RwLock`], so all trait
/// methods can operate on `&self` without external synchronisation. Writes to
/// keys registered with [`failing_on`](Self::failing_on) fail with a network
/// error and store nothing, simulating a destination outage.
///
/// # Examples
///
/// ```
/// use thermo_storage::backend::MockStore;
/// use thermo_storage::{ObjectKey, ObjectStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::with_objects([("site/2024-01-01/a.csv", b"t,v")]);
/// assert!(store.exists(&ObjectKey::new("site/2024-01-01/a.csv")?).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    name: String,
    objects: RwLock<BTreeMap<ObjectKey, Vec<u8>>>,
    failing: BTreeSet<ObjectKey>,
}

impl MockStore {
    /// Create a mock store pre-populated with objects.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        for (key, data) in objects {
            let Ok(validated) = ObjectKey::new(key.as_ref()) else {
                panic!("MockStore::with_objects: invalid key {}", key.as_ref());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            objects: RwLock::new(map),
            failing: BTreeSet::new(),
        }
    }

    /// Change the name of the mock store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every write or upload to `key` fail.
    pub fn failing_on(mut self, key: impl AsRef<str>) -> Self {
        let Ok(validated) = ObjectKey::new(key.as_ref()) else {
            panic!("MockStore::failing_on: invalid key {}", key.as_ref());
        };
        self.failing.insert(validated);
        self
    }

    /// All stored keys, in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().map(|k| k.to_string()).collect()
    }

    /// Contents of a stored object, if present.
    pub async fn get(&self, key: impl AsRef<str>) -> Option<Vec<u8>> {
        let key = ObjectKey::new(key.as_ref()).ok()?;
        self.objects.read().await.get(&key).cloned()
    }

    fn check_failure(&self, key: &ObjectKey) -> Result<()> {
        if self.failing.contains(key) {
            exn::bail!(ErrorKind::Network(format!("simulated write failure for {key}")));
        }
        Ok(())
    }
}
impl Default for MockStore {
    fn default() -> Self {
        let objects: [(&str, &[u8]); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn read(&self, key: &ObjectKey) -> Result<Vec<u8>> {
        let data = self.objects.read().await.get(key).cloned();
        data.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.to_string())))
    }

    async fn write(&self, key: &ObjectKey, data: &[u8]) -> Result<()> {
        self.check_failure(key)?;
        self.objects.write().await.insert(key.clone(), data.to_vec());
        Ok(())
    }

    async fn upload(&self, key: &ObjectKey, local: &Path) -> Result<u64> {
        self.check_failure(key)?;
        let data = tokio::fs::read(local).await.map_err(ErrorKind::Io)?;
        let size = data.len() as u64;
        self.objects.write().await.insert(key.clone(), data);
        Ok(size)
    }
}
