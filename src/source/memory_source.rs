use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::staged_file::StagedFile;
use super::{ObjectKey, Result, Source, SourceError};

/// An in-memory implementation of `Source`, intended primarily for testing.
///
/// Records every listing and fetch so tests can assert on the calls an agent
/// made, and can be told to fail listings or individual fetches.
pub struct MemorySource {
    objects: RwLock<BTreeMap<ObjectKey, Vec<u8>>>,
    failing_fetches: RwLock<HashSet<ObjectKey>>,
    failing_listings: AtomicUsize,
    listings: AtomicUsize,
    fetches: Mutex<Vec<(ObjectKey, PathBuf)>>,
}

impl MemorySource {
    /// Create a new empty in-memory source.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            failing_fetches: RwLock::new(HashSet::new()),
            failing_listings: AtomicUsize::new(0),
            listings: AtomicUsize::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Builder-style insert.
    pub fn with_object(self, key: impl Into<ObjectKey>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(key, data);
        self
    }

    pub fn insert(&self, key: impl Into<ObjectKey>, data: impl Into<Vec<u8>>) {
        self.objects.write().unwrap().insert(key.into(), data.into());
    }

    /// Make the next `count` listings fail with `SourceError::Unavailable`.
    pub fn fail_next_listings(&self, count: usize) {
        self.failing_listings.store(count, Ordering::SeqCst);
    }

    /// Make every fetch of `key` fail with `SourceError::FetchFailed`.
    pub fn fail_fetch(&self, key: impl Into<ObjectKey>) {
        self.failing_fetches.write().unwrap().insert(key.into());
    }

    /// Number of listings attempted so far, failed ones included.
    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Every fetch attempted so far, as `(key, destination)`.
    pub fn fetches(&self) -> Vec<(ObjectKey, PathBuf)> {
        self.fetches.lock().unwrap().clone()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn list_objects(&self) -> Result<Vec<ObjectKey>> {
        self.listings.fetch_add(1, Ordering::SeqCst);

        let fail = self
            .failing_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(SourceError::Unavailable(
                "simulated listing failure".to_string(),
            ));
        }

        Ok(self.objects.read().unwrap().keys().cloned().collect())
    }

    async fn fetch_object(&self, key: &str, destination: &Path) -> Result<()> {
        self.fetches
            .lock()
            .unwrap()
            .push((key.to_string(), destination.to_path_buf()));

        if self.failing_fetches.read().unwrap().contains(key) {
            return Err(SourceError::fetch_failed(key, "simulated fetch failure"));
        }

        let data = self
            .objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::fetch_failed(key, "no such object"))?;

        let mut staged = StagedFile::create(destination).await?;
        staged.write(&data).await?;
        staged.commit().await?;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
