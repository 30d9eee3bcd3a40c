use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::error::{DestinationError, Result};
use super::{Destination, target_path};

/// One `store` call observed by a [`MemoryDestination`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    /// The local file that was uploaded.
    pub local_file: PathBuf,
    /// The `repository/relative_path` it was stored at.
    pub path: String,
}

/// An in-memory implementation of `Destination`, intended primarily for testing.
///
/// Stored objects are retained, so later existence checks for the same path
/// report them as present. Every query and store is recorded.
pub struct MemoryDestination {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    failing_queries: RwLock<HashSet<String>>,
    failing_stores: RwLock<HashSet<String>>,
    queries: Mutex<Vec<String>>,
    stores: Mutex<Vec<StoreRecord>>,
}

impl MemoryDestination {
    /// Create a new empty in-memory destination.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            failing_queries: RwLock::new(HashSet::new()),
            failing_stores: RwLock::new(HashSet::new()),
            queries: Mutex::new(Vec::new()),
            stores: Mutex::new(Vec::new()),
        }
    }

    /// Builder-style insert of an object already present in `repository`.
    pub fn with_object(self, repository: &str, relative_path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.objects
            .write()
            .unwrap()
            .insert(target_path(repository, relative_path), data.into());
        self
    }

    /// Contents stored at `repository/relative_path`, if any.
    pub fn object(&self, repository: &str, relative_path: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap()
            .get(&target_path(repository, relative_path))
            .cloned()
    }

    /// Make existence checks of `repository/relative_path` fail.
    pub fn fail_query(&self, repository: &str, relative_path: &str) {
        self.failing_queries
            .write()
            .unwrap()
            .insert(target_path(repository, relative_path));
    }

    /// Make uploads to `repository/relative_path` fail.
    pub fn fail_store(&self, repository: &str, relative_path: &str) {
        self.failing_stores
            .write()
            .unwrap()
            .insert(target_path(repository, relative_path));
    }

    /// Stop failing uploads to `repository/relative_path`.
    pub fn allow_store(&self, repository: &str, relative_path: &str) {
        self.failing_stores
            .write()
            .unwrap()
            .remove(&target_path(repository, relative_path));
    }

    /// Every path queried so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Every store attempted so far, in order, failed ones included.
    pub fn stores(&self) -> Vec<StoreRecord> {
        self.stores.lock().unwrap().clone()
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn exists(&self, repository: &str, relative_path: &str) -> Result<bool> {
        let path = target_path(repository, relative_path);
        self.queries.lock().unwrap().push(path.clone());

        if self.failing_queries.read().unwrap().contains(&path) {
            return Err(DestinationError::query_failed(&path, "simulated query failure"));
        }

        Ok(self.objects.read().unwrap().contains_key(&path))
    }

    async fn store(&self, local_file: &Path, repository: &str, relative_path: &str) -> Result<()> {
        let path = target_path(repository, relative_path);
        self.stores.lock().unwrap().push(StoreRecord {
            local_file: local_file.to_path_buf(),
            path: path.clone(),
        });

        if self.failing_stores.read().unwrap().contains(&path) {
            return Err(DestinationError::upload_failed(&path, "simulated upload failure"));
        }

        let data = tokio::fs::read(local_file)
            .await
            .map_err(|e| DestinationError::upload_failed(&path, e))?;
        self.objects.write().unwrap().insert(path, data);
        Ok(())
    }
}
