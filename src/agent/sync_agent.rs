//! The per-mirror polling loop.
//!
//! Each iteration lists the source, asks the destination about every key, and
//! mirrors the keys it does not already have: fetch into the agent's staging
//! directory, store under the identical relative path, then remove the staged
//! file. Failures are per object and never stop the loop.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use super::shutdown::Shutdown;
use super::transfer::{IterationReport, TransferAttempt, TransferOutcome};
use crate::config::MirrorDefinition;
use crate::destination::{Destination, target_path};
use crate::source::{Source, partial_path};

/// Runs one mirror definition against its source and destination.
pub struct SyncAgent {
    definition: MirrorDefinition,
    source: Arc<dyn Source>,
    destination: Arc<dyn Destination>,
    staging_dir: PathBuf,
}

impl SyncAgent {
    /// Create an agent staging its downloads under `staging_root/<name>`.
    pub fn new(
        definition: MirrorDefinition,
        source: Arc<dyn Source>,
        destination: Arc<dyn Destination>,
        staging_root: &Path,
    ) -> Self {
        let staging_dir = staging_root.join(&definition.name);
        Self {
            definition,
            source,
            destination,
            staging_dir,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &MirrorDefinition {
        &self.definition
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Poll until shutdown, sleeping the configured interval between iterations.
    pub async fn run(&self, shutdown: Shutdown) {
        info!(
            agent = %self.name(),
            source = %self.source.describe(),
            target = %self.definition.target_repository,
            interval_secs = self.definition.interval.as_secs(),
            "Agent started"
        );

        while !shutdown.is_shutdown() {
            let report = self.run_iteration(&shutdown).await;
            if report.cancelled {
                break;
            }

            info!(
                agent = %self.name(),
                "Sleeping {}s until next iteration",
                self.definition.interval.as_secs()
            );
            if !shutdown.sleep(self.definition.interval).await {
                break;
            }
        }

        info!(agent = %self.name(), "Agent stopped");
    }

    /// List the source once and process every key.
    pub async fn run_iteration(&self, shutdown: &Shutdown) -> IterationReport {
        let mut report = IterationReport::default();

        let keys = match shutdown.guard(self.source.list_objects()).await {
            None => {
                report.cancelled = true;
                return report;
            }
            Some(Ok(keys)) => keys,
            Some(Err(e)) => {
                error!(
                    agent = %self.name(),
                    source = %self.source.describe(),
                    error = %e,
                    "Listing failed, no objects processed this iteration"
                );
                report.listing_failed = true;
                Vec::new()
            }
        };

        for key in &keys {
            if shutdown.is_shutdown() {
                report.cancelled = true;
                break;
            }

            let attempt = self.transfer(key, shutdown).await;
            let cancelled = attempt.outcome == TransferOutcome::Cancelled;
            report.attempts.push(attempt);
            if cancelled {
                report.cancelled = true;
                break;
            }
        }

        info!(
            agent = %self.name(),
            listed = keys.len(),
            mirrored = report.mirrored(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Iteration complete"
        );
        report
    }

    async fn transfer(&self, key: &str, shutdown: &Shutdown) -> TransferAttempt {
        let repository = &self.definition.target_repository;
        let target = target_path(repository, key);

        let exists = match shutdown.guard(self.destination.exists(repository, key)).await {
            None => return TransferAttempt::new(key, None, TransferOutcome::Cancelled),
            Some(Ok(exists)) => exists,
            Some(Err(e)) => {
                warn!(agent = %self.name(), key = %key, error = %e, "Existence check failed");
                return TransferAttempt::new(key, None, TransferOutcome::CheckFailed);
            }
        };

        if exists {
            info!(agent = %self.name(), "[skip] {}", target);
            return TransferAttempt::new(key, None, TransferOutcome::Skipped);
        }

        let local_path = match self.staging_path(key) {
            Some(path) => path,
            None => {
                warn!(
                    agent = %self.name(),
                    key = %key,
                    "Key does not name a file inside the staging directory"
                );
                return TransferAttempt::new(key, None, TransferOutcome::InvalidKey);
            }
        };

        info!(agent = %self.name(), "[mirror] {}", target);
        let outcome = self.fetch_and_store(key, &local_path, shutdown).await;
        self.remove_staged(&local_path).await;

        TransferAttempt::new(key, Some(local_path), outcome)
    }

    async fn fetch_and_store(
        &self,
        key: &str,
        local_path: &Path,
        shutdown: &Shutdown,
    ) -> TransferOutcome {
        let repository = &self.definition.target_repository;

        match shutdown
            .guard(self.source.fetch_object(key, local_path))
            .await
        {
            None => return TransferOutcome::Cancelled,
            Some(Err(e)) => {
                error!(agent = %self.name(), key = %key, error = %e, "Fetch failed");
                return TransferOutcome::FetchFailed;
            }
            Some(Ok(())) => {}
        }

        match shutdown
            .guard(self.destination.store(local_path, repository, key))
            .await
        {
            None => TransferOutcome::Cancelled,
            Some(Err(e)) => {
                error!(agent = %self.name(), key = %key, error = %e, "Upload failed");
                TransferOutcome::StoreFailed
            }
            Some(Ok(())) => TransferOutcome::Mirrored,
        }
    }

    /// Local path for `key`, or None if the key would land outside the
    /// staging directory.
    fn staging_path(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !plain {
            return None;
        }
        Some(self.staging_dir.join(relative))
    }

    /// Remove a staged file (and any partial download of it), then prune
    /// parent directories left empty, stopping at the staging directory.
    async fn remove_staged(&self, local_path: &Path) {
        for path in [local_path.to_path_buf(), partial_path(local_path)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    agent = %self.name(),
                    path = %path.display(),
                    error = %e,
                    "Failed to remove staged file"
                ),
            }
        }

        let mut dir = local_path.parent();
        while let Some(current) = dir {
            if current == self.staging_dir || !current.starts_with(&self.staging_dir) {
                break;
            }
            // Fails on a non-empty directory, which ends the walk
            if tokio::fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}
