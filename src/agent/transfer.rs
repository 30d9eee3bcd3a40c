use std::fmt;
use std::path::PathBuf;

use crate::source::ObjectKey;

/// What happened to one object during one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferOutcome {
    /// Already present in the destination; nothing fetched.
    Skipped,
    /// Fetched and stored.
    Mirrored,
    /// The existence check failed, so the object was left alone.
    CheckFailed,
    FetchFailed,
    StoreFailed,
    /// The key cannot be staged safely and was never fetched.
    InvalidKey,
    /// Shutdown arrived while the object was in flight.
    Cancelled,
}

impl TransferOutcome {
    /// Whether the object should have been mirrored but was not.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TransferOutcome::CheckFailed
                | TransferOutcome::FetchFailed
                | TransferOutcome::StoreFailed
                | TransferOutcome::InvalidKey
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransferOutcome::Skipped => "skipped",
            TransferOutcome::Mirrored => "mirrored",
            TransferOutcome::CheckFailed => "check-failed",
            TransferOutcome::FetchFailed => "fetch-failed",
            TransferOutcome::StoreFailed => "store-failed",
            TransferOutcome::InvalidKey => "invalid-key",
            TransferOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One object's pass through check, fetch, store and cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAttempt {
    pub key: ObjectKey,
    /// Where the object was staged; None when it was never fetched.
    pub local_path: Option<PathBuf>,
    pub outcome: TransferOutcome,
}

impl TransferAttempt {
    pub(crate) fn new(key: &str, local_path: Option<PathBuf>, outcome: TransferOutcome) -> Self {
        Self {
            key: key.to_string(),
            local_path,
            outcome,
        }
    }
}

/// Summary of a single agent iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub attempts: Vec<TransferAttempt>,
    /// The source could not be listed; no objects were processed.
    pub listing_failed: bool,
    /// Shutdown ended the iteration early.
    pub cancelled: bool,
}

impl IterationReport {
    /// Number of attempts with the given outcome.
    pub fn count(&self, outcome: TransferOutcome) -> usize {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome == outcome)
            .count()
    }

    pub fn mirrored(&self) -> usize {
        self.count(TransferOutcome::Mirrored)
    }

    pub fn skipped(&self) -> usize {
        self.count(TransferOutcome::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome.is_failure())
            .count()
    }

    /// Whether anything went wrong, listing included.
    pub fn has_failures(&self) -> bool {
        self.listing_failed || self.failed() > 0
    }

    /// Keys with the given outcome, in processing order.
    pub fn keys_with(&self, outcome: TransferOutcome) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|attempt| attempt.outcome == outcome)
            .map(|attempt| attempt.key.as_str())
            .collect()
    }
}
