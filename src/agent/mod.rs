//! Sync agents: one polling loop per mirror definition.

mod shutdown;
mod sync_agent;
mod transfer;

pub use shutdown::{Shutdown, ShutdownController};
pub use sync_agent::SyncAgent;
pub use transfer::{IterationReport, TransferAttempt, TransferOutcome};
