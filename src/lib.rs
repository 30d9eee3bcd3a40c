//! mirrorsync - Mirror S3 objects and GitHub release assets into an artifact repository.

pub mod agent;
pub mod cli;
pub mod config;
pub mod destination;
pub mod source;
pub mod supervisor;

pub use agent::{
    IterationReport, Shutdown, ShutdownController, SyncAgent, TransferAttempt, TransferOutcome,
};
pub use destination::{ArtifactoryDestination, Destination, DestinationError, MemoryDestination};
pub use source::{
    MemorySource, ObjectKey, ObjectStoreSource, ReleaseAssetSource, Source, SourceConfig,
    SourceError,
};
pub use supervisor::{Supervisor, SupervisorError};
