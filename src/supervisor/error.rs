use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::destination::DestinationError;
use crate::source::CreateSourceError;

/// Errors that prevent the supervisor from starting, or that end a run.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("destination: {0}")]
    Destination(#[from] DestinationError),

    #[error("mirror '{agent}': {source}")]
    Source {
        agent: String,
        source: CreateSourceError,
    },

    #[error("mirror name '{0}' cannot be used as a staging directory name")]
    InvalidAgentName(String),

    #[error("mirrors share the staging directory {}", .0.display())]
    DuplicateStagingDir(PathBuf),

    #[error("mirror '{agent}' stopped unexpectedly: {message}")]
    AgentFailed { agent: String, message: String },
}

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;
