//! Command-line interface for mirrorsync.

pub mod args;
mod commands;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ConfigHelper, read_config};
use crate::supervisor::SupervisorError;

pub use args::{GlobalArgs, OutputSink};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument processing error.
    #[error("{0}")]
    Args(#[from] args::ArgsError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Supervisor error.
    #[error("{0}")]
    Supervisor(#[from] SupervisorError),

    /// No `[mirror.*]` sections were configured.
    #[error("no mirrors configured")]
    NoMirrors,

    /// A single pass finished with failed objects or listings.
    #[error("{0} mirror(s) reported failures")]
    MirrorFailures(usize),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// mirrorsync - Mirror S3 objects and GitHub release assets into Artifactory.
#[derive(Parser, Debug)]
#[command(name = "mirrorsync", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configured mirror until interrupted.
    Start(commands::start::StartArgs),

    /// Validate the configuration and construct every mirror without running it.
    Check(commands::check::CheckArgs),

    /// List the resolved mirror definitions.
    Mirrors(commands::mirrors::MirrorsArgs),
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Start(args) => args.run(&self.global).await,
            Command::Check(args) => args.run(&self.global).await,
            Command::Mirrors(args) => args.run(&self.global).await,
        }
    }
}

/// Read configuration from the sources named by the global arguments.
///
/// Warnings raised while reading are logged, not returned.
pub(crate) fn load_config(global: &GlobalArgs) -> Result<ConfigHelper> {
    let result = read_config(&global.to_config_source())?;
    for warning in &result.warnings {
        warn!("{}", warning);
    }
    Ok(ConfigHelper::new(result.config))
}

/// Install the log subscriber. `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Main entry point for the CLI.
pub async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging();
    cli.run().await
}
