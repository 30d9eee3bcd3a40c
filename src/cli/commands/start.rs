//! The `start` command.

use std::sync::Arc;

use clap::Args;
use tracing::{error, info};

use crate::agent::{IterationReport, ShutdownController};
use crate::cli::{CliError, GlobalArgs, OutputSink, Result, load_config};
use crate::supervisor::Supervisor;

/// Arguments for the start command.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Run a single iteration of every mirror, print a summary and exit.
    #[arg(long)]
    pub once: bool,

    #[command(flatten)]
    pub output: OutputSink,
}

impl StartArgs {
    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = load_config(global)?;
        let supervisor = Supervisor::from_config(&config).await?;
        if supervisor.is_empty() {
            return Err(CliError::NoMirrors);
        }

        let controller = Arc::new(ShutdownController::new());
        stop_on_interrupt(controller.clone());

        if !self.once {
            supervisor.run(controller.signal()).await?;
            return Ok(());
        }

        let reports = supervisor.run_once(&controller.signal()).await;
        self.output.write_str(&summarize(&reports)).await?;

        let failures = reports
            .iter()
            .filter(|(_, report)| report.has_failures())
            .count();
        if failures > 0 {
            return Err(CliError::MirrorFailures(failures));
        }
        Ok(())
    }
}

/// Signal shutdown on the first Ctrl-C.
fn stop_on_interrupt(controller: Arc<ShutdownController>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping mirrors");
                controller.shutdown();
            }
            Err(e) => error!(error = %e, "Unable to listen for interrupts"),
        }
    });
}

/// One line per mirror.
fn summarize(reports: &[(String, IterationReport)]) -> String {
    reports
        .iter()
        .map(|(name, report)| {
            let status = if report.listing_failed {
                "listing failed".to_string()
            } else {
                format!(
                    "{} mirrored, {} skipped, {} failed",
                    report.mirrored(),
                    report.skipped(),
                    report.failed()
                )
            };
            if report.cancelled {
                format!("{}: {} (interrupted)", name, status)
            } else {
                format!("{}: {}", name, status)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
