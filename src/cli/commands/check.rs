//! The `check` command.

use clap::Args;

use crate::cli::{CliError, GlobalArgs, OutputSink, Result, load_config};
use crate::supervisor::Supervisor;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub output: OutputSink,
}

impl CheckArgs {
    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = load_config(global)?;
        let supervisor = Supervisor::from_config(&config).await?;
        if supervisor.is_empty() {
            return Err(CliError::NoMirrors);
        }

        let names: Vec<&str> = supervisor.agents().map(|agent| agent.name()).collect();
        self.output
            .write_str(&format!(
                "configuration OK: {} mirror(s): {}",
                names.len(),
                names.join(", ")
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn global_for(path: std::path::PathBuf) -> GlobalArgs {
        GlobalArgs {
            config_file: Some(path),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_check_valid_config() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("mirrorsync.conf");
        std::fs::write(
            &config,
            "[artifactory]\nurl = http://localhost:8081/artifactory\n\n\
             [mirror.widget]\ntarget_repository = github-releases\nsource = github\nrepo = acme/widget\n",
        )
        .unwrap();
        let out = temp.path().join("out.txt");

        let args = CheckArgs {
            output: OutputSink {
                file: Some(out.clone()),
            },
        };
        args.run(&global_for(config)).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "configuration OK: 1 mirror(s): widget"
        );
    }

    #[tokio::test]
    async fn test_check_reports_missing_object_store_fields() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("mirrorsync.conf");
        std::fs::write(
            &config,
            "[artifactory]\nurl = http://localhost:8081/artifactory\n\n\
             [mirror.nightly]\ntarget_repository = generic-local\nsource = s3\nbucket = builds\n",
        )
        .unwrap();

        let args = CheckArgs {
            output: OutputSink::default(),
        };
        let err = args.run(&global_for(config)).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("prefix"));
        assert!(message.contains("region"));
        assert!(message.contains("access_key"));
        assert!(message.contains("secret_key"));
    }

    #[tokio::test]
    async fn test_check_without_mirrors() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("mirrorsync.conf");
        std::fs::write(&config, "[artifactory]\nurl = http://localhost:8081\n").unwrap();

        let args = CheckArgs {
            output: OutputSink::default(),
        };
        assert!(matches!(
            args.run(&global_for(config)).await,
            Err(CliError::NoMirrors)
        ));
    }
}
