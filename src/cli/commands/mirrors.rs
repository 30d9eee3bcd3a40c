//! The `mirrors` command.

use clap::Args;
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputSink, Result, load_config};
use crate::config::MirrorDefinition;

/// Arguments for the mirrors command.
#[derive(Args, Debug)]
pub struct MirrorsArgs {
    /// Format output as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub output: OutputSink,
}

/// A mirror definition without credentials.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct MirrorSummary {
    name: String,
    source: &'static str,
    location: String,
    target_repository: String,
    interval_secs: u64,
}

impl From<&MirrorDefinition> for MirrorSummary {
    fn from(definition: &MirrorDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            source: definition.source.source_type().name(),
            location: definition.source.describe(),
            target_repository: definition.target_repository.clone(),
            interval_secs: definition.interval.as_secs(),
        }
    }
}

impl MirrorsArgs {
    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = load_config(global)?;
        let summaries: Vec<MirrorSummary> = config
            .mirror_definitions()?
            .iter()
            .map(MirrorSummary::from)
            .collect();

        if self.json {
            self.output.write_json(&summaries).await?;
        } else {
            let lines: Vec<String> = summaries
                .iter()
                .map(|s| {
                    format!(
                        "{}\t{} -> {}\tevery {}s",
                        s.name, s.location, s.target_repository, s.interval_secs
                    )
                })
                .collect();
            self.output.write_str(&lines.join("\n")).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = "[staging]\ndefault_interval = 120\n\n\
        [mirror.nightly]\ntarget_repository = generic-local\nsource = s3\n\
        bucket = builds\nprefix = nightly/\nregion = us-west-2\naccess_key = AKIA\nsecret_key = hunter2\n\n\
        [mirror.widget]\ntarget_repository = github-releases\nsource = github\nrepo = acme/widget\n\
        token = ghp_secret\ninterval = 60\n";

    async fn run_mirrors(json: bool) -> String {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("mirrorsync.conf");
        std::fs::write(&config, CONFIG).unwrap();
        let out = temp.path().join("out");

        let args = MirrorsArgs {
            json,
            output: OutputSink {
                file: Some(out.clone()),
            },
        };
        let global = GlobalArgs {
            config_file: Some(config),
            ..Default::default()
        };
        args.run(&global).await.unwrap();
        std::fs::read_to_string(&out).unwrap()
    }

    #[tokio::test]
    async fn test_text_listing() {
        let output = run_mirrors(false).await;
        assert_eq!(
            output,
            "nightly\ts3://builds/nightly/ -> generic-local\tevery 120s\n\
             widget\tgithub:acme/widget -> github-releases\tevery 60s"
        );
    }

    #[tokio::test]
    async fn test_json_listing_omits_secrets() {
        let output = run_mirrors(true).await;
        assert!(!output.contains("hunter2"));
        assert!(!output.contains("ghp_secret"));

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["name"], "nightly");
        assert_eq!(value[0]["source"], "s3");
        assert_eq!(value[1]["location"], "github:acme/widget");
        assert_eq!(value[1]["interval_secs"], 60);
    }
}
