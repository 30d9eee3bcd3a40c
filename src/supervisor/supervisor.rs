use std::collections::HashSet;
use std::path::{Component, Path};
use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info};

use super::error::{Result, SupervisorError};
use crate::agent::{IterationReport, Shutdown, SyncAgent};
use crate::config::{ConfigHelper, MirrorDefinition};
use crate::destination::{ArtifactoryDestination, Destination};
use crate::source::create_source;

/// Owns every sync agent and runs them side by side.
pub struct Supervisor {
    agents: Vec<Arc<SyncAgent>>,
}

impl Supervisor {
    /// Build an agent for every mirror in `config`, all sharing one
    /// Artifactory destination.
    pub async fn from_config(config: &ConfigHelper) -> Result<Self> {
        let definitions = config.mirror_definitions()?;
        let destination: Arc<dyn Destination> =
            Arc::new(ArtifactoryDestination::new(config.artifactory())?);
        Self::build(definitions, destination, config.staging_root()).await
    }

    /// Build an agent per definition.
    ///
    /// Every definition is checked before any source is created, and the
    /// first failure aborts construction so no agent starts on a partial
    /// configuration.
    pub async fn build(
        definitions: Vec<MirrorDefinition>,
        destination: Arc<dyn Destination>,
        staging_root: &Path,
    ) -> Result<Self> {
        for definition in &definitions {
            validate_name(&definition.name)?;
        }

        let mut agents = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let source = create_source(&definition.source)
                .await
                .map_err(|source| SupervisorError::Source {
                    agent: definition.name.clone(),
                    source,
                })?;
            agents.push(SyncAgent::new(
                definition,
                source,
                destination.clone(),
                staging_root,
            ));
        }

        Self::with_agents(agents)
    }

    /// Wrap already-built agents. Agents must not share a staging directory.
    pub fn with_agents(agents: Vec<SyncAgent>) -> Result<Self> {
        let mut staging_dirs = HashSet::new();
        for agent in &agents {
            if !staging_dirs.insert(agent.staging_dir().to_path_buf()) {
                return Err(SupervisorError::DuplicateStagingDir(
                    agent.staging_dir().to_path_buf(),
                ));
            }
        }

        Ok(Self {
            agents: agents.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn agents(&self) -> impl Iterator<Item = &SyncAgent> {
        self.agents.iter().map(|agent| agent.as_ref())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Run every agent as its own task until shutdown, then wait for all of
    /// them to finish.
    pub async fn run(self, shutdown: Shutdown) -> Result<()> {
        info!("Starting {} mirror agent(s)", self.agents.len());

        let tasks: Vec<_> = self
            .agents
            .iter()
            .map(|agent| {
                let agent = agent.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { agent.run(shutdown).await })
            })
            .collect();

        let mut first_failure = None;
        for (agent, result) in self.agents.iter().zip(join_all(tasks).await) {
            if let Err(e) = result {
                error!(agent = %agent.name(), error = %e, "Agent task failed");
                first_failure.get_or_insert(SupervisorError::AgentFailed {
                    agent: agent.name().to_string(),
                    message: e.to_string(),
                });
            }
        }

        info!("All mirror agents stopped");
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run a single iteration of every agent concurrently.
    pub async fn run_once(&self, shutdown: &Shutdown) -> Vec<(String, IterationReport)> {
        let reports = join_all(
            self.agents
                .iter()
                .map(|agent| agent.run_iteration(shutdown)),
        )
        .await;

        self.agents
            .iter()
            .map(|agent| agent.name().to_string())
            .zip(reports)
            .collect()
    }
}

/// Agent names become staging directory names, so they must be a single
/// plain path component.
fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains('/') => Ok(()),
        _ => Err(SupervisorError::InvalidAgentName(name.to_string())),
    }
}
