//! Pipeline coordinator
//!
//! Runs one push event end to end:
//! 1. Fetch the sources into a fresh scratch directory
//! 2. Build the rock and the charm in parallel
//! 3. Read the deployment descriptor
//! 4. Publish the image
//! 5. Reconcile the deployment
//!
//! Any failure aborts the run; later stages never see partial results. The
//! scratch directory is removed when the run ends, whatever the outcome.

use async_trait::async_trait;
use slipway_core::domain::{DeploymentOutcome, RepositoryRef};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::builder::{ArtifactBuilder, BuildError};
use crate::config::Config;
use crate::controller::{ControllerBackend, JujuCli};
use crate::descriptor::{DescriptorError, DescriptorReader};
use crate::publisher::{PublishError, RegistryPublisher};
use crate::queue::RunExecutor;
use crate::reconciler::{ReconcileError, Reconciler};
use crate::source::{GitFetcher, SourceError, SourceFetcher};

/// A failed pipeline run, tagged with the stage that failed
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to prepare workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("failed to fetch sources: {0}")]
    Source(#[from] SourceError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("failed to read descriptor: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("deployment failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Executes the build-publish-deploy sequence for a repository reference
pub struct Pipeline {
    fetcher: Arc<dyn SourceFetcher>,
    builder: ArtifactBuilder,
    descriptors: DescriptorReader,
    publisher: RegistryPublisher,
    reconciler: Reconciler,
    workspace_base: Option<PathBuf>,
}

impl Pipeline {
    /// Creates a pipeline with explicit source and controller backends
    ///
    /// # Arguments
    /// * `config` - Build, registry and timeout settings
    /// * `fetcher` - Produces the checkout for a run
    /// * `backend` - The controller deployments are reconciled against
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn SourceFetcher>,
        backend: Arc<dyn ControllerBackend>,
    ) -> Self {
        Self {
            fetcher,
            builder: ArtifactBuilder::new(config),
            descriptors: DescriptorReader::new(config),
            publisher: RegistryPublisher::new(config),
            reconciler: Reconciler::new(
                backend,
                config.image_resource_name.clone(),
                config.processor(),
            ),
            workspace_base: config.workspace_base.clone(),
        }
    }

    /// Creates a pipeline backed by git and the juju CLI
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(GitFetcher::new(config)),
            Arc::new(JujuCli::new(config)),
        )
    }

    /// Runs the pipeline for a push event
    pub async fn run(&self, repo: &RepositoryRef) -> Result<DeploymentOutcome, PipelineError> {
        let scratch = match &self.workspace_base {
            Some(base) => {
                tokio::fs::create_dir_all(base).await?;
                tempfile::Builder::new().prefix("slipway-").tempdir_in(base)?
            }
            None => tempfile::Builder::new().prefix("slipway-").tempdir()?,
        };
        let checkout = scratch.path().join("src");

        info!("Starting pipeline for {} in {}", repo, checkout.display());

        self.fetcher.fetch(repo, &checkout).await?;

        let artefacts = self.builder.build(&checkout).await?;
        let descriptor = self.descriptors.read(&checkout).await?;
        info!(
            "Built {} {} (application {})",
            descriptor.image_name, descriptor.image_version, descriptor.application_name
        );

        let image = self.publisher.publish(&artefacts.rock, &descriptor).await?;

        let outcome = self
            .reconciler
            .reconcile(repo, &descriptor, &artefacts.charm, &image)
            .await?;

        info!(
            "Pipeline for {} finished: {} {} in model {}",
            repo, outcome.action, outcome.application, outcome.model
        );
        Ok(outcome)
    }
}

#[async_trait]
impl RunExecutor for Pipeline {
    async fn execute(&self, repo: &RepositoryRef) -> Result<DeploymentOutcome, String> {
        self.run(repo).await.map_err(|e| e.to_string())
    }
}
