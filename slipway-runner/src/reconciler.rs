//! Deployment reconciler
//!
//! Converges the controller towards the freshly built artefacts:
//! - Get or create the model of the repository+branch
//! - Deploy the application if the model does not have it yet
//! - Refresh it in place otherwise
//!
//! The controller is shared with other runs. A create that loses a race
//! against a concurrent run ("already exists") is treated as success.

use slipway_core::domain::{
    Architecture, ConfigError, DeployAction, DeploymentDescriptor, DeploymentOutcome,
    RepositoryRef, model_name,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::controller::{
    ControllerBackend, ControllerError, DeployRequest, ModelHandle, RefreshRequest,
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),
}

/// Reconciles deployments against a controller backend
pub struct Reconciler {
    backend: Arc<dyn ControllerBackend>,
    resource_name: String,
    processor: String,
}

impl Reconciler {
    /// # Arguments
    /// * `backend` - The controller to reconcile against
    /// * `resource_name` - Charm resource the image reference is attached to
    /// * `processor` - Host processor identifier used for the placement constraint
    pub fn new(
        backend: Arc<dyn ControllerBackend>,
        resource_name: impl Into<String>,
        processor: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            resource_name: resource_name.into(),
            processor: processor.into(),
        }
    }

    /// Deploys or refreshes the application for a repository
    ///
    /// The placement architecture is resolved before the controller is
    /// contacted, so an unsupported host never mutates remote state.
    pub async fn reconcile(
        &self,
        repo: &RepositoryRef,
        descriptor: &DeploymentDescriptor,
        charm: &Path,
        image: &str,
    ) -> Result<DeploymentOutcome, ReconcileError> {
        let arch = Architecture::from_processor(&self.processor)?;

        let model = self.get_or_create_model(repo).await?;
        let action = self
            .deploy_or_refresh(&model, &descriptor.application_name, charm, image, arch)
            .await?;

        Ok(DeploymentOutcome {
            model: model.name,
            application: descriptor.application_name.clone(),
            image: image.to_string(),
            action,
        })
    }

    /// Connects to the model of a repository+branch, creating it if needed
    pub async fn get_or_create_model(
        &self,
        repo: &RepositoryRef,
    ) -> Result<ModelHandle, ReconcileError> {
        let name = model_name(&repo.url, &repo.branch);
        info!("Creating or getting model {}", name);

        let models = self.backend.list_models().await?;
        if !models.iter().any(|existing| existing == &name) {
            match self.backend.create_model(&name).await {
                Ok(()) => info!("Created model {}", name),
                Err(ControllerError::AlreadyExists(what)) => {
                    warn!("{} was created concurrently, reusing it", what)
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(self.backend.connect_model(&name).await?)
    }

    async fn deploy_or_refresh(
        &self,
        model: &ModelHandle,
        application: &str,
        charm: &Path,
        image: &str,
        arch: Architecture,
    ) -> Result<DeployAction, ReconcileError> {
        let resources = BTreeMap::from([(self.resource_name.clone(), image.to_string())]);

        let applications = self.backend.list_applications(model).await?;
        info!(
            "Currently deployed applications in {}: {}",
            model.name,
            applications.join(", ")
        );

        if !applications.iter().any(|existing| existing == application) {
            info!("Deploying {} into {}", application, model.name);
            let request = DeployRequest {
                application: application.to_string(),
                charm: charm.to_path_buf(),
                resources: resources.clone(),
                constraints: arch.constraint(),
            };

            match self.backend.deploy(model, &request).await {
                Ok(()) => {
                    info!("Deployed {}", application);
                    return Ok(DeployAction::Deployed);
                }
                Err(ControllerError::AlreadyExists(what)) => {
                    warn!("{} was deployed concurrently, refreshing instead", what)
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Refreshing {} in {}", application, model.name);
        let request = RefreshRequest {
            application: application.to_string(),
            charm: charm.to_path_buf(),
            resources,
        };
        self.backend.refresh(model, &request).await?;

        info!("Refreshed {}", application);
        Ok(DeployAction::Refreshed)
    }
}
