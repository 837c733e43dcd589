//! Orchestration controller
//!
//! The reconciler only sees the controller through [`ControllerBackend`], so
//! tests can substitute a fake with controllable model and application sets.
//! [`JujuCli`] is the production implementation.

mod juju;

pub use juju::JujuCli;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::process::ProcessError;

/// Controller failures
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("`{command}` exited with code {exit_code}:\n{output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    /// A create raced with another run and lost
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("model {0} not found")]
    ModelNotFound(String),

    #[error("unexpected response from `{command}`: {reason}")]
    InvalidResponse { command: String, reason: String },
}

/// A model the pipeline is connected to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub name: String,
    pub uuid: Option<String>,
}

/// First deployment of an application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub application: String,
    pub charm: PathBuf,
    /// Resource name to value (the published image reference)
    pub resources: BTreeMap<String, String>,
    /// Placement constraint, e.g. `arch=amd64`
    pub constraints: String,
}

/// In-place update of an existing application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    pub application: String,
    pub charm: PathBuf,
    pub resources: BTreeMap<String, String>,
}

/// Operations the pipeline needs from the orchestration controller
#[async_trait]
pub trait ControllerBackend: Send + Sync {
    /// Short names of the models visible on the controller
    async fn list_models(&self) -> Result<Vec<String>, ControllerError>;

    /// Creates a model; `AlreadyExists` if it is already there
    async fn create_model(&self, name: &str) -> Result<(), ControllerError>;

    async fn connect_model(&self, name: &str) -> Result<ModelHandle, ControllerError>;

    /// Names of the applications deployed in a model
    async fn list_applications(&self, model: &ModelHandle) -> Result<Vec<String>, ControllerError>;

    /// Deploys a new application; `AlreadyExists` if the name is taken
    async fn deploy(&self, model: &ModelHandle, request: &DeployRequest)
    -> Result<(), ControllerError>;

    async fn refresh(
        &self,
        model: &ModelHandle,
        request: &RefreshRequest,
    ) -> Result<(), ControllerError>;
}
