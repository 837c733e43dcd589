//! Deployment domain types
//!
//! Values produced and consumed within a single pipeline run: the build
//! artefacts, the descriptor facts read from the checkout and the result of
//! reconciling them against the controller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Artefacts produced by one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    /// OCI image archive
    pub rock: PathBuf,
    /// Packaging unit that references the image
    pub charm: PathBuf,
}

/// Naming and versioning facts read from the descriptor files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub image_name: String,
    pub image_version: String,
    pub application_name: String,
}

/// What the reconciler did to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployAction {
    /// First deployment into the model
    Deployed,
    /// In-place refresh of an existing application
    Refreshed,
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployAction::Deployed => write!(f, "Deployed"),
            DeployAction::Refreshed => write!(f, "Refreshed"),
        }
    }
}

/// Result of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub model: String,
    pub application: String,
    /// Fully qualified image reference published to the registry
    pub image: String,
    pub action: DeployAction,
}
