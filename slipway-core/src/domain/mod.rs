//! Core domain types
//!
//! These types are shared between the webhook server (which queues runs),
//! the runner (which executes them) and the CLI (which displays them).

pub mod arch;
pub mod deployment;
pub mod model;
pub mod repository;
pub mod run;

pub use arch::{Architecture, ConfigError};
pub use deployment::{BuildOutput, DeployAction, DeploymentDescriptor, DeploymentOutcome};
pub use model::model_name;
pub use repository::RepositoryRef;
pub use run::{PipelineRun, RunStatus};
