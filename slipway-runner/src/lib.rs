//! Slipway Runner
//!
//! The build-and-deploy engine behind the Slipway webhook server and CLI.
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Stages: source checkout, artefact build, descriptor reading, image
//!   publishing and deployment reconciliation
//! - Controller: the orchestration backend seam and its `juju` CLI implementation
//! - Pipeline: sequences the stages for one push event
//! - Queue: bounded worker pool that runs queued pipelines and tracks their status

pub mod builder;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod pipeline;
pub mod process;
pub mod publisher;
pub mod queue;
pub mod reconciler;
pub mod source;

pub use config::Config;
pub use pipeline::{Pipeline, PipelineError};
pub use queue::{RunExecutor, RunQueue, RunRegistry, RunWorker};
