//! Artefact builder
//!
//! Builds the rock (image archive) and the charm in parallel, each in its own
//! working directory, and recovers the path of each produced artefact from the
//! build tool's output.

use regex::Regex;
use slipway_core::domain::BuildOutput;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::process::{ProcessError, run_command};

static PACKED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Packed (.+?)\r?$").expect("Packed line pattern is valid")
});

/// Build failures
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{step} build `{command}` failed in {} with exit code {exit_code}:\n{output}", .working_dir.display())]
    CommandFailed {
        step: String,
        command: String,
        working_dir: PathBuf,
        exit_code: i32,
        output: String,
    },

    #[error("{step} build `{command}` in {} reported no packed artefact:\n{output}", .working_dir.display())]
    ArtifactNotFound {
        step: String,
        command: String,
        working_dir: PathBuf,
        output: String,
    },

    #[error("{step} build in {}: {source}", .working_dir.display())]
    Process {
        step: String,
        working_dir: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("{step} build task aborted: {reason}")]
    Aborted { step: String, reason: String },
}

/// Finds the artefact a build tool reports in its output
pub trait ArtifactLocator: Send + Sync {
    /// Returns the artefact path resolved against `working_dir`
    fn locate(&self, output: &str, working_dir: &Path) -> Option<PathBuf>;
}

/// Locates artefacts announced as `Packed <relative-path>` lines
///
/// This is the format printed by rockcraft and charmcraft. The first such line
/// whose path has the expected extension wins.
#[derive(Debug, Clone)]
pub struct PackedLineLocator {
    extension: String,
}

impl PackedLineLocator {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }
}

impl ArtifactLocator for PackedLineLocator {
    fn locate(&self, output: &str, working_dir: &Path) -> Option<PathBuf> {
        let suffix = format!(".{}", self.extension);

        PACKED_LINE
            .captures_iter(output)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|path| path.ends_with(&suffix) && path.len() > suffix.len())
            .map(|path| working_dir.join(path))
    }
}

/// A finished build step
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub artifact: PathBuf,
    /// Combined stdout and stderr of the build command
    pub output: String,
}

/// One of the two builds
#[derive(Clone)]
pub struct BuildStep {
    pub name: String,
    pub command: String,
    pub working_dir: PathBuf,
    pub locator: Arc<dyn ArtifactLocator>,
}

impl BuildStep {
    /// Runs the build command and locates its artefact
    ///
    /// The command runs under `sh -c` with stderr folded into stdout, so the
    /// captured output keeps the tool's interleaving.
    pub async fn run(self, timeout: Duration) -> Result<StepOutput, BuildError> {
        info!(
            "Running {} build `{}` in {}",
            self.name,
            self.command,
            self.working_dir.display()
        );

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("exec 2>&1; {}", self.command))
            .current_dir(&self.working_dir);

        let output = run_command(&mut cmd, timeout)
            .await
            .map_err(|source| BuildError::Process {
                step: self.name.clone(),
                working_dir: self.working_dir.clone(),
                source,
            })?;

        let combined = output.combined();
        debug!("{} build output:\n{}", self.name, combined);

        if !output.success {
            return Err(BuildError::CommandFailed {
                step: self.name,
                command: self.command,
                working_dir: self.working_dir,
                exit_code: output.exit_code,
                output: combined,
            });
        }

        match self.locator.locate(&combined, &self.working_dir) {
            Some(path) => {
                info!("{} build produced {}", self.name, path.display());
                Ok(StepOutput {
                    artifact: path,
                    output: combined,
                })
            }
            None => Err(BuildError::ArtifactNotFound {
                step: self.name,
                command: self.command,
                working_dir: self.working_dir,
                output: combined,
            }),
        }
    }
}

/// Builds the rock and the charm of a checkout
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    rock_command: String,
    charm_command: String,
    charm_dir: PathBuf,
    timeout: Duration,
}

impl ArtifactBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            rock_command: config.rock_build_command.clone(),
            charm_command: config.charm_build_command.clone(),
            charm_dir: config.charm_dir.clone(),
            timeout: config.build_timeout,
        }
    }

    /// The two build steps for a checkout: rock in the root, charm in `charm_dir`
    pub fn steps(&self, checkout: &Path) -> (BuildStep, BuildStep) {
        let rock = BuildStep {
            name: "rock".to_string(),
            command: self.rock_command.clone(),
            working_dir: checkout.to_path_buf(),
            locator: Arc::new(PackedLineLocator::new("rock")),
        };
        let charm = BuildStep {
            name: "charm".to_string(),
            command: self.charm_command.clone(),
            working_dir: checkout.join(&self.charm_dir),
            locator: Arc::new(PackedLineLocator::new("charm")),
        };
        (rock, charm)
    }

    /// Runs both builds in parallel and waits for both to finish
    ///
    /// If either build fails the whole build fails; the other build is still
    /// awaited and its result logged, including the output of a build that
    /// succeeded.
    pub async fn build(&self, checkout: &Path) -> Result<BuildOutput, BuildError> {
        let (rock_step, charm_step) = self.steps(checkout);
        let timeout = self.timeout;

        let rock_task = tokio::spawn(rock_step.run(timeout));
        let charm_task = tokio::spawn(charm_step.run(timeout));

        let (rock, charm) = tokio::join!(rock_task, charm_task);
        let rock = rock.unwrap_or_else(|e| Err(aborted("rock", e)));
        let charm = charm.unwrap_or_else(|e| Err(aborted("charm", e)));

        match (rock, charm) {
            (Ok(rock), Ok(charm)) => Ok(BuildOutput {
                rock: rock.artifact,
                charm: charm.artifact,
            }),
            (Err(err), other) | (other, Err(err)) => {
                error!("Build failed: {}", err);
                match other {
                    Ok(step) => warn!(
                        "Discarding {} built alongside the failed build, its output was:\n{}",
                        step.artifact.display(),
                        step.output
                    ),
                    Err(other_err) => error!("Build failed: {}", other_err),
                }
                Err(err)
            }
        }
    }
}

fn aborted(step: &str, err: tokio::task::JoinError) -> BuildError {
    BuildError::Aborted {
        step: step.to_string(),
        reason: err.to_string(),
    }
}
