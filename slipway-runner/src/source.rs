//! Source fetching
//!
//! Produces a checkout of the pushed repository+branch (and commit, when the
//! push carried one) inside the run's scratch directory.

use async_trait::async_trait;
use slipway_core::domain::RepositoryRef;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

use crate::config::Config;
use crate::process::{ProcessError, describe, run_command};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("invalid {kind} '{value}'")]
    InvalidRef { kind: &'static str, value: String },

    #[error("`{command}` exited with code {exit_code}:\n{output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },
}

/// Fetches repository sources into a directory
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Populates `dir` with a checkout of `repo`; `dir` must not exist yet
    async fn fetch(&self, repo: &RepositoryRef, dir: &Path) -> Result<(), SourceError>;
}

/// Fetches sources with the git CLI
#[derive(Debug, Clone)]
pub struct GitFetcher {
    git_bin: String,
    timeout: Duration,
}

impl GitFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            git_bin: config.git_bin.clone(),
            timeout: config.clone_timeout,
        }
    }

    async fn git(&self, args: &[&str]) -> Result<(), SourceError> {
        let mut cmd = Command::new(&self.git_bin);
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
        let command = describe(&cmd);

        let output = run_command(&mut cmd, self.timeout).await?;
        if !output.success {
            return Err(SourceError::CommandFailed {
                command,
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, repo: &RepositoryRef, dir: &Path) -> Result<(), SourceError> {
        validate_branch(&repo.branch)?;
        if let Some(commit) = &repo.commit {
            validate_commit(commit)?;
        }

        info!("Cloning {} into {}", repo, dir.display());

        let dir_arg = dir.to_string_lossy();
        self.git(&[
            "clone",
            "--branch",
            &repo.branch,
            "--single-branch",
            "--",
            &repo.url,
            &dir_arg,
        ])
        .await?;

        if let Some(commit) = &repo.commit {
            info!("Checking out {}", commit);
            self.git(&["-C", &dir_arg, "checkout", "--detach", commit])
                .await?;
        }

        Ok(())
    }
}

/// Branch names are passed as option values; refuse ones git would read as options
fn validate_branch(branch: &str) -> Result<(), SourceError> {
    if branch.is_empty() || branch.starts_with('-') {
        return Err(SourceError::InvalidRef {
            kind: "branch",
            value: branch.to_string(),
        });
    }
    Ok(())
}

/// Commits must be hex object names
fn validate_commit(commit: &str) -> Result<(), SourceError> {
    let valid = (4..=64).contains(&commit.len()) && commit.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(SourceError::InvalidRef {
            kind: "commit",
            value: commit.to_string(),
        });
    }
    Ok(())
}
