//! Local command handlers
//!
//! Runs the pipeline in-process with the same environment configuration the
//! server reads, and resolves model names offline.

use anyhow::{Context, Result, anyhow};
use colored::*;
use slipway_core::domain::{RepositoryRef, model_name};
use slipway_runner::{Config as RunnerConfig, Pipeline};

use super::RepoArgs;

/// Run the whole pipeline for a repository and branch on this machine
pub async fn run_locally(args: RepoArgs) -> Result<()> {
    let config = RunnerConfig::from_env();
    config
        .validate()
        .map_err(|e| anyhow!(e))
        .context("Invalid runner configuration")?;

    let repo: RepositoryRef = args.into();
    println!("{} {}", "Running pipeline for".bold(), repo);

    let outcome = Pipeline::from_config(&config)
        .run(&repo)
        .await
        .with_context(|| format!("Pipeline failed for {}", repo))?;

    println!();
    println!(
        "{} {} {}",
        "✓".green(),
        outcome.action.to_string().green(),
        outcome.application.bold()
    );
    println!("  Model: {}", outcome.model);
    println!("  Image: {}", outcome.image);

    Ok(())
}

pub fn print_model_name(repo: &str, branch: &str) {
    println!("{}", model_name(repo, branch));
}
