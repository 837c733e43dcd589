//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod local;
mod runs;
mod trigger;

pub use runs::RunsCommands;

use anyhow::Result;
use clap::{Args, Subcommand};
use slipway_core::domain::RepositoryRef;

use crate::config::Config;

/// Repository and branch a command acts on
#[derive(Args, Debug, Clone)]
pub struct RepoArgs {
    /// Repository clone URL
    #[arg(long)]
    pub repo: String,

    /// Branch to build and deploy
    #[arg(long)]
    pub branch: String,

    /// Pin a specific commit instead of the branch head
    #[arg(long)]
    pub commit: Option<String>,
}

impl From<RepoArgs> for RepositoryRef {
    fn from(args: RepoArgs) -> Self {
        RepositoryRef {
            url: args.repo,
            branch: args.branch,
            commit: args.commit,
        }
    }
}

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Queue a pipeline run on the server
    Trigger(RepoArgs),
    /// Inspect runs on the server
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Run the pipeline locally, without a server
    Run(RepoArgs),
    /// Print the model a repository and branch deploy into
    ModelName {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        branch: String,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Trigger(args) => trigger::handle_trigger(args, config).await,
        Commands::Runs { command } => runs::handle_runs_command(command, config).await,
        Commands::Run(args) => local::run_locally(args).await,
        Commands::ModelName { repo, branch } => {
            local::print_model_name(&repo, &branch);
            Ok(())
        }
    }
}
