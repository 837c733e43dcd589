//! Run command handlers
//!
//! Lists and inspects pipeline runs recorded by the server.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use slipway_client::SlipwayClient;
use slipway_core::domain::{PipelineRun, RunStatus};

use crate::config::Config;
use crate::id_resolver::resolve_run_id;
use crate::types::IdOrPrefix;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunsCommands {
    /// List all runs, most recent first
    List,
    /// Get run details
    Get {
        /// Run ID or unambiguous prefix
        id: String,
    },
}

/// Handle run commands
pub async fn handle_runs_command(command: RunsCommands, config: &Config) -> Result<()> {
    let client = SlipwayClient::new(&config.server_url);

    match command {
        RunsCommands::List => list_runs(&client).await,
        RunsCommands::Get { id } => get_run(&client, &id).await,
    }
}

async fn list_runs(client: &SlipwayClient) -> Result<()> {
    let runs = client.list_runs().await?;

    if runs.is_empty() {
        println!("{}", "No runs found.".yellow());
    } else {
        println!("{}", format!("Found {} run(s):", runs.len()).bold());
        println!();
        for run in runs {
            print_run_summary(&run);
        }
    }

    Ok(())
}

async fn get_run(client: &SlipwayClient, id: &str) -> Result<()> {
    let id_or_prefix = IdOrPrefix::parse(id);
    let uuid = resolve_run_id(client, &id_or_prefix).await?;

    let run = client.get_run(uuid).await?;

    print_run_details(&run);

    Ok(())
}

/// Print a one-block summary of a run
pub fn print_run_summary(run: &PipelineRun) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Repository: {}", run.repository.url);
    println!("    Branch:     {}", run.repository.branch);
    println!("    Status:     {}", colorize_status(&run.status));
    println!(
        "    Requested:  {}",
        run.requested_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_run_details(run: &PipelineRun) {
    println!("{}", "Run Details:".bold());
    println!("  ID:         {}", run.id.to_string().cyan());
    println!("  Repository: {}", run.repository.url);
    println!("  Branch:     {}", run.repository.branch);
    if let Some(commit) = &run.repository.commit {
        println!("  Commit:     {}", commit.dimmed());
    }
    println!("  Status:     {}", colorize_status(&run.status));
    println!(
        "  Requested:  {}",
        run.requested_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = run.started_at {
        println!("  Started:    {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(completed) = run.completed_at {
        println!("  Completed:  {}", completed.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = run.started_at {
            let duration = completed.signed_duration_since(started);
            println!("  Duration:   {}s", duration.num_seconds());
        }
    }

    if let Some(outcome) = &run.outcome {
        println!("\n{}", "Deployment:".bold());
        println!("  Action:      {}", outcome.action.to_string().green());
        println!("  Model:       {}", outcome.model);
        println!("  Application: {}", outcome.application);
        println!("  Image:       {}", outcome.image);
    }

    if let Some(error) = &run.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

fn colorize_status(status: &RunStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        RunStatus::Queued => status_str.yellow(),
        RunStatus::Running => status_str.cyan(),
        RunStatus::Succeeded => status_str.green(),
        RunStatus::Failed => status_str.red(),
    }
}
