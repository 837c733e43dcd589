//! Trigger command handler

use anyhow::{Context, Result};
use colored::*;
use slipway_client::SlipwayClient;
use slipway_core::dto::PushRequest;

use super::RepoArgs;
use super::runs::print_run_summary;
use crate::config::Config;

/// Queue a run on the server for a repository and branch
pub async fn handle_trigger(args: RepoArgs, config: &Config) -> Result<()> {
    let client = SlipwayClient::new(&config.server_url);

    let run = client
        .trigger(PushRequest {
            repo: args.repo,
            branch: args.branch,
            commit: args.commit,
        })
        .await
        .with_context(|| format!("Failed to trigger run on {}", config.server_url))?;

    println!("{} Run queued", "✓".green());
    println!();
    print_run_summary(&run);

    Ok(())
}
