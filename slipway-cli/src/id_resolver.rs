//! ID resolver module
//!
//! Resolves run ID prefixes to full UUIDs so users can type short,
//! unambiguous prefixes instead of full IDs.

use anyhow::{Context, Result, anyhow};
use slipway_client::SlipwayClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a run ID or prefix to a full UUID
///
/// A full UUID is returned as is; a prefix is matched against the server's
/// run list.
///
/// # Errors
/// Returns an error if no run or more than one run matches the prefix, or if
/// the run list cannot be fetched.
pub async fn resolve_run_id(client: &SlipwayClient, id_or_prefix: &IdOrPrefix) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let runs = client
        .list_runs()
        .await
        .context("Failed to fetch runs for ID resolution")?;

    match_prefix(runs.iter().map(|run| run.id), &id_or_prefix.to_string())
}

/// Picks the single ID starting with `prefix`
fn match_prefix(ids: impl IntoIterator<Item = Uuid>, prefix: &str) -> Result<Uuid> {
    let matches: Vec<Uuid> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No run found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple runs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
