//! Push API Handlers
//!
//! Entry points that turn push notifications into queued pipeline runs:
//! - `POST /` takes `{"repo", "branch", "commit"?}` from any caller
//! - `POST /github` takes a GitHub `push` webhook payload

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde_json::Value as JsonValue;
use slipway_core::domain::PipelineRun;
use slipway_core::dto::{GithubPushEvent, GithubTriggerResponse, PushRequest};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

const REPO_KEY: &str = "repo";
const BRANCH_KEY: &str = "branch";
const COMMIT_KEY: &str = "commit";

/// POST /
/// Queue a pipeline run for a repository and branch
pub async fn trigger(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PipelineRun>)> {
    let req = parse_push_request(&body)?;
    tracing::info!("Received push for {} branch {}", req.repo, req.branch);

    let run = state.queue.submit(req.into()).await;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// POST /github
/// Queue a pipeline run for a GitHub branch push
///
/// Pushes that do not update a branch (tags, deletions) are acknowledged
/// without queueing anything.
pub async fn github_push(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<GithubTriggerResponse>)> {
    let event: GithubPushEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid push event: {}", e)))?;

    let Some(repo) = event.repository_ref() else {
        let reason = match (&event.git_ref, event.deleted) {
            (Some(git_ref), true) => format!("{} was deleted", git_ref),
            (Some(git_ref), false) => format!("{} is not a branch", git_ref),
            (None, _) => "push event has no ref".to_string(),
        };
        tracing::info!("Ignoring push: {}", reason);
        return Ok((
            StatusCode::OK,
            Json(GithubTriggerResponse {
                queued: false,
                run: None,
                reason: Some(reason),
            }),
        ));
    };

    tracing::info!("Received GitHub push for {}", repo);
    let run = state.queue.submit(repo).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(GithubTriggerResponse {
            queued: true,
            run: Some(run),
            reason: None,
        }),
    ))
}

/// Validates a `POST /` body
///
/// Anything that is not a non-empty JSON object is "not JSON"; each required
/// key is then checked in order.
fn parse_push_request(body: &[u8]) -> ApiResult<PushRequest> {
    let not_json = || ApiError::BadRequest("data not JSON".to_string());

    let value: JsonValue = serde_json::from_slice(body).map_err(|_| not_json())?;
    let object = match value.as_object() {
        Some(object) if !object.is_empty() => object,
        _ => return Err(not_json()),
    };

    let required = |key: &str| -> ApiResult<String> {
        match object.get(key) {
            None => Err(ApiError::BadRequest(format!(
                "required key {} missing in request data",
                key
            ))),
            Some(JsonValue::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            Some(_) => Err(ApiError::BadRequest(format!(
                "key {} must be a non-empty string",
                key
            ))),
        }
    };

    let repo = required(REPO_KEY)?;
    let branch = required(BRANCH_KEY)?;
    let commit = match object.get(COMMIT_KEY) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(ApiError::BadRequest(format!(
                "key {} must be a string",
                COMMIT_KEY
            )));
        }
    };

    Ok(PushRequest {
        repo,
        branch,
        commit,
    })
}
