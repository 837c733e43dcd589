//! Run API Handlers
//!
//! Read-only view of the runs queued since the server started.

use axum::{
    Json,
    extract::{Path, State},
};
use slipway_core::domain::PipelineRun;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /runs
/// List all runs, most recent first
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<PipelineRun>> {
    tracing::debug!("Listing runs");
    Json(state.registry.list().await)
}

/// GET /runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineRun>> {
    tracing::debug!("Getting run: {}", id);

    state
        .registry
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Run {} not found", id)))
}
