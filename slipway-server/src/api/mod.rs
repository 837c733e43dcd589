//! API Module
//!
//! HTTP API layer for the webhook server.
//! Each submodule handles endpoints for a specific concern.

pub mod error;
pub mod health;
pub mod push;
pub mod runs;

use axum::{
    Router,
    routing::{get, post},
};
use slipway_runner::{RunQueue, RunRegistry};
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: RunRegistry,
    pub queue: RunQueue,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Push triggers
        .route("/", post(push::trigger))
        .route("/github", post(push::github_push))
        // Runs
        .route("/runs", get(runs::list_runs))
        .route("/runs/{id}", get(runs::get_run))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value as JsonValue, json};
    use slipway_core::domain::{
        DeployAction, DeploymentOutcome, PipelineRun, RepositoryRef, RunStatus,
    };
    use slipway_runner::{RunExecutor, RunWorker};
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeExecutor;

    #[async_trait]
    impl RunExecutor for FakeExecutor {
        async fn execute(&self, repo: &RepositoryRef) -> Result<DeploymentOutcome, String> {
            Ok(DeploymentOutcome {
                model: format!("model-{}", repo.branch),
                application: "svc".to_string(),
                image: "localhost:32000/app:1.0".to_string(),
                action: DeployAction::Deployed,
            })
        }
    }

    /// Serves the router with a fake executor on an ephemeral port
    async fn serve() -> String {
        let registry = RunRegistry::new();
        let (queue, receiver) = RunQueue::new(registry.clone());
        let worker = RunWorker::new(registry.clone(), Arc::new(FakeExecutor), 2);
        tokio::spawn(worker.run(receiver));

        let app = create_router(AppState { registry, queue });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        format!("http://{}", addr)
    }

    async fn wait_for_terminal(base: &str, id: uuid::Uuid) -> PipelineRun {
        for _ in 0..200 {
            let run: PipelineRun = reqwest::get(format!("{}/runs/{}", base, id))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if run.status.is_terminal() {
                return run;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {id} did not finish");
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve().await;
        let response = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "OK");
    }

    #[tokio::test]
    async fn test_trigger_queues_and_runs() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/", base))
            .json(&json!({"repo": "https://example.com/org/app.git", "branch": "main"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);

        let run: PipelineRun = response.json().await.unwrap();
        assert_eq!(run.status, RunStatus::Queued);

        let run = wait_for_terminal(&base, run.id).await;
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.outcome.unwrap().model, "model-main");

        let runs: Vec<PipelineRun> = reqwest::get(format!("{}/runs", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_rejects_bad_body() {
        let base = serve().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/", base))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(body, json!({"error": "data not JSON"}));

        let response = client
            .post(format!("{}/", base))
            .json(&json!({"repo": "https://example.com/org/app.git"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({"error": "required key branch missing in request data"})
        );
    }

    #[tokio::test]
    async fn test_github_branch_push() {
        let base = serve().await;
        let response = reqwest::Client::new()
            .post(format!("{}/github", base))
            .json(&json!({
                "ref": "refs/heads/dev",
                "after": "feedbeef",
                "repository": {"clone_url": "https://github.com/org/app.git"}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);

        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(body["queued"], json!(true));
        assert_eq!(body["run"]["repository"]["branch"], json!("dev"));
        assert_eq!(body["run"]["repository"]["commit"], json!("feedbeef"));
    }

    #[tokio::test]
    async fn test_github_tag_push_is_ignored() {
        let base = serve().await;
        let response = reqwest::Client::new()
            .post(format!("{}/github", base))
            .json(&json!({
                "ref": "refs/tags/v1.0",
                "repository": {"clone_url": "https://github.com/org/app.git"}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({"queued": false, "reason": "refs/tags/v1.0 is not a branch"})
        );

        let runs: Vec<JsonValue> = reqwest::get(format!("{}/runs", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let base = serve().await;
        let id = uuid::Uuid::new_v4();
        let response = reqwest::get(format!("{}/runs/{}", base, id)).await.unwrap();
        assert_eq!(response.status(), 404);
        let body: JsonValue = response.json().await.unwrap();
        assert_eq!(body, json!({"error": format!("Run {} not found", id)}));
    }
}
