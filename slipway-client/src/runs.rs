//! Pipeline run endpoints

use crate::SlipwayClient;
use crate::error::Result;
use slipway_core::domain::PipelineRun;
use slipway_core::dto::PushRequest;
use tracing::debug;
use uuid::Uuid;

impl SlipwayClient {
    /// Queue a pipeline run for a push
    ///
    /// # Returns
    /// The run as recorded by the server, in the `Queued` state
    pub async fn trigger(&self, req: PushRequest) -> Result<PipelineRun> {
        let url = format!("{}/", self.base_url);
        debug!("Triggering run for {}@{}", req.repo, req.branch);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// List all runs, most recent first
    pub async fn list_runs(&self) -> Result<Vec<PipelineRun>> {
        let url = format!("{}/runs", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get a run by ID
    pub async fn get_run(&self, run_id: Uuid) -> Result<PipelineRun> {
        let url = format!("{}/runs/{}", self.base_url, run_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
