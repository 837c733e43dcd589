//! Slipway HTTP Client
//!
//! A small, type-safe client for the Slipway webhook server, used by the CLI.
//!
//! # Example
//!
//! ```no_run
//! use slipway_client::SlipwayClient;
//! use slipway_core::dto::PushRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), slipway_client::ClientError> {
//!     let client = SlipwayClient::new("http://localhost:8080");
//!
//!     let run = client
//!         .trigger(PushRequest {
//!             repo: "https://github.com/org/app.git".to_string(),
//!             branch: "main".to_string(),
//!             commit: None,
//!         })
//!         .await?;
//!
//!     println!("Queued run: {}", run.id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod runs;

pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Slipway server API
///
/// - Health checks
/// - Triggering pipeline runs
/// - Inspecting queued, running and finished runs
#[derive(Debug, Clone)]
pub struct SlipwayClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    client: Client,
}

impl SlipwayClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows configuring timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the server is up
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_empty_response(response).await
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response whose body is ignored
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
