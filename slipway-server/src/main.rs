use anyhow::{Context, Result};
use slipway_runner::{Config, Pipeline, RunQueue, RunRegistry, RunWorker};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "slipway_server=info,slipway_runner=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Slipway server...");

    let config = Config::from_env();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid configuration")?;

    tracing::info!(
        "Publishing to {} (max parallel runs: {}, retained runs: {})",
        config.registry_host,
        config.max_parallel_runs,
        config.max_retained_runs
    );

    let registry = RunRegistry::with_retention(config.max_retained_runs);
    let (queue, receiver) = RunQueue::new(registry.clone());
    let worker = RunWorker::new(
        registry.clone(),
        Arc::new(Pipeline::from_config(&config)),
        config.max_parallel_runs,
    );
    tokio::spawn(worker.run(receiver));

    let app = api::create_router(api::AppState { registry, queue });

    let addr = std::env::var("SLIPWAY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
