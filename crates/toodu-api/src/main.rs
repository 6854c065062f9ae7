//! Theft Over Open Data prediction API
//!
//! Serves the six fitted classifiers over HTTP and summarizes predictions
//! through an OpenAI-compatible chat completion API.

use anyhow::{Context, Result};
use std::sync::Arc;
use toodu_api::{api, config::ServiceConfig};
use toodu_lib::{
    chat::ChatClient,
    health::{components, ComponentHealth, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    predictor::PredictionService,
    store::ModelStore,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting toodu-api");

    let config = ServiceConfig::load()?;
    info!(
        models_dir = %config.models_dir.display(),
        chat_model = %config.chat_model,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    let metrics = ServiceMetrics::new();

    let store = Arc::new(ModelStore::new(config.models_dir.clone()));
    if config.preload_models {
        let preload_store = Arc::clone(&store);
        let report = tokio::task::spawn_blocking(move || preload_store.preload())
            .await
            .context("Model preload task failed")?;
        health_registry
            .update(components::MODEL_STORE, ComponentHealth::from_preload(&report))
            .await;
    } else {
        health_registry.register(components::MODEL_STORE).await;
    }
    metrics.set_models_loaded(store.loaded_count());

    let chat = ChatClient::new(config.chat_config()).context("Failed to create chat client")?;
    if chat.has_api_key() {
        health_registry.register(components::CHAT_CLIENT).await;
    } else {
        health_registry
            .set_degraded(components::CHAT_CLIENT, "No chat API key configured")
            .await;
    }

    let logger = StructuredLogger::new("toodu-api");
    logger.log_startup(SERVICE_VERSION, &config.bind_addr(), store.loaded_count());

    let app_state = Arc::new(api::AppState::new(
        PredictionService::new(store),
        chat,
        config.default_sampling(),
        health_registry.clone(),
        metrics,
    ));

    health_registry.set_ready(true).await;

    let server = tokio::spawn(api::serve(config.bind_addr(), app_state));

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("server stopped"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    return Err(e);
                }
                Err(e) => return Err(e).context("API server task panicked"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
