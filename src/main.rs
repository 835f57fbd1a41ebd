mod config;
mod gemini;
mod models;
mod orchestrator;
mod pdf;
mod prompts;
mod routes;
mod store;
mod studio;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use routes::{
    export_pdf, factory_chat, generate, generate_variations, get_project, health, list_projects, market_reaction, news,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::gemini::GeminiClient;
use crate::orchestrator::{Orchestrator, OrchestratorSettings};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/generate", post(generate))
        .route("/api/variations", post(generate_variations))
        .route("/api/market-reaction", post(market_reaction))
        .route("/api/factory-chat", post(factory_chat))
        .route("/api/news", get(news))
        .route("/api/projects/:user", get(list_projects))
        .route("/api/projects/:user/:style_no", get(get_project))
        .route("/api/projects/:user/:style_no/pdf", get(export_pdf))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    if config.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; generation requests will be rejected");
    }
    tracing::info!("Using API key: {}", config.masked_api_key());
    tracing::info!(
        text_model = %config.text_model,
        image_model = %config.image_model,
        branch_timeout = ?config.branch_timeout,
        "Gemini configured"
    );

    let gemini = Arc::new(GeminiClient::new(&config));
    let state = AppState {
        store: Arc::default(),
        orchestrator: Arc::new(Orchestrator::new(gemini, OrchestratorSettings::from(&config))),
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
