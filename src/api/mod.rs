// src/api/mod.rs — HTTP surface for the step-by-step walkthrough

pub mod auth;
pub mod handlers;
pub mod types;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::core::controller::TurnController;
use crate::infra::config::ServerConfig;
use crate::memory::StoreHandle;
use crate::recipe::Catalog;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<TurnController>,
    pub store: StoreHandle,
    pub catalog: Arc<Catalog>,
    /// Guards the review endpoints when set.
    pub token: Option<String>,
}

/// Build the axum router with all API routes.
pub fn build_router(state: ApiState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {o}");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route(
            "/api/session",
            post(handlers::create_session).get(handlers::get_session),
        )
        .route("/api/message", post(handlers::post_message))
        .route("/api/step", get(handlers::get_step))
        .route("/api/transcript", get(handlers::get_transcript))
        .route("/api/demographics", post(handlers::post_demographics))
        .route("/api/consented", get(handlers::list_consented))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Serve until the process is stopped.
pub async fn start_server(config: &ServerConfig, state: ApiState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let router = build_router(state, &config.cors_origins);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
