//! HTTP server.
//!
//! Routes, CORS and shared handler state.

pub mod handlers;

use crate::aspects::AspectDetector;
use crate::chart::ChartSource;
use crate::config::ServerConfig;
use crate::localization::Localizer;
use crate::models::BirthDefaults;
use crate::narrative::BackendChain;
use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<AspectDetector>,
    pub chart: Arc<dyn ChartSource>,
    pub narrative: Arc<BackendChain>,
    pub localizer: Arc<Localizer>,
    pub birth_defaults: Arc<BirthDefaults>,
}

/// Build the application router.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/api/get-data", post(handlers::get_data))
        .route("/api/analyze-big-three", post(handlers::analyze_big_three))
        .route("/api/aspects", post(handlers::aspects))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state, &config.allowed_origins))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
