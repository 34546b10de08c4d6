//! HTTP service for the barista assistant
//!
//! Exposes the agent and each backend directly: `POST /chat` runs one agent
//! turn, `/products`, `/outlets` and `/calculate` call a single capability, and
//! `/` reports health. Endpoints whose component failed at startup answer 503.

pub mod error;
pub mod routes;

pub use error::{ApiError, Result};

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use barista_core::config::ServerSettings;
use barista_core::{AgentError, Services};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

/// Builds the router with all routes and middleware.
pub fn router(state: AppState, settings: &ServerSettings) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/chat", post(routes::chat))
        .route("/products", get(routes::products))
        .route("/outlets", get(routes::outlets))
        .route("/calculate", get(routes::calculate))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&settings.cors_origins))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;
    log::info!(
        "{} {} -> {} in {:?}",
        method,
        uri.path(),
        response.status(),
        start.elapsed()
    );
    response
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let parsed: std::result::Result<Vec<HeaderValue>, _> =
        origins.iter().map(|origin| origin.parse()).collect();
    match parsed {
        Ok(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            log::warn!("Invalid CORS origin in {:?}, allowing any origin", origins);
            CorsLayer::permissive()
        }
    }
}

/// Binds the configured address and serves until Ctrl+C or SIGTERM.
pub async fn serve(state: AppState, settings: &ServerSettings) -> std::result::Result<(), AgentError> {
    let listener = TcpListener::bind(&settings.bind_addr).await.map_err(|e| {
        AgentError::ConfigError(format!("Failed to bind to {}: {}", settings.bind_addr, e))
    })?;
    log::info!("Barista server listening on http://{}", settings.bind_addr);

    axum::serve(listener, router(state, settings))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Barista server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
