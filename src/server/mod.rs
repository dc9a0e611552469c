mod handlers;
mod state;

use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::map_response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::places::SitesService;

pub use state::AppState;

/// Routes plus CORS, no-store caching and the per-request timeout.
///
/// When the timeout fires the handler future is dropped, which abandons any
/// pending page delay and further provider calls.
pub fn build_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/geocode", get(handlers::geocode))
        .route("/places", get(handlers::places))
        .route("/get_sites", get(handlers::get_sites))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(map_response(handlers::timeout_body))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(config: &ServerConfig, service: SitesService) -> std::io::Result<()> {
    let state = Arc::new(AppState { service });
    let app = build_router(state, config.request_timeout);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("sitescout listening on http://{}", addr);
    info!("press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl+C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
