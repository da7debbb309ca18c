//! Router assembly: session endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
  routing::{delete, get, post},
  Router,
};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - session API under `/api/v1/sessions/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/ws", get(ws::ws_upgrade))
    .route("/api/v1/health", get(http::http_health))
    .route("/api/v1/sessions", post(http::http_start_session))
    .route("/api/v1/sessions/:id", delete(http::http_end_session))
    .route("/api/v1/sessions/:id/next", post(http::http_next_word))
    .route("/api/v1/sessions/:id/complete", post(http::http_complete))
    .route("/api/v1/sessions/:id/reset", post(http::http_reset))
    .route("/api/v1/sessions/:id/failed", get(http::http_session_failed))
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}
