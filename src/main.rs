//! Caatuu · Challenge Engine server
//!
//! - Axum HTTP + WebSocket API over the session manager
//! - Optional OpenAI advisor (via environment variables)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   OPENAI_API_KEY     : enables the OpenAI advisor if present
//!   OPENAI_BASE_URL    : default "https://api.openai.com/v1"
//!   OPENAI_MODEL       : default "gpt-4o-mini"
//!   ENGINE_CONFIG_PATH : path to TOML config (prompts, timeouts, idle TTL, optional word bank)
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use caatuu_engine::routes::build_router;
use caatuu_engine::state::{spawn_idle_sweeper, AppState};
use caatuu_engine::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::from_env());
  let _sweeper = spawn_idle_sweeper(state.clone());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "caatuu_engine", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "caatuu_engine", error = %e, "Failed to listen for shutdown signal");
  }
  info!(target: "caatuu_engine", "Shutdown signal received");
}
