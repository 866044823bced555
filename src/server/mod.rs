//! HTTP surface: webhooks, manual trigger, live updates and health.

mod live;
mod webhooks;

use std::future::Future;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use log::info;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::ingest::Ingestor;

/// Shared state for route handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    /// Shared secret webhooks must present; `None` disables the check
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(ingestor: Ingestor, webhook_secret: Option<String>) -> Self {
        Self {
            ingestor,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/webhooks/{provider}", post(webhooks::receive))
        .route("/api/collect/trigger", post(trigger))
        .route("/ws", get(live::upgrade))
        .with_state(state)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Starts a poll pass in the background and answers at once.
async fn trigger(State(state): State<AppState>) -> Json<Value> {
    drop(state.ingestor.spawn_pass());
    Json(json!({ "ok": true }))
}
