use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use log::{error, warn};
use serde_json::Value;

use crate::ingest::WebhookOutcome;
use crate::model::Provider;

use super::AppState;

const GENERIC_TOKEN_HEADER: &str = "x-webhook-token";

/// Header carrying the shared secret for each provider.
fn token_header(provider: Provider) -> &'static str {
    match provider {
        Provider::Github => GENERIC_TOKEN_HEADER,
        Provider::Gitlab => "x-gitlab-token",
        Provider::Jenkins => "x-jenkins-token",
    }
}

fn presented_token(provider: Provider, headers: &HeaderMap) -> Option<&str> {
    [token_header(provider), GENERIC_TOKEN_HEADER]
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
}

/// `POST /api/webhooks/{provider}`
pub(super) async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, StatusCode> {
    let provider: Provider = provider.parse().map_err(|_| StatusCode::NOT_FOUND)?;

    if let Some(secret) = &state.webhook_secret {
        if presented_token(provider, &headers) != Some(secret.as_str()) {
            warn!("Rejected {provider} webhook: missing or wrong token");
            return Err(StatusCode::FORBIDDEN);
        }
    }

    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejected {provider} webhook: invalid JSON: {e}");
        StatusCode::BAD_REQUEST
    })?;

    match state.ingestor.ingest_webhook(provider, &payload).await {
        Ok(Some(outcome)) => Ok(Json(outcome)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to store {provider} webhook: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
