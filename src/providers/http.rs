use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::{CiPulseError, Result};

const USER_AGENT: &str = concat!("cipulse/", env!("CARGO_PKG_VERSION"));

/// HTTP client shared by one adapter; every request carries `timeout`.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| CiPulseError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Sends the request and decodes a JSON body, treating non-2xx as failure.
pub(crate) async fn get_json<T>(request: RequestBuilder) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(CiPulseError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
