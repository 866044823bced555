use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::SlackConfig;
use crate::error::{CiPulseError, Result};
use crate::model::Transition;
use crate::providers::build_client;

use super::AlertChannel;

/// Posts transitions to a Slack incoming webhook.
pub struct SlackChannel {
    client: Client,
    webhook_url: Option<String>,
}

impl SlackChannel {
    pub fn from_config(config: &SlackConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            webhook_url: config
                .webhook_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
        })
    }
}

fn payload(transition: &Transition) -> Value {
    let text = transition.summary();
    json!({
        "text": text,
        "blocks": [
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": format!("*Build Update*\n{text}") }
            },
            {
                "type": "context",
                "elements": [
                    { "type": "mrkdwn", "text": transition.web_url.as_deref().unwrap_or("-") }
                ]
            }
        ]
    })
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn notify(&self, transition: &Transition) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&payload(transition))
            .send()
            .await
            .map_err(|e| CiPulseError::Alert(format!("slack request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CiPulseError::Alert(format!("slack responded with {status}")));
        }

        debug!("Slack notified: {}", transition.summary());
        Ok(())
    }
}
