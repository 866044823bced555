use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::auth::Token;
use crate::config::GitHubConfig;
use crate::error::Result;
use crate::model::{CanonicalObservation, Provider, Status};
use crate::providers::{collect_per_target, ProviderAdapter};

use super::client::GitHubClient;
use super::types::GitHubWorkflowRun;

/// Adapter for GitHub Actions workflow runs.
pub struct GitHubProvider {
    /// `None` when no token is configured
    client: Option<GitHubClient>,
    /// Repositories in `owner/repo` form
    repos: Vec<String>,
}

impl GitHubProvider {
    /// Create a GitHub Actions adapter.
    ///
    /// An adapter without a token or without repositories is inert.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL is invalid.
    pub fn from_config(config: &GitHubConfig, timeout: Duration) -> Result<Self> {
        let client = match Token::non_empty(config.token.as_deref()) {
            Some(token) => Some(GitHubClient::new(&config.api_url, token, timeout)?),
            None => None,
        };

        Ok(Self {
            client,
            repos: config.repos.clone(),
        })
    }

    async fn fetch_repo(&self, client: &GitHubClient, repo: String) -> Result<Vec<CanonicalObservation>> {
        let runs = client.fetch_recent_runs(&repo).await?;
        Ok(runs
            .iter()
            .filter_map(|run| normalize_run(&repo, run))
            .collect())
    }
}

#[async_trait]
impl ProviderAdapter for GitHubProvider {
    fn provider(&self) -> Provider {
        Provider::Github
    }

    fn is_configured(&self) -> bool {
        self.client.is_some() && !self.repos.is_empty()
    }

    async fn fetch_recent(&self) -> Vec<CanonicalObservation> {
        let Some(client) = self.client.as_ref().filter(|_| !self.repos.is_empty()) else {
            return Vec::new();
        };

        collect_per_target(Provider::Github, &self.repos, |repo| {
            self.fetch_repo(client, repo)
        })
        .await
    }

    fn normalize_webhook(&self, payload: &Value) -> Option<CanonicalObservation> {
        let run_value = payload.get("workflow_run").filter(|v| v.is_object())?;

        let run: GitHubWorkflowRun = match serde_json::from_value(run_value.clone()) {
            Ok(run) => run,
            Err(e) => {
                debug!("Ignoring malformed workflow_run payload: {e}");
                return None;
            }
        };

        let pipeline_name = payload
            .pointer("/repository/full_name")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .or_else(|| run.name.clone())?;

        normalize_run(&pipeline_name, &run)
    }
}

/// Maps GitHub's status/conclusion pair onto a canonical status.
///
/// Returns `None` when the run reports neither.
pub(super) fn map_status(status: Option<&str>, conclusion: Option<&str>) -> Option<Status> {
    if matches!(status, Some("in_progress" | "queued")) {
        return Some(Status::Running);
    }
    match conclusion {
        Some("success") => Some(Status::Success),
        Some("failure") => Some(Status::Failed),
        Some(raw) => Some(Status::from(raw)),
        None => status.map(Status::from),
    }
}

pub(super) fn normalize_run(pipeline_name: &str, run: &GitHubWorkflowRun) -> Option<CanonicalObservation> {
    let Some(status) = map_status(run.status.as_deref(), run.conclusion.as_deref()) else {
        debug!("Skipping run {} with neither status nor conclusion", run.id);
        return None;
    };

    let finished_at = if status.is_terminal() {
        run.updated_at
    } else {
        None
    };

    Some(CanonicalObservation::new(
        Provider::Github,
        pipeline_name,
        run.id.to_string(),
        status,
        run.run_started_at,
        finished_at,
        run.html_url.clone(),
    ))
}
