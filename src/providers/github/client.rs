use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use url::Url;

use crate::auth::Token;
use crate::error::{CiPulseError, Result};
use crate::providers::http::{build_client, get_json};
use crate::providers::RECENT_WINDOW;

use super::types::{GitHubWorkflowRun, WorkflowRunsResponse};

/// GitHub API client for fetching workflow runs.
pub struct GitHubClient {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL for GitHub API
    api_url: Url,
    token: Token,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `api_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `token` - GitHub token sent as a bearer credential
    /// * `timeout` - Per-request timeout
    pub fn new(api_url: &str, token: Token, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(&format!("{}/", api_url.trim_end_matches('/')))
            .map_err(|e| CiPulseError::Config(format!("Invalid GitHub API URL: {e}")))?;

        Ok(Self {
            client: build_client(timeout)?,
            api_url,
            token,
        })
    }

    /// Fetch the most recent workflow runs of one repository.
    ///
    /// # Arguments
    ///
    /// * `repo` - Repository in `owner/repo` form
    pub async fn fetch_recent_runs(&self, repo: &str) -> Result<Vec<GitHubWorkflowRun>> {
        let url = self
            .api_url
            .join(&format!("repos/{repo}/actions/runs"))
            .map_err(|e| CiPulseError::Config(format!("Invalid repository '{repo}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let request = self
            .client
            .get(url)
            .headers(headers)
            .bearer_auth(self.token.as_str())
            .query(&[("per_page", RECENT_WINDOW)]);

        let response: WorkflowRunsResponse = get_json(request).await?;
        Ok(response.workflow_runs)
    }
}
