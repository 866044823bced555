use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::auth::Token;
use crate::error::{CiPulseError, Result};
use crate::providers::http::{build_client, get_json};
use crate::providers::RECENT_WINDOW;

use super::links::encode_project;
use super::types::{GitLabPipeline, GitLabProject};

pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Token,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Token, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| CiPulseError::Config(format!("Invalid base URL: {e}")))?
            .join("api/v4/")
            .map_err(|e| CiPulseError::Config(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client: build_client(timeout)?,
            api_url,
            token,
        })
    }

    fn project_url(&self, project: &str, suffix: &str) -> Result<Url> {
        self.api_url
            .join(&format!("projects/{}{suffix}", encode_project(project)))
            .map_err(|e| CiPulseError::Config(format!("Invalid project URL: {e}")))
    }

    /// Project details, used to turn a numeric ID into its path.
    pub async fn fetch_project(&self, project: &str) -> Result<GitLabProject> {
        let request = self
            .client
            .get(self.project_url(project, "")?)
            .header("PRIVATE-TOKEN", self.token.as_str());

        get_json(request).await
    }

    /// Most recent pipelines of a project, newest first.
    pub async fn fetch_recent_pipelines(&self, project: &str) -> Result<Vec<GitLabPipeline>> {
        let request = self
            .client
            .get(self.project_url(project, "/pipelines")?)
            .header("PRIVATE-TOKEN", self.token.as_str())
            .query(&[("per_page", RECENT_WINDOW)]);

        get_json(request).await
    }
}
