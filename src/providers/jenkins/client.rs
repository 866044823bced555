use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::auth::Token;
use crate::error::{CiPulseError, Result};
use crate::providers::http::{build_client, get_json};
use crate::providers::RECENT_WINDOW;

use super::types::{JenkinsBuild, JobBuildsResponse};

/// Jenkins JSON API client authenticated with a user API token.
pub struct JenkinsClient {
    client: Client,
    base_url: Url,
    user: String,
    token: Token,
}

impl JenkinsClient {
    pub fn new(base_url: &str, user: String, token: Token, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| CiPulseError::Config(format!("Invalid Jenkins URL: {e}")))?;

        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            user,
            token,
        })
    }

    /// API URL of a job; `folder/job` addresses `job/folder/job/job`.
    pub fn job_api_url(&self, job: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| CiPulseError::Config("Jenkins URL cannot be a base".into()))?;
            segments.pop_if_empty();
            for part in job.split('/').filter(|p| !p.is_empty()) {
                segments.push("job").push(part);
            }
            segments.push("api").push("json");
        }
        Ok(url)
    }

    /// Most recent builds of one job.
    pub async fn fetch_recent_builds(&self, job: &str) -> Result<Vec<JenkinsBuild>> {
        let tree = format!("builds[number,result,timestamp,duration,url]{{0,{RECENT_WINDOW}}}");
        let request = self
            .client
            .get(self.job_api_url(job)?)
            .basic_auth(&self.user, Some(self.token.as_str()))
            .query(&[("tree", tree)]);

        let response: JobBuildsResponse = get_json(request).await?;
        Ok(response.builds)
    }
}
