use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use log::debug;
use serde_json::Value;

use crate::auth::Token;
use crate::config::JenkinsConfig;
use crate::error::Result;
use crate::model::{CanonicalObservation, Provider, Status};
use crate::providers::{collect_per_target, json_id, ProviderAdapter};

use super::client::JenkinsClient;
use super::types::JenkinsBuild;

/// Jenkins adapter polling job build lists.
pub struct JenkinsProvider {
    client: Option<JenkinsClient>,
    jobs: Vec<String>,
}

impl JenkinsProvider {
    /// Creates a Jenkins adapter; inert unless URL, user, token and jobs are all set.
    ///
    /// # Errors
    ///
    /// Returns an error if the Jenkins URL cannot be parsed.
    pub fn from_config(config: &JenkinsConfig, timeout: Duration) -> Result<Self> {
        let base_url = config.base_url.as_deref().filter(|s| !s.trim().is_empty());
        let user = config.user.as_deref().filter(|s| !s.trim().is_empty());
        let token = Token::non_empty(config.api_token.as_deref());

        let client = match (base_url, user, token) {
            (Some(base_url), Some(user), Some(token)) => Some(JenkinsClient::new(
                base_url,
                user.to_string(),
                token,
                timeout,
            )?),
            _ => None,
        };

        Ok(Self {
            client,
            jobs: config
                .jobs
                .iter()
                .map(|job| job.trim().trim_matches('/').to_string())
                .collect(),
        })
    }

    async fn fetch_job(&self, client: &JenkinsClient, job: String) -> Result<Vec<CanonicalObservation>> {
        let builds = client.fetch_recent_builds(&job).await?;
        Ok(builds.iter().map(|build| normalize_build(&job, build)).collect())
    }
}

#[async_trait]
impl ProviderAdapter for JenkinsProvider {
    fn provider(&self) -> Provider {
        Provider::Jenkins
    }

    fn is_configured(&self) -> bool {
        self.client.is_some() && !self.jobs.is_empty()
    }

    async fn fetch_recent(&self) -> Vec<CanonicalObservation> {
        let Some(client) = self.client.as_ref().filter(|_| !self.jobs.is_empty()) else {
            return Vec::new();
        };

        collect_per_target(Provider::Jenkins, &self.jobs, |job| self.fetch_job(client, job)).await
    }

    fn normalize_webhook(&self, payload: &Value) -> Option<CanonicalObservation> {
        let build = payload.get("build").filter(|b| b.is_object())?;

        let Some(number) = build
            .get("number")
            .and_then(json_id)
            .or_else(|| build.get("id").and_then(json_id))
        else {
            debug!("Ignoring Jenkins payload without a build number");
            return None;
        };

        let name = ["name", "job_name", "project"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(|name| name.trim().trim_matches('/'))
            .filter(|name| !name.is_empty())?;

        let result = build
            .get("status")
            .and_then(Value::as_str)
            .or_else(|| build.get("result").and_then(Value::as_str));

        let url = build
            .get("full_url")
            .and_then(Value::as_str)
            .or_else(|| build.get("url").and_then(Value::as_str))
            .map(ToString::to_string);

        let (started_at, finished_at) = timing(
            build.get("timestamp").and_then(json_i64),
            build.get("duration").and_then(json_i64),
        );

        Some(CanonicalObservation::new(
            Provider::Jenkins,
            name,
            number,
            map_result(result),
            started_at,
            finished_at,
            url,
        ))
    }
}

/// Maps a Jenkins build result onto a canonical status.
///
/// No result yet means the build is still running.
pub(super) fn map_result(result: Option<&str>) -> Status {
    match result.map(str::trim).filter(|r| !r.is_empty()) {
        None => Status::Running,
        Some(r) if r.eq_ignore_ascii_case("SUCCESS") => Status::Success,
        Some(r) if r.eq_ignore_ascii_case("FAILURE") => Status::Failed,
        Some(r) => Status::from(r.to_lowercase()),
    }
}

/// Start and end times from Jenkins' epoch-millisecond start and elapsed
/// milliseconds. Jenkins has no end timestamp of its own; a duration that
/// lands outside the representable range yields no end time.
fn timing(
    timestamp_ms: Option<i64>,
    duration_ms: Option<i64>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let started_at = timestamp_ms
        .filter(|ts| *ts > 0)
        .and_then(|ts| Utc.timestamp_millis_opt(ts).single());

    let finished_at = match (started_at, duration_ms) {
        (Some(start), Some(ms)) if ms > 0 => TimeDelta::try_milliseconds(ms)
            .and_then(|elapsed| start.checked_add_signed(elapsed)),
        _ => None,
    };

    (started_at, finished_at)
}

fn json_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn normalize_build(job: &str, build: &JenkinsBuild) -> CanonicalObservation {
    let (started_at, finished_at) = timing(build.timestamp, build.duration);

    CanonicalObservation::new(
        Provider::Jenkins,
        job,
        build.number.to_string(),
        map_result(build.result.as_deref()),
        started_at,
        finished_at,
        build.url.clone(),
    )
}
