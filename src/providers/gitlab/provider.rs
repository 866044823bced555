use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use crate::auth::Token;
use crate::config::GitLabConfig;
use crate::error::Result;
use crate::model::{CanonicalObservation, Provider, Status};
use crate::providers::{collect_per_target, parse_timestamp, ProviderAdapter};

use super::client::GitLabClient;
use super::links::pipeline_url;
use super::types::{GitLabPipeline, GitLabProject};

/// Native statuses after which a pipeline has an end time.
const FINISHED_STATUSES: [&str; 5] = ["success", "failed", "canceled", "cancelled", "skipped"];

/// GitLab CI/CD adapter.
///
/// GitLab's status vocabulary is passed through verbatim. Builds are keyed by
/// project path on both the poll and webhook side; a project configured by
/// numeric ID is looked up once and polled under its path.
pub struct GitLabProvider {
    client: Option<GitLabClient>,
    /// Project paths (e.g., "group/project") or numeric IDs
    projects: Vec<String>,
    /// Numeric project ID -> resolved project
    resolved: Mutex<HashMap<String, GitLabProject>>,
}

impl GitLabProvider {
    /// Creates a GitLab adapter; inert without a token or projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the API endpoint URL cannot be constructed.
    pub fn from_config(config: &GitLabConfig, timeout: Duration) -> Result<Self> {
        let client = match Token::non_empty(config.token.as_deref()) {
            Some(token) => Some(GitLabClient::new(&config.base_url, token, timeout)?),
            None => None,
        };

        Ok(Self {
            client,
            projects: config.projects.clone(),
            resolved: Mutex::new(HashMap::new()),
        })
    }

    /// Path and web URL for a configured project.
    async fn resolve_project(
        &self,
        client: &GitLabClient,
        project: &str,
    ) -> Result<(String, Option<String>)> {
        if !project.bytes().all(|b| b.is_ascii_digit()) {
            return Ok((project.to_string(), None));
        }

        let cached = self
            .resolved
            .lock()
            .ok()
            .and_then(|cache| cache.get(project).cloned());
        let details = match cached {
            Some(details) => details,
            None => {
                let details = client.fetch_project(project).await?;
                if let Ok(mut cache) = self.resolved.lock() {
                    cache.insert(project.to_string(), details.clone());
                }
                details
            }
        };

        let path = details
            .path_with_namespace
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| project.to_string());
        debug!("GitLab project {project} is {path}");
        Ok((path, details.web_url))
    }

    async fn fetch_project(
        &self,
        client: &GitLabClient,
        project: String,
    ) -> Result<Vec<CanonicalObservation>> {
        let (path, project_web_url) = self.resolve_project(client, &project).await?;
        let pipelines = client.fetch_recent_pipelines(&project).await?;
        Ok(pipelines
            .iter()
            .map(|pipeline| normalize_pipeline(&path, pipeline, project_web_url.as_deref()))
            .collect())
    }
}

#[async_trait]
impl ProviderAdapter for GitLabProvider {
    fn provider(&self) -> Provider {
        Provider::Gitlab
    }

    fn is_configured(&self) -> bool {
        self.client.is_some() && !self.projects.is_empty()
    }

    async fn fetch_recent(&self) -> Vec<CanonicalObservation> {
        let Some(client) = self.client.as_ref().filter(|_| !self.projects.is_empty()) else {
            return Vec::new();
        };

        collect_per_target(Provider::Gitlab, &self.projects, |project| {
            self.fetch_project(client, project)
        })
        .await
    }

    fn normalize_webhook(&self, payload: &Value) -> Option<CanonicalObservation> {
        let kind = payload.get("object_kind").and_then(Value::as_str);
        if kind != Some("pipeline") {
            debug!("Ignoring GitLab event kind {kind:?}");
            return None;
        }

        let pipeline: GitLabPipeline = payload
            .get("object_attributes")
            .cloned()
            .and_then(|attrs| serde_json::from_value(attrs).ok())?;

        let project: GitLabProject = payload
            .get("project")
            .cloned()
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        let pipeline_name = project
            .path_with_namespace
            .clone()
            .or_else(|| project.name.clone())?;

        Some(normalize_pipeline(
            &pipeline_name,
            &pipeline,
            project.web_url.as_deref(),
        ))
    }
}

fn normalize_pipeline(
    project: &str,
    pipeline: &GitLabPipeline,
    project_web_url: Option<&str>,
) -> CanonicalObservation {
    let started_at = pipeline.created_at.as_deref().and_then(parse_timestamp);

    let finished_at = if FINISHED_STATUSES.contains(&pipeline.status.as_str()) {
        pipeline
            .finished_at
            .as_deref()
            .or(pipeline.updated_at.as_deref())
            .and_then(parse_timestamp)
    } else {
        None
    };

    let web_url = pipeline
        .web_url
        .clone()
        .or_else(|| pipeline.url.clone())
        .or_else(|| project_web_url.map(|base| pipeline_url(base, pipeline.id)));

    CanonicalObservation::new(
        Provider::Gitlab,
        project,
        pipeline.id.to_string(),
        Status::from(pipeline.status.as_str()),
        started_at,
        finished_at,
        web_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn provider_for(base_url: &str, token: Option<&str>, projects: &[&str]) -> GitLabProvider {
        let config = GitLabConfig {
            token: token.map(ToString::to_string),
            base_url: base_url.to_string(),
            projects: projects.iter().map(ToString::to_string).collect(),
        };
        GitLabProvider::from_config(&config, Duration::from_secs(5)).unwrap()
    }

    async fn mock_project(server: &mut mockito::ServerGuard, id: u64, path: &str) -> mockito::Mock {
        server
            .mock("GET", format!("/api/v4/projects/{id}").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": id,
                    "name": path.rsplit('/').next(),
                    "path_with_namespace": path,
                    "web_url": format!("https://gitlab.com/{path}")
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_fetch_recent_passes_status_through() {
        let mut server = Server::new_async().await;
        let _project = mock_project(&mut server, 278964, "acme/app").await;
        let mock = server
            .mock("GET", "/api/v4/projects/278964/pipelines")
            .match_query(Matcher::UrlEncoded("per_page".into(), "10".into()))
            .match_header("private-token", "glpat-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {
                        "id": 900,
                        "status": "canceled",
                        "created_at": "2024-05-01T10:00:00.000Z",
                        "updated_at": "2024-05-01T10:01:30.000Z",
                        "web_url": "https://gitlab.com/acme/app/-/pipelines/900"
                    },
                    {
                        "id": 901,
                        "status": "running",
                        "created_at": "2024-05-01T10:05:00.000Z",
                        "updated_at": "2024-05-01T10:06:00.000Z"
                    },
                    {
                        "id": 902,
                        "status": "manual",
                        "created_at": "2024-05-01T10:07:00.000Z",
                        "updated_at": "2024-05-01T10:08:00.000Z"
                    }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let provider = provider_for(&server.url(), Some("glpat-test"), &["278964"]);
        let observations = provider.fetch_recent().await;

        mock.assert_async().await;
        assert_eq!(observations.len(), 3);

        assert_eq!(observations[0].pipeline_name, "acme/app");
        assert_eq!(observations[0].external_id, "900");
        assert_eq!(observations[0].status, Status::Other("canceled".into()));
        assert_eq!(observations[0].duration_seconds, Some(90));

        assert_eq!(observations[1].status, Status::Running);
        assert_eq!(observations[1].duration_seconds, None);
        assert_eq!(
            observations[1].web_url.as_deref(),
            Some("https://gitlab.com/acme/app/-/pipelines/901")
        );

        assert_eq!(observations[2].status.as_str(), "manual");
        assert_eq!(observations[2].finished_at, None);
    }

    #[tokio::test]
    async fn test_unreachable_project_returns_partial_results() {
        let mut server = Server::new_async().await;
        let _denied = server
            .mock("GET", "/api/v4/projects/1")
            .with_status(401)
            .with_body(r#"{"message":"401 Unauthorized"}"#)
            .create_async()
            .await;
        let _project = mock_project(&mut server, 2, "acme/tools").await;
        let _ok = server
            .mock("GET", "/api/v4/projects/2/pipelines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 5, "status": "pending"}]"#)
            .create_async()
            .await;

        let provider = provider_for(&server.url(), Some("glpat"), &["1", "2"]);
        let observations = provider.fetch_recent().await;

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].pipeline_name, "acme/tools");
        assert_eq!(observations[0].status, Status::Pending);
    }

    #[tokio::test]
    async fn test_numeric_project_matches_webhook_identity() {
        let mut server = Server::new_async().await;
        let project = server
            .mock("GET", "/api/v4/projects/42")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 42, "path_with_namespace": "acme/app"}"#)
            .expect(1)
            .create_async()
            .await;
        let pipelines = server
            .mock("GET", "/api/v4/projects/42/pipelines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 31, "status": "running"}]"#)
            .expect(2)
            .create_async()
            .await;

        let by_id = provider_for(&server.url(), Some("glpat"), &["42"]);
        let first = by_id.fetch_recent().await;
        let second = by_id.fetch_recent().await;
        let webhook = by_id
            .normalize_webhook(&json!({
                "object_kind": "pipeline",
                "object_attributes": { "id": 31, "status": "running" },
                "project": { "id": 42, "path_with_namespace": "acme/app" }
            }))
            .unwrap();

        project.assert_async().await;
        pipelines.assert_async().await;
        assert_eq!(first[0].pipeline_name, "acme/app");
        assert_eq!(second[0].pipeline_name, "acme/app");
        assert_eq!(webhook.pipeline_name, first[0].pipeline_name);
        assert_eq!(webhook.external_id, first[0].external_id);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_inert() {
        let provider = provider_for("http://127.0.0.1:9", None, &["group/project"]);
        assert!(!provider.is_configured());
        assert!(provider.fetch_recent().await.is_empty());
    }

    #[test]
    fn test_pipeline_webhook() {
        let provider = provider_for("https://gitlab.com", None, &[]);
        let payload = json!({
            "object_kind": "pipeline",
            "object_attributes": {
                "id": 31,
                "status": "success",
                "created_at": "2024-05-01 10:00:00 UTC",
                "finished_at": "2024-05-01 10:03:20 UTC",
                "duration": 200
            },
            "project": {
                "name": "app",
                "path_with_namespace": "acme/app",
                "web_url": "https://gitlab.com/acme/app"
            }
        });

        let observation = provider.normalize_webhook(&payload).unwrap();
        assert_eq!(observation.provider, Provider::Gitlab);
        assert_eq!(observation.pipeline_name, "acme/app");
        assert_eq!(observation.external_id, "31");
        assert_eq!(observation.status, Status::Success);
        assert_eq!(observation.duration_seconds, Some(200));
        assert_eq!(
            observation.web_url.as_deref(),
            Some("https://gitlab.com/acme/app/-/pipelines/31")
        );
    }

    #[test]
    fn test_running_pipeline_webhook_has_no_duration() {
        let provider = provider_for("https://gitlab.com", None, &[]);
        let payload = json!({
            "object_kind": "pipeline",
            "object_attributes": {
                "id": 32,
                "status": "running",
                "created_at": "2024-05-01 10:00:00 UTC",
                "finished_at": null
            },
            "project": { "name": "app" }
        });

        let observation = provider.normalize_webhook(&payload).unwrap();
        assert_eq!(observation.pipeline_name, "app");
        assert_eq!(observation.finished_at, None);
        assert_eq!(observation.duration_seconds, None);
    }

    #[test]
    fn test_non_pipeline_events_are_unsupported() {
        let provider = provider_for("https://gitlab.com", None, &[]);
        assert!(provider
            .normalize_webhook(&json!({ "object_kind": "push", "project": { "name": "app" } }))
            .is_none());
        assert!(provider
            .normalize_webhook(&json!({ "object_kind": "build", "build_id": 1 }))
            .is_none());
        assert!(provider.normalize_webhook(&json!({})).is_none());
    }
}
