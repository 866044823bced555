use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;

use super::provider::{map_status, GitHubProvider};
use crate::config::GitHubConfig;
use crate::model::{Provider, Status};
use crate::providers::ProviderAdapter;

fn provider_for(api_url: &str, token: Option<&str>, repos: &[&str]) -> GitHubProvider {
    let config = GitHubConfig {
        token: token.map(ToString::to_string),
        api_url: api_url.to_string(),
        repos: repos.iter().map(ToString::to_string).collect(),
    };
    GitHubProvider::from_config(&config, Duration::from_secs(5)).unwrap()
}

fn runs_body() -> String {
    json!({
        "total_count": 2,
        "workflow_runs": [
            {
                "id": 101,
                "name": "CI",
                "status": "completed",
                "conclusion": "success",
                "run_started_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:02:00Z",
                "html_url": "https://github.com/acme/api/actions/runs/101"
            },
            {
                "id": 102,
                "name": "CI",
                "status": "in_progress",
                "conclusion": null,
                "run_started_at": "2024-05-01T10:05:00Z",
                "updated_at": "2024-05-01T10:06:00Z",
                "html_url": "https://github.com/acme/api/actions/runs/102"
            }
        ]
    })
    .to_string()
}

#[test]
fn test_status_mapping() {
    assert_eq!(map_status(Some("queued"), None), Some(Status::Running));
    assert_eq!(map_status(Some("in_progress"), None), Some(Status::Running));
    assert_eq!(
        map_status(Some("completed"), Some("success")),
        Some(Status::Success)
    );
    assert_eq!(
        map_status(Some("completed"), Some("failure")),
        Some(Status::Failed)
    );
    assert_eq!(
        map_status(Some("completed"), Some("cancelled")),
        Some(Status::Cancelled)
    );
    assert_eq!(
        map_status(Some("completed"), Some("timed_out")),
        Some(Status::Other("timed_out".into()))
    );
    assert_eq!(
        map_status(Some("waiting"), None),
        Some(Status::Other("waiting".into()))
    );
    assert_eq!(map_status(None, None), None);
}

#[tokio::test]
async fn test_unconfigured_provider_is_inert() {
    let no_token = provider_for("http://127.0.0.1:9", None, &["acme/api"]);
    assert!(!no_token.is_configured());
    assert!(no_token.fetch_recent().await.is_empty());

    let no_repos = provider_for("http://127.0.0.1:9", Some("ghp"), &[]);
    assert!(!no_repos.is_configured());
    assert!(no_repos.fetch_recent().await.is_empty());
}

#[tokio::test]
async fn test_fetch_recent_normalizes_runs() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/acme/api/actions/runs")
        .match_query(Matcher::UrlEncoded("per_page".into(), "10".into()))
        .match_header("authorization", "Bearer ghp-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(runs_body())
        .create_async()
        .await;

    let provider = provider_for(&server.url(), Some("ghp-test"), &["acme/api"]);
    let observations = provider.fetch_recent().await;

    mock.assert_async().await;
    assert_eq!(observations.len(), 2);

    let done = &observations[0];
    assert_eq!(done.provider, Provider::Github);
    assert_eq!(done.pipeline_name, "acme/api");
    assert_eq!(done.external_id, "101");
    assert_eq!(done.status, Status::Success);
    assert_eq!(done.duration_seconds, Some(120));
    assert!(done.finished_at.is_some());

    let running = &observations[1];
    assert_eq!(running.status, Status::Running);
    assert_eq!(running.finished_at, None);
    assert_eq!(running.duration_seconds, None);
}

#[tokio::test]
async fn test_failing_repo_is_isolated() {
    let mut server = Server::new_async().await;
    let _broken = server
        .mock("GET", "/repos/acme/broken/actions/runs")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;
    let _healthy = server
        .mock("GET", "/repos/acme/api/actions/runs")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(runs_body())
        .create_async()
        .await;

    let provider = provider_for(&server.url(), Some("ghp"), &["acme/broken", "acme/api"]);
    let observations = provider.fetch_recent().await;

    assert_eq!(observations.len(), 2);
    assert!(observations.iter().all(|o| o.pipeline_name == "acme/api"));
}

#[tokio::test]
async fn test_malformed_response_is_isolated() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/repos/acme/api/actions/runs")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>not json</html>")
        .create_async()
        .await;

    let provider = provider_for(&server.url(), Some("ghp"), &["acme/api"]);
    assert!(provider.fetch_recent().await.is_empty());
}

#[test]
fn test_webhook_workflow_run_event() {
    let provider = provider_for("https://api.github.com", None, &[]);
    let payload = json!({
        "action": "completed",
        "workflow_run": {
            "id": 555,
            "name": "Deploy",
            "status": "completed",
            "conclusion": "failure",
            "run_started_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:45Z",
            "html_url": "https://github.com/acme/api/actions/runs/555"
        },
        "repository": { "full_name": "acme/api" }
    });

    let observation = provider.normalize_webhook(&payload).unwrap();
    assert_eq!(observation.pipeline_name, "acme/api");
    assert_eq!(observation.external_id, "555");
    assert_eq!(observation.status, Status::Failed);
    assert_eq!(observation.duration_seconds, Some(45));
}

#[test]
fn test_webhook_falls_back_to_workflow_name() {
    let provider = provider_for("https://api.github.com", None, &[]);
    let payload = json!({
        "workflow_run": { "id": 7, "name": "Nightly", "status": "queued", "conclusion": null }
    });

    let observation = provider.normalize_webhook(&payload).unwrap();
    assert_eq!(observation.pipeline_name, "Nightly");
    assert_eq!(observation.status, Status::Running);
}

#[test]
fn test_webhook_without_workflow_run_is_unsupported() {
    let provider = provider_for("https://api.github.com", None, &[]);
    assert!(provider
        .normalize_webhook(&json!({ "zen": "Keep it logically awesome.", "hook_id": 1 }))
        .is_none());
    assert!(provider
        .normalize_webhook(&json!({ "workflow_run": "not-an-object" }))
        .is_none());
}
