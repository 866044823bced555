//! Provider adapters: turn CI-provider data into [`CanonicalObservation`]s.

mod github;
mod gitlab;
mod http;
mod jenkins;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;

use crate::config::Config;
use crate::error::Result;
use crate::model::{CanonicalObservation, Provider};

pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use jenkins::JenkinsProvider;

pub(crate) use http::build_client;

/// Number of most recent builds fetched per target on each poll.
pub const RECENT_WINDOW: usize = 10;

/// Common capability every CI provider exposes to the ingestion pipeline.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Whether credentials and targets are present. Unconfigured adapters
    /// still normalize webhooks but never poll.
    fn is_configured(&self) -> bool;

    /// Poll mode: recent builds for every configured target.
    ///
    /// Failures are contained per target; this never errors.
    async fn fetch_recent(&self) -> Vec<CanonicalObservation>;

    /// Webhook mode: `None` when the payload is not an event we understand.
    fn normalize_webhook(&self, payload: &Value) -> Option<CanonicalObservation>;
}

/// Adapters keyed by their provider tag.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    /// Builds all three adapters from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured base URL cannot be parsed or the HTTP
    /// client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.server.request_timeout();
        let mut registry = Self::default();
        registry.register(Arc::new(GitHubProvider::from_config(&config.github, timeout)?));
        registry.register(Arc::new(GitLabProvider::from_config(&config.gitlab, timeout)?));
        registry.register(Arc::new(JenkinsProvider::from_config(&config.jenkins, timeout)?));
        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// Adapters for the given providers, in the order requested.
    pub fn enabled(&self, providers: &[Provider]) -> Vec<Arc<dyn ProviderAdapter>> {
        providers.iter().filter_map(|p| self.get(*p)).collect()
    }
}

/// Runs `fetch` for every target concurrently and keeps only the successes.
///
/// A failing target is logged and skipped so it never hides the others.
pub(crate) async fn collect_per_target<F, Fut>(
    provider: Provider,
    targets: &[String],
    fetch: F,
) -> Vec<CanonicalObservation>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Vec<CanonicalObservation>>>,
{
    let fetch = &fetch;
    let results = join_all(
        targets
            .iter()
            .map(|target| target.trim())
            .filter(|target| !target.is_empty())
            .map(|target| async move { (target, fetch(target.to_string()).await) }),
    )
    .await;

    let mut observations = Vec::new();
    for (target, result) in results {
        match result {
            Ok(batch) => {
                debug!("{provider}: {} builds from {target}", batch.len());
                observations.extend(batch);
            }
            Err(e) => warn!("{provider}: skipping {target}: {e}"),
        }
    }
    observations
}

/// Parses the timestamp formats providers put in API responses and webhooks.
///
/// Accepts RFC 3339 and GitLab's webhook style `2024-05-01 10:00:00 UTC`.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some(ts.with_timezone(&Utc));
    }
    raw.strip_suffix(" UTC")
        .and_then(|naive| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S").ok())
        .map(|naive| naive.and_utc())
}

/// Renders a JSON id (number or string) as an opaque external identifier.
pub(crate) fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CiPulseError;
    use crate::model::Status;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parses_rfc3339_and_gitlab_webhook_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:00:00 UTC"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 12:00:00 +0200"), Some(expected));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn json_ids_accept_numbers_and_strings() {
        assert_eq!(json_id(&json!(42)), Some("42".to_string()));
        assert_eq!(json_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(json_id(&json!("")), None);
        assert_eq!(json_id(&json!(null)), None);
    }

    #[tokio::test]
    async fn failing_target_does_not_hide_others() {
        let targets = vec!["broken".to_string(), " ".to_string(), "healthy".to_string()];

        let observations = collect_per_target(Provider::Github, &targets, |target| async move {
            if target == "broken" {
                Err(CiPulseError::Api {
                    status: 504,
                    message: "gateway timeout".into(),
                })
            } else {
                Ok(vec![CanonicalObservation::new(
                    Provider::Github,
                    target,
                    "1",
                    Status::Success,
                    None,
                    None,
                    None,
                )])
            }
        })
        .await;

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].pipeline_name, "healthy");
    }

    #[test]
    fn registry_selects_enabled_adapters_in_order() {
        let registry = AdapterRegistry::from_config(&Config::default()).unwrap();
        let enabled = registry.enabled(&[Provider::Jenkins, Provider::Github]);
        let tags: Vec<Provider> = enabled.iter().map(|a| a.provider()).collect();
        assert_eq!(tags, vec![Provider::Jenkins, Provider::Github]);
        assert!(registry.get(Provider::Gitlab).is_some());
    }
}
