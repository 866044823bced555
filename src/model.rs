//! Provider-agnostic build records shared by adapters, the store and the dispatcher.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A CI system that builds are collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
    Jenkins,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Github, Provider::Gitlab, Provider::Jenkins];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Jenkins => "jenkins",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Provider::Github),
            "gitlab" => Ok(Provider::Gitlab),
            "jenkins" => Ok(Provider::Jenkins),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Canonical build status.
///
/// Anything a provider reports that has no canonical counterpart is carried
/// verbatim in [`Status::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Running,
    Success,
    Failed,
    Cancelled,
    Pending,
    Skipped,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Running => "running",
            Status::Success => "success",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
            Status::Pending => "pending",
            Status::Skipped => "skipped",
            Status::Other(raw) => raw,
        }
    }

    /// Running and pending builds have no end time yet.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Status::Running | Status::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Success | Status::Failed | Status::Cancelled | Status::Skipped
        )
    }
}

impl From<&str> for Status {
    fn from(raw: &str) -> Self {
        match raw {
            "running" => Status::Running,
            "success" => Status::Success,
            "failed" => Status::Failed,
            "cancelled" => Status::Cancelled,
            "pending" => Status::Pending,
            "skipped" => Status::Skipped,
            other => Status::Other(other.to_string()),
        }
    }
}

impl From<String> for Status {
    fn from(raw: String) -> Self {
        Status::from(raw.as_str())
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which producer wrote a build row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestSource {
    Poll,
    Webhook,
}

impl IngestSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestSource::Poll => "poll",
            IngestSource::Webhook => "webhook",
        }
    }
}

/// A normalized snapshot of one build as seen by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalObservation {
    pub provider: Provider,
    pub pipeline_name: String,
    pub external_id: String,
    pub status: Status,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub web_url: Option<String>,
}

impl CanonicalObservation {
    /// Builds an observation and derives its duration.
    ///
    /// In-progress builds never carry an end time or a duration; otherwise the
    /// duration is the whole number of seconds between start and finish when
    /// both are known. Empty URLs are treated as absent.
    pub fn new(
        provider: Provider,
        pipeline_name: impl Into<String>,
        external_id: impl Into<String>,
        status: Status,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
        web_url: Option<String>,
    ) -> Self {
        let finished_at = if status.is_in_progress() {
            None
        } else {
            finished_at
        };

        let duration_seconds = match (started_at, finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        };

        Self {
            provider,
            pipeline_name: pipeline_name.into(),
            external_id: external_id.into(),
            status,
            started_at,
            finished_at,
            duration_seconds,
            web_url: web_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

/// A detected change in a build's observable state.
///
/// `status_old == None` marks the first sighting of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub provider: Provider,
    pub pipeline_name: String,
    pub external_id: String,
    pub status_old: Option<Status>,
    pub status_new: Status,
    pub web_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Transition {
    pub fn is_first_sighting(&self) -> bool {
        self.status_old.is_none()
    }

    /// One-line human summary used by log lines and alert channels.
    pub fn summary(&self) -> String {
        let old = self
            .status_old
            .as_ref()
            .map_or("new", |status| status.as_str());
        format!(
            "[{}] {} -> {} (was {})",
            self.provider, self.pipeline_name, self.status_new, old
        )
    }
}

/// Event pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    BuildUpdated { build: Transition },
}

/// A stored build joined with its pipeline, as returned by store reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub id: i64,
    pub provider: Provider,
    pub pipeline_name: String,
    pub external_id: String,
    pub status: Status,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub web_url: Option<String>,
    pub event_source: Option<String>,
    pub logs: Option<String>,
}
