use chrono::{DateTime, Utc};
use serde::Deserialize;

/// GitHub Actions workflow run, as returned by the runs API and embedded in
/// `workflow_run` webhook events.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubWorkflowRun {
    /// Unique identifier for the workflow run
    pub id: u64,
    /// Name of the workflow
    pub name: Option<String>,
    /// Lifecycle state (queued, in_progress, completed, ...)
    pub status: Option<String>,
    /// Outcome once completed (success, failure, cancelled, ...)
    pub conclusion: Option<String>,
    /// When the run actually started executing
    pub run_started_at: Option<DateTime<Utc>>,
    /// Last update; the finish time for completed runs
    pub updated_at: Option<DateTime<Utc>>,
    /// Link to the run in the GitHub UI
    pub html_url: Option<String>,
}

/// Response from GitHub API for workflow runs.
#[derive(Debug, Deserialize)]
pub struct WorkflowRunsResponse {
    #[serde(default)]
    pub workflow_runs: Vec<GitHubWorkflowRun>,
}
