use serde::Deserialize;

/// One entry of a Jenkins job's `builds` array.
#[derive(Debug, Clone, Deserialize)]
pub struct JenkinsBuild {
    /// Build number, unique per job
    pub number: u64,
    /// `None` while the build is still running
    #[serde(default)]
    pub result: Option<String>,
    /// Start time in epoch milliseconds
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Elapsed milliseconds; zero while running
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Response of `job/<name>/api/json` restricted by a `tree` query.
#[derive(Debug, Deserialize)]
pub struct JobBuildsResponse {
    #[serde(default)]
    pub builds: Vec<JenkinsBuild>,
}
