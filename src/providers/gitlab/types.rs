use serde::Deserialize;

/// A GitLab CI/CD pipeline.
///
/// Shared by the REST list API and the `object_attributes` of pipeline
/// webhook events, which differ in timestamp format and in which optional
/// fields they carry. Timestamps stay raw strings until normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabPipeline {
    /// Numeric pipeline ID, unique per instance
    pub id: u64,
    /// Native status (e.g., "running", "success", "canceled", "manual")
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Present in webhooks and pipeline details, not in list responses
    #[serde(default)]
    pub finished_at: Option<String>,
    /// REST API link to the pipeline page
    #[serde(default)]
    pub web_url: Option<String>,
    /// Webhook link to the pipeline page
    #[serde(default)]
    pub url: Option<String>,
}

/// The `project` block of a webhook event, or a project from the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitLabProject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}
