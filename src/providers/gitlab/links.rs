/// Builds the web URL of a pipeline from its project's web URL.
///
/// # Arguments
///
/// * `project_web_url` - Project page (e.g., <https://gitlab.com/group/project>)
/// * `pipeline_id` - Numeric pipeline ID
///
/// # Returns
///
/// Clickable URL to the pipeline (e.g., <https://gitlab.com/group/project/-/pipelines/123>)
pub fn pipeline_url(project_web_url: &str, pipeline_id: u64) -> String {
    format!(
        "{}/-/pipelines/{pipeline_id}",
        project_web_url.trim_end_matches('/')
    )
}

/// Percent-encodes a project path so it fits in a single URL path segment.
///
/// GitLab accepts either a numeric ID or the full path with `/` encoded.
pub fn encode_project(project: &str) -> String {
    url::form_urlencoded::byte_serialize(project.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_url() {
        assert_eq!(
            pipeline_url("https://gitlab.com/group/project", 123456),
            "https://gitlab.com/group/project/-/pipelines/123456"
        );
    }

    #[test]
    fn test_pipeline_url_trailing_slash() {
        assert_eq!(
            pipeline_url("https://gitlab.com/group/project/", 1),
            "https://gitlab.com/group/project/-/pipelines/1"
        );
    }

    #[test]
    fn test_encode_project_path() {
        assert_eq!(encode_project("group/sub/project"), "group%2Fsub%2Fproject");
        assert_eq!(encode_project("278964"), "278964");
    }
}
