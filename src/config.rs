use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::Provider;

/// Configuration file structure for cipulse.
///
/// Loaded from a file (TOML, JSON or YAML) and then overridden from the
/// environment, so a container can run with env vars alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub gitlab: GitLabConfig,

    #[serde(default)]
    pub jenkins: JenkinsConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Seconds between poll passes
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Timeout for every outbound provider request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for a single alert channel delivery
    #[serde(default = "default_alert_timeout_secs")]
    pub alert_timeout_secs: u64,

    /// Shared secret inbound webhooks must present
    pub webhook_secret: Option<String>,

    /// Providers polled on every tick
    #[serde(default = "default_providers")]
    pub providers: Vec<Provider>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Repositories to poll (e.g., 'owner/repo')
    #[serde(default)]
    pub repos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab personal access token
    pub token: Option<String>,

    /// GitLab instance base URL
    #[serde(default = "default_gitlab_base_url")]
    pub base_url: String,

    /// Project paths or numeric IDs to poll
    #[serde(default)]
    pub projects: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JenkinsConfig {
    /// Jenkins root URL
    pub base_url: Option<String>,

    pub user: Option<String>,

    pub api_token: Option<String>,

    /// Job names; folders as 'folder/job'
    #[serde(default)]
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AlertsConfig {
    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlackConfig {
    /// Incoming webhook URL
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EmailConfig {
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    pub username: Option<String>,

    pub password: Option<String>,

    pub from: Option<String>,

    pub to: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database_path: default_database_path(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            alert_timeout_secs: default_alert_timeout_secs(),
            webhook_secret: None,
            providers: default_providers(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
            repos: Vec::new(),
        }
    }
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_gitlab_base_url(),
            projects: Vec::new(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from: None,
            to: None,
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("cipulse.db")
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_alert_timeout_secs() -> u64 {
    10
}

fn default_providers() -> Vec<Provider> {
    Provider::ALL.to_vec()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_gitlab_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

impl ServerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_secs(self.alert_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a file, then apply environment overrides.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./cipulse.toml
    /// 3. ./cipulse.json
    /// 4. ./cipulse.yaml
    /// 5. ./cipulse.yml
    ///
    /// Falls back to defaults if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if path.exists() {
                return Self::load_from_path(path);
            }
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let candidates = ["cipulse.toml", "cipulse.json", "cipulse.yaml", "cipulse.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Override file values with environment variables.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = get("GITHUB_REPOS") {
            self.github.repos = split_list(&v);
        }

        if let Some(v) = get("GITLAB_TOKEN") {
            self.gitlab.token = Some(v);
        }
        if let Some(v) = get("GITLAB_BASE_URL") {
            self.gitlab.base_url = v;
        }
        if let Some(v) = get("GITLAB_PROJECTS") {
            self.gitlab.projects = split_list(&v);
        }

        if let Some(v) = get("JENKINS_BASE_URL") {
            self.jenkins.base_url = Some(v);
        }
        if let Some(v) = get("JENKINS_USER") {
            self.jenkins.user = Some(v);
        }
        if let Some(v) = get("JENKINS_API_TOKEN") {
            self.jenkins.api_token = Some(v);
        }
        if let Some(v) = get("JENKINS_JOBS") {
            self.jenkins.jobs = split_list(&v);
        }

        if let Some(v) = get("SLACK_WEBHOOK_URL") {
            self.alerts.slack.webhook_url = Some(v);
        }
        if let Some(v) = get("SMTP_HOST") {
            self.alerts.email.smtp_host = Some(v);
        }
        if let Some(port) = get("SMTP_PORT").and_then(|v| v.parse().ok()) {
            self.alerts.email.smtp_port = port;
        }
        if let Some(v) = get("SMTP_USERNAME") {
            self.alerts.email.username = Some(v);
        }
        if let Some(v) = get("SMTP_PASSWORD") {
            self.alerts.email.password = Some(v);
        }
        if let Some(v) = get("EMAIL_FROM") {
            self.alerts.email.from = Some(v);
        }
        if let Some(v) = get("EMAIL_TO") {
            self.alerts.email.to = Some(v);
        }

        if let Some(v) = get("WEBHOOK_SECRET") {
            self.server.webhook_secret = Some(v);
        }
        if let Some(secs) = get("COLLECTOR_POLL_SECONDS").and_then(|v| v.parse().ok()) {
            self.server.poll_interval_secs = secs;
        }
        if let Some(v) = get("DATABASE_PATH") {
            self.server.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("PROVIDERS") {
            self.server.providers = split_list(&v)
                .iter()
                .filter_map(|name| match name.parse::<Provider>() {
                    Ok(provider) => Some(provider),
                    Err(e) => {
                        log::warn!("Ignoring PROVIDERS entry: {e}");
                        None
                    }
                })
                .collect();
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.poll_interval_secs, 30);
        assert_eq!(config.server.request_timeout_secs, 20);
        assert_eq!(config.server.providers, Provider::ALL.to_vec());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.gitlab.base_url, "https://gitlab.com");
        assert_eq!(config.alerts.email.smtp_port, 587);
        assert!(config.server.webhook_secret.is_none());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[server]
poll-interval-secs = 45
webhook-secret = "s3cret"
providers = ["github", "jenkins"]

[github]
token = "ghp-test"
repos = ["acme/api", "acme/web"]

[jenkins]
base-url = "https://ci.example.com"
jobs = ["folder/deploy"]

[alerts.slack]
webhook-url = "https://hooks.slack.com/services/T/B/X"
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.server.poll_interval_secs, 45);
        assert_eq!(config.server.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(
            config.server.providers,
            vec![Provider::Github, Provider::Jenkins]
        );
        assert_eq!(config.github.repos, vec!["acme/api", "acme/web"]);
        assert_eq!(config.jenkins.jobs, vec!["folder/deploy"]);
        assert!(config.alerts.slack.webhook_url.is_some());
        assert_eq!(config.gitlab.base_url, "https://gitlab.com");
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "gitlab": {
    "token": "glpat-json-token",
    "base-url": "https://gitlab.example.com",
    "projects": ["group/project"]
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.gitlab.token.as_deref(), Some("glpat-json-token"));
        assert_eq!(config.gitlab.base_url, "https://gitlab.example.com");
        assert_eq!(config.gitlab.projects, vec!["group/project"]);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let yaml_content = "alerts:\n  email:\n    smtp-host: smtp.example.com\n    smtp-port: 2525\n";
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(
            config.alerts.email.smtp_host.as_deref(),
            Some("smtp.example.com")
        );
        assert_eq!(config.alerts.email.smtp_port, 2525);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_file(Some(Path::new("nonexistent.toml"))).unwrap();
        assert_eq!(config.server.poll_interval_secs, 30);
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.github.repos = vec!["from/file".to_string()];

        config.apply_env(env(&[
            ("GITHUB_TOKEN", "ghp-env"),
            ("GITHUB_REPOS", "acme/api, ,acme/web"),
            ("JENKINS_JOBS", "/build/,deploy"),
            ("COLLECTOR_POLL_SECONDS", "5"),
            ("PROVIDERS", "gitlab,unknown"),
            ("SMTP_PORT", "not-a-number"),
        ]));

        assert_eq!(config.github.token.as_deref(), Some("ghp-env"));
        assert_eq!(config.github.repos, vec!["acme/api", "acme/web"]);
        assert_eq!(config.jenkins.jobs, vec!["/build/", "deploy"]);
        assert_eq!(config.server.poll_interval_secs, 5);
        assert_eq!(config.server.providers, vec![Provider::Gitlab]);
        assert_eq!(config.alerts.email.smtp_port, 587);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config.gitlab.token = Some("from-file".to_string());

        config.apply_env(env(&[("GITLAB_TOKEN", "  ")]));

        assert_eq!(config.gitlab.token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let server = ServerConfig {
            poll_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(server.poll_interval(), Duration::from_secs(1));
    }
}
