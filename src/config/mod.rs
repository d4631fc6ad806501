//! Connection configuration for the assistant's Jira instance.
//!
//! The embedding assistant resolves settings and secrets; this module only
//! validates the resulting snapshot. A [`Config`] is constructed once per
//! client instance and never mutated afterwards.

use thiserror::Error;

/// Which variant of the Jira API shape and auth scheme is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Multi-tenant Jira Cloud: Basic auth from email + API token, one fixed
    /// URL shape.
    Cloud,
    /// Self-hosted Server or Data Center: Bearer auth from a personal access
    /// token, base paths vary per installation.
    ServerDc,
}

impl DeploymentMode {
    /// Guess the deployment mode from the base URL.
    ///
    /// Hosts under `.atlassian.net` are always Cloud; anything else is
    /// assumed to be self-hosted. An explicit mode in the configuration
    /// overrides this guess.
    pub fn detect(base_url: &str) -> Self {
        if base_url.to_lowercase().contains(".atlassian.net") {
            DeploymentMode::Cloud
        } else {
            DeploymentMode::ServerDc
        }
    }
}

/// Configuration errors. Each variant names the exact setting at fault so the
/// message can be surfaced verbatim to the operator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Jira base URL is not configured")]
    MissingBaseUrl,

    #[error("Jira base URL must use HTTPS: {0}")]
    InsecureBaseUrl(String),

    #[error("Jira PAT/API token is not configured")]
    MissingSecret,

    #[error(
        "email for Jira Cloud is not configured (using Server/Data Center? switch the deployment mode)"
    )]
    MissingEmail,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Immutable snapshot of everything the client needs to talk to one Jira
/// instance.
#[derive(Clone)]
pub struct Config {
    /// Base URL without a trailing slash, e.g. `https://jira.example.com`.
    pub base_url: String,
    /// Cloud or Server/Data Center. Auto-detected from the URL unless set
    /// explicitly.
    pub mode: DeploymentMode,
    /// API token (Cloud) or personal access token (Server/DC). Opaque.
    pub secret: String,
    /// Account email, required for Cloud Basic auth.
    pub email: Option<String>,
    /// Project key used to scope JQL queries, e.g. `PROJ`.
    pub project_key: Option<String>,
    /// Agile board id for sprint queries.
    pub board_id: Option<String>,
    /// Custom field id holding story points, e.g. `customfield_10016`.
    ///
    /// Jira assigns this id per deployment, so it is configuration rather
    /// than a constant. When unset, story points are neither requested nor
    /// mapped.
    pub story_points_field: Option<String>,
}

impl Config {
    /// Create a configuration with the deployment mode detected from the URL.
    ///
    /// The base URL is normalized by stripping trailing slashes.
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        let base_url = normalize_base_url(&base_url.into());
        let mode = DeploymentMode::detect(&base_url);
        Self {
            base_url,
            mode,
            secret: secret.into(),
            email: None,
            project_key: None,
            board_id: None,
            story_points_field: None,
        }
    }

    /// Override the auto-detected deployment mode.
    pub fn with_mode(mut self, mode: DeploymentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the account email used for Cloud Basic auth.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Scope JQL queries to one project.
    pub fn with_project_key(mut self, key: impl Into<String>) -> Self {
        self.project_key = Some(key.into());
        self
    }

    /// Set the agile board used for sprint queries.
    pub fn with_board_id(mut self, id: impl Into<String>) -> Self {
        self.board_id = Some(id.into());
        self
    }

    /// Set the per-deployment custom field id that holds story points.
    pub fn with_story_points_field(mut self, field: impl Into<String>) -> Self {
        self.story_points_field = Some(field.into());
        self
    }

    /// Validate the snapshot before any network call is attempted.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found: missing base URL, non-HTTPS
    /// base URL (local addresses exempt), missing secret, or a Cloud mode
    /// without an email.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if !self.base_url.starts_with("https://") && !is_local_url(&self.base_url) {
            return Err(ConfigError::InsecureBaseUrl(self.base_url.clone()));
        }
        if self.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.mode == DeploymentMode::Cloud && self.email.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::MissingEmail);
        }
        Ok(())
    }

    /// The canonical browse URL for an issue key.
    pub fn browse_url(&self, issue_key: &str) -> String {
        format!("{}/browse/{}", self.base_url, issue_key)
    }
}

// Secrets must never leak through debug formatting or logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .field("secret", &"<redacted>")
            .field("email", &self.email)
            .field("project_key", &self.project_key)
            .field("board_id", &self.board_id)
            .field("story_points_field", &self.story_points_field)
            .finish()
    }
}

/// Strip trailing slashes; the rest of the crate appends absolute paths.
fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Local addresses are exempt from the HTTPS requirement so the client can be
/// exercised against test servers.
fn is_local_url(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_cloud_config() -> Config {
        Config::new("https://company.atlassian.net", "token").with_email("user@company.com")
    }

    #[test]
    fn test_detect_cloud_from_url() {
        assert_eq!(
            DeploymentMode::detect("https://company.atlassian.net"),
            DeploymentMode::Cloud
        );
        assert_eq!(
            DeploymentMode::detect("https://COMPANY.Atlassian.NET"),
            DeploymentMode::Cloud
        );
    }

    #[test]
    fn test_detect_server_from_url() {
        assert_eq!(
            DeploymentMode::detect("https://jira.example.com"),
            DeploymentMode::ServerDc
        );
    }

    #[test]
    fn test_new_normalizes_trailing_slashes() {
        let config = Config::new("https://jira.example.com///", "token");
        assert_eq!(config.base_url, "https://jira.example.com");
    }

    #[test]
    fn test_explicit_mode_overrides_detection() {
        let config =
            Config::new("https://proxy.example.com", "token").with_mode(DeploymentMode::Cloud);
        assert_eq!(config.mode, DeploymentMode::Cloud);
    }

    #[test]
    fn test_validate_accepts_cloud_with_email() {
        assert!(valid_cloud_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_base_url() {
        let config = Config::new("", "token");
        assert_eq!(config.validate(), Err(ConfigError::MissingBaseUrl));
    }

    #[test]
    fn test_validate_rejects_http_base_url() {
        let config = Config::new("http://jira.example.com", "token");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InsecureBaseUrl(_))
        ));
    }

    #[test]
    fn test_validate_allows_local_http() {
        let config = Config::new("http://127.0.0.1:8080", "token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_secret() {
        let config = Config::new("https://jira.example.com", "");
        assert_eq!(config.validate(), Err(ConfigError::MissingSecret));
    }

    #[test]
    fn test_validate_rejects_cloud_without_email() {
        let config = Config::new("https://company.atlassian.net", "token");
        assert_eq!(config.validate(), Err(ConfigError::MissingEmail));
    }

    #[test]
    fn test_validate_allows_server_without_email() {
        let config = Config::new("https://jira.example.com", "token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_does_not_expose_secret() {
        let config = Config::new("https://jira.example.com", "super_secret_token");
        let output = format!("{config:?}");
        assert!(!output.contains("super_secret_token"));
    }

    #[test]
    fn test_browse_url() {
        let config = Config::new("https://jira.example.com/", "token");
        assert_eq!(
            config.browse_url("PROJ-123"),
            "https://jira.example.com/browse/PROJ-123"
        );
    }
}
