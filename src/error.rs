//! Unified error types for the Jira client.
//!
//! Every failure mode the client can produce is represented here so the
//! embedding assistant can match on one enum. All error types use `thiserror`
//! for ergonomic error handling.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors produced by the Jira client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configuration is invalid. Fatal, never retried; the message names
    /// the exact missing setting.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Transport-level failure (DNS, TLS, connect, timeout). Not retried.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered, but with a non-success status on every URL shape
    /// that was worth trying.
    #[error("Jira API error ({status}){}", hint_suffix(.hint))]
    RequestFailed {
        /// The last HTTP status observed before giving up.
        status: u16,
        /// Status-specific guidance for the operator, when one exists.
        hint: Option<&'static str>,
    },

    /// None of the requested target phrases matched a live transition.
    /// Carries every legal `action -> destination` pair so the caller can
    /// pick a valid one manually.
    #[error(
        "no transition matches [{}]; available transitions: {}",
        .targets.join(" / "),
        format_transitions(.available)
    )]
    NoMatchingTransition {
        /// The target phrases that were tried, in priority order.
        targets: Vec<String>,
        /// Every live `(action name, destination status)` pair.
        available: Vec<(String, String)>,
    },

    /// The response body could not be interpreted.
    #[error("unexpected Jira response: {0}")]
    InvalidResponse(String),

    /// The in-flight operation was cancelled cooperatively. Not an error the
    /// operator should ever see rendered.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Build a `RequestFailed` with the hint keyed by the status code.
    pub(crate) fn request_failed(status: u16) -> Self {
        let hint = match status {
            401 => Some("check your PAT/API token"),
            403 => Some("missing access"),
            404 => Some(
                "resource not found (check the base URL, self-hosted instances often need a /jira suffix)",
            ),
            _ => None,
        };
        ApiError::RequestFailed { status, hint }
    }

    /// Whether this failure warrants running the auth diagnostics probe.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::RequestFailed { status: 401, .. })
    }

    /// A message suitable for rendering in the chat response, without
    /// technical jargon or stack traces.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Config(e) => e.to_string(),
            ApiError::Network(_) => {
                "Could not reach Jira. Check your network connection and base URL.".to_string()
            }
            ApiError::RequestFailed { .. }
            | ApiError::NoMatchingTransition { .. }
            | ApiError::InvalidResponse(_) => self.to_string(),
            ApiError::Cancelled => String::new(),
        }
    }
}

fn hint_suffix(hint: &Option<&'static str>) -> String {
    match hint {
        Some(h) => format!(" - {h}"),
        None => String::new(),
    }
}

fn format_transitions(available: &[(String, String)]) -> String {
    if available.is_empty() {
        return "(none)".to_string();
    }
    available
        .iter()
        .map(|(name, to)| format!("\"{name}\" -> {to}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failed_401_hint() {
        let err = ApiError::request_failed(401);
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("check your PAT/API token"));
        assert!(err.is_auth_failure());
    }

    #[test]
    fn test_request_failed_403_hint() {
        let err = ApiError::request_failed(403);
        assert!(err.to_string().contains("missing access"));
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn test_request_failed_404_hint() {
        let err = ApiError::request_failed(404);
        let msg = err.to_string();
        assert!(msg.contains("resource not found"));
        assert!(msg.contains("/jira"));
    }

    #[test]
    fn test_request_failed_500_no_hint() {
        let err = ApiError::request_failed(500);
        assert_eq!(err.to_string(), "Jira API error (500)");
    }

    #[test]
    fn test_no_matching_transition_lists_alternatives() {
        let err = ApiError::NoMatchingTransition {
            targets: vec!["review".to_string()],
            available: vec![
                ("Resolve".to_string(), "Done".to_string()),
                ("Close".to_string(), "Closed".to_string()),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("[review]"));
        assert!(msg.contains("\"Resolve\" -> Done"));
        assert!(msg.contains("\"Close\" -> Closed"));
    }

    #[test]
    fn test_no_matching_transition_empty_list() {
        let err = ApiError::NoMatchingTransition {
            targets: vec!["done".to_string(), "closed".to_string()],
            available: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("[done / closed]"));
        assert!(msg.contains("(none)"));
    }

    #[test]
    fn test_cancelled_has_no_user_message() {
        assert_eq!(ApiError::Cancelled.user_message(), "");
    }

    #[test]
    fn test_config_error_surfaces_verbatim() {
        let err = ApiError::Config(crate::config::ConfigError::MissingSecret);
        assert_eq!(err.user_message(), err.to_string());
    }
}
