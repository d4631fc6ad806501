//! Authorization header construction for both Jira deployment variants.
//!
//! Cloud uses Basic auth built from `email:token`; Server/Data Center uses a
//! Bearer personal access token. Pure functions, no I/O.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::config::{Config, ConfigError, DeploymentMode};
use crate::error::{ApiError, Result};

/// Build the `Authorization` value matching the configured deployment mode.
///
/// # Errors
///
/// Fails fast with a configuration error when Cloud mode has no email;
/// no network call is ever attempted with an invalid combination.
pub(crate) fn authorization_header(config: &Config) -> Result<String> {
    match config.mode {
        DeploymentMode::Cloud => {
            let email = config
                .email
                .as_deref()
                .filter(|e| !e.is_empty())
                .ok_or(ApiError::Config(ConfigError::MissingEmail))?;
            Ok(basic_authorization(email, &config.secret))
        }
        DeploymentMode::ServerDc => Ok(bearer_authorization(&config.secret)),
    }
}

/// The Cloud shape: `Basic base64(email:token)`.
pub(crate) fn basic_authorization(email: &str, secret: &str) -> String {
    let credentials = format!("{email}:{secret}");
    format!("Basic {}", BASE64.encode(credentials.as_bytes()))
}

/// The Server/DC shape: `Bearer token`.
pub(crate) fn bearer_authorization(secret: &str) -> String {
    format!("Bearer {secret}")
}

/// Mutate the secret's last character so it is guaranteed invalid.
///
/// The diagnostics control probe uses this to fingerprint what a
/// definitely-wrong credential looks like against a given server.
pub(crate) fn corrupted_secret(secret: &str) -> String {
    let mut corrupted = secret.to_string();
    match corrupted.pop() {
        Some(last) if last != 'x' => corrupted.push('x'),
        _ => corrupted.push('y'),
    }
    corrupted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_authorization_encodes_email_and_secret() {
        let header = basic_authorization("user@example.com", "api_token");
        let encoded = header.strip_prefix("Basic ").unwrap();
        let decoded = String::from_utf8(BASE64.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, "user@example.com:api_token");
    }

    #[test]
    fn test_bearer_authorization_format() {
        assert_eq!(bearer_authorization("pat123"), "Bearer pat123");
    }

    #[test]
    fn test_cloud_header_requires_email() {
        let config = Config::new("https://company.atlassian.net", "token");
        let err = authorization_header(&config).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Config(ConfigError::MissingEmail)
        ));
    }

    #[test]
    fn test_cloud_header_rejects_empty_email() {
        let config = Config::new("https://company.atlassian.net", "token").with_email("");
        assert!(authorization_header(&config).is_err());
    }

    #[test]
    fn test_cloud_header_uses_basic_auth() {
        let config =
            Config::new("https://company.atlassian.net", "token").with_email("user@example.com");
        let header = authorization_header(&config).unwrap();
        assert!(header.starts_with("Basic "));
    }

    #[test]
    fn test_server_header_uses_bearer_auth() {
        let config = Config::new("https://jira.example.com", "pat123");
        assert_eq!(authorization_header(&config).unwrap(), "Bearer pat123");
    }

    #[test]
    fn test_corrupted_secret_differs_from_input() {
        assert_ne!(corrupted_secret("token123"), "token123");
        assert_ne!(corrupted_secret("tokenx"), "tokenx");
        assert_ne!(corrupted_secret(""), "");
    }

    #[test]
    fn test_corrupted_secret_keeps_length() {
        assert_eq!(corrupted_secret("token123").len(), "token123".len());
    }
}
