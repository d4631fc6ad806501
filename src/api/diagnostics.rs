//! Credential diagnostics for persistent 401 responses.
//!
//! A bare 401 cannot tell the operator whether the token is wrong, the
//! deployment mode is wrong, or the base URL is missing its server context
//! path. This module probes each auth shape independently against the
//! `/myself` endpoint, including a control probe with a deliberately
//! corrupted token, and turns the combined results into one actionable
//! diagnosis. Probe failures are isolated: one failing cell never aborts the
//! others, and only cancellation escapes this module.

use reqwest::{header, Client};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::api::auth;
use crate::api::endpoints::SERVER_SUFFIX;
use crate::config::{Config, DeploymentMode};
use crate::error::{ApiError, Result};

/// Probe target, the cheapest authenticated endpoint Jira has.
const PROBE_PATH: &str = "/rest/api/2/myself";

/// Outcome of a single trial request. Used only for diagnostics, never for
/// the control flow of normal operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Whether the trial got a 2xx response.
    pub ok: bool,
    /// HTTP status, absent on transport failure.
    pub status: Option<u16>,
    /// Short failure description for rendering.
    pub hint: Option<String>,
    /// The server's `WWW-Authenticate` challenge, when present. Part of the
    /// failure fingerprint compared against the control probe.
    pub challenge: Option<String>,
}

impl ProbeOutcome {
    /// The failure fingerprint used to compare against the control probe.
    fn signature(&self) -> (Option<u16>, Option<&str>) {
        (self.status, self.challenge.as_deref())
    }
}

/// What the operator should change, in the order the rules are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    /// Basic auth works but Bearer does not: this is a Cloud deployment.
    SwitchToCloud,
    /// Bearer works but Basic does not: this is a Server/DC deployment.
    SwitchToServerDc,
    /// Bearer only works under the `/jira` context path: fix the base URL.
    AppendJiraSuffix,
    /// No auth shape works against this server.
    NoAuthModeWorks,
    /// The probes contradict a persistent 401; nothing to recommend.
    Inconclusive,
}

/// Structured result of the probe matrix.
#[derive(Debug, Clone)]
pub struct AuthDiagnosis {
    pub recommendation: Recommendation,
    /// True when the configured credential fails exactly like the corrupted
    /// control credential: likely expired or invalid, or the authorization
    /// header is being stripped upstream.
    pub credential_indistinguishable_from_bad: bool,
    /// Cloud-shape probe (Basic, canonical base). `None` when no email is
    /// configured, so no Basic header can be built.
    pub cloud: Option<ProbeOutcome>,
    /// Server/DC-shape probe (Bearer, canonical base).
    pub server: ProbeOutcome,
    /// Server/DC-shape probe with the `/jira` suffix appended. `None` when
    /// the base URL already carries the suffix.
    pub server_with_suffix: Option<ProbeOutcome>,
    /// Control probe: Bearer with a deliberately corrupted token.
    pub control: ProbeOutcome,
}

impl AuthDiagnosis {
    /// One-paragraph guidance for the operator.
    pub fn summary(&self) -> String {
        let mut text = match self.recommendation {
            Recommendation::SwitchToCloud => {
                "Basic auth (email + API token) works against this server but Bearer auth \
                 does not. Switch the deployment mode to Cloud."
                    .to_string()
            }
            Recommendation::SwitchToServerDc => {
                "Bearer auth (personal access token) works against this server but Basic \
                 auth does not. Switch the deployment mode to Server/Data Center."
                    .to_string()
            }
            Recommendation::AppendJiraSuffix => {
                "The token is accepted once the /jira context path is appended. Add the \
                 /jira suffix to the configured base URL."
                    .to_string()
            }
            Recommendation::NoAuthModeWorks => {
                "Neither auth shape is accepted by this server.".to_string()
            }
            Recommendation::Inconclusive => {
                "The probes succeeded with the current settings; the earlier 401 may have \
                 been transient."
                    .to_string()
            }
        };
        if self.credential_indistinguishable_from_bad {
            text.push_str(
                " The configured token fails exactly like a known-bad one: it is likely \
                 expired or invalid, or a proxy is stripping the Authorization header.",
            );
        }
        text
    }
}

/// Run the fixed probe matrix, sequentially, each cell isolated.
///
/// # Errors
///
/// Only [`ApiError::Cancelled`]; every other failure is folded into the
/// matching [`ProbeOutcome`].
#[instrument(skip_all)]
pub(crate) async fn run(
    http: &Client,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<AuthDiagnosis> {
    let canonical = format!("{}{PROBE_PATH}", config.base_url);

    let cloud = match config.email.as_deref().filter(|e| !e.is_empty()) {
        Some(email) => {
            check_cancelled(cancel)?;
            Some(probe(http, &canonical, &auth::basic_authorization(email, &config.secret)).await)
        }
        None => None,
    };

    check_cancelled(cancel)?;
    let server = probe(http, &canonical, &auth::bearer_authorization(&config.secret)).await;

    let server_with_suffix = if config
        .base_url
        .to_lowercase()
        .ends_with(SERVER_SUFFIX)
    {
        None
    } else {
        check_cancelled(cancel)?;
        let suffixed = format!("{}{SERVER_SUFFIX}{PROBE_PATH}", config.base_url);
        Some(probe(http, &suffixed, &auth::bearer_authorization(&config.secret)).await)
    };

    check_cancelled(cancel)?;
    let corrupted = auth::corrupted_secret(&config.secret);
    let control = probe(http, &canonical, &auth::bearer_authorization(&corrupted)).await;

    Ok(diagnose(config.mode, cloud, server, server_with_suffix, control))
}

/// Apply the diagnosis rules, in order, to the collected outcomes.
fn diagnose(
    mode: DeploymentMode,
    cloud: Option<ProbeOutcome>,
    server: ProbeOutcome,
    server_with_suffix: Option<ProbeOutcome>,
    control: ProbeOutcome,
) -> AuthDiagnosis {
    let cloud_ok = cloud.as_ref().map(|p| p.ok).unwrap_or(false);
    let suffix_ok = server_with_suffix.as_ref().map(|p| p.ok).unwrap_or(false);

    let recommendation = if cloud_ok && !server.ok {
        Recommendation::SwitchToCloud
    } else if server.ok && !cloud_ok {
        Recommendation::SwitchToServerDc
    } else if !server.ok && suffix_ok {
        Recommendation::AppendJiraSuffix
    } else if !cloud_ok && !server.ok {
        Recommendation::NoAuthModeWorks
    } else {
        Recommendation::Inconclusive
    };

    // Compare the failure the operator actually sees (the probe matching the
    // configured mode) against the known-bad control.
    let real_failure = match mode {
        DeploymentMode::Cloud => cloud.as_ref(),
        DeploymentMode::ServerDc => Some(&server),
    };
    let credential_indistinguishable_from_bad = recommendation
        == Recommendation::NoAuthModeWorks
        && real_failure
            .map(|p| p.signature() == control.signature())
            .unwrap_or(false);

    AuthDiagnosis {
        recommendation,
        credential_indistinguishable_from_bad,
        cloud,
        server,
        server_with_suffix,
        control,
    }
}

/// Issue one trial request. Never fails: transport errors become an outcome
/// with `ok = false` and a generic network hint.
async fn probe(http: &Client, url: &str, authorization: &str) -> ProbeOutcome {
    let sent = http
        .get(url)
        .header(header::AUTHORIZATION, authorization)
        .header(header::ACCEPT, "application/json")
        .send()
        .await;

    match sent {
        Ok(response) => {
            let status = response.status();
            let challenge = response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let ok = status.is_success();
            debug!(%url, status = status.as_u16(), ok, "probe completed");
            ProbeOutcome {
                ok,
                status: Some(status.as_u16()),
                hint: (!ok).then(|| format!("HTTP {}", status.as_u16())),
                challenge,
            }
        }
        Err(e) => {
            debug!(%url, error = %e, "probe transport failure");
            ProbeOutcome {
                ok: false,
                status: None,
                hint: Some("network error".to_string()),
                challenge: None,
            }
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ApiError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::Config;

    fn probe_client() -> Client {
        Client::new()
    }

    fn cloud_capable_config(base_url: &str) -> Config {
        Config::new(base_url, "pat123")
            .with_mode(DeploymentMode::ServerDc)
            .with_email("user@example.com")
    }

    fn outcome(ok: bool, status: Option<u16>, challenge: Option<&str>) -> ProbeOutcome {
        ProbeOutcome {
            ok,
            status,
            hint: None,
            challenge: challenge.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_cloud_probe_ok_recommends_cloud() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .and(header("Authorization", "Bearer pat123"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .and(header(
                "Authorization",
                auth::basic_authorization("user@example.com", "pat123").as_str(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        // Suffix and control probes.
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = cloud_capable_config(&server.uri());
        let diagnosis = run(&probe_client(), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(diagnosis.recommendation, Recommendation::SwitchToCloud);
        assert!(!diagnosis.credential_indistinguishable_from_bad);
    }

    #[tokio::test]
    async fn test_server_probe_ok_recommends_server_dc() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/api/2/myself"))
            .and(header("Authorization", "Bearer pat123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = cloud_capable_config(&server.uri());
        let diagnosis = run(&probe_client(), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(diagnosis.recommendation, Recommendation::SwitchToServerDc);
    }

    #[tokio::test]
    async fn test_suffix_probe_ok_recommends_appending_suffix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jira/rest/api/2/myself"))
            .and(header("Authorization", "Bearer pat123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        // No email: the cloud cell is not applicable.
        let config = Config::new(server.uri(), "pat123").with_mode(DeploymentMode::ServerDc);
        let diagnosis = run(&probe_client(), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(diagnosis.recommendation, Recommendation::AppendJiraSuffix);
        assert!(diagnosis.cloud.is_none());
        assert!(diagnosis.server_with_suffix.unwrap().ok);
    }

    #[tokio::test]
    async fn test_all_failing_with_matching_control_flags_bad_credential() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401)
                    .insert_header("WWW-Authenticate", "OAuth realm=\"jira\""),
            )
            .mount(&server)
            .await;

        let config = cloud_capable_config(&server.uri());
        let diagnosis = run(&probe_client(), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(diagnosis.recommendation, Recommendation::NoAuthModeWorks);
        assert!(diagnosis.credential_indistinguishable_from_bad);
        assert!(diagnosis.summary().contains("expired or invalid"));
    }

    #[tokio::test]
    async fn test_control_with_distinct_signature_clears_credential_flag() {
        let server = MockServer::start().await;
        // The configured token is known to the server but lacks access (403);
        // the corrupted control token gets a plain 401.
        Mock::given(method("GET"))
            .and(header("Authorization", "Bearer pat123"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let config = Config::new(server.uri(), "pat123").with_mode(DeploymentMode::ServerDc);
        let diagnosis = run(&probe_client(), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(diagnosis.recommendation, Recommendation::NoAuthModeWorks);
        assert!(!diagnosis.credential_indistinguishable_from_bad);
    }

    #[tokio::test]
    async fn test_suffix_cell_skipped_when_base_already_has_suffix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let base = format!("{}/jira", server.uri());
        let config = Config::new(base, "pat123").with_mode(DeploymentMode::ServerDc);
        let diagnosis = run(&probe_client(), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert!(diagnosis.server_with_suffix.is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_outcome_not_error() {
        // Nothing listens on this port; every probe must still complete.
        let config =
            Config::new("http://127.0.0.1:9", "pat123").with_mode(DeploymentMode::ServerDc);
        let diagnosis = run(&probe_client(), &config, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!diagnosis.server.ok);
        assert!(diagnosis.server.status.is_none());
        assert_eq!(diagnosis.server.hint.as_deref(), Some("network error"));
        assert_eq!(diagnosis.recommendation, Recommendation::NoAuthModeWorks);
    }

    #[tokio::test]
    async fn test_cancellation_stops_probe_matrix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = Config::new(server.uri(), "pat123").with_mode(DeploymentMode::ServerDc);
        let err = run(&probe_client(), &config, &cancel).await.unwrap_err();

        assert!(matches!(err, ApiError::Cancelled));
    }

    #[test]
    fn test_diagnose_both_ok_is_inconclusive() {
        let diagnosis = diagnose(
            DeploymentMode::ServerDc,
            Some(outcome(true, Some(200), None)),
            outcome(true, Some(200), None),
            None,
            outcome(false, Some(401), None),
        );
        assert_eq!(diagnosis.recommendation, Recommendation::Inconclusive);
        assert!(!diagnosis.credential_indistinguishable_from_bad);
    }

    #[test]
    fn test_diagnose_rule_order_prefers_cloud_over_suffix() {
        // Rule 1 fires even when the suffix probe also succeeded.
        let diagnosis = diagnose(
            DeploymentMode::ServerDc,
            Some(outcome(true, Some(200), None)),
            outcome(false, Some(401), None),
            Some(outcome(true, Some(200), None)),
            outcome(false, Some(401), None),
        );
        assert_eq!(diagnosis.recommendation, Recommendation::SwitchToCloud);
    }

    #[test]
    fn test_credential_flag_uses_cloud_probe_in_cloud_mode() {
        let diagnosis = diagnose(
            DeploymentMode::Cloud,
            Some(outcome(false, Some(401), Some("Basic realm=\"jira\""))),
            outcome(false, Some(403), None),
            None,
            outcome(false, Some(401), Some("Basic realm=\"jira\"")),
        );
        assert_eq!(diagnosis.recommendation, Recommendation::NoAuthModeWorks);
        assert!(diagnosis.credential_indistinguishable_from_bad);
    }
}
