//! JiraChat - the Jira-facing core of a chat-driven assistant.
//!
//! This crate implements an adaptive client for the Jira REST API that works
//! against both deployment variants without knowing up front which one it is
//! talking to:
//!
//! - **Jira Cloud** (multi-tenant, `*.atlassian.net`): Basic auth built from
//!   email + API token, a single fixed URL shape.
//! - **Jira Server / Data Center** (self-hosted): Bearer auth from a personal
//!   access token, with base paths that vary per installation (a `/jira`
//!   context path is common, and some instances only answer on the `latest`
//!   API version alias).
//!
//! The client heals wrong URL guesses by trying an ordered list of candidate
//! shapes, remembers the shape that worked for the rest of its lifetime, and
//! on persistent 401 responses can run a probe matrix that tells the operator
//! *why* authentication failed and which setting to change.
//!
//! The chat command dispatcher, prompt assembly, secret storage, and project
//! scanning live in the embedding assistant; this crate only consumes a
//! [`Config`] plus a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! and hands back typed records and a uniform error type.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;

pub use api::types::{Comment, Issue, Sprint, StatusCategory, Subtask, Transition, User};
pub use api::{AuthDiagnosis, JiraClient, ProbeOutcome, Recommendation};
pub use config::{Config, ConfigError, DeploymentMode};
pub use error::{ApiError, Result};
