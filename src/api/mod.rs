//! Jira REST API client and supporting machinery.
//!
//! This module provides the adaptive client for communicating with the Jira
//! REST API across both deployment variants.

mod auth;
mod client;
mod diagnostics;
mod endpoints;
pub mod types;

pub use client::JiraClient;
pub use diagnostics::{AuthDiagnosis, ProbeOutcome, Recommendation};
