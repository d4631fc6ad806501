//! Candidate URL resolution for requests against unknown Jira deployments.
//!
//! Self-hosted Jira installations disagree about base paths: many live under
//! a `/jira` context path, and some only answer on the `latest` API version
//! alias instead of `2`. Rather than asking the operator to get this exactly
//! right, the client derives an ordered list of URL shapes to try for each
//! request. Once a healed shape succeeds, the corrected base is remembered on
//! the client instance so later candidate lists try it early.

use crate::config::DeploymentMode;

/// The documented, version-stable API path segment. First guess, always.
pub(crate) const API_SEGMENT: &str = "/rest/api/2/";

/// Version alias some Server/DC installations require.
pub(crate) const API_LATEST_SEGMENT: &str = "/rest/api/latest/";

/// Context path suffix commonly needed by self-hosted installations.
pub(crate) const SERVER_SUFFIX: &str = "/jira";

/// Produce the ordered, duplicate-free list of absolute URLs to try for one
/// canonical resource path.
///
/// Cloud deployments have a single fixed path shape, so exactly one candidate
/// comes back. For Server/DC the order is: canonical URL, the same path on
/// the learned base (when one differs from the configured base), the `latest`
/// version alias, then the `/jira` suffix variants cross-multiplied with the
/// alias. The order is deterministic.
pub(crate) fn candidate_urls(
    base_url: &str,
    mode: DeploymentMode,
    learned_base: Option<&str>,
    path: &str,
) -> Vec<String> {
    let canonical = format!("{base_url}{path}");
    if mode == DeploymentMode::Cloud {
        return vec![canonical];
    }

    let mut urls = Vec::new();
    push_unique(&mut urls, canonical);

    if let Some(learned) = learned_base.filter(|b| *b != base_url) {
        push_unique(&mut urls, format!("{learned}{path}"));
    }

    if path.contains(API_SEGMENT) {
        let latest_path = path.replacen(API_SEGMENT, API_LATEST_SEGMENT, 1);
        push_unique(&mut urls, format!("{base_url}{latest_path}"));
    }

    let active_base = learned_base.unwrap_or(base_url);
    if !active_base.to_lowercase().ends_with(SERVER_SUFFIX) && path.starts_with("/rest/") {
        let suffixed_base = format!("{active_base}{SERVER_SUFFIX}");
        push_unique(&mut urls, format!("{suffixed_base}{path}"));
        if path.contains(API_SEGMENT) {
            let latest_path = path.replacen(API_SEGMENT, API_LATEST_SEGMENT, 1);
            push_unique(&mut urls, format!("{suffixed_base}{latest_path}"));
        }
    }

    urls
}

fn push_unique(urls: &mut Vec<String>, url: String) {
    if !urls.contains(&url) {
        urls.push(url);
    }
}
