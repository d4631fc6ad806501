//! The adaptive Jira client.
//!
//! One logical request is executed by trying an ordered list of candidate URL
//! shapes: 2xx short-circuits success, 404 means "wrong shape, try the next
//! candidate", and any other status aborts the loop immediately since it is
//! not a shape problem and retrying other shapes would only muddy the
//! diagnostics. There is no retry-with-backoff anywhere in this client; the
//! only repetition is the deliberate trial of *different* URL shapes while
//! responses are 404.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::{header, Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::api::auth;
use crate::api::diagnostics::{self, AuthDiagnosis};
use crate::api::endpoints::{self, SERVER_SUFFIX};
use crate::api::types::{self, Issue, Sprint, Transition, User};
use crate::config::{Config, DeploymentMode};
use crate::error::{ApiError, Result};

/// Request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Result cap for the assignee's open-issue listing.
const MY_ISSUES_MAX_RESULTS: u32 = 30;

/// Result cap for sprint and board listings.
const SPRINT_ISSUES_MAX_RESULTS: u32 = 50;

/// Field projection sent with every JQL search. Wire contract with the
/// server; the configured story-points field id is appended when present.
const SEARCH_FIELDS: [&str; 12] = [
    "summary",
    "description",
    "status",
    "priority",
    "assignee",
    "reporter",
    "issuetype",
    "labels",
    "created",
    "updated",
    "subtasks",
    "comment",
];

/// Adaptive client for one Jira instance.
///
/// Every operation takes a [`CancellationToken`]; cancellation is checked
/// before each candidate request and produces [`ApiError::Cancelled`] with no
/// partial state changes.
#[derive(Debug)]
pub struct JiraClient {
    http: Client,
    config: Config,
    /// Base URL shape learned after the first successful healed request.
    /// Confined to this instance, never persisted.
    learned_base: Mutex<Option<String>>,
}

impl JiraClient {
    /// Create a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing setting, or a network
    /// error if the HTTP client cannot be built. No connection is attempted.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            config,
            learned_base: Mutex::new(None),
        })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The corrected base URL discovered at runtime, if any.
    pub fn learned_base(&self) -> Option<String> {
        self.learned_base.lock().ok().and_then(|g| g.clone())
    }

    /// Execute one logical request against the candidate URL shapes.
    #[instrument(skip(self, body, cancel), fields(path = %path))]
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let authorization = auth::authorization_header(&self.config)?;
        let learned = self.learned_base();
        let candidates = endpoints::candidate_urls(
            &self.config.base_url,
            self.config.mode,
            learned.as_deref(),
            path,
        );

        let mut last_status: Option<StatusCode> = None;
        for url in &candidates {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let mut request = self
                .http
                .request(method.clone(), url)
                .header(header::AUTHORIZATION, &authorization)
                .header(header::ACCEPT, "application/json");
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            last_status = Some(status);

            if status.is_success() {
                self.record_learned_base(url);
                if status == StatusCode::NO_CONTENT {
                    return Ok(Value::Null);
                }
                let text = response.text().await?;
                if text.is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_str(&text)
                    .map_err(|e| ApiError::InvalidResponse(format!("{path}: {e}")));
            }

            if status != StatusCode::NOT_FOUND {
                debug!(%status, %url, "non-404 response, aborting candidate loop");
                break;
            }
            debug!(%url, "404, trying next candidate shape");
        }

        Err(ApiError::request_failed(
            last_status.map(|s| s.as_u16()).unwrap_or(0),
        ))
    }

    /// Remember the `/jira` base correction after a healed request succeeds.
    fn record_learned_base(&self, url: &str) {
        if self.config.mode != DeploymentMode::ServerDc {
            return;
        }
        let healed_prefix = format!("{}{}/rest/", self.config.base_url, SERVER_SUFFIX);
        if url.starts_with(&healed_prefix) {
            let corrected = format!("{}{}", self.config.base_url, SERVER_SUFFIX);
            info!(%corrected, "learned corrected base URL");
            if let Ok(mut learned) = self.learned_base.lock() {
                *learned = Some(corrected);
            }
        }
    }

    fn map_issue_list(&self, data: &Value) -> Result<Vec<Issue>> {
        let issues = data
            .get("issues")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        issues
            .into_iter()
            .map(|raw| {
                types::map_issue(
                    raw,
                    &self.config.base_url,
                    self.config.story_points_field.as_deref(),
                )
            })
            .collect()
    }

    fn project_filter(&self, template: &str) -> String {
        match self.config.project_key.as_deref() {
            Some(key) => template.replace("{}", key),
            None => String::new(),
        }
    }

    /// Fetch the authenticated user.
    #[instrument(skip(self, cancel))]
    pub async fn current_user(&self, cancel: &CancellationToken) -> Result<User> {
        let data = self
            .execute(Method::GET, "/rest/api/2/myself", None, cancel)
            .await?;
        serde_json::from_value(data)
            .map_err(|e| ApiError::InvalidResponse(format!("user payload: {e}")))
    }

    /// Fetch a single issue by key, e.g. `PROJ-123`.
    #[instrument(skip(self, cancel), fields(issue_key = %issue_key))]
    pub async fn get_issue(&self, issue_key: &str, cancel: &CancellationToken) -> Result<Issue> {
        let path = format!(
            "/rest/api/2/issue/{}?expand=names,transitions",
            urlencoding::encode(issue_key)
        );
        let data = self.execute(Method::GET, &path, None, cancel).await?;
        types::map_issue(
            data,
            &self.config.base_url,
            self.config.story_points_field.as_deref(),
        )
    }

    /// Search issues with JQL, capped at `max_results`.
    #[instrument(skip(self, cancel), fields(jql = %jql))]
    pub async fn search_issues(
        &self,
        jql: &str,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<Issue>> {
        let mut fields: Vec<&str> = SEARCH_FIELDS.to_vec();
        if let Some(story_points) = self.config.story_points_field.as_deref() {
            fields.push(story_points);
        }
        let body = json!({
            "jql": jql,
            "maxResults": max_results,
            "fields": fields,
        });
        let data = self
            .execute(Method::POST, "/rest/api/2/search", Some(body), cancel)
            .await?;
        self.map_issue_list(&data)
    }

    /// The authenticated user's unfinished issues, most urgent first.
    pub async fn my_issues(&self, cancel: &CancellationToken) -> Result<Vec<Issue>> {
        let project_filter = self.project_filter(" AND project = {}");
        let jql = format!(
            "assignee = currentUser() AND statusCategory != Done{project_filter} \
             ORDER BY priority ASC, updated DESC"
        );
        self.search_issues(&jql, MY_ISSUES_MAX_RESULTS, cancel).await
    }

    /// The highest-priority unassigned issue that is not done, epics
    /// excluded. Works for both Scrum and Kanban projects.
    pub async fn next_priority_issue(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Issue>> {
        let project_filter = self.project_filter("project = {} AND ");
        let jql = format!(
            "{project_filter}assignee is EMPTY AND statusCategory != Done \
             AND issuetype != Epic ORDER BY priority ASC, rank ASC"
        );
        let mut issues = self.search_issues(&jql, 1, cancel).await?;
        Ok(if issues.is_empty() {
            None
        } else {
            Some(issues.remove(0))
        })
    }

    /// Assign an issue to a user.
    ///
    /// `user_id` is the account id on Cloud and the username on Server/DC
    /// (see [`User::assignable_id`]).
    #[instrument(skip(self, cancel), fields(issue_key = %issue_key))]
    pub async fn assign_issue(
        &self,
        issue_key: &str,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = format!(
            "/rest/api/2/issue/{}/assignee",
            urlencoding::encode(issue_key)
        );
        let body = match self.config.mode {
            DeploymentMode::Cloud => json!({ "accountId": user_id }),
            DeploymentMode::ServerDc => json!({ "name": user_id }),
        };
        self.execute(Method::PUT, &path, Some(body), cancel).await?;
        Ok(())
    }

    /// Fetch the live transitions for an issue.
    ///
    /// Always fetched fresh: the legal set depends on the issue's current
    /// status and changes after every successful transition.
    #[instrument(skip(self, cancel), fields(issue_key = %issue_key))]
    pub async fn get_transitions(
        &self,
        issue_key: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Transition>> {
        let path = format!(
            "/rest/api/2/issue/{}/transitions",
            urlencoding::encode(issue_key)
        );
        let data = self.execute(Method::GET, &path, None, cancel).await?;
        let transitions = data.get("transitions").cloned().unwrap_or(Value::Null);
        if transitions.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(transitions)
            .map_err(|e| ApiError::InvalidResponse(format!("transitions payload: {e}")))
    }

    /// Execute one transition by id.
    #[instrument(skip(self, cancel), fields(issue_key = %issue_key))]
    pub async fn transition_issue(
        &self,
        issue_key: &str,
        transition_id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = format!(
            "/rest/api/2/issue/{}/transitions",
            urlencoding::encode(issue_key)
        );
        let body = json!({ "transition": { "id": transition_id } });
        self.execute(Method::POST, &path, Some(body), cancel).await?;
        Ok(())
    }

    /// Move an issue toward a target status expressed as one or more phrases
    /// tried in priority order.
    ///
    /// Each phrase is matched case-insensitively as a substring of either a
    /// transition's action name or its destination status name. The first
    /// phrase that matches anything wins; ties within one phrase resolve to
    /// the first transition in server order. Returns the destination status
    /// display name of the executed transition.
    ///
    /// This lets one high-level intent ("start work") be expressed as a
    /// prioritized synonym list that survives per-project workflow naming.
    ///
    /// # Errors
    ///
    /// Fails with [`ApiError::NoMatchingTransition`] listing every available
    /// `action -> destination` pair when no phrase matches.
    #[instrument(skip(self, cancel), fields(issue_key = %issue_key))]
    pub async fn move_to_status(
        &self,
        issue_key: &str,
        targets: &[&str],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let transitions = self.get_transitions(issue_key, cancel).await?;

        for target in targets {
            let needle = target.to_lowercase();
            let matched = transitions.iter().find(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.to.name.to_lowercase().contains(&needle)
            });
            if let Some(transition) = matched {
                self.transition_issue(issue_key, &transition.id, cancel)
                    .await?;
                info!(transition = %transition.name, to = %transition.to.name, "issue transitioned");
                return Ok(transition.to.name.clone());
            }
        }

        Err(ApiError::NoMatchingTransition {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            available: transitions
                .into_iter()
                .map(|t| (t.name, t.to.name))
                .collect(),
        })
    }

    /// Add a plain-text comment to an issue.
    #[instrument(skip(self, body, cancel), fields(issue_key = %issue_key))]
    pub async fn add_comment(
        &self,
        issue_key: &str,
        body: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = format!(
            "/rest/api/2/issue/{}/comment",
            urlencoding::encode(issue_key)
        );
        self.execute(Method::POST, &path, Some(json!({ "body": body })), cancel)
            .await?;
        Ok(())
    }

    /// The active sprint of the configured board, if any.
    ///
    /// Returns `None` when no board is configured or the board has no sprint
    /// API (Kanban boards). Only cancellation propagates as an error.
    #[instrument(skip(self, cancel))]
    pub async fn active_sprint(&self, cancel: &CancellationToken) -> Result<Option<Sprint>> {
        let Some(board_id) = self.config.board_id.as_deref() else {
            return Ok(None);
        };
        let path = format!("/rest/agile/1.0/board/{board_id}/sprint?state=active");
        let data = match self.execute(Method::GET, &path, None, cancel).await {
            Ok(data) => data,
            Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
            Err(e) => {
                debug!(error = %e, "sprint lookup failed, assuming Kanban board");
                return Ok(None);
            }
        };
        let sprints = data
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        match sprints.into_iter().next() {
            Some(raw) => serde_json::from_value(raw)
                .map(Some)
                .map_err(|e| ApiError::InvalidResponse(format!("sprint payload: {e}"))),
            None => Ok(None),
        }
    }

    /// All issues in the active sprint, or from the Kanban board, or as a
    /// last resort every unfinished issue in the configured project.
    #[instrument(skip(self, cancel))]
    pub async fn sprint_issues(&self, cancel: &CancellationToken) -> Result<Vec<Issue>> {
        if let Some(board_id) = self.config.board_id.as_deref() {
            if let Some(sprint) = self.active_sprint(cancel).await? {
                let path = format!(
                    "/rest/agile/1.0/sprint/{}/issue?maxResults={SPRINT_ISSUES_MAX_RESULTS}",
                    sprint.id
                );
                let data = self.execute(Method::GET, &path, None, cancel).await?;
                return self.map_issue_list(&data);
            }

            // Kanban board: pull active issues straight off the board.
            let mut fields = vec![
                "summary",
                "status",
                "priority",
                "assignee",
                "issuetype",
                "labels",
                "created",
                "updated",
                "comment",
            ];
            if let Some(story_points) = self.config.story_points_field.as_deref() {
                fields.push(story_points);
            }
            fields.push("subtasks");
            fields.push("reporter");
            let path = format!(
                "/rest/agile/1.0/board/{board_id}/issue?maxResults={SPRINT_ISSUES_MAX_RESULTS}&fields={}",
                fields.join(",")
            );
            match self.execute(Method::GET, &path, None, cancel).await {
                Ok(data) => {
                    let issues = self.map_issue_list(&data)?;
                    if !issues.is_empty() {
                        return Ok(issues);
                    }
                }
                Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
                Err(e) => debug!(error = %e, "board listing failed, falling back to JQL"),
            }
        }

        let project_filter = self.project_filter("project = {} AND ");
        let jql =
            format!("{project_filter}statusCategory != Done ORDER BY priority ASC, rank ASC");
        self.search_issues(&jql, SPRINT_ISSUES_MAX_RESULTS, cancel)
            .await
    }

    /// Run the auth probe matrix against this instance.
    ///
    /// Intended for use after an operation failed with a 401 (see
    /// [`ApiError::is_auth_failure`]); explains *why* authentication failed
    /// and which setting to change.
    #[instrument(skip(self, cancel))]
    pub async fn diagnose_auth(&self, cancel: &CancellationToken) -> Result<AuthDiagnosis> {
        diagnostics::run(&self.http, &self.config, cancel).await
    }
}
