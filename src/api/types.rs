//! Wire formats and domain records for Jira resources.
//!
//! The wire shape of an issue differs between deployments (API v2 returns
//! plain-string descriptions, v3 returns Atlassian Document Format; custom
//! field ids vary per installation), so payloads are deserialized leniently
//! and then mapped through a total function into a fixed [`Issue`] record
//! with a defined fallback for every optional field.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Fallback shown when the server omits a display value.
const UNKNOWN: &str = "Unknown";

/// Priority id fallback; sorts after every real Jira priority.
const UNKNOWN_PRIORITY_ID: i64 = 99;

/// How many of the most recent comments an issue record carries.
const MAX_COMMENTS: usize = 5;

/// Jira's own coarse classification of a status, used for grouping
/// regardless of project-specific status naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    /// Not started ("To Do" and friends).
    New,
    /// In flight ("In Progress" and friends).
    Indeterminate,
    /// Finished.
    Done,
    /// Anything the server reports that is not one of the three known keys.
    Other,
}

impl StatusCategory {
    pub(crate) fn from_key(key: &str) -> Self {
        match key {
            "new" => StatusCategory::New,
            "indeterminate" => StatusCategory::Indeterminate,
            "done" => StatusCategory::Done,
            _ => StatusCategory::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::New => "new",
            StatusCategory::Indeterminate => "indeterminate",
            StatusCategory::Done => "done",
            StatusCategory::Other => "other",
        }
    }
}

/// A Jira user, as returned by `/myself` and embedded in issue fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Cloud account id; absent on Server/DC.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Server/DC username; absent on Cloud.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email_address: Option<String>,
}

impl User {
    /// The identifier to use when assigning issues: `accountId` on Cloud,
    /// `name` on Server/DC.
    pub fn assignable_id(&self) -> Option<&str> {
        self.account_id.as_deref().or(self.name.as_deref())
    }
}

/// A workflow action that moves an issue to another status.
///
/// Transition lists are always fetched fresh, never cached: the legal set
/// changes after every successful transition.
#[derive(Debug, Clone, Deserialize)]
pub struct Transition {
    pub id: String,
    /// Display name of the action, e.g. "Resolve".
    pub name: String,
    /// The destination status.
    pub to: TransitionTarget,
}

/// Destination status of a transition.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionTarget {
    pub id: String,
    pub name: String,
}

/// An agile sprint, from the agile board API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
}

/// A subtask reference carried on its parent issue.
#[derive(Debug, Clone)]
pub struct Subtask {
    pub key: String,
    pub summary: String,
    pub status: String,
}

/// One of the most recent comments on an issue, flattened to plain text.
#[derive(Debug, Clone)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created: String,
}

/// A Jira issue, mapped to a flat record with defined fallbacks.
#[derive(Debug, Clone)]
pub struct Issue {
    pub key: String,
    pub id: String,
    pub summary: String,
    pub description: String,
    /// Status display name; project-specific.
    pub status: String,
    /// Jira's coarse status grouping; unknown server values map to `Other`.
    pub status_category: StatusCategory,
    pub priority: String,
    /// Numeric priority id, lower is more urgent. 99 when the server omits
    /// a priority.
    pub priority_id: i64,
    pub assignee: Option<String>,
    pub reporter: String,
    pub issue_type: String,
    pub labels: Vec<String>,
    pub created: String,
    pub updated: String,
    /// Story points from the configured per-deployment custom field.
    pub story_points: Option<f64>,
    /// Canonical browse URL on the configured base.
    pub url: String,
    pub subtasks: Vec<Subtask>,
    /// The most recent comments, oldest first, capped at five.
    pub comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireIssue {
    #[serde(default)]
    id: String,
    #[serde(default)]
    key: String,
    #[serde(default)]
    fields: WireFields,
}

#[derive(Debug, Default, Deserialize)]
struct WireFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    status: Option<WireStatus>,
    #[serde(default)]
    priority: Option<WirePriority>,
    #[serde(default)]
    assignee: Option<User>,
    #[serde(default)]
    reporter: Option<User>,
    #[serde(default)]
    issuetype: Option<WireNamed>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    subtasks: Vec<WireSubtask>,
    #[serde(default)]
    comment: Option<WireComments>,
    /// Everything else, kept so per-deployment custom fields (story points)
    /// can be read by their configured id.
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "statusCategory")]
    status_category: Option<WireStatusCategory>,
}

#[derive(Debug, Deserialize)]
struct WireStatusCategory {
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePriority {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireNamed {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSubtask {
    #[serde(default)]
    key: String,
    #[serde(default)]
    fields: Option<WireSubtaskFields>,
}

#[derive(Debug, Deserialize)]
struct WireSubtaskFields {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    status: Option<WireStatus>,
}

#[derive(Debug, Deserialize)]
struct WireComments {
    #[serde(default)]
    comments: Vec<WireComment>,
}

#[derive(Debug, Deserialize)]
struct WireComment {
    #[serde(default)]
    author: Option<User>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    created: Option<String>,
}

/// Map one raw issue payload into the fixed [`Issue`] record.
///
/// Total over any JSON object shape: every missing or unexpected field gets
/// its defined fallback. Only a payload that is not an object at all is
/// rejected.
pub(crate) fn map_issue(
    raw: Value,
    base_url: &str,
    story_points_field: Option<&str>,
) -> Result<Issue> {
    let wire: WireIssue = serde_json::from_value(raw)
        .map_err(|e| ApiError::InvalidResponse(format!("issue payload: {e}")))?;
    Ok(issue_from_wire(wire, base_url, story_points_field))
}

fn issue_from_wire(wire: WireIssue, base_url: &str, story_points_field: Option<&str>) -> Issue {
    let fields = wire.fields;

    let (status, status_category) = match fields.status {
        Some(status) => (
            status.name.unwrap_or_else(|| UNKNOWN.to_string()),
            status
                .status_category
                .and_then(|c| c.key)
                .map(|key| StatusCategory::from_key(&key))
                .unwrap_or(StatusCategory::Other),
        ),
        None => (UNKNOWN.to_string(), StatusCategory::Other),
    };

    let (priority, priority_id) = match fields.priority {
        Some(priority) => (
            priority.name.unwrap_or_else(|| UNKNOWN.to_string()),
            priority
                .id
                .and_then(|id| id.parse().ok())
                .unwrap_or(UNKNOWN_PRIORITY_ID),
        ),
        None => (UNKNOWN.to_string(), UNKNOWN_PRIORITY_ID),
    };

    let story_points = story_points_field
        .and_then(|field| fields.extra.get(field))
        .and_then(Value::as_f64);

    let comment_count = fields.comment.as_ref().map(|c| c.comments.len()).unwrap_or(0);
    let comments = fields
        .comment
        .map(|c| c.comments)
        .unwrap_or_default()
        .into_iter()
        .skip(comment_count.saturating_sub(MAX_COMMENTS))
        .map(|c| Comment {
            author: c
                .author
                .map(|a| a.display_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            body: c.body.as_ref().map(body_text).unwrap_or_default(),
            created: c.created.unwrap_or_default(),
        })
        .collect();

    let subtasks = fields
        .subtasks
        .into_iter()
        .map(|st| Subtask {
            key: st.key,
            summary: st
                .fields
                .as_ref()
                .and_then(|f| f.summary.clone())
                .unwrap_or_default(),
            status: st
                .fields
                .and_then(|f| f.status)
                .and_then(|s| s.name)
                .unwrap_or_default(),
        })
        .collect();

    Issue {
        url: format!("{base_url}/browse/{}", wire.key),
        key: wire.key,
        id: wire.id,
        summary: fields.summary.unwrap_or_default(),
        description: fields.description.as_ref().map(body_text).unwrap_or_default(),
        status,
        status_category,
        priority,
        priority_id,
        assignee: fields
            .assignee
            .map(|a| a.display_name)
            .filter(|n| !n.is_empty()),
        reporter: fields
            .reporter
            .map(|r| r.display_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        issue_type: fields
            .issuetype
            .and_then(|t| t.name)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        labels: fields.labels,
        created: fields.created.unwrap_or_default(),
        updated: fields.updated.unwrap_or_default(),
        story_points,
        subtasks,
        comments,
    }
}

/// Flatten a rich-text body to plain text.
///
/// API v2 returns plain strings; v3 returns Atlassian Document Format. Any
/// other shape is serialized as-is rather than dropped.
fn body_text(value: &Value) -> String {
    if let Some(text) = value.as_str() {
        return text.to_string();
    }
    if let Ok(doc) = serde_json::from_value::<AtlassianDoc>(value.clone()) {
        return doc.to_plain_text();
    }
    value.to_string()
}

/// An Atlassian Document Format (ADF) document.
///
/// Jira Cloud's v3 endpoints return descriptions and comment bodies in this
/// rich-text tree; the assistant only needs plain text.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AtlassianDoc {
    #[serde(rename = "type")]
    doc_type: String,
    #[serde(default)]
    content: Vec<Value>,
}

impl AtlassianDoc {
    /// Recursively extract text nodes, preserving paragraph and line breaks.
    pub(crate) fn to_plain_text(&self) -> String {
        if self.doc_type != "doc" {
            return String::new();
        }
        let mut out = String::new();
        for node in &self.content {
            extract_text(node, &mut out);
        }
        out.trim().to_string()
    }
}

fn extract_text(node: &Value, out: &mut String) {
    let Some(obj) = node.as_object() else {
        if let Some(items) = node.as_array() {
            for item in items {
                extract_text(item, out);
            }
        }
        return;
    };

    let recurse_children = |out: &mut String| {
        if let Some(items) = obj.get("content").and_then(Value::as_array) {
            for item in items {
                extract_text(item, out);
            }
        }
    };

    match obj.get("type").and_then(Value::as_str) {
        Some("text") => {
            if let Some(text) = obj.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
        Some("paragraph") | Some("heading") | Some("codeBlock") => {
            recurse_children(out);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
        }
        Some("hardBreak") => out.push('\n'),
        Some("listItem") => {
            out.push_str("- ");
            recurse_children(out);
        }
        Some("mention") => {
            if let Some(text) = obj
                .get("attrs")
                .and_then(|a| a.get("text"))
                .and_then(Value::as_str)
            {
                out.push('@');
                out.push_str(text);
            }
        }
        Some("inlineCard") | Some("mediaGroup") | Some("mediaSingle") => {
            // No useful text representation.
        }
        _ => recurse_children(out),
    }
}
