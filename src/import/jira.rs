//! Jira user stories as spec descriptions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ImportError;
use crate::ports::{IssueImporter, TrackerCredentials};

const STORY_TYPES: [&str; 2] = ["story", "user story"];

static BROWSE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https://([^/]+)/browse/([A-Z][A-Z0-9]+-\d+)")
        .expect("browse url pattern is valid")
});

/// Host and issue key taken from a browse link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraUrl {
    /// Host name, e.g. `acme.atlassian.net`.
    pub host: String,
    /// Issue key, uppercased.
    pub key: String,
}

/// A validated user story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStory {
    /// Issue key.
    pub key: String,
    /// Trimmed summary.
    pub summary: String,
    /// Description flattened to plain text; empty when absent.
    pub description: String,
    /// Issue type as reported by Jira.
    pub issue_type: String,
}

/// Parses `https://<host>/browse/<KEY-123>` (any case, trailing path or query
/// allowed).
#[must_use]
pub fn parse_jira_url(url: &str) -> Option<JiraUrl> {
    let caps = BROWSE_URL.captures(url.trim())?;
    Some(JiraUrl { host: caps[1].to_string(), key: caps[2].to_uppercase() })
}

/// Whether `input` looks like a browse link rather than a free-text
/// description.
#[must_use]
pub fn is_jira_url(input: &str) -> bool {
    parse_jira_url(input).is_some()
}

/// Fetches the issue behind `url` and checks it is a user story.
///
/// The URL is validated before any request is made. `credentials.base_url`
/// overrides the host from the link.
///
/// # Errors
///
/// [`ImportError::InvalidUrl`] for anything but a browse link,
/// [`ImportError::Fetch`] when the tracker request fails and
/// [`ImportError::NotAStory`] for other issue types.
pub async fn fetch_user_story(
    importer: &dyn IssueImporter,
    url: &str,
    credentials: &TrackerCredentials,
) -> Result<UserStory, ImportError> {
    let parsed = parse_jira_url(url).ok_or(ImportError::InvalidUrl)?;
    let api_base = credentials
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map_or_else(|| format!("https://{}", parsed.host), |b| b.trim_end_matches('/').to_string());

    tracing::debug!(key = %parsed.key, %api_base, "fetching jira issue");
    let issue = importer
        .fetch_issue(&api_base, &parsed.key, credentials)
        .await
        .map_err(ImportError::Fetch)?;

    let issue_type = issue.issue_type.trim().to_string();
    if !STORY_TYPES.contains(&issue_type.to_lowercase().as_str()) {
        return Err(ImportError::NotAStory(issue_type));
    }

    let key = if issue.key.trim().is_empty() { parsed.key } else { issue.key };
    Ok(UserStory {
        key,
        summary: issue.summary.trim().to_string(),
        description: issue.description.as_ref().map(adf_to_plain_text).unwrap_or_default().trim().to_string(),
        issue_type,
    })
}

/// Flattens an Atlassian Document Format node to its text, depth first.
#[must_use]
pub fn adf_to_plain_text(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str).filter(|t| !t.is_empty()) {
                return text.to_string();
            }
            match map.get("content") {
                Some(Value::Array(children)) => children.iter().map(adf_to_plain_text).collect(),
                _ => String::new(),
            }
        }
        _ => String::new(),
    }
}

/// Renders a story as `# KEY: summary`, followed by the description when
/// there is one.
#[must_use]
pub fn issue_to_prompt(story: &UserStory) -> String {
    let mut prompt = format!("# {}: {}", story.key, story.summary);
    if !story.description.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&story.description);
    }
    prompt
}
