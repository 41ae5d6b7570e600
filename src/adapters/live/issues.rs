//! Live adapter for the `IssueImporter` port, backed by the Jira Cloud REST API.

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::ports::{IssueFuture, IssueImporter, RawIssue, TrackerCredentials};

/// Fetches issues from Jira Cloud (`/rest/api/3/issue/<key>`).
pub struct LiveIssueImporter {
    client: Client,
}

impl LiveIssueImporter {
    /// Creates a new live importer.
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for LiveIssueImporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct JiraIssue {
    key: Option<String>,
    #[serde(default)]
    fields: JiraFields,
}

#[derive(Deserialize, Default)]
struct JiraFields {
    summary: Option<String>,
    description: Option<serde_json::Value>,
    issuetype: Option<JiraIssueType>,
}

#[derive(Deserialize)]
struct JiraIssueType {
    name: Option<String>,
}

impl IssueImporter for LiveIssueImporter {
    fn fetch_issue<'a>(
        &'a self,
        api_base: &'a str,
        key: &'a str,
        credentials: &'a TrackerCredentials,
    ) -> IssueFuture<'a> {
        Box::pin(async move {
            let url = format!("{}/rest/api/3/issue/{key}", api_base.trim_end_matches('/'));
            let mut request = self.client.get(&url).header("Accept", "application/json");
            if let (Some(email), Some(token)) = (&credentials.email, &credentials.api_token) {
                request = request.basic_auth(email, Some(token));
            }

            tracing::debug!(%url, "fetching issue");
            let response =
                request.send().await.map_err(|e| format!("Jira request failed: {e}"))?;

            match response.status() {
                s if s.is_success() => {}
                StatusCode::UNAUTHORIZED => {
                    return Err(
                        "Jira authentication failed. Check the configured Jira email and API token."
                            .to_string(),
                    )
                }
                StatusCode::NOT_FOUND => {
                    return Err(format!("Jira issue {key} not found or you don't have access."))
                }
                s => {
                    return Err(format!(
                        "Jira request failed ({}). Check the URL and Jira settings.",
                        s.as_u16()
                    ))
                }
            }

            let issue: JiraIssue =
                response.json().await.map_err(|e| format!("Failed to parse Jira response: {e}"))?;

            Ok(RawIssue {
                key: issue.key.unwrap_or_else(|| key.to_string()),
                summary: issue.fields.summary.unwrap_or_default(),
                description: issue.fields.description,
                issue_type: issue.fields.issuetype.and_then(|t| t.name).unwrap_or_default(),
            })
        })
    }
}
