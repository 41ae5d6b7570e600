//! Issue importer port for pulling work items from an external tracker.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future returned by [`IssueImporter::fetch_issue`].
pub type IssueFuture<'a> = Pin<Box<dyn Future<Output = Result<RawIssue, String>> + Send + 'a>>;

/// Credentials for the tracker's REST API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerCredentials {
    /// Base URL overriding the host parsed from the issue link.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Account email for basic auth.
    #[serde(default)]
    pub email: Option<String>,
    /// API token for basic auth.
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
}

/// An issue as returned by the tracker, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIssue {
    /// Issue key (e.g. `PROJ-123`).
    pub key: String,
    /// One-line summary.
    pub summary: String,
    /// Description in the tracker's native document format.
    pub description: Option<serde_json::Value>,
    /// Issue type name as configured in the tracker (e.g. `Story`).
    pub issue_type: String,
}

/// Fetches issues from an external tracker.
///
/// Abstracting the tracker allows deterministic replay and testing without
/// touching a real tracker API.
pub trait IssueImporter: Send + Sync {
    /// Fetches the issue with `key` from `api_base` (scheme and host, no
    /// trailing slash).
    ///
    /// # Errors
    ///
    /// Returns a user-facing message if the request fails or the issue is
    /// not found.
    fn fetch_issue<'a>(
        &'a self,
        api_base: &'a str,
        key: &'a str,
        credentials: &'a TrackerCredentials,
    ) -> IssueFuture<'a>;
}
