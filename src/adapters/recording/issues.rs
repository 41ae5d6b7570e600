//! Recording adapter for the `IssueImporter` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::record_interaction;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{IssueFuture, IssueImporter, TrackerCredentials};

/// Records issue fetches while delegating to an inner implementation.
pub struct RecordingIssueImporter {
    inner: Box<dyn IssueImporter>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingIssueImporter {
    /// Creates a new recording importer wrapping the given implementation.
    pub fn new(inner: Box<dyn IssueImporter>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

/// The API token is never serialized, so cassettes are safe to commit.
#[derive(Serialize)]
struct FetchIssueInput<'a> {
    api_base: &'a str,
    key: &'a str,
    credentials: &'a TrackerCredentials,
}

impl IssueImporter for RecordingIssueImporter {
    fn fetch_issue<'a>(
        &'a self,
        api_base: &'a str,
        key: &'a str,
        credentials: &'a TrackerCredentials,
    ) -> IssueFuture<'a> {
        Box::pin(async move {
            let result = self.inner.fetch_issue(api_base, key, credentials).await;
            let input = FetchIssueInput { api_base, key, credentials };
            record_interaction(&self.recorder, "issues", "fetch_issue", &input, &result);
            result
        })
    }
}
