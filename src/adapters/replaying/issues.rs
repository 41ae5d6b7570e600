//! Replaying adapter for the `IssueImporter` port.

use std::sync::{Arc, Mutex};

use super::next_output;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{IssueFuture, IssueImporter, RawIssue, TrackerCredentials};

/// Serves recorded issue fetches from a cassette.
pub struct ReplayingIssueImporter {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingIssueImporter {
    /// Create a replaying importer over the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl IssueImporter for ReplayingIssueImporter {
    fn fetch_issue<'a>(
        &'a self,
        _api_base: &'a str,
        _key: &'a str,
        _credentials: &'a TrackerCredentials,
    ) -> IssueFuture<'a> {
        let recorded: Result<Result<RawIssue, String>, String> =
            next_output(&self.replayer, "issues", "fetch_issue");
        Box::pin(async move { recorded? })
    }
}
