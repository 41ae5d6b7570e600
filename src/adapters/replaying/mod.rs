//! Replaying adapters that serve recorded interactions.

pub mod clock;
pub mod issues;
pub mod llm;

pub use clock::ReplayingClock;
pub use issues::ReplayingIssueImporter;
pub use llm::ReplayingGenerationBackend;

use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use crate::cassette::replayer::CassetteReplayer;

/// Take the next recorded output for `port::method` and decode it.
///
/// Mirror of `recording::record_interaction`.
///
/// # Errors
///
/// Returns a message if the cassette has no matching interaction left or
/// the recorded output does not decode as `T`.
pub(crate) fn next_output<T: DeserializeOwned>(
    replayer: &Arc<Mutex<CassetteReplayer>>,
    port: &str,
    method: &str,
) -> Result<T, String> {
    let output = {
        let mut guard = replayer.lock().map_err(|e| format!("replayer lock poisoned: {e}"))?;
        guard.next_interaction(port, method)?.output.clone()
    };
    serde_json::from_value(output)
        .map_err(|e| format!("{port}::{method}: recorded output does not decode: {e}"))
}

#[cfg(test)]
pub(crate) fn replayer_for(
    interactions: Vec<crate::cassette::format::Interaction>,
) -> Arc<Mutex<CassetteReplayer>> {
    let cassette = crate::cassette::format::Cassette {
        name: "test".into(),
        recorded_at: chrono::Utc::now(),
        version: "0.1.0".into(),
        interactions,
    };
    Arc::new(Mutex::new(CassetteReplayer::new(&cassette)))
}
