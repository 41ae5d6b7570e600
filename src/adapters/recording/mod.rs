//! Recording adapters that capture interactions to cassettes.

pub mod clock;
pub mod issues;
pub mod llm;

pub use clock::RecordingClock;
pub use issues::RecordingIssueImporter;
pub use llm::RecordingGenerationBackend;

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::cassette::recorder::CassetteRecorder;

/// Record one interaction, serializing `input` and `output` to JSON.
///
/// Mirror of `replaying::next_output`. `Result` outputs use serde's
/// `{"Ok": v}` / `{"Err": e}` encoding so replay can rebuild them exactly.
/// An interaction that cannot be serialized is logged and skipped.
pub(crate) fn record_interaction<I, O>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
    output: &O,
) where
    I: Serialize + ?Sized,
    O: Serialize + ?Sized,
{
    let encoded = serde_json::to_value(input).and_then(|i| Ok((i, serde_json::to_value(output)?)));
    let (input_json, output_json) = match encoded {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(port, method, error = %e, "skipping unserializable interaction");
            return;
        }
    };

    match recorder.lock() {
        Ok(mut guard) => guard.record(port, method, input_json, output_json),
        Err(e) => tracing::warn!(port, method, error = %e, "recorder lock poisoned"),
    }
}
