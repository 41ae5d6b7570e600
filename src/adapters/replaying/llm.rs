//! Replaying adapter for the `GenerationBackend` port.

use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::next_output;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::{
    ChunkSink, CompletionRequest, CompletionSummary, GenerationBackend, StreamError, StreamFuture,
};

/// Serves recorded completion streams from a cassette.
///
/// Chunks are re-emitted one at a time, yielding to the runtime in between,
/// so cancellation mid-stream behaves as it does against a live backend.
pub struct ReplayingGenerationBackend {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingGenerationBackend {
    /// Create a replaying backend over the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

#[derive(Deserialize)]
struct RecordedStream {
    #[serde(default)]
    chunks: Vec<String>,
    result: Result<CompletionSummary, StreamError>,
}

impl GenerationBackend for ReplayingGenerationBackend {
    fn stream_completion<'a>(
        &'a self,
        _request: &'a CompletionRequest,
        on_chunk: ChunkSink<'a>,
        cancel: CancellationToken,
    ) -> StreamFuture<'a> {
        let recorded: Result<RecordedStream, String> =
            next_output(&self.replayer, "llm", "stream_completion");
        Box::pin(async move {
            let recorded = recorded.map_err(StreamError::Unconfigured)?;
            for chunk in &recorded.chunks {
                if cancel.is_cancelled() {
                    return Err(StreamError::Cancelled);
                }
                on_chunk(chunk);
                tokio::task::yield_now().await;
            }
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            recorded.result
        })
    }
}
