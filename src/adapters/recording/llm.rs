//! Recording adapter for the `GenerationBackend` port.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::record_interaction;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{
    ChunkSink, CompletionRequest, CompletionSummary, GenerationBackend, StreamError, StreamFuture,
};

/// Records streamed completions while delegating to an inner backend.
///
/// Each call becomes one interaction whose output holds every chunk in
/// order plus the terminal result.
pub struct RecordingGenerationBackend {
    inner: Box<dyn GenerationBackend>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingGenerationBackend {
    /// Creates a new recording backend wrapping the given implementation.
    pub fn new(inner: Box<dyn GenerationBackend>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

#[derive(Serialize)]
struct RecordedStream<'a> {
    chunks: &'a [String],
    result: &'a Result<CompletionSummary, StreamError>,
}

impl GenerationBackend for RecordingGenerationBackend {
    fn stream_completion<'a>(
        &'a self,
        request: &'a CompletionRequest,
        on_chunk: ChunkSink<'a>,
        cancel: CancellationToken,
    ) -> StreamFuture<'a> {
        Box::pin(async move {
            let mut chunks: Vec<String> = Vec::new();
            let result = {
                let mut tee = |chunk: &str| {
                    chunks.push(chunk.to_string());
                    on_chunk(chunk);
                };
                self.inner.stream_completion(request, &mut tee, cancel).await
            };

            let output = RecordedStream { chunks: &chunks, result: &result };
            record_interaction(&self.recorder, "llm", "stream_completion", request, &output);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Cassette;

    struct TwoChunks;

    impl GenerationBackend for TwoChunks {
        fn stream_completion<'a>(
            &'a self,
            _request: &'a CompletionRequest,
            on_chunk: ChunkSink<'a>,
            _cancel: CancellationToken,
        ) -> StreamFuture<'a> {
            Box::pin(async move {
                on_chunk("# Design\n");
                on_chunk("body");
                Ok(CompletionSummary { completion_tokens: Some(2), ..CompletionSummary::default() })
            })
        }
    }

    #[tokio::test]
    async fn records_chunks_and_result_while_forwarding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llm.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&path, "test")));
        let backend = RecordingGenerationBackend::new(Box::new(TwoChunks), Arc::clone(&recorder));

        let request = CompletionRequest {
            model: "m".into(),
            system: "sys".into(),
            prompt: "p".into(),
            max_tokens: 16,
        };
        let mut seen = String::new();
        let mut sink = |c: &str| seen.push_str(c);
        let result = backend.stream_completion(&request, &mut sink, CancellationToken::new()).await;
        assert!(result.is_ok());
        assert_eq!(seen, "# Design\nbody");

        recorder.lock().unwrap().write().unwrap();
        let cassette = Cassette::from_yaml(&std::fs::read_to_string(&path).unwrap(), "llm").unwrap();
        let output = &cassette.interactions[0].output;
        assert_eq!(output["chunks"][1], "body");
        assert_eq!(output["result"]["Ok"]["completion_tokens"], 2);
        assert_eq!(cassette.interactions[0].input["prompt"], "p");
    }
}
