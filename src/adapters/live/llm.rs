//! Live generation backend streaming from the Anthropic Messages API.

use std::env;

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::ports::{ChunkSink, CompletionRequest, CompletionSummary, GenerationBackend, StreamError, StreamFuture};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Live backend that streams completions from the Anthropic Claude API.
pub struct LiveGenerationBackend {
    client: Client,
}

impl LiveGenerationBackend {
    /// Creates a new live backend.
    #[must_use]
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for LiveGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Request body sent to the Anthropic messages API.
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    stream: bool,
    messages: Vec<AnthropicMessage<'a>>,
}

/// A single message in the Anthropic API request.
#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Error response from the Anthropic API.
#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

/// Detail inside an Anthropic error response.
#[derive(Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

/// What one server-sent event contributed to the stream.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Text(String),
    Stop,
    Ignored,
}

/// Incremental decoder for the `text/event-stream` body.
///
/// Bytes are buffered until a blank line closes an event, so events split
/// across network reads (including inside a multi-byte character) are handled.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    summary: CompletionSummary,
}

impl SseDecoder {
    /// Feeds raw bytes and returns every event completed by them.
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, StreamError> {
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            let text = String::from_utf8_lossy(&raw);
            for line in text.lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    events.push(self.decode(data.trim())?);
                }
            }
        }
        Ok(events)
    }

    fn decode(&mut self, data: &str) -> Result<SseEvent, StreamError> {
        let event: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| StreamError::Protocol(format!("invalid event payload: {e}")))?;

        match event.get("type").and_then(|t| t.as_str()) {
            Some("content_block_delta") => Ok(event
                .get("delta")
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .map_or(SseEvent::Ignored, |t| SseEvent::Text(t.to_string()))),
            Some("message_start") => {
                self.summary.prompt_tokens = token_count(&event["message"]["usage"]["input_tokens"]);
                Ok(SseEvent::Ignored)
            }
            Some("message_delta") => {
                self.summary.completion_tokens = token_count(&event["usage"]["output_tokens"]);
                self.summary.stop_reason =
                    event["delta"]["stop_reason"].as_str().map(ToString::to_string);
                Ok(SseEvent::Ignored)
            }
            Some("message_stop") => Ok(SseEvent::Stop),
            Some("error") => Err(StreamError::Provider {
                status: 200,
                message: event["error"]["message"].as_str().unwrap_or("stream error").to_string(),
            }),
            _ => Ok(SseEvent::Ignored),
        }
    }
}

fn token_count(value: &serde_json::Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

impl GenerationBackend for LiveGenerationBackend {
    fn stream_completion<'a>(
        &'a self,
        request: &'a CompletionRequest,
        on_chunk: ChunkSink<'a>,
        cancel: CancellationToken,
    ) -> StreamFuture<'a> {
        Box::pin(async move {
            let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
                StreamError::Unconfigured("ANTHROPIC_API_KEY environment variable not set".into())
            })?;

            let body = AnthropicRequest {
                model: &request.model,
                max_tokens: request.max_tokens,
                system: &request.system,
                stream: true,
                messages: vec![AnthropicMessage { role: "user", content: &request.prompt }],
            };

            tracing::debug!(model = %request.model, "opening completion stream");
            let send = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send();

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StreamError::Cancelled),
                sent = send => sent.map_err(|e| StreamError::Transport(format!("Anthropic API request failed: {e}")))?,
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                return Err(StreamError::Provider { status: status.as_u16(), message });
            }

            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::default();
            loop {
                let next = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(StreamError::Cancelled),
                    next = body.next() => next,
                };
                let Some(bytes) = next else {
                    return Err(StreamError::Protocol("stream ended before message_stop".into()));
                };
                let bytes = bytes.map_err(|e| StreamError::Transport(format!("stream read failed: {e}")))?;
                for event in decoder.push(&bytes)? {
                    match event {
                        SseEvent::Text(text) => on_chunk(&text),
                        SseEvent::Stop => {
                            tracing::debug!(
                                completion_tokens = ?decoder.summary.completion_tokens,
                                "completion stream finished"
                            );
                            return Ok(decoder.summary);
                        }
                        SseEvent::Ignored => {}
                    }
                }
            }
        })
    }
}
