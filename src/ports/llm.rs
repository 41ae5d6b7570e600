//! Generation backend port for streamed language-model completions.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`GenerationBackend::stream_completion`].
///
/// Its single output is the terminal signal of the stream: `Ok` once all
/// chunks were delivered, `Err` on failure or cancellation. Never both.
pub type StreamFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionSummary, StreamError>> + Send + 'a>>;

/// Callback receiving each text fragment as it arrives.
pub type ChunkSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// A request to stream a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model identifier (e.g. `"claude-sonnet-4-20250514"`).
    pub model: String,
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
}

/// Metadata reported once a stream completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    /// Number of prompt tokens consumed, when reported.
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    /// Number of completion tokens generated, when reported.
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    /// Provider stop reason, when reported.
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Failure of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StreamError {
    /// The caller's cancellation token fired.
    #[error("generation cancelled")]
    Cancelled,
    /// The backend is missing configuration (API key, model).
    #[error("backend not configured: {0}")]
    Unconfigured(String),
    /// The request could not be sent or the connection dropped.
    #[error("transport error: {0}")]
    Transport(String),
    /// The provider answered with an error status.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Provider-supplied message.
        message: String,
    },
    /// The stream contained something that could not be understood.
    #[error("malformed stream: {0}")]
    Protocol(String),
}

/// Streams completions from a language model.
pub trait GenerationBackend: Send + Sync {
    /// Streams a completion, invoking `on_chunk` for every fragment in the
    /// order produced.
    ///
    /// Implementations must watch `cancel` and resolve to
    /// [`StreamError::Cancelled`] promptly once it fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the stream is malformed, or the
    /// token is cancelled.
    fn stream_completion<'a>(
        &'a self,
        request: &'a CompletionRequest,
        on_chunk: ChunkSink<'a>,
        cancel: CancellationToken,
    ) -> StreamFuture<'a>;
}
