//! Events the controller reports to the presentation layer.

use std::sync::Mutex;

use crate::spec::{Progress, RequirementsFormat};
use crate::stage::Stage;

use super::state::ChatRole;

/// Something the presentation layer may want to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A generation or refinement stream was accepted.
    StreamStart {
        /// Stage being generated.
        stage: Stage,
        /// Whether this is a refinement turn.
        refine: bool,
    },
    /// One fragment of streamed text, forwarded verbatim.
    StreamChunk {
        /// Stage being generated.
        stage: Stage,
        /// The fragment.
        chunk: String,
    },
    /// A stage document was committed.
    StreamDone {
        /// Stage committed.
        stage: Stage,
        /// Full committed content.
        content: String,
    },
    /// A refinement turn answered a question; the document is unchanged.
    InquiryDone {
        /// Stage the question was about.
        stage: Stage,
        /// Answer text.
        answer: String,
    },
    /// A chat turn was added to a stage's history.
    ChatEntry {
        /// Stage whose history grew.
        stage: Stage,
        /// Who spoke.
        role: ChatRole,
        /// What was said.
        text: String,
    },
    /// An operation failed.
    Error {
        /// User-facing message.
        message: String,
    },
    /// Task progress changed.
    ProgressUpdated {
        /// New progress record.
        progress: Progress,
    },
    /// A `_prompts/` override replaced the built-in system prompt.
    UsingCustomPrompt {
        /// Stage using the override.
        stage: Stage,
    },
    /// Manually edited content was saved.
    Saved {
        /// Stage saved.
        stage: Stage,
    },
    /// A new spec folder was created and made active.
    SpecCreated {
        /// Folder name.
        spec: String,
        /// First stage to be generated.
        stage: Stage,
    },
    /// An existing spec was made active.
    SpecOpened {
        /// Folder name.
        spec: String,
        /// Stage selected on open.
        stage: Stage,
        /// Progress after re-sync.
        progress: Option<Progress>,
    },
    /// A spec was deleted.
    SpecDeleted {
        /// Folder name.
        spec: String,
    },
    /// A spec was renamed.
    SpecRenamed {
        /// Previous folder name.
        old: String,
        /// New folder name.
        new: String,
    },
    /// The requirements format of the active spec changed.
    RequirementsFormatChanged {
        /// New format.
        format: RequirementsFormat,
    },
    /// Custom prompt files were scaffolded.
    PromptsScaffolded {
        /// Folder name.
        spec: String,
    },
}

/// Receives pipeline events.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: PipelineEvent);
}

/// Sink that keeps every event in memory.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl CollectingSink {
    /// Returns a copy of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Concatenated chunk text received for `stage`.
    #[must_use]
    pub fn streamed_text(&self, stage: Stage) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::StreamChunk { stage: s, chunk } if s == stage => Some(chunk),
                _ => None,
            })
            .collect()
    }

    /// Messages of every `Error` event.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
