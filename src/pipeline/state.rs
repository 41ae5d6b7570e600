//! Per-session state owned by the controller.

use std::collections::BTreeMap;
use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::stage::Stage;

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// The person refining the spec.
    User,
    /// The generation backend.
    Assistant,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        })
    }
}

/// One turn of a stage's refinement conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    /// Who spoke.
    pub role: ChatRole,
    /// What was said.
    pub text: String,
}

/// Mutable state of one controller session.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Folder name of the open spec.
    pub active_spec: Option<String>,
    /// Stage the session is looking at.
    pub active_stage: Stage,
    /// Cached stage documents of the open spec.
    pub contents: BTreeMap<Stage, String>,
    /// Whether a generation is in flight.
    pub generating: bool,
    /// Token of the in-flight generation.
    pub cancel: Option<CancellationToken>,
    /// Refinement conversation per stage.
    pub history: BTreeMap<Stage, Vec<ChatEntry>>,
}

impl SessionState {
    /// Makes `spec` active with the given documents, clearing chat history.
    pub fn activate(&mut self, spec: &str, contents: BTreeMap<Stage, String>, stage: Stage) {
        self.active_spec = Some(spec.to_string());
        self.contents = contents;
        self.active_stage = stage;
        self.history.clear();
    }

    /// Back to the freshly created state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prior turns of `stage` as `User: …` / `Assistant: …` lines.
    #[must_use]
    pub fn serialized_history(&self, stage: Stage) -> Option<String> {
        let entries = self.history.get(&stage).filter(|h| !h.is_empty())?;
        Some(
            entries
                .iter()
                .map(|e| format!("{}: {}", e.role, e.text))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Appends a turn to `stage`'s history.
    pub fn push_history(&mut self, stage: Stage, role: ChatRole, text: &str) {
        self.history.entry(stage).or_default().push(ChatEntry { role, text: text.to_string() });
    }
}
