//! Stage pipeline controller.
//!
//! Owns one [`SessionState`] and drives every generation through a single
//! flight: while a stream is running any further generation or refinement
//! is rejected with [`PipelineError::Busy`] before it touches the backend or
//! the session. The state sits behind a mutex that is never held across an
//! await, so a [`CancelHandle`] can reach the in-flight token from another
//! task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use super::events::{EventSink, PipelineEvent};
use super::refine::{Refinement, REVISION_ACK};
use super::state::{ChatEntry, ChatRole, SessionState};
use crate::context::ServiceContext;
use crate::error::PipelineError;
use crate::ports::CompletionRequest;
use crate::prompts::{
    apply_title, build_refinement_prompt, build_system_prompt, build_verification_prompt,
    transcript_requirements_prompt, PromptContext, REFINE_SYSTEM,
};
use crate::spec::{parse_checklist, sync_progress, Progress};
use crate::stage::Stage;
use crate::store::SpecStore;

/// Backend parameters applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Model identifier.
    pub model: String,
    /// Token ceiling per completion.
    pub max_tokens: u32,
}

/// Outcome of a cascade.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Stages regenerated and committed, in order.
    pub completed: Vec<Stage>,
    /// The error that stopped the cascade, if it stopped early.
    pub halted: Option<PipelineError>,
}

/// Cancels the in-flight generation of a controller from anywhere.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<Mutex<SessionState>>,
}

impl CancelHandle {
    /// Fires the in-flight token. Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        let state = lock(&self.state);
        match &state.cancel {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Clears the flight flag and token when the generation ends, however it ends.
struct FlightGuard {
    state: Arc<Mutex<SessionState>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.generating = false;
        state.cancel = None;
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives the four-stage pipeline for one session.
pub struct Controller<'a> {
    pub(super) ctx: &'a ServiceContext,
    pub(super) store: SpecStore<'a>,
    pub(super) sink: &'a dyn EventSink,
    settings: GenerationSettings,
    state: Arc<Mutex<SessionState>>,
}

impl<'a> Controller<'a> {
    /// Creates a controller with an empty session.
    #[must_use]
    pub fn new(
        ctx: &'a ServiceContext,
        store: SpecStore<'a>,
        sink: &'a dyn EventSink,
        settings: GenerationSettings,
    ) -> Self {
        Self { ctx, store, sink, settings, state: Arc::default() }
    }

    /// The store this controller persists to.
    #[must_use]
    pub fn store(&self) -> &SpecStore<'a> {
        &self.store
    }

    /// Handle that cancels whatever generation is in flight.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { state: Arc::clone(&self.state) }
    }

    /// Cancels the in-flight generation, if any.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Whether a generation is in flight.
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.lock().generating
    }

    /// Folder name of the open spec.
    #[must_use]
    pub fn active_spec(&self) -> Option<String> {
        self.lock().active_spec.clone()
    }

    /// Stage the session is looking at.
    #[must_use]
    pub fn active_stage(&self) -> Stage {
        self.lock().active_stage
    }

    /// Cached document of `stage` for the open spec. A blank document counts
    /// as missing.
    #[must_use]
    pub fn content(&self, stage: Stage) -> Option<String> {
        self.lock().contents.get(&stage).filter(|doc| !doc.trim().is_empty()).cloned()
    }

    /// Refinement conversation of `stage`.
    #[must_use]
    pub fn history(&self, stage: Stage) -> Vec<ChatEntry> {
        self.lock().history.get(&stage).cloned().unwrap_or_default()
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    /// Reports `err` to the sink and hands it back.
    pub(super) fn fail(&self, err: PipelineError) -> PipelineError {
        self.sink.emit(PipelineEvent::Error { message: err.to_string() });
        err
    }

    pub(super) fn require_spec(&self) -> Result<String, PipelineError> {
        self.active_spec().ok_or_else(|| self.fail(PipelineError::NoActiveSpec))
    }

    pub(super) fn ensure_idle(&self) -> Result<(), PipelineError> {
        if self.is_generating() {
            return Err(self.fail(PipelineError::Busy));
        }
        Ok(())
    }

    fn begin_flight(&self) -> Result<(CancellationToken, FlightGuard), PipelineError> {
        let token = {
            let mut state = self.lock();
            if state.generating {
                None
            } else {
                let token = CancellationToken::new();
                state.generating = true;
                state.cancel = Some(token.clone());
                Some(token)
            }
        };
        match token {
            Some(token) => Ok((token, FlightGuard { state: Arc::clone(&self.state) })),
            None => Err(self.fail(PipelineError::Busy)),
        }
    }

    fn request(&self, system: String, prompt: String) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            system,
            prompt,
            max_tokens: self.settings.max_tokens,
        }
    }

    /// Built-in system prompt for `stage` of `spec`, ignoring overrides.
    #[must_use]
    pub fn builtin_prompt(&self, spec: &str, stage: Stage, title: &str) -> String {
        let config = self.store.read_config(spec);
        let role = self.store.role(spec);
        let steering = self.store.steering(spec);
        build_system_prompt(
            stage,
            &PromptContext {
                title,
                role: role.as_deref(),
                steering: steering.as_deref(),
                requirements_format: config.as_ref().map(|c| c.requirements_format).unwrap_or_default(),
                light_design: config.as_ref().is_some_and(|c| c.light_design),
                mode: config.map(|c| c.generation_mode).unwrap_or_default(),
            },
        )
    }

    fn system_prompt(&self, spec: &str, stage: Stage, title: &str) -> String {
        if let Some(custom) = self.store.custom_prompt(spec, stage) {
            self.sink.emit(PipelineEvent::UsingCustomPrompt { stage });
            return apply_title(&custom, title);
        }
        self.builtin_prompt(spec, stage, title)
    }

    /// Runs one stream, accumulating its text. `forward` sends every chunk
    /// to the sink as it arrives.
    async fn stream(
        &self,
        stage: Stage,
        request: CompletionRequest,
        token: CancellationToken,
        forward: bool,
    ) -> Result<String, PipelineError> {
        let sink = self.sink;
        let mut accumulated = String::new();
        let result = {
            let mut on_chunk = |chunk: &str| {
                accumulated.push_str(chunk);
                if forward {
                    sink.emit(PipelineEvent::StreamChunk { stage, chunk: chunk.to_string() });
                }
            };
            self.ctx.llm.stream_completion(&request, &mut on_chunk, token).await
        };

        match result {
            Ok(summary) => {
                tracing::debug!(
                    %stage,
                    bytes = accumulated.len(),
                    completion_tokens = ?summary.completion_tokens,
                    "stream finished"
                );
                Ok(accumulated)
            }
            Err(e) => {
                tracing::warn!(%stage, error = %e, "stream failed");
                Err(self.fail(e.into()))
            }
        }
    }

    /// Streams without forwarding chunks, for intermediate material.
    pub(super) async fn collect(&self, system: &str, prompt: String) -> Result<String, PipelineError> {
        let (token, _flight) = self.begin_flight()?;
        let request = self.request(system.to_string(), prompt);
        self.stream(self.active_stage(), request, token, false).await
    }

    /// Writes `content` as the `stage` document of `spec`, refreshing the
    /// cache when `spec` is still open and re-syncing progress for tasks.
    pub(super) fn commit(&self, spec: &str, stage: Stage, content: &str) -> Result<(), PipelineError> {
        self.store
            .write_stage(spec, stage, content)
            .map_err(|e| self.fail(PipelineError::Storage(e)))?;
        {
            let mut state = self.lock();
            if state.active_spec.as_deref() == Some(spec) {
                state.contents.insert(stage, content.to_string());
                state.active_stage = stage;
            }
        }
        if stage == Stage::Tasks {
            self.sync_tasks(spec, content)?;
        }
        Ok(())
    }

    pub(super) fn sync_tasks(&self, spec: &str, document: &str) -> Result<Progress, PipelineError> {
        let progress = sync_progress(self.store.read_progress(spec).as_ref(), document);
        self.store
            .write_progress(spec, &progress)
            .map_err(|e| self.fail(PipelineError::Storage(e)))?;
        self.sink.emit(PipelineEvent::ProgressUpdated { progress: progress.clone() });
        Ok(progress)
    }

    /// Generates `stage` of the open spec from `material` and commits it.
    ///
    /// # Errors
    ///
    /// `NoActiveSpec`, `Busy` while another generation runs, `Cancelled` or
    /// `Backend` when the stream fails, `Storage` when the commit fails.
    /// Nothing is written on any error path before the commit.
    pub async fn generate(
        &self,
        stage: Stage,
        material: &str,
        title: &str,
    ) -> Result<String, PipelineError> {
        self.generate_with(stage, material.to_string(), title, stage.wants_workspace_context()).await
    }

    pub(super) async fn generate_with(
        &self,
        stage: Stage,
        material: String,
        title: &str,
        workspace_context: bool,
    ) -> Result<String, PipelineError> {
        let spec = self.require_spec()?;
        let (token, _flight) = self.begin_flight()?;

        let system = self.system_prompt(&spec, stage, title);
        let mut prompt = material;
        if workspace_context {
            if let Some(context) = self.store.workspace_context() {
                prompt = format!("{prompt}\n\n{context}");
            }
        }

        tracing::info!(spec = %spec, %stage, "generating");
        self.sink.emit(PipelineEvent::StreamStart { stage, refine: false });
        let content = self.stream(stage, self.request(system, prompt), token, true).await?;
        if content.trim().is_empty() {
            return Err(self.fail(PipelineError::Backend("the model returned an empty document".into())));
        }

        self.commit(&spec, stage, &content)?;
        self.sink.emit(PipelineEvent::StreamDone { stage, content: content.clone() });
        Ok(content)
    }

    /// Regenerates `stage` from its natural source: the upstream document for
    /// design and tasks, all three documents for verify, the saved transcript
    /// or the current document for requirements.
    ///
    /// # Errors
    ///
    /// `MissingPrerequisite` when the source is absent, plus everything
    /// [`Controller::generate`] returns.
    pub async fn generate_stage(&self, stage: Stage) -> Result<String, PipelineError> {
        let upstream = match stage {
            Stage::Requirements => return self.generate_requirements().await,
            Stage::Verify => return self.generate_verify().await,
            Stage::Design | Stage::Tasks => stage.upstream().unwrap_or(Stage::Requirements),
        };
        let spec = self.require_spec()?;
        let Some(source) = self.content(upstream) else {
            return Err(self.fail(PipelineError::missing_upstream(upstream)));
        };
        self.generate(stage, &source, &spec).await
    }

    /// Generates the verification report from the three upstream documents.
    ///
    /// # Errors
    ///
    /// `MissingPrerequisite` unless requirements, design and tasks all exist.
    pub async fn generate_verify(&self) -> Result<String, PipelineError> {
        let spec = self.require_spec()?;
        let (Some(requirements), Some(design), Some(tasks)) = (
            self.content(Stage::Requirements),
            self.content(Stage::Design),
            self.content(Stage::Tasks),
        ) else {
            return Err(self.fail(PipelineError::MissingPrerequisite(
                "Verification requires Requirements, Design, and Tasks to all be complete.".into(),
            )));
        };
        let prompt = build_verification_prompt(&requirements, &design, &tasks);
        self.generate(Stage::Verify, &prompt, &spec).await
    }

    /// Regenerates requirements from the saved transcript context, or from
    /// the current requirements document when there is none.
    ///
    /// # Errors
    ///
    /// `MissingPrerequisite` when neither source exists.
    pub async fn generate_requirements(&self) -> Result<String, PipelineError> {
        let spec = self.require_spec()?;
        let material = match self
            .store
            .read_transcript(&spec)
            .filter(|t| !t.extracted_description.trim().is_empty())
        {
            Some(t) if t.transcript.is_empty() => t.extracted_description,
            Some(t) => transcript_requirements_prompt(&t.extracted_description, &t.transcript),
            None => match self.content(Stage::Requirements) {
                Some(existing) => existing,
                None => {
                    return Err(self.fail(PipelineError::MissingPrerequisite(
                        "No source material to regenerate requirements. Use refine instead."
                            .into(),
                    )))
                }
            },
        };
        self.generate(Stage::Requirements, &material, &spec).await
    }

    /// Applies free-form feedback to a stage document.
    ///
    /// Returns `Ok(None)` without doing anything when no spec is open, the
    /// feedback is blank, or the stage has no document.
    ///
    /// # Errors
    ///
    /// `Busy` (checked before the history is touched), stream failures, and
    /// `Backend` for a blank response, which never overwrites the document.
    pub async fn refine(
        &self,
        stage: Stage,
        feedback: &str,
    ) -> Result<Option<Refinement>, PipelineError> {
        let feedback = feedback.trim();
        let Some(spec) = self.active_spec() else {
            return Ok(None);
        };
        let Some(document) = self.content(stage).filter(|_| !feedback.is_empty()) else {
            return Ok(None);
        };
        let (token, _flight) = self.begin_flight()?;

        let history = {
            let mut state = self.lock();
            let history = state.serialized_history(stage);
            state.push_history(stage, ChatRole::User, feedback);
            history
        };
        self.sink.emit(PipelineEvent::ChatEntry {
            stage,
            role: ChatRole::User,
            text: feedback.to_string(),
        });

        let prompt = build_refinement_prompt(stage, &document, feedback, history.as_deref());
        tracing::info!(spec = %spec, %stage, "refining");
        self.sink.emit(PipelineEvent::StreamStart { stage, refine: true });
        let response =
            self.stream(stage, self.request(REFINE_SYSTEM.to_string(), prompt), token, true).await?;

        let Some(refinement) = Refinement::classify(&response) else {
            return Err(self.fail(PipelineError::Backend(
                "the model returned an empty response; the document was not changed".into(),
            )));
        };
        match &refinement {
            Refinement::Inquiry { answer } => {
                self.lock().push_history(stage, ChatRole::Assistant, answer);
                self.sink.emit(PipelineEvent::InquiryDone { stage, answer: answer.clone() });
            }
            Refinement::Revision { document } => {
                self.commit(&spec, stage, document)?;
                self.lock().push_history(stage, ChatRole::Assistant, REVISION_ACK);
                self.sink.emit(PipelineEvent::StreamDone { stage, content: document.clone() });
            }
        }
        Ok(Some(refinement))
    }

    /// Flips the completion state of one task of the open spec.
    ///
    /// Returns `Ok(None)` when no spec is open or it has no tasks document.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `id` names no checklist line, `Storage` when the
    /// progress record cannot be written.
    pub fn toggle_task(&self, id: &str) -> Result<Option<Progress>, PipelineError> {
        let Some(spec) = self.active_spec() else {
            return Ok(None);
        };
        let Some(document) = self.content(Stage::Tasks) else {
            return Ok(None);
        };
        if !parse_checklist(&document).iter().any(|item| item.id == id) {
            return Err(self.fail(PipelineError::InvalidInput(format!("No task with id \"{id}\""))));
        }

        let mut progress = sync_progress(self.store.read_progress(&spec).as_ref(), &document);
        progress.toggle(id);
        self.store
            .write_progress(&spec, &progress)
            .map_err(|e| self.fail(PipelineError::Storage(e)))?;
        self.sink.emit(PipelineEvent::ProgressUpdated { progress: progress.clone() });
        Ok(Some(progress))
    }

    /// Regenerates every stage from `start` through verify.
    ///
    /// Requirements is skipped. The loop stops at the first failing step and
    /// never rolls back stages already committed.
    ///
    /// # Errors
    ///
    /// `NoActiveSpec` when no spec is open; step failures are reported in the
    /// returned [`CascadeReport`].
    pub async fn cascade(&self, start: Stage) -> Result<CascadeReport, PipelineError> {
        let spec = self.require_spec()?;
        let mut report = CascadeReport::default();
        for stage in start.through_end() {
            let step = match stage {
                Stage::Requirements => continue,
                Stage::Verify => self.generate_verify().await,
                Stage::Design | Stage::Tasks => self.generate_stage(stage).await,
            };
            if let Err(e) = step {
                tracing::info!(spec = %spec, %stage, error = %e, "cascade halted");
                report.halted = Some(e);
                break;
            }
            report.completed.push(stage);
            if self.is_generating() {
                report.halted = Some(PipelineError::Busy);
                break;
            }
        }
        Ok(report)
    }
}
