//! Spec lifecycle operations: create, open, save, import, delete, rename.

use std::path::Path;

use super::controller::Controller;
use super::events::PipelineEvent;
use crate::error::PipelineError;
use crate::prompts::{
    build_import_prompt, build_transcript_prompt, transcript_requirements_prompt,
    truncate_transcript, TRANSCRIPT_TO_SPEC_SYSTEM,
};
use crate::spec::{sync_progress, to_folder_name, GenerationMode, RequirementsFormat, SpecConfig, SpecSummary};
use crate::stage::Stage;
use crate::store::TranscriptContext;

const NAME_REQUIRED: &str = "Enter a spec name.";
const DESCRIPTION_REQUIRED: &str =
    "Enter a feature description or a Jira user story URL (user stories only).";

impl Controller<'_> {
    fn storage(&self, message: String) -> PipelineError {
        self.fail(PipelineError::Storage(message))
    }

    fn invalid(&self, message: impl Into<String>) -> PipelineError {
        self.fail(PipelineError::InvalidInput(message.into()))
    }

    /// Folder names of every spec under the root.
    ///
    /// # Errors
    ///
    /// `Storage` when the root cannot be listed.
    pub fn list_specs(&self) -> Result<Vec<String>, PipelineError> {
        self.store.list_specs().map_err(|e| self.storage(e))
    }

    /// Creates the folder for `display_name` and makes it active with no
    /// documents. Returns the folder name.
    fn start_spec(
        &self,
        display_name: &str,
        mode: GenerationMode,
        light_design: bool,
    ) -> Result<String, PipelineError> {
        let folder = to_folder_name(display_name);
        if folder.is_empty() {
            return Err(self.invalid(NAME_REQUIRED));
        }
        if self.store.exists(&folder) {
            return Err(self.invalid(format!("A spec named \"{folder}\" already exists.")));
        }

        let mut config = SpecConfig::new(mode, self.ctx.clock.now());
        config.light_design = light_design;
        self.store.create_spec(&folder, &config).map_err(|e| self.storage(e))?;

        let first = if mode == GenerationMode::DesignFirst { Stage::Design } else { Stage::Requirements };
        self.lock().activate(&folder, Default::default(), first);
        tracing::info!(spec = %folder, ?mode, "spec created");
        self.sink.emit(PipelineEvent::SpecCreated { spec: folder.clone(), stage: first });
        Ok(folder)
    }

    /// Creates a spec and immediately generates its first stage from
    /// `description`: design for design-first specs, requirements otherwise.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank name or description or a name already in
    /// use, `Busy` while generating, plus any generation failure. The folder
    /// stays in place when generation fails.
    pub async fn create_spec(
        &self,
        display_name: &str,
        description: &str,
        mode: GenerationMode,
        light_design: bool,
    ) -> Result<String, PipelineError> {
        let display_name = display_name.trim();
        let description = description.trim();
        if display_name.is_empty() {
            return Err(self.invalid(NAME_REQUIRED));
        }
        if description.is_empty() {
            return Err(self.invalid(DESCRIPTION_REQUIRED));
        }
        self.ensure_idle()?;

        let folder = self.start_spec(display_name, mode, light_design)?;
        let first = self.active_stage();
        self.generate(first, description, display_name).await?;
        Ok(folder)
    }

    /// Creates a spec from a conversation transcript.
    ///
    /// The backend first extracts a feature description; that description and
    /// the transcript (truncated) are stored as the spec's transcript
    /// context, then requirements are generated from both.
    ///
    /// # Errors
    ///
    /// As [`Controller::create_spec`], plus `Backend` when the extraction
    /// comes back blank.
    pub async fn create_from_transcript(
        &self,
        display_name: &str,
        transcript: &str,
    ) -> Result<String, PipelineError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(self.invalid(NAME_REQUIRED));
        }
        if transcript.trim().is_empty() {
            return Err(self.invalid("Paste a conversation transcript."));
        }
        self.ensure_idle()?;

        let folder = self.start_spec(display_name, GenerationMode::RequirementsFirst, false)?;
        let extracted = self.collect(TRANSCRIPT_TO_SPEC_SYSTEM, build_transcript_prompt(transcript)).await?;
        let description = extracted.trim();
        if description.is_empty() {
            return Err(self.fail(PipelineError::Backend(
                "could not extract a feature description from the transcript".into(),
            )));
        }

        let context = TranscriptContext {
            transcript: truncate_transcript(transcript),
            extracted_description: description.to_string(),
            generated_at: self.ctx.clock.now(),
        };
        self.store.write_transcript(&folder, &context).map_err(|e| self.storage(e))?;

        let material = transcript_requirements_prompt(description, transcript);
        self.generate(Stage::Requirements, &material, display_name).await?;
        Ok(folder)
    }

    /// Makes an existing spec active.
    ///
    /// Loads every stage document, re-syncs progress against the tasks
    /// document and selects the furthest stage that has content. Chat
    /// history starts empty.
    ///
    /// # Errors
    ///
    /// `Busy` while generating, `Storage` when the spec cannot be read.
    pub fn open_spec(&self, name: &str) -> Result<SpecSummary, PipelineError> {
        self.ensure_idle()?;
        let mut summary = self.store.load_spec(name).map_err(|e| self.storage(e))?;
        if let Some(tasks) = summary.stages.get(&Stage::Tasks) {
            let progress = sync_progress(summary.progress.as_ref(), tasks);
            self.store.write_progress(name, &progress).map_err(|e| self.storage(e))?;
            summary.progress = Some(progress);
        }

        let stage = summary.furthest_stage();
        self.lock().activate(name, summary.stages.clone(), stage);
        tracing::debug!(spec = %name, %stage, "spec opened");
        self.sink.emit(PipelineEvent::SpecOpened {
            spec: name.to_string(),
            stage,
            progress: summary.progress.clone(),
        });
        Ok(summary)
    }

    /// Writes manually edited content for `stage` of the open spec.
    ///
    /// # Errors
    ///
    /// `NoActiveSpec`, `Busy` while generating, `Storage` on write failure.
    pub fn save_content(&self, stage: Stage, content: &str) -> Result<(), PipelineError> {
        let spec = self.require_spec()?;
        self.ensure_idle()?;
        self.commit(&spec, stage, content)?;
        self.sink.emit(PipelineEvent::Saved { stage });
        Ok(())
    }

    /// Imports a file into `stage`, either verbatim or converted by the
    /// backend into the stage's format. Returns the committed document.
    ///
    /// # Errors
    ///
    /// `ImportValidation` when the file cannot be read or is empty, plus
    /// whatever saving or generating returns.
    pub async fn import_file(
        &self,
        stage: Stage,
        path: &Path,
        transform: bool,
    ) -> Result<String, PipelineError> {
        let spec = self.require_spec()?;
        let content = self.ctx.fs.read_to_string(path).map_err(|e| {
            self.fail(PipelineError::ImportValidation(format!(
                "Could not read {}: {e}",
                path.display()
            )))
        })?;
        if content.trim().is_empty() {
            return Err(self.fail(PipelineError::ImportValidation("The selected file is empty.".into())));
        }

        if !transform {
            self.save_content(stage, &content)?;
            return Ok(content);
        }
        self.generate_with(stage, build_import_prompt(stage, &content), &spec, false).await
    }

    /// Deletes a spec folder, resetting the session when it was active.
    ///
    /// # Errors
    ///
    /// `Busy` while generating, `Storage` when the folder cannot be removed.
    pub fn delete_spec(&self, name: &str) -> Result<(), PipelineError> {
        self.ensure_idle()?;
        self.store.delete_spec(name).map_err(|e| self.storage(e))?;
        {
            let mut state = self.lock();
            if state.active_spec.as_deref() == Some(name) {
                state.reset();
            }
        }
        self.sink.emit(PipelineEvent::SpecDeleted { spec: name.to_string() });
        Ok(())
    }

    /// Renames a spec folder to the normalized form of `new_name`. Returns
    /// the new folder name.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank name or a target that already exists,
    /// `Storage` for other failures.
    pub fn rename_spec(&self, old: &str, new_name: &str) -> Result<String, PipelineError> {
        self.ensure_idle()?;
        let new = to_folder_name(new_name);
        if new.is_empty() {
            return Err(self.invalid(NAME_REQUIRED));
        }
        if let Err(e) = self.store.rename_spec(old, &new) {
            if self.store.exists(&new) {
                return Err(self.invalid(format!(
                    "Could not rename spec. A spec named \"{new}\" may already exist."
                )));
            }
            return Err(self.storage(e));
        }
        {
            let mut state = self.lock();
            if state.active_spec.as_deref() == Some(old) {
                state.active_spec = Some(new.clone());
            }
        }
        self.sink.emit(PipelineEvent::SpecRenamed { old: old.to_string(), new: new.clone() });
        Ok(new)
    }

    /// Switches the requirements style of the open spec.
    ///
    /// # Errors
    ///
    /// `NoActiveSpec`, `Storage` on write failure.
    pub fn set_requirements_format(&self, format: RequirementsFormat) -> Result<(), PipelineError> {
        let spec = self.require_spec()?;
        let mut config = self
            .store
            .read_config(&spec)
            .unwrap_or_else(|| SpecConfig::new(GenerationMode::default(), self.ctx.clock.now()));
        config.requirements_format = format;
        self.store.write_config(&spec, &config).map_err(|e| self.storage(e))?;
        self.sink.emit(PipelineEvent::RequirementsFormatChanged { format });
        Ok(())
    }

    /// Seeds `_prompts/<stage>.md` for the open spec from the built-in
    /// prompts, keeping a `{title}` placeholder. Existing files are left
    /// alone. Returns the stages written.
    ///
    /// # Errors
    ///
    /// `NoActiveSpec`, `Storage` on write failure.
    pub fn scaffold_prompts(&self) -> Result<Vec<Stage>, PipelineError> {
        let spec = self.require_spec()?;
        let written = self
            .store
            .scaffold_prompts(&spec, |stage| self.builtin_prompt(&spec, stage, "{title}"))
            .map_err(|e| self.storage(e))?;
        self.sink.emit(PipelineEvent::PromptsScaffolded { spec });
        Ok(written)
    }
}
