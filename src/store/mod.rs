//! Spec store: persistence layer for spec folders.
//!
//! All I/O goes through the `FileSystem` port. Directory layout:
//!
//! ```text
//! <root>/
//!   ├── _steering.md              shared steering notes (optional)
//!   └── <spec>/
//!         ├── requirements.md | design.md | tasks.md | verify.md
//!         ├── .config.json
//!         ├── _progress.json
//!         ├── _steering.md        per-spec steering (optional)
//!         ├── _vibe-context.json  transcript the spec was built from
//!         └── _prompts/
//!               ├── _role.md
//!               └── <stage>.md    full system prompt overrides
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::context::ServiceContext;
use crate::spec::{Progress, SpecConfig, SpecSummary};
use crate::stage::Stage;

const CONFIG_FILE: &str = ".config.json";
const PROGRESS_FILE: &str = "_progress.json";
const STEERING_FILE: &str = "_steering.md";
const TRANSCRIPT_FILE: &str = "_vibe-context.json";
const PROMPTS_DIR: &str = "_prompts";
const ROLE_FILE: &str = "_role.md";

/// Upper bound on the workspace context block, in characters.
pub const WORKSPACE_CONTEXT_LIMIT: usize = 4000;

/// The conversation a spec was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptContext {
    /// Transcript, already truncated for storage.
    pub transcript: String,
    /// Feature description extracted from it.
    pub extracted_description: String,
    /// When the extraction ran.
    pub generated_at: DateTime<Utc>,
}

/// Persistence layer for spec folders.
pub struct SpecStore<'a> {
    ctx: &'a ServiceContext,
    root: PathBuf,
    workspace: Option<PathBuf>,
    context_files: Vec<String>,
}

impl<'a> SpecStore<'a> {
    /// Creates a new store rooted at the given path.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, root: &Path) -> Self {
        Self { ctx, root: root.to_path_buf(), workspace: None, context_files: Vec::new() }
    }

    /// Enables workspace context built from `files` under `workspace`.
    #[must_use]
    pub fn with_workspace(mut self, workspace: &Path, files: &[String]) -> Self {
        self.workspace = Some(workspace.to_path_buf());
        self.context_files = files.to_vec();
        self
    }

    /// Folder of the named spec.
    #[must_use]
    pub fn spec_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether a spec folder with this name exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.ctx.fs.exists(&self.spec_dir(name))
    }

    /// Lists spec names, sorted. A folder counts as a spec once it holds a
    /// config file or any stage document.
    ///
    /// # Errors
    ///
    /// Returns an error if the root exists but cannot be listed.
    pub fn list_specs(&self) -> Result<Vec<String>, String> {
        if !self.ctx.fs.exists(&self.root) {
            return Ok(Vec::new());
        }
        let entries = self
            .ctx
            .fs
            .list_dir(&self.root)
            .map_err(|e| format!("Failed to list specs directory {}: {e}", self.root.display()))?;
        Ok(entries
            .into_iter()
            .filter(|name| !name.starts_with('_') && !name.starts_with('.'))
            .filter(|name| {
                let dir = self.spec_dir(name);
                self.ctx.fs.exists(&dir.join(CONFIG_FILE))
                    || Stage::ALL.iter().any(|s| self.ctx.fs.exists(&dir.join(s.file_name())))
            })
            .collect())
    }

    /// Creates the spec folder and writes its config.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder or config cannot be written.
    pub fn create_spec(&self, name: &str, config: &SpecConfig) -> Result<(), String> {
        self.ctx
            .fs
            .create_dir_all(&self.spec_dir(name))
            .map_err(|e| format!("Failed to create spec folder {name}: {e}"))?;
        self.write_config(name, config)
    }

    /// Loads every stage document and the persisted progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec does not exist or a document cannot be read.
    pub fn load_spec(&self, name: &str) -> Result<SpecSummary, String> {
        if !self.exists(name) {
            return Err(format!("No spec named \"{name}\""));
        }
        let mut stages = BTreeMap::new();
        for stage in Stage::ALL {
            if let Some(content) = self.read_stage(name, stage)? {
                stages.insert(stage, content);
            }
        }
        Ok(SpecSummary { name: name.to_string(), stages, progress: self.read_progress(name) })
    }

    /// Deletes the spec folder and everything in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec does not exist or removal fails.
    pub fn delete_spec(&self, name: &str) -> Result<(), String> {
        if !self.exists(name) {
            return Err(format!("No spec named \"{name}\""));
        }
        self.ctx
            .fs
            .remove_dir_all(&self.spec_dir(name))
            .map_err(|e| format!("Failed to delete spec {name}: {e}"))
    }

    /// Renames a spec folder. Fails without touching anything when the
    /// target already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing, the target exists, or the
    /// rename fails.
    pub fn rename_spec(&self, old: &str, new: &str) -> Result<(), String> {
        if !self.exists(old) {
            return Err(format!("No spec named \"{old}\""));
        }
        if self.exists(new) {
            return Err(format!("A spec named \"{new}\" already exists"));
        }
        self.ctx
            .fs
            .rename(&self.spec_dir(old), &self.spec_dir(new))
            .map_err(|e| format!("Failed to rename spec {old} to {new}: {e}"))
    }

    /// Reads a stage document; `None` if it was never written or is blank.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_stage(&self, name: &str, stage: Stage) -> Result<Option<String>, String> {
        let doc = self.read_optional(&self.spec_dir(name).join(stage.file_name()))?;
        Ok(doc.filter(|d| !d.trim().is_empty()))
    }

    /// Writes a stage document.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_stage(&self, name: &str, stage: Stage, content: &str) -> Result<(), String> {
        tracing::debug!(spec = name, %stage, bytes = content.len(), "writing stage");
        self.ctx
            .fs
            .write(&self.spec_dir(name).join(stage.file_name()), content)
            .map_err(|e| format!("Failed to write {stage} for {name}: {e}"))
    }

    /// Reads the spec config; `None` when missing or unreadable.
    #[must_use]
    pub fn read_config(&self, name: &str) -> Option<SpecConfig> {
        self.read_json(&self.spec_dir(name).join(CONFIG_FILE))
    }

    /// Writes the spec config.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_config(&self, name: &str, config: &SpecConfig) -> Result<(), String> {
        self.write_json(&self.spec_dir(name).join(CONFIG_FILE), config)
    }

    /// Reads the persisted progress; `None` when missing or unreadable.
    #[must_use]
    pub fn read_progress(&self, name: &str) -> Option<Progress> {
        self.read_json(&self.spec_dir(name).join(PROGRESS_FILE))
    }

    /// Writes the progress record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_progress(&self, name: &str, progress: &Progress) -> Result<(), String> {
        self.write_json(&self.spec_dir(name).join(PROGRESS_FILE), progress)
    }

    /// Full system prompt override for a stage, if present and non-blank.
    #[must_use]
    pub fn custom_prompt(&self, name: &str, stage: Stage) -> Option<String> {
        self.read_text(&self.prompts_dir(name).join(stage.file_name()))
    }

    /// Role override from `_prompts/_role.md`.
    #[must_use]
    pub fn role(&self, name: &str) -> Option<String> {
        self.read_text(&self.prompts_dir(name).join(ROLE_FILE))
    }

    /// Steering notes: the spec's own file, falling back to the shared one.
    #[must_use]
    pub fn steering(&self, name: &str) -> Option<String> {
        self.read_text(&self.spec_dir(name).join(STEERING_FILE))
            .or_else(|| self.read_text(&self.root.join(STEERING_FILE)))
    }

    /// Seeds `_prompts/<stage>.md` with `render(stage)` for every stage that
    /// has no override yet. Returns the stages written.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn scaffold_prompts(
        &self,
        name: &str,
        render: impl Fn(Stage) -> String,
    ) -> Result<Vec<Stage>, String> {
        let dir = self.prompts_dir(name);
        self.ctx
            .fs
            .create_dir_all(&dir)
            .map_err(|e| format!("Failed to create {}: {e}", dir.display()))?;
        let mut written = Vec::new();
        for stage in Stage::ALL {
            let path = dir.join(stage.file_name());
            if self.ctx.fs.exists(&path) {
                continue;
            }
            self.ctx
                .fs
                .write(&path, &render(stage))
                .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
            written.push(stage);
        }
        Ok(written)
    }

    /// Transcript context the spec was created from.
    #[must_use]
    pub fn read_transcript(&self, name: &str) -> Option<TranscriptContext> {
        self.read_json(&self.spec_dir(name).join(TRANSCRIPT_FILE))
    }

    /// Stores the transcript context.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_transcript(&self, name: &str, context: &TranscriptContext) -> Result<(), String> {
        self.write_json(&self.spec_dir(name).join(TRANSCRIPT_FILE), context)
    }

    /// Summary of the configured workspace files, capped at
    /// [`WORKSPACE_CONTEXT_LIMIT`] characters. `None` when no file is found.
    #[must_use]
    pub fn workspace_context(&self) -> Option<String> {
        let workspace = self.workspace.as_ref()?;
        let mut block = String::from("## Workspace Context\n");
        let mut included = 0;
        for file in &self.context_files {
            let Some(content) = self.read_text(&workspace.join(file)) else {
                continue;
            };
            let _ = write!(block, "\n### {file}\n\n```\n{}\n```\n", content.trim_end());
            included += 1;
        }
        if included == 0 {
            return None;
        }
        if let Some((cut, _)) = block.char_indices().nth(WORKSPACE_CONTEXT_LIMIT) {
            block.truncate(cut);
            block.push_str("\n[...truncated]\n");
        }
        Some(block)
    }

    fn prompts_dir(&self, name: &str) -> PathBuf {
        self.spec_dir(name).join(PROMPTS_DIR)
    }

    fn read_optional(&self, path: &Path) -> Result<Option<String>, String> {
        if !self.ctx.fs.exists(path) {
            return Ok(None);
        }
        self.ctx
            .fs
            .read_to_string(path)
            .map(Some)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))
    }

    fn read_text(&self, path: &Path) -> Option<String> {
        match self.read_optional(path) {
            Ok(text) => text.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable file");
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let raw = self.read_text(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!(path = %path.display(), error = %e, "ignoring malformed JSON"))
            .ok()
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), String> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| format!("Failed to serialize {}: {e}", path.display()))?;
        self.ctx
            .fs
            .write(path, &json)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))
    }
}
