//! Application configuration: `nspec.toml`, `.env`, then `NSPEC_*` overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ports::TrackerCredentials;

/// Name of the optional workspace config file.
pub const CONFIG_FILE: &str = "nspec.toml";

/// Model used when neither the config file nor the environment names one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`AppConfig`].
    #[error("Failed to parse TOML config file {path}: {message}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
    /// A value is out of range.
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting name.
        key: String,
        /// What is wrong with it.
        value: String,
    },
}

/// Resolved configuration for one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Specs root, relative to the workspace unless absolute.
    pub specs_dir: PathBuf,
    /// Model identifier passed to the generation backend.
    pub model: String,
    /// Token ceiling for each completion.
    pub max_tokens: u32,
    /// Workspace files summarized into design and tasks prompts.
    pub context_files: Vec<String>,
    /// Jira REST credentials.
    pub jira: TrackerCredentials,
    /// TOML file whose `mcpServers` table is probed for a Rovo server.
    pub rovo_mcp_config_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from(".specs"),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 8192,
            context_files: vec!["README.md".into(), "Cargo.toml".into(), "package.json".into()],
            jira: TrackerCredentials::default(),
            rovo_mcp_config_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration for `workspace`.
    ///
    /// Reads `<workspace>/.env` into the process environment if present, then
    /// `<workspace>/nspec.toml`, then applies `NSPEC_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or a
    /// value fails validation.
    pub fn load(workspace: &Path) -> Result<Self, ConfigError> {
        let env_file = workspace.join(".env");
        if env_file.is_file() {
            if let Err(e) = dotenvy::from_path(&env_file) {
                tracing::warn!(path = %env_file.display(), error = %e, "ignoring unreadable .env");
            }
        }

        let mut config = Self::from_file(&workspace.join(CONFIG_FILE))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// Apply `NSPEC_*` overrides read through `lookup`.
    ///
    /// Taking the lookup as a closure keeps tests off the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `NSPEC_MAX_TOKENS` is not a number.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = set("NSPEC_SPECS_DIR") {
            self.specs_dir = PathBuf::from(dir);
        }
        if let Some(model) = set("NSPEC_MODEL") {
            self.model = model;
        }
        if let Some(raw) = set("NSPEC_MAX_TOKENS") {
            self.max_tokens = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "NSPEC_MAX_TOKENS".into(),
                value: format!("{raw:?} is not a positive integer"),
            })?;
        }
        if let Some(url) = set("NSPEC_JIRA_BASE_URL") {
            self.jira.base_url = Some(url);
        }
        if let Some(email) = set("NSPEC_JIRA_EMAIL") {
            self.jira.email = Some(email);
        }
        if let Some(token) = set("NSPEC_JIRA_API_TOKEN") {
            self.jira.api_token = Some(token);
        }
        if let Some(path) = set("NSPEC_ROVO_MCP_CONFIG") {
            self.rovo_mcp_config_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_tokens".into(),
                value: "must be greater than 0".into(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "model".into(),
                value: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Absolute specs root for `workspace`.
    #[must_use]
    pub fn specs_root(&self, workspace: &Path) -> PathBuf {
        if self.specs_dir.is_absolute() {
            self.specs_dir.clone()
        } else {
            workspace.join(&self.specs_dir)
        }
    }
}
