//! Per-spec configuration persisted next to the stage documents.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Acceptance-criteria style used by the Requirements prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementsFormat {
    /// `Given … When … Then …` scenarios.
    #[default]
    GivenWhenThen,
    /// Easy Approach to Requirements Syntax (`WHEN … THE SYSTEM SHALL …`).
    Ears,
}

impl RequirementsFormat {
    /// Kebab-case identifier, as stored on disk.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequirementsFormat::GivenWhenThen => "given-when-then",
            RequirementsFormat::Ears => "ears",
        }
    }
}

impl fmt::Display for RequirementsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementsFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "given-when-then" | "gwt" => Ok(RequirementsFormat::GivenWhenThen),
            "ears" => Ok(RequirementsFormat::Ears),
            other => Err(format!("unknown requirements format '{other}'")),
        }
    }
}

/// How a new spec enters the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    /// Start from a feature description and generate requirements first.
    #[default]
    RequirementsFirst,
    /// Start from a technical description and generate the design first.
    DesignFirst,
    /// Requirements document framed as a bug report and fix criteria.
    Bugfix,
}

/// Settings stored in `.config.json` inside each spec folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecConfig {
    /// Generation mode chosen at creation.
    #[serde(default)]
    pub generation_mode: GenerationMode,
    /// Preferred requirements style.
    #[serde(default)]
    pub requirements_format: RequirementsFormat,
    /// Ask for a shorter design document.
    #[serde(default)]
    pub light_design: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SpecConfig {
    /// Creates a config with defaults for the given mode.
    #[must_use]
    pub fn new(generation_mode: GenerationMode, created_at: DateTime<Utc>) -> Self {
        Self {
            generation_mode,
            requirements_format: RequirementsFormat::default(),
            light_design: false,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kebab_case_values() {
        let created_at = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z").unwrap().to_utc();
        let mut config = SpecConfig::new(GenerationMode::DesignFirst, created_at);
        config.requirements_format = RequirementsFormat::Ears;

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["generationMode"], "design-first");
        assert_eq!(json["requirementsFormat"], "ears");
        assert_eq!(json["lightDesign"], false);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SpecConfig =
            serde_json::from_str(r#"{"createdAt":"2025-01-02T03:04:05Z"}"#).unwrap();
        assert_eq!(config.generation_mode, GenerationMode::RequirementsFirst);
        assert_eq!(config.requirements_format, RequirementsFormat::GivenWhenThen);
    }

    #[test]
    fn parses_format_aliases() {
        assert_eq!("GWT".parse::<RequirementsFormat>(), Ok(RequirementsFormat::GivenWhenThen));
        assert!("prose".parse::<RequirementsFormat>().is_err());
    }
}
