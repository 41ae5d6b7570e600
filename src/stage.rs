//! Pipeline stages and their fixed ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One step of the document pipeline.
///
/// The derived `Ord` follows declaration order, which is the pipeline order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Requirements document; needs seed material and has no upstream stage.
    #[default]
    Requirements,
    /// Design document, generated from requirements.
    Design,
    /// Checklist of implementation tasks, generated from design.
    Tasks,
    /// Verification report over the three preceding documents.
    Verify,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 4] = [Stage::Requirements, Stage::Design, Stage::Tasks, Stage::Verify];

    /// Lowercase identifier used in file names and events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Requirements => "requirements",
            Stage::Design => "design",
            Stage::Tasks => "tasks",
            Stage::Verify => "verify",
        }
    }

    /// Human-readable title.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Stage::Requirements => "Requirements",
            Stage::Design => "Design",
            Stage::Tasks => "Tasks",
            Stage::Verify => "Verify",
        }
    }

    /// Name of the markdown file holding this stage's document.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.md", self.as_str())
    }

    /// The stage whose document feeds this one, if any.
    #[must_use]
    pub fn upstream(self) -> Option<Stage> {
        match self {
            Stage::Requirements => None,
            Stage::Design => Some(Stage::Requirements),
            Stage::Tasks => Some(Stage::Design),
            Stage::Verify => Some(Stage::Tasks),
        }
    }

    /// Stages from `self` through the terminal stage, inclusive.
    pub fn through_end(self) -> impl Iterator<Item = Stage> {
        Self::ALL.into_iter().filter(move |s| *s >= self)
    }

    /// Whether generation for this stage receives workspace context.
    #[must_use]
    pub fn wants_workspace_context(self) -> bool {
        matches!(self, Stage::Design | Stage::Tasks)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requirements" => Ok(Stage::Requirements),
            "design" => Ok(Stage::Design),
            "tasks" => Ok(Stage::Tasks),
            "verify" => Ok(Stage::Verify),
            other => Err(format!(
                "unknown stage '{other}' (expected requirements, design, tasks or verify)"
            )),
        }
    }
}
