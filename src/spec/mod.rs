//! Spec domain types.
//!
//! A spec is a named folder holding one markdown document per [`Stage`],
//! a [`SpecConfig`] and, once the Tasks stage exists, a [`Progress`] record.

mod config;
mod health;
pub mod progress;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use config::{GenerationMode, RequirementsFormat, SpecConfig};
pub use health::{health_score, HealthBand, HealthScore};
pub use progress::{parse_checklist, render_checklist, sync_progress, task_id, ChecklistItem, Progress};

use crate::stage::Stage;

/// Snapshot of a spec as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecSummary {
    /// Folder name, which is also the spec's identifier.
    pub name: String,
    /// Documents that exist, keyed by stage.
    pub stages: BTreeMap<Stage, String>,
    /// Persisted progress, if any.
    pub progress: Option<Progress>,
}

impl SpecSummary {
    /// Whether the given stage has a document.
    #[must_use]
    pub fn has(&self, stage: Stage) -> bool {
        self.stages.contains_key(&stage)
    }

    /// The furthest stage with a document, or `requirements` for an empty spec.
    #[must_use]
    pub fn furthest_stage(&self) -> Stage {
        Stage::ALL.into_iter().rev().find(|s| self.has(*s)).unwrap_or(Stage::Requirements)
    }
}

/// Normalizes a display name into a spec folder name.
///
/// Lowercases, replaces every run of non-alphanumeric characters with a single
/// `-` and trims dashes from both ends.
#[must_use]
pub fn to_folder_name(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    let mut pending_dash = false;
    for ch in display_name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names_are_kebab_case() {
        assert_eq!(to_folder_name("  Auth Feature: v2!  "), "auth-feature-v2");
        assert_eq!(to_folder_name("already-kebab"), "already-kebab");
        assert_eq!(to_folder_name("???"), "");
    }

    #[test]
    fn furthest_stage_skips_gaps() {
        let mut stages = BTreeMap::new();
        stages.insert(Stage::Requirements, "r".to_string());
        stages.insert(Stage::Tasks, "t".to_string());
        let summary = SpecSummary { name: "x".into(), stages, progress: None };
        assert_eq!(summary.furthest_stage(), Stage::Tasks);
    }
}
