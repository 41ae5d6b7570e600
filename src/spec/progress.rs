//! Checklist parsing, stable task identity and completion tracking.
//!
//! A task's identity is derived from its label and its position among the
//! checklist lines of the Tasks document. Both [`sync_progress`] and
//! [`render_checklist`] go through [`parse_checklist`], so the ids written to
//! the progress record and the ids shown next to rendered checkboxes always
//! agree.
//!
//! Reordering or relabelling a line changes its id; completion state for that
//! line then starts over from the literal marker in the document.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Number of label characters that contribute to a task id.
const ID_LABEL_CHARS: usize = 32;

static CHECKLIST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\s*)-\s+\[([ xX])\]\s+(.+?)(\s+\(([SMLX]+)\))?$")
        .expect("checklist pattern is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Derives the stable id for a checklist label at a given position.
///
/// The first 32 characters of the trimmed label are taken, whitespace runs are
/// collapsed to `_`, the result is lowercased and suffixed with `_<index>`.
#[must_use]
pub fn task_id(label: &str, index: usize) -> String {
    let head: String = label.trim().chars().take(ID_LABEL_CHARS).collect();
    let collapsed = WHITESPACE_RUN.replace_all(&head, "_");
    format!("{}_{index}", collapsed.to_lowercase())
}

/// A single `- [ ] label (S)` line from a Tasks document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Zero-based line number within the document.
    pub line: usize,
    /// Position among checklist lines only.
    pub index: usize,
    /// Stable id derived from label and index.
    pub id: String,
    /// Label text with surrounding whitespace removed.
    pub label: String,
    /// Literal marker state (`[x]`/`[X]` is checked).
    pub checked: bool,
    /// Optional effort annotation such as `S`, `M`, `XL`.
    pub size: Option<String>,
    /// Leading indentation, preserved on render.
    indent: String,
}

/// Parses every checklist line of a Tasks document, in order.
#[must_use]
pub fn parse_checklist(document: &str) -> Vec<ChecklistItem> {
    let mut items = Vec::new();
    for (line_no, line) in document.lines().enumerate() {
        let Some(caps) = CHECKLIST_LINE.captures(line) else {
            continue;
        };
        let label = caps[3].trim().to_string();
        let index = items.len();
        items.push(ChecklistItem {
            line: line_no,
            index,
            id: task_id(&label, index),
            checked: caps[2].eq_ignore_ascii_case("x"),
            size: caps.get(5).map(|m| m.as_str().to_string()),
            indent: caps[1].to_string(),
            label,
        });
    }
    items
}

/// Durable completion state for the Tasks document of one spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Number of completed tasks.
    pub done: usize,
    /// Number of checklist lines in the Tasks document at last sync.
    pub total: usize,
    /// Completion flag per stable task id.
    #[serde(default)]
    pub items: BTreeMap<String, bool>,
}

impl Progress {
    /// Whether the given task is complete, falling back to `literal` when the
    /// id has no durable entry.
    #[must_use]
    pub fn is_checked(&self, id: &str, literal: bool) -> bool {
        self.items.get(id).copied().unwrap_or(literal)
    }

    /// Flips the completion flag for `id` and recomputes `done`.
    ///
    /// An id with no entry is marked complete. `total` is left alone.
    pub fn toggle(&mut self, id: &str) {
        let entry = self.items.entry(id.to_string()).or_insert(false);
        *entry = !*entry;
        self.recount();
    }

    /// Completion as a whole percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.done as f64 / self.total as f64) * 100.0).round().min(100.0) as u8
    }

    fn recount(&mut self) {
        self.done = self.items.values().filter(|v| **v).count();
    }
}

/// Reconciles a Tasks document against the persisted completion map.
///
/// Each checklist line keeps its persisted state when one exists and is
/// otherwise seeded from its literal marker. Entries for ids that no longer
/// appear in the document are dropped, so `items` always describes exactly the
/// current checklist.
#[must_use]
pub fn sync_progress(persisted: Option<&Progress>, document: &str) -> Progress {
    let checklist = parse_checklist(document);
    let items: BTreeMap<String, bool> = checklist
        .iter()
        .map(|item| {
            let checked = persisted.map_or(item.checked, |p| p.is_checked(&item.id, item.checked));
            (item.id.clone(), checked)
        })
        .collect();

    let mut progress = Progress { done: 0, total: checklist.len(), items };
    progress.recount();
    progress
}

/// Rewrites the checklist markers of a Tasks document from the progress map.
///
/// Non-checklist lines pass through unchanged.
#[must_use]
pub fn render_checklist(document: &str, progress: Option<&Progress>) -> String {
    let checklist = parse_checklist(document);
    let mut by_line = checklist.iter().peekable();
    let mut out = Vec::new();

    for (line_no, line) in document.lines().enumerate() {
        match by_line.peek() {
            Some(item) if item.line == line_no => {
                let checked = progress.map_or(item.checked, |p| p.is_checked(&item.id, item.checked));
                let mark = if checked { 'x' } else { ' ' };
                let size = item.size.as_deref().map(|s| format!(" ({s})")).unwrap_or_default();
                out.push(format!("{}- [{mark}] {}{size}", item.indent, item.label));
                by_line.next();
            }
            _ => out.push(line.to_string()),
        }
    }

    let mut rendered = out.join("\n");
    if document.ends_with('\n') {
        rendered.push('\n');
    }
    rendered
}
