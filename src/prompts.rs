//! System and user prompts for every pipeline stage.

use std::fmt::Write as _;

use crate::spec::{GenerationMode, RequirementsFormat};
use crate::stage::Stage;

/// Wire marker a refinement response starts with when it answers a question
/// instead of revising the document.
pub const INQUIRY_SENTINEL: &str = "<!-- INQUIRY -->";

/// Maximum transcript length kept as spec context.
pub const TRANSCRIPT_LIMIT: usize = 10_000;

const TRUNCATION_MARKER: &str = "\n\n[...truncated]";

const DEFAULT_ROLE: &str =
    "You are a senior software engineer and technical writer producing a feature specification.";

/// Everything a built-in system prompt is parameterized by.
#[derive(Debug, Clone, Default)]
pub struct PromptContext<'a> {
    /// Spec display title.
    pub title: &'a str,
    /// Replacement for the default role line (`_role.md`).
    pub role: Option<&'a str>,
    /// Project steering notes (`_steering.md`).
    pub steering: Option<&'a str>,
    /// Acceptance-criteria style for the Requirements stage.
    pub requirements_format: RequirementsFormat,
    /// Ask for a compact design document.
    pub light_design: bool,
    /// How the spec was created.
    pub mode: GenerationMode,
}

/// Builds the built-in system prompt for `stage`.
#[must_use]
pub fn build_system_prompt(stage: Stage, ctx: &PromptContext<'_>) -> String {
    let mut prompt = String::new();
    prompt.push_str(ctx.role.map_or(DEFAULT_ROLE, str::trim));
    let _ = write!(prompt, "\n\nThe feature is titled \"{}\".\n\n", ctx.title);

    match stage {
        Stage::Requirements if ctx.mode == GenerationMode::Bugfix => push_bugfix(&mut prompt),
        Stage::Requirements => push_requirements(&mut prompt, ctx.requirements_format),
        Stage::Design if ctx.light_design => push_light_design(&mut prompt),
        Stage::Design => push_design(&mut prompt, ctx.mode),
        Stage::Tasks => push_tasks(&mut prompt),
        Stage::Verify => push_verify(&mut prompt),
    }

    if let Some(steering) = ctx.steering.map(str::trim).filter(|s| !s.is_empty()) {
        let _ = write!(prompt, "\n## Project Steering\n\nFollow these project conventions:\n\n{steering}\n");
    }

    prompt.push_str(
        "\nRespond with the markdown document only. Do not wrap it in code fences and do not \
         add commentary before or after it.\n",
    );
    prompt
}

fn push_requirements(prompt: &mut String, format: RequirementsFormat) {
    prompt.push_str(
        "Write a Requirements document.\n\n\
         Structure:\n\
         # Requirements: <title>\n\
         ## Overview\n\
         ## User Stories\n\
         For each story: `### <n>. <short name>`, the story as \
         \"As a <role>, I want <capability>, so that <benefit>.\", then its acceptance criteria.\n\
         ## Non-Functional Requirements\n\
         ## Out of Scope\n\n",
    );
    match format {
        RequirementsFormat::GivenWhenThen => prompt.push_str(
            "Write every acceptance criterion as a Given/When/Then scenario:\n\
             - **Given** <precondition> **When** <action> **Then** <observable outcome>\n",
        ),
        RequirementsFormat::Ears => prompt.push_str(
            "Write every acceptance criterion in EARS notation, choosing the matching pattern:\n\
             - Ubiquitous: THE SYSTEM SHALL <response>\n\
             - Event-driven: WHEN <trigger> THE SYSTEM SHALL <response>\n\
             - State-driven: WHILE <state> THE SYSTEM SHALL <response>\n\
             - Unwanted behavior: IF <condition> THEN THE SYSTEM SHALL <response>\n\
             - Optional feature: WHERE <feature is included> THE SYSTEM SHALL <response>\n",
        ),
    }
}

fn push_bugfix(prompt: &mut String) {
    prompt.push_str(
        "Write a Bug Report and Fix Requirements document.\n\n\
         Structure:\n\
         # Bugfix: <title>\n\
         ## Current Behavior\n\
         ## Expected Behavior\n\
         ## Steps to Reproduce\n\
         ## Root Cause Hypotheses\n\
         ## Fix Acceptance Criteria\n\
         Each criterion must be checkable: **Given** <state> **When** <action> **Then** <outcome>.\n\
         ## Regression Risks\n",
    );
}

fn push_design(prompt: &mut String, mode: GenerationMode) {
    if mode == GenerationMode::DesignFirst {
        prompt.push_str(
            "Write a technical Design document directly from the description below; no \
             requirements document exists yet, so state the goals you infer.\n\n",
        );
    } else {
        prompt.push_str("Write a technical Design document that satisfies the requirements below.\n\n");
    }
    prompt.push_str(
        "Structure:\n\
         # Design: <title>\n\
         ## Overview\n\
         ## Architecture\n\
         ## Components and Interfaces\n\
         ## Data Models\n\
         ## Error Handling\n\
         ## Testing Strategy\n\
         ## Open Questions\n\n\
         Reference requirement numbers where a component satisfies them. Prefer concrete \
         names (modules, types, endpoints) drawn from the workspace context when it is given.\n",
    );
}

fn push_light_design(prompt: &mut String) {
    prompt.push_str(
        "Write a concise Design document of at most one page.\n\n\
         Structure:\n\
         # Design: <title>\n\
         ## Approach\n\
         ## Key Components\n\
         ## Data Changes\n\
         ## Risks\n",
    );
}

fn push_tasks(prompt: &mut String) {
    prompt.push_str(
        "Write an implementation Tasks checklist from the design below.\n\n\
         Structure:\n\
         # Tasks: <title>\n\
         Group tasks under `## <phase>` headings in implementation order.\n\n\
         Every task is exactly one markdown checklist line:\n\
         - [ ] <imperative task description> (S|M|L)\n\n\
         The trailing size is S (under an hour), M (half a day) or L (a day or more). Use \
         two-space indentation for subtasks. Do not put anything else on a checklist line and \
         do not number the tasks.\n",
    );
}

fn push_verify(prompt: &mut String) {
    prompt.push_str(
        "Audit the Requirements, Design and Tasks documents below for consistency and \
         completeness, and write a Verification report.\n\n\
         Structure:\n\
         # Verification: <title>\n\
         ## Spec Health Score: <0-100>\n\
         One sentence verdict on the line after the score.\n\
         ## Coverage Matrix\n\
         A table mapping each requirement to the design sections and tasks that cover it.\n\
         ## Gaps\n\
         ## Inconsistencies\n\
         ## Recommendations\n",
    );
}

/// System prompt for refinement turns.
pub const REFINE_SYSTEM: &str = "You are editing one document of a feature specification \
together with its author.\n\n\
Decide what the user's latest message is:\n\
- A QUESTION about the document (asking why, what, how, or for an explanation): answer it. \
Your reply MUST start with the exact line <!-- INQUIRY --> followed by the answer in markdown. \
Do not reproduce the document.\n\
- A CHANGE REQUEST: reply with the complete revised document and nothing else. Keep the \
existing structure and every part the user did not ask to change. Do not start the reply \
with <!-- INQUIRY -->.\n";

/// Builds the user prompt for a refinement turn.
///
/// `history` is the serialized prior conversation for the stage, if any.
#[must_use]
pub fn build_refinement_prompt(
    stage: Stage,
    document: &str,
    feedback: &str,
    history: Option<&str>,
) -> String {
    let mut prompt = String::new();
    let _ = write!(prompt, "## Current {} Document\n\n{document}\n\n", stage.title());
    if let Some(history) = history.filter(|h| !h.is_empty()) {
        let _ = write!(prompt, "## Conversation So Far\n\n{history}\n\n");
    }
    let _ = write!(prompt, "## User Message\n\n{feedback}\n");
    prompt
}

/// Builds the user prompt for the verification stage.
#[must_use]
pub fn build_verification_prompt(requirements: &str, design: &str, tasks: &str) -> String {
    format!(
        "## Requirements\n\n{requirements}\n\n---\n\n## Design\n\n{design}\n\n---\n\n## Tasks\n\n{tasks}\n"
    )
}

/// System prompt for extracting a feature description from a transcript.
pub const TRANSCRIPT_TO_SPEC_SYSTEM: &str = "You read a conversation between a developer and an \
assistant and extract the feature they converged on.\n\n\
Write a feature description of one to three paragraphs: the problem, the intended behavior, \
important constraints and decisions made in the conversation. Ignore abandoned ideas. Output \
plain prose with no headings and no preamble.";

/// Builds the user prompt for transcript extraction.
#[must_use]
pub fn build_transcript_prompt(transcript: &str) -> String {
    format!("## Conversation Transcript\n\n{transcript}\n\nExtract the feature description.")
}

/// Seed material for requirements generated from a transcript.
#[must_use]
pub fn transcript_requirements_prompt(description: &str, transcript: &str) -> String {
    format!("{description}\n\n---\n## Original Conversation Transcript\n{transcript}")
}

/// Builds the user prompt for converting an imported file into a stage.
#[must_use]
pub fn build_import_prompt(stage: Stage, content: &str) -> String {
    format!("Convert the following document into the proper {stage} format for this spec.\n\n---\n\n{content}")
}

/// Truncates a transcript to [`TRANSCRIPT_LIMIT`] characters, marking the cut.
#[must_use]
pub fn truncate_transcript(transcript: &str) -> String {
    match transcript.char_indices().nth(TRANSCRIPT_LIMIT) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &transcript[..cut]),
        None => transcript.to_string(),
    }
}

/// Substitutes `{title}` in a custom prompt override.
#[must_use]
pub fn apply_title(template: &str, title: &str) -> String {
    template.replace("{title}", title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(title: &str) -> PromptContext<'_> {
        PromptContext { title, ..PromptContext::default() }
    }

    #[test]
    fn requirements_prompt_follows_format() {
        let gwt = build_system_prompt(Stage::Requirements, &ctx("Login"));
        assert!(gwt.contains("Given/When/Then"));
        assert!(gwt.contains("\"Login\""));

        let ears = build_system_prompt(
            Stage::Requirements,
            &PromptContext { requirements_format: RequirementsFormat::Ears, ..ctx("Login") },
        );
        assert!(ears.contains("EARS"));
        assert!(!ears.contains("Given/When/Then"));
    }

    #[test]
    fn bugfix_mode_changes_requirements_only() {
        let bug = PromptContext { mode: GenerationMode::Bugfix, ..ctx("Crash") };
        assert!(build_system_prompt(Stage::Requirements, &bug).contains("Current Behavior"));
        assert!(!build_system_prompt(Stage::Design, &bug).contains("Current Behavior"));
    }

    #[test]
    fn light_design_is_shorter() {
        let full = build_system_prompt(Stage::Design, &ctx("X"));
        let light = build_system_prompt(Stage::Design, &PromptContext { light_design: true, ..ctx("X") });
        assert!(light.len() < full.len());
        assert!(light.contains("one page"));
    }

    #[test]
    fn role_and_steering_are_included() {
        let prompt = build_system_prompt(
            Stage::Tasks,
            &PromptContext {
                role: Some("You are a Rust specialist.\n"),
                steering: Some("Use tokio everywhere."),
                ..ctx("X")
            },
        );
        assert!(prompt.starts_with("You are a Rust specialist."));
        assert!(prompt.contains("## Project Steering"));
        assert!(prompt.contains("Use tokio everywhere."));
        assert!(prompt.contains("- [ ]"));
    }

    #[test]
    fn refinement_prompt_includes_history_only_when_present() {
        let without = build_refinement_prompt(Stage::Design, "# Design", "why REST?", None);
        assert!(!without.contains("Conversation So Far"));

        let with = build_refinement_prompt(
            Stage::Design,
            "# Design",
            "why REST?",
            Some("User: add caching\nAssistant: ✏️ Document updated."),
        );
        assert!(with.contains("## Current Design Document\n\n# Design"));
        assert!(with.contains("User: add caching\nAssistant: ✏️ Document updated."));
        assert!(with.ends_with("## User Message\n\nwhy REST?\n"));
    }

    #[test]
    fn refine_system_names_the_sentinel() {
        assert!(REFINE_SYSTEM.contains(INQUIRY_SENTINEL));
    }

    #[test]
    fn import_prompt_names_the_stage() {
        assert_eq!(
            build_import_prompt(Stage::Tasks, "notes"),
            "Convert the following document into the proper tasks format for this spec.\n\n---\n\nnotes"
        );
    }

    #[test]
    fn transcripts_are_truncated_on_char_boundaries() {
        let short = "é".repeat(TRANSCRIPT_LIMIT);
        assert_eq!(truncate_transcript(&short), short);

        let long = "é".repeat(TRANSCRIPT_LIMIT + 5);
        let cut = truncate_transcript(&long);
        assert!(cut.ends_with("[...truncated]"));
        assert_eq!(cut.chars().filter(|c| *c == 'é').count(), TRANSCRIPT_LIMIT);
    }

    #[test]
    fn custom_prompt_title_substitution_replaces_every_occurrence() {
        assert_eq!(apply_title("{title} / {title}", "Auth"), "Auth / Auth");
    }
}
