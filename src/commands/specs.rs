//! Spec-level commands: `new`, `from-transcript`, `list`, `show`, `rename`,
//! `delete`, `format` and `scaffold-prompts`.

use std::fmt::Write as _;
use std::io::Read;
use std::path::Path;

use super::{open, Workspace};
use crate::context::ServiceContext;
use crate::import::jira::{fetch_user_story, is_jira_url, issue_to_prompt};
use crate::import::mcp;
use crate::pipeline::Controller;
use crate::spec::{health_score, render_checklist, GenerationMode, RequirementsFormat};
use crate::stage::Stage;

/// Arguments of `nspec new`.
#[derive(Debug, Clone, Copy)]
pub struct NewSpec<'a> {
    /// Display name.
    pub name: &'a str,
    /// Free-text description, or a Jira browse URL.
    pub description: Option<&'a str>,
    /// Explicit Jira browse URL.
    pub jira: Option<&'a str>,
    /// Generation mode.
    pub mode: GenerationMode,
    /// Shorter design document.
    pub light_design: bool,
}

/// Execute `new`: resolve the description (fetching a Jira story when given
/// one), create the spec and generate its first stage.
///
/// # Errors
///
/// Returns an error string if the Jira import, creation or generation fails.
pub async fn create(
    ctx: &ServiceContext,
    workspace: &Workspace,
    controller: &Controller<'_>,
    request: &NewSpec<'_>,
) -> Result<(), String> {
    let jira_url = request.jira.or(request.description.filter(|d| is_jira_url(d)));
    let description = match jira_url {
        Some(url) => {
            let probe = mcp::probe(
                ctx.fs.as_ref(),
                Some(workspace.root.as_path()),
                dirs::home_dir().as_deref(),
                workspace.config.rovo_mcp_config_path.as_deref(),
            );
            if !probe.configured {
                tracing::warn!(
                    "Rovo MCP is not configured; agents working on this spec will not be able to read Jira"
                );
            }
            let story = fetch_user_story(ctx.issues.as_ref(), url, &workspace.config.jira)
                .await
                .map_err(|e| e.to_string())?;
            eprintln!("Imported {} ({}).", story.key, story.issue_type);
            issue_to_prompt(&story)
        }
        None => request.description.unwrap_or_default().to_string(),
    };

    controller
        .create_spec(request.name, &description, request.mode, request.light_design)
        .await
        .map(drop)
        .map_err(|e| e.to_string())
}

/// Execute `from-transcript`. A `file` of `-` reads the transcript from stdin.
///
/// # Errors
///
/// Returns an error string if the transcript cannot be read or the
/// extraction or generation fails.
pub async fn from_transcript(
    ctx: &ServiceContext,
    controller: &Controller<'_>,
    name: &str,
    file: &Path,
) -> Result<(), String> {
    let transcript = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read transcript from stdin: {e}"))?;
        buf
    } else {
        ctx.fs
            .read_to_string(file)
            .map_err(|e| format!("Failed to read transcript {}: {e}", file.display()))?
    };
    controller.create_from_transcript(name, &transcript).await.map(drop).map_err(|e| e.to_string())
}

/// Execute `list`: a table of specs with their stages and task progress.
///
/// # Errors
///
/// Returns an error string if the specs root cannot be read.
pub fn list(controller: &Controller<'_>) -> Result<(), String> {
    let names = controller.list_specs().map_err(|e| e.to_string())?;
    if names.is_empty() {
        println!("No specs found.");
        return Ok(());
    }

    let mut rows = Vec::new();
    for name in &names {
        let summary = controller.store().load_spec(name)?;
        let stages: Vec<&str> =
            Stage::ALL.iter().filter(|s| summary.has(**s)).map(|s| s.as_str()).collect();
        let progress = summary
            .progress
            .map_or_else(|| "-".to_string(), |p| format!("{}/{}", p.done, p.total));
        rows.push((name.clone(), stages.join(","), progress));
    }
    print!("{}", format_table(&rows));
    Ok(())
}

fn format_table(rows: &[(String, String, String)]) -> String {
    let name_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(4).max(4);
    let stage_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(6).max(6);

    let mut out = String::new();
    let _ = writeln!(out, "{:<name_width$}  {:<stage_width$}  TASKS", "NAME", "STAGES");
    let _ = writeln!(out, "{:-<name_width$}  {:-<stage_width$}  -----", "", "");
    for (name, stages, progress) in rows {
        let _ = writeln!(out, "{name:<name_width$}  {stages:<stage_width$}  {progress}");
    }
    let _ = writeln!(out, "\n{} spec(s) total.", rows.len());
    out
}

/// Execute `show`: print one stage, or every stage that exists. Tasks are
/// rendered with their tracked completion state.
///
/// # Errors
///
/// Returns an error string if the spec or the requested stage is missing.
pub fn show(controller: &Controller<'_>, spec: &str, stage: Option<Stage>) -> Result<(), String> {
    open(controller, spec)?;
    let progress = controller.store().read_progress(spec);
    let render = |stage: Stage, doc: &str| {
        if stage == Stage::Tasks {
            render_checklist(doc, progress.as_ref())
        } else {
            doc.to_string()
        }
    };

    if let Some(stage) = stage {
        let doc = controller
            .content(stage)
            .ok_or_else(|| format!("Spec \"{spec}\" has no {stage} document yet."))?;
        println!("{}", render(stage, &doc).trim_end());
    } else {
        let mut any = false;
        for stage in Stage::ALL {
            let Some(doc) = controller.content(stage) else { continue };
            any = true;
            println!("==> {} <==\n{}\n", stage.file_name(), render(stage, &doc).trim_end());
        }
        if !any {
            println!("Spec \"{spec}\" has no documents yet.");
        }
    }

    if let Some(health) = controller.content(Stage::Verify).as_deref().and_then(health_score) {
        eprintln!("Spec health: {}/100 ({})", health.score, health.band);
    }
    Ok(())
}

/// Execute `rename`.
///
/// # Errors
///
/// Returns an error string if the target name is invalid or taken.
pub fn rename(controller: &Controller<'_>, spec: &str, new_name: &str) -> Result<(), String> {
    if !controller.store().exists(spec) {
        return Err(format!("Spec \"{spec}\" not found."));
    }
    controller.rename_spec(spec, new_name).map(drop).map_err(|e| e.to_string())
}

/// Execute `delete`.
///
/// # Errors
///
/// Returns an error string if the spec does not exist or cannot be removed.
pub fn delete(controller: &Controller<'_>, spec: &str) -> Result<(), String> {
    controller.delete_spec(spec).map_err(|e| e.to_string())
}

/// Execute `format`.
///
/// # Errors
///
/// Returns an error string if the spec does not exist or its config cannot
/// be written.
pub fn set_format(
    controller: &Controller<'_>,
    spec: &str,
    format: RequirementsFormat,
) -> Result<(), String> {
    open(controller, spec)?;
    controller.set_requirements_format(format).map_err(|e| e.to_string())
}

/// Execute `scaffold-prompts`.
///
/// # Errors
///
/// Returns an error string if the spec does not exist or a file cannot be
/// written.
pub fn scaffold_prompts(controller: &Controller<'_>, spec: &str) -> Result<(), String> {
    open(controller, spec)?;
    let written = controller.scaffold_prompts().map_err(|e| e.to_string())?;
    if written.is_empty() {
        println!("All prompt files already exist.");
    } else {
        for stage in written {
            println!("_prompts/{}", stage.file_name());
        }
    }
    Ok(())
}
