//! Stage commands: `generate`, `verify`, `refine`, `cascade`, `save` and
//! `import`.

use std::io::Read;
use std::path::Path;

use super::open;
use crate::context::ServiceContext;
use crate::pipeline::{CascadeReport, Controller};
use crate::spec::health_score;
use crate::stage::Stage;

/// Execute `generate`.
///
/// # Errors
///
/// Returns an error string if the spec is missing, the stage's source is
/// missing or generation fails.
pub async fn generate(controller: &Controller<'_>, spec: &str, stage: Stage) -> Result<(), String> {
    open(controller, spec)?;
    controller.generate_stage(stage).await.map(drop).map_err(|e| e.to_string())
}

/// Execute `verify` and report the health score.
///
/// # Errors
///
/// Returns an error string if an upstream document is missing or
/// generation fails.
pub async fn verify(controller: &Controller<'_>, spec: &str) -> Result<(), String> {
    open(controller, spec)?;
    let report = controller.generate_verify().await.map_err(|e| e.to_string())?;
    match health_score(&report) {
        Some(health) => eprintln!("Spec health: {}/100 ({})", health.score, health.band),
        None => eprintln!("The report did not include a health score."),
    }
    Ok(())
}

/// Execute `refine`.
///
/// # Errors
///
/// Returns an error string if the stage has no document, the feedback is
/// blank or the turn fails.
pub async fn refine(
    controller: &Controller<'_>,
    spec: &str,
    stage: Stage,
    feedback: &str,
) -> Result<(), String> {
    open(controller, spec)?;
    match controller.refine(stage, feedback).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) if controller.content(stage).is_none() => {
            Err(format!("Spec \"{spec}\" has no {stage} document to refine."))
        }
        Ok(None) => Err("Enter some feedback or a question.".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Execute `cascade`.
///
/// # Errors
///
/// Returns an error string naming the step that stopped the cascade.
pub async fn cascade(controller: &Controller<'_>, spec: &str, from: Stage) -> Result<(), String> {
    open(controller, spec)?;
    let report = controller.cascade(from).await.map_err(|e| e.to_string())?;
    eprintln!("{}", describe_cascade(&report));
    match report.halted {
        Some(e) => Err(e.to_string()),
        None => Ok(()),
    }
}

fn describe_cascade(report: &CascadeReport) -> String {
    if report.completed.is_empty() {
        return "No stages were regenerated.".to_string();
    }
    let names: Vec<&str> = report.completed.iter().map(|s| s.as_str()).collect();
    format!("Regenerated: {}", names.join(" -> "))
}

/// Execute `save` with content from `file`, or stdin when `file` is `None`.
///
/// # Errors
///
/// Returns an error string if the content cannot be read or written.
pub fn save(
    ctx: &ServiceContext,
    controller: &Controller<'_>,
    spec: &str,
    stage: Stage,
    file: Option<&Path>,
) -> Result<(), String> {
    open(controller, spec)?;
    let content = match file {
        Some(path) => ctx
            .fs
            .read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("Failed to read stdin: {e}"))?;
            buf
        }
    };
    controller.save_content(stage, &content).map_err(|e| e.to_string())
}

/// Execute `import`.
///
/// # Errors
///
/// Returns an error string if the file is unreadable or empty, or the
/// transform fails.
pub async fn import(
    controller: &Controller<'_>,
    spec: &str,
    stage: Stage,
    file: &Path,
    transform: bool,
) -> Result<(), String> {
    open(controller, spec)?;
    controller.import_file(stage, file, transform).await.map(drop).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::{CollectingSink, GenerationSettings};
    use crate::spec::{GenerationMode, SpecConfig};
    use crate::store::SpecStore;
    use crate::testing::{mem_context, ScriptedBackend, Step};

    fn controller<'a>(ctx: &'a ServiceContext, sink: &'a CollectingSink) -> Controller<'a> {
        let store = SpecStore::new(ctx, Path::new("/ws/.specs"));
        let config = SpecConfig::new(GenerationMode::default(), ctx.clock.now());
        store.create_spec("auth", &config).unwrap();
        store.write_stage("auth", Stage::Requirements, "# Requirements\n").unwrap();
        Controller::new(ctx, store, sink, GenerationSettings { model: "m".into(), max_tokens: 10 })
    }

    #[tokio::test]
    async fn generate_opens_the_spec_first() {
        let ctx = mem_context(ScriptedBackend::new(vec![Step::reply("# Design\n")]));
        let sink = CollectingSink::default();
        let controller = controller(&ctx, &sink);

        generate(&controller, "auth", Stage::Design).await.unwrap();
        assert_eq!(controller.store().read_stage("auth", Stage::Design).unwrap().as_deref(), Some("# Design\n"));
        assert!(generate(&controller, "nope", Stage::Design).await.unwrap_err().contains("not found"));
    }

    #[tokio::test]
    async fn refine_explains_why_nothing_happened() {
        let ctx = mem_context(ScriptedBackend::default());
        let sink = CollectingSink::default();
        let controller = controller(&ctx, &sink);

        let err = refine(&controller, "auth", Stage::Tasks, "more").await.unwrap_err();
        assert_eq!(err, "Spec \"auth\" has no tasks document to refine.");
        let err = refine(&controller, "auth", Stage::Requirements, " ").await.unwrap_err();
        assert_eq!(err, "Enter some feedback or a question.");
    }

    #[tokio::test]
    async fn cascade_failure_is_returned_as_the_error() {
        let ctx = mem_context(ScriptedBackend::new(vec![Step::reply("# Design\n")]));
        let sink = CollectingSink::default();
        let controller = controller(&ctx, &sink);

        let err = cascade(&controller, "auth", Stage::Design).await.unwrap_err();
        assert_eq!(err, PipelineError::from(crate::ports::StreamError::Unconfigured("script exhausted".into())).to_string());
        assert_eq!(controller.store().read_stage("auth", Stage::Design).unwrap().as_deref(), Some("# Design\n"));
    }

    #[test]
    fn cascade_summary_lists_completed_stages() {
        let report = CascadeReport { completed: vec![Stage::Design, Stage::Tasks], halted: None };
        assert_eq!(describe_cascade(&report), "Regenerated: design -> tasks");
        assert_eq!(describe_cascade(&CascadeReport::default()), "No stages were regenerated.");
    }

    #[test]
    fn save_reads_the_given_file() {
        let ctx = mem_context(ScriptedBackend::default());
        let sink = CollectingSink::default();
        let controller = controller(&ctx, &sink);
        ctx.fs.write(Path::new("/tmp/tasks.md"), "- [ ] One\n").unwrap();

        save(&ctx, &controller, "auth", Stage::Tasks, Some(Path::new("/tmp/tasks.md"))).unwrap();
        assert_eq!(controller.store().read_progress("auth").map(|p| p.total), Some(1));
        assert!(save(&ctx, &controller, "auth", Stage::Tasks, Some(Path::new("/tmp/none.md"))).is_err());
    }
}
