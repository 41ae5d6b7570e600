//! Command dispatch and handlers.

pub mod output;
pub mod session;
pub mod specs;
pub mod stages;
pub mod tasks;

use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::cassette::session::RecordingSession;
use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::pipeline::{CancelHandle, Controller, GenerationSettings};
use crate::store::SpecStore;

use output::TerminalSink;

/// Records backend, issue tracker and clock interactions to this cassette.
pub const RECORD_ENV: &str = "NSPEC_RECORD";
/// Serves backend, issue tracker and clock interactions from this cassette.
pub const REPLAY_ENV: &str = "NSPEC_REPLAY";
/// Error returned when Ctrl-C stops a command with no generation in flight.
pub const INTERRUPTED: &str = "Interrupted.";
/// Exit status for [`INTERRUPTED`].
pub const INTERRUPTED_EXIT: u8 = 130;

/// Workspace root plus its resolved configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Workspace root.
    pub root: PathBuf,
    /// Configuration loaded for it.
    pub config: AppConfig,
}

impl Workspace {
    /// Loads the configuration of `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `nspec.toml` or the environment holds invalid
    /// settings.
    pub fn load(root: &Path) -> Result<Self, String> {
        let config = AppConfig::load(root).map_err(|e| e.to_string())?;
        Ok(Self { root: root.to_path_buf(), config })
    }

    /// Store over this workspace's specs root.
    #[must_use]
    pub fn store<'a>(&self, ctx: &'a ServiceContext) -> SpecStore<'a> {
        SpecStore::new(ctx, &self.config.specs_root(&self.root))
            .with_workspace(&self.root, &self.config.context_files)
    }

    fn settings(&self) -> GenerationSettings {
        GenerationSettings { model: self.config.model.clone(), max_tokens: self.config.max_tokens }
    }
}

/// Dispatch a parsed command line to its handler.
///
/// `NSPEC_REPLAY=<file>` serves every recorded port from a cassette;
/// `NSPEC_RECORD=<file>` runs live and writes the cassette when the command
/// finishes, even when it fails.
///
/// # Errors
///
/// Returns an error string if configuration, the cassette or the selected
/// command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    let workspace = Workspace::load(&cli.workspace)?;

    if let Some(path) = env_path(REPLAY_ENV) {
        tracing::debug!(cassette = %path.display(), "replaying");
        let ctx = ServiceContext::replaying(&path)?;
        return dispatch_with_context(&cli.command, &ctx, &workspace);
    }

    if let Some(path) = env_path(RECORD_ENV) {
        return record_to(path, |ctx| dispatch_with_context(&cli.command, ctx, &workspace));
    }

    let ctx = ServiceContext::live();
    dispatch_with_context(&cli.command, &ctx, &workspace)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}

/// Runs `run` against a recording context and writes the cassette afterwards,
/// whatever `run` returned.
fn record_to(
    path: PathBuf,
    run: impl FnOnce(&ServiceContext) -> Result<(), String>,
) -> Result<(), String> {
    let session = RecordingSession::new(path);
    let ctx = ServiceContext::recording(&session);
    let result = run(&ctx);
    drop(ctx);
    finish_recording(session)?;
    result
}

/// Run a command with the given service context on a single-threaded
/// runtime. Ctrl-C cancels the in-flight generation; a Ctrl-C with nothing
/// running stops the command with [`INTERRUPTED`].
///
/// # Errors
///
/// Returns the handler's error message.
pub fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    workspace: &Workspace,
) -> Result<(), String> {
    let sink = TerminalSink::stdio();
    let controller = Controller::new(ctx, workspace.store(ctx), &sink, workspace.settings());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    runtime.block_on(async {
        let shutdown = CancellationToken::new();
        tokio::spawn(cancel_on_interrupt(controller.cancel_handle(), shutdown.clone()));
        until_shutdown(execute(command, ctx, workspace, &controller), &shutdown).await
    })
}

async fn cancel_on_interrupt(handle: CancelHandle, shutdown: CancellationToken) {
    while tokio::signal::ctrl_c().await.is_ok() {
        if !interrupt(&handle, &shutdown) {
            break;
        }
    }
}

/// Cancels the in-flight generation, or fires `shutdown` when nothing is
/// running. Returns whether to keep listening.
fn interrupt(handle: &CancelHandle, shutdown: &CancellationToken) -> bool {
    if handle.cancel() {
        tracing::info!("cancelling generation");
        true
    } else {
        tracing::info!("interrupted while idle");
        shutdown.cancel();
        false
    }
}

async fn until_shutdown(
    work: impl Future<Output = Result<(), String>>,
    shutdown: &CancellationToken,
) -> Result<(), String> {
    tokio::select! {
        result = work => result,
        () = shutdown.cancelled() => Err(INTERRUPTED.to_string()),
    }
}

async fn execute(
    command: &Command,
    ctx: &ServiceContext,
    workspace: &Workspace,
    controller: &Controller<'_>,
) -> Result<(), String> {
    match command {
        Command::New { name, description, jira, mode, light_design } => {
            let request = specs::NewSpec {
                name,
                description: description.as_deref(),
                jira: jira.as_deref(),
                mode: *mode,
                light_design: *light_design,
            };
            specs::create(ctx, workspace, controller, &request).await
        }
        Command::FromTranscript { name, file } => {
            specs::from_transcript(ctx, controller, name, file).await
        }
        Command::List => specs::list(controller),
        Command::Show { spec, stage } => specs::show(controller, spec, *stage),
        Command::Generate { spec, stage } => stages::generate(controller, spec, *stage).await,
        Command::Verify { spec } => stages::verify(controller, spec).await,
        Command::Refine { spec, stage, feedback } => {
            stages::refine(controller, spec, *stage, feedback).await
        }
        Command::Toggle { spec, id } => tasks::toggle(controller, spec, id),
        Command::Tasks { spec } => tasks::list(controller, spec),
        Command::Cascade { spec, from } => stages::cascade(controller, spec, *from).await,
        Command::Save { spec, stage, file } => {
            stages::save(ctx, controller, spec, *stage, file.as_deref())
        }
        Command::Import { spec, stage, file, transform } => {
            stages::import(controller, spec, *stage, file, *transform).await
        }
        Command::Rename { spec, new_name } => specs::rename(controller, spec, new_name),
        Command::Delete { spec } => specs::delete(controller, spec),
        Command::Format { spec, format } => specs::set_format(controller, spec, *format),
        Command::ScaffoldPrompts { spec } => specs::scaffold_prompts(controller, spec),
        Command::Session { spec } => {
            open(controller, spec)?;
            let stdin = std::io::stdin();
            session::SessionLoop::new(stdin.lock(), std::io::stdout()).run(controller).await
        }
    }
}

/// Makes `spec` the active spec of `controller`.
pub(crate) fn open(controller: &Controller<'_>, spec: &str) -> Result<(), String> {
    if !controller.store().exists(spec) {
        return Err(format!("Spec \"{spec}\" not found. Run `nspec list` to see available specs."));
    }
    controller.open_spec(spec).map(drop).map_err(|e| e.to_string())
}

/// Finish a recording session and print the cassette path.
fn finish_recording(session: RecordingSession) -> Result<(), String> {
    let path = session.finish()?;
    eprintln!("Recording saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::pipeline::CollectingSink;
    use crate::spec::{GenerationMode, SpecConfig};
    use crate::stage::Stage;
    use crate::testing::{mem_context, ScriptedBackend, Step};

    fn controller<'a>(ctx: &'a ServiceContext, sink: &'a CollectingSink) -> Controller<'a> {
        let store = SpecStore::new(ctx, Path::new("/ws/.specs"));
        store.create_spec("auth", &SpecConfig::new(GenerationMode::default(), ctx.clock.now())).unwrap();
        store.write_stage("auth", Stage::Requirements, "# Requirements\n").unwrap();
        Controller::new(ctx, store, sink, GenerationSettings { model: "m".into(), max_tokens: 10 })
    }

    #[test]
    fn idle_interrupt_requests_shutdown() {
        let ctx = mem_context(ScriptedBackend::default());
        let sink = CollectingSink::default();
        let controller = controller(&ctx, &sink);
        let shutdown = CancellationToken::new();

        assert!(!interrupt(&controller.cancel_handle(), &shutdown));
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn interrupt_during_generation_cancels_only_the_flight() {
        let backend = ScriptedBackend::new(vec![Step::Hang(vec!["# Des".into()])]);
        let requests = backend.requests();
        let ctx = mem_context(backend);
        let sink = CollectingSink::default();
        let controller = controller(&ctx, &sink);
        open(&controller, "auth").unwrap();
        let shutdown = CancellationToken::new();
        let handle = controller.cancel_handle();

        let (result, keep_listening) = tokio::join!(controller.generate_stage(Stage::Design), async {
            while requests.lock().unwrap().is_empty() {
                tokio::task::yield_now().await;
            }
            interrupt(&handle, &shutdown)
        });

        assert!(keep_listening);
        assert!(!shutdown.is_cancelled());
        assert_eq!(result, Err(crate::error::PipelineError::Cancelled));
    }

    #[tokio::test]
    async fn shutdown_stops_pending_work() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let result = until_shutdown(std::future::pending(), &shutdown).await;
        assert_eq!(result, Err(INTERRUPTED.to_string()));

        let idle = CancellationToken::new();
        assert_eq!(until_shutdown(async { Ok(()) }, &idle).await, Ok(()));
    }

    #[test]
    fn interrupted_recording_is_still_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interrupted.yaml");

        let result = record_to(path.clone(), |ctx| {
            let _ = ctx.clock.now();
            let shutdown = CancellationToken::new();
            shutdown.cancel();
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(until_shutdown(std::future::pending(), &shutdown))
        });

        assert_eq!(result, Err(INTERRUPTED.to_string()));
        let cassette = std::fs::read_to_string(&path).unwrap();
        assert!(cassette.contains("clock"));
    }
}
