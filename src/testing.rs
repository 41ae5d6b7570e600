//! Test doubles shared by the unit tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use tokio_util::sync::CancellationToken;

use crate::context::ServiceContext;
use crate::ports::{
    ChunkSink, Clock, CompletionRequest, CompletionSummary, FileSystem, GenerationBackend,
    IssueFuture, IssueImporter, RawIssue, StreamError, StreamFuture, TrackerCredentials,
};

type FsResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// In-memory filesystem for testing the store without touching disk.
#[derive(Default)]
pub struct MemFs {
    files: Mutex<HashMap<PathBuf, String>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MemFs {
    fn add_dir_chain(&self, path: &Path) {
        let mut dirs = self.dirs.lock().unwrap();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap().contains(path)
    }
}

impl FileSystem for MemFs {
    fn read_to_string(&self, path: &Path) -> FsResult<String> {
        let files = self.files.lock().unwrap();
        files.get(path).cloned().ok_or_else(|| format!("File not found: {}", path.display()).into())
    }

    fn write(&self, path: &Path, contents: &str) -> FsResult<()> {
        if let Some(parent) = path.parent() {
            self.add_dir_chain(parent);
        }
        self.files.lock().unwrap().insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path) || self.is_dir(path)
    }

    fn list_dir(&self, path: &Path) -> FsResult<Vec<String>> {
        if !self.is_dir(path) {
            return Err(format!("Not a directory: {}", path.display()).into());
        }
        let files = self.files.lock().unwrap();
        let dirs = self.dirs.lock().unwrap();
        let mut names: Vec<String> = files
            .keys()
            .chain(dirs.iter())
            .filter(|k| k.parent() == Some(path))
            .filter_map(|k| k.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        self.add_dir_chain(path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> FsResult<()> {
        if !self.is_dir(path) {
            return Err(format!("Not a directory: {}", path.display()).into());
        }
        self.files.lock().unwrap().retain(|k, _| !k.starts_with(path));
        self.dirs.lock().unwrap().retain(|k| !k.starts_with(path));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> FsResult<()> {
        if !self.exists(from) {
            return Err(format!("No such entry: {}", from.display()).into());
        }
        let moved = |k: &Path| to.join(k.strip_prefix(from).unwrap_or(k));
        {
            let mut files = self.files.lock().unwrap();
            let keys: Vec<PathBuf> = files.keys().filter(|k| k.starts_with(from)).cloned().collect();
            for key in keys {
                if let Some(v) = files.remove(&key) {
                    files.insert(moved(&key), v);
                }
            }
        }
        let mut dirs = self.dirs.lock().unwrap();
        let keys: Vec<PathBuf> = dirs.iter().filter(|k| k.starts_with(from)).cloned().collect();
        for key in keys {
            dirs.remove(&key);
            dirs.insert(moved(&key));
        }
        if let Some(parent) = to.parent() {
            for ancestor in parent.ancestors().filter(|a| !a.as_os_str().is_empty()) {
                dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }
}

/// Clock pinned to one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// One scripted backend response.
pub enum Step {
    /// Emit the chunks, then succeed.
    Reply(Vec<String>),
    /// Emit the chunks, then fail with the error.
    Fail(Vec<String>, StreamError),
    /// Emit the chunks, then wait for `release` before succeeding.
    Gated(Vec<String>, oneshot::Receiver<()>),
    /// Emit the chunks, then wait until cancelled.
    Hang(Vec<String>),
}

impl Step {
    /// A successful reply delivered as one chunk per line.
    pub fn reply(text: &str) -> Self {
        Step::Reply(text.split_inclusive('\n').map(ToString::to_string).collect())
    }
}

/// Backend serving [`Step`]s in order and recording every request.
#[derive(Default)]
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedBackend {
    /// A backend that serves `steps` in order.
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps: Mutex::new(steps.into()), requests: Arc::default() }
    }

    /// Shared log of requests received, usable after the backend is boxed.
    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl GenerationBackend for ScriptedBackend {
    fn stream_completion<'a>(
        &'a self,
        request: &'a CompletionRequest,
        on_chunk: ChunkSink<'a>,
        cancel: CancellationToken,
    ) -> StreamFuture<'a> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.steps.lock().unwrap().pop_front();
        Box::pin(async move {
            match step {
                None => Err(StreamError::Unconfigured("script exhausted".into())),
                Some(Step::Reply(chunks)) => {
                    emit(&chunks, on_chunk);
                    Ok(CompletionSummary::default())
                }
                Some(Step::Fail(chunks, err)) => {
                    emit(&chunks, on_chunk);
                    Err(err)
                }
                Some(Step::Gated(chunks, release)) => {
                    emit(&chunks, on_chunk);
                    tokio::select! {
                        () = cancel.cancelled() => Err(StreamError::Cancelled),
                        _ = release => Ok(CompletionSummary::default()),
                    }
                }
                Some(Step::Hang(chunks)) => {
                    emit(&chunks, on_chunk);
                    cancel.cancelled().await;
                    Err(StreamError::Cancelled)
                }
            }
        })
    }
}

fn emit(chunks: &[String], on_chunk: &mut (dyn FnMut(&str) + Send)) {
    for chunk in chunks {
        on_chunk(chunk);
    }
}

/// Importer serving one canned response.
pub struct CannedImporter(pub Mutex<Option<Result<RawIssue, String>>>);

impl IssueImporter for CannedImporter {
    fn fetch_issue<'a>(
        &'a self,
        _api_base: &'a str,
        _key: &'a str,
        _credentials: &'a TrackerCredentials,
    ) -> IssueFuture<'a> {
        let canned = self.0.lock().unwrap().take();
        Box::pin(async move { canned.unwrap_or_else(|| Err("no canned issue".into())) })
    }
}

/// Context over [`MemFs`], a fixed clock and the given backend.
pub fn mem_context(backend: ScriptedBackend) -> ServiceContext {
    ServiceContext {
        clock: Box::new(FixedClock(
            DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z").unwrap().to_utc(),
        )),
        fs: Box::new(MemFs::default()),
        llm: Box::new(backend),
        issues: Box::new(CannedImporter(Mutex::new(None))),
    }
}
