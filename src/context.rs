//! Service context bundling all port trait objects.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::adapters::live::{LiveClock, LiveFileSystem, LiveGenerationBackend, LiveIssueImporter};
use crate::adapters::recording::{
    RecordingClock, RecordingGenerationBackend, RecordingIssueImporter,
};
use crate::adapters::replaying::{
    ReplayingClock, ReplayingGenerationBackend, ReplayingIssueImporter,
};
use crate::cassette::format::Cassette;
use crate::cassette::replayer::CassetteReplayer;
use crate::cassette::session::RecordingSession;
use crate::ports::{Clock, FileSystem, GenerationBackend, IssueImporter};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors
/// wire up different adapter implementations (live, recording, replaying).
pub struct ServiceContext {
    /// Clock for obtaining the current time.
    pub clock: Box<dyn Clock>,
    /// Filesystem for spec storage.
    pub fs: Box<dyn FileSystem>,
    /// Streaming generation backend.
    pub llm: Box<dyn GenerationBackend>,
    /// Issue tracker importer.
    pub issues: Box<dyn IssueImporter>,
}

impl ServiceContext {
    /// Creates a live context with real adapters for every port.
    #[must_use]
    pub fn live() -> Self {
        Self {
            clock: Box::new(LiveClock),
            fs: Box::new(LiveFileSystem),
            llm: Box::new(LiveGenerationBackend::new()),
            issues: Box::new(LiveIssueImporter::new()),
        }
    }

    /// Creates a recording context writing into `session`.
    ///
    /// Uses live adapters for actual work; the clock, generation backend and
    /// issue importer are wrapped so every call lands in the session's
    /// cassette. The filesystem is not recorded: replay runs against a real
    /// workspace. This is the developer-only mechanism behind `NSPEC_RECORD`.
    #[must_use]
    pub fn recording(session: &RecordingSession) -> Self {
        Self {
            clock: Box::new(RecordingClock::new(Box::new(LiveClock), session.recorder())),
            fs: Box::new(LiveFileSystem),
            llm: Box::new(RecordingGenerationBackend::new(
                Box::new(LiveGenerationBackend::new()),
                session.recorder(),
            )),
            issues: Box::new(RecordingIssueImporter::new(
                Box::new(LiveIssueImporter::new()),
                session.recorder(),
            )),
        }
    }

    /// Creates a replaying context from a cassette file.
    ///
    /// All replaying ports share one replayer; each port/method pair is
    /// dispatched to its own interaction stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be read or parsed.
    pub fn replaying(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        let cassette = Cassette::from_yaml(&content, &path.display().to_string())?;
        Ok(Self::replaying_cassette(&cassette))
    }

    /// Creates a replaying context from an already loaded cassette.
    #[must_use]
    pub fn replaying_cassette(cassette: &Cassette) -> Self {
        let replayer = Arc::new(Mutex::new(CassetteReplayer::new(cassette)));
        Self {
            clock: Box::new(ReplayingClock::new(Arc::clone(&replayer))),
            fs: Box::new(LiveFileSystem),
            llm: Box::new(ReplayingGenerationBackend::new(Arc::clone(&replayer))),
            issues: Box::new(ReplayingIssueImporter::new(replayer)),
        }
    }
}
