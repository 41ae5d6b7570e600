//! Recording session shared by every recording adapter.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::recorder::CassetteRecorder;

/// Owns the recorder that all recording adapters of one run write into.
///
/// Every port shares a single cassette so replay sees the same interleaving.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Create a session recording to `path`, named after the file stem.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .map_or_else(|| "nspec-session".to_string(), |s| s.to_string_lossy().into_owned());
        Self { recorder: Arc::new(Mutex::new(CassetteRecorder::new(path, name))) }
    }

    /// Handle for a recording adapter.
    #[must_use]
    pub fn recorder(&self) -> Arc<Mutex<CassetteRecorder>> {
        Arc::clone(&self.recorder)
    }

    /// Write the cassette to disk.
    ///
    /// Adapters may still hold handles; whatever they recorded so far is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned or the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        let guard = self.recorder.lock().map_err(|e| format!("Recorder lock poisoned: {e}"))?;
        guard
            .write()
            .map(std::path::Path::to_path_buf)
            .map_err(|e| format!("Failed to write cassette {}: {e}", guard.path().display()))
    }
}
