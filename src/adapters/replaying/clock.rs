//! Replaying adapter for the `Clock` port.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::next_output;
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::Clock;

/// Replays recorded clock values from a cassette.
///
/// Falls back to the wall clock (with a warning) once the recording runs out.
pub struct ReplayingClock {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingClock {
    /// Creates a new replaying clock from a shared cassette replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl Clock for ReplayingClock {
    fn now(&self) -> DateTime<Utc> {
        next_output(&self.replayer, "clock", "now").unwrap_or_else(|e| {
            tracing::warn!(error = %e, "clock replay failed, using wall clock");
            Utc::now()
        })
    }
}
