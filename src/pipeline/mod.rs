//! The stage pipeline: session state, the single-flight controller and the
//! events it reports.

mod controller;
mod events;
mod lifecycle;
mod refine;
mod state;

pub use controller::{CancelHandle, CascadeReport, Controller, GenerationSettings};
pub use events::{CollectingSink, EventSink, PipelineEvent};
pub use refine::{Refinement, REVISION_ACK};
pub use state::{ChatEntry, ChatRole, SessionState};
