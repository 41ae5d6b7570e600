//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the pipeline core and an external
//! system (time, generation backend, filesystem, issue tracker).
//! Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod issues;
pub mod llm;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use issues::{IssueFuture, IssueImporter, RawIssue, TrackerCredentials};
pub use llm::{
    ChunkSink, CompletionRequest, CompletionSummary, GenerationBackend, StreamError, StreamFuture,
};
