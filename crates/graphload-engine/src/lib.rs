//! Core engine crate for graphload bulk import execution.

pub mod batch;
pub mod chunker;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod profiler;
pub mod query;
pub mod result;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod verifier;

// Re-export public API for convenience
pub use error::LoadError;
pub use orchestrator::{run_import, RunOptions};
pub use result::{EntityClassRun, RunSummary};
pub use store::GraphStore;
