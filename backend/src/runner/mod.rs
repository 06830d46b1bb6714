//! Run coordination - the pipeline around path resolution
//!
//! See `engine.rs` for the implementation.

pub mod engine;

// Re-export main types for convenience
pub use engine::{
    DirectoryEnsurer, ExecutionError, ExecutionResult, LocalDirectoryEnsurer, NotebookExecutor,
    RunCoordinator, RunError, RunOutcome,
};
