//! Notebook Runner Core - Rust Engine
//!
//! Output-path resolution and run coordination for a parameterized
//! notebook execution service. The HTTP layer and the execution engine
//! stay outside this crate; they talk to the core through the FFI
//! gateway and the collaborator traits.
//!
//! # Architecture
//!
//! - **core**: Clock seam and time-derived template arguments
//! - **models**: Domain types (Template, RunRequest, TemplateArgs)
//! - **store**: Template lookup trait and in-memory reference store
//! - **paths**: Notebook reference preprocessing (pure)
//! - **render**: Strict placeholder substitution
//! - **resolver**: Four-strategy output path precedence
//! - **runner**: Run pipeline around the collaborator seams
//!
//! # Critical Invariants
//!
//! 1. Resolution is deterministic given a fixed clock reading
//! 2. An unresolvable placeholder is a hard error, never a blank
//! 3. The default pointer, when set, names an existing template
//! 4. Every run's output filename is unique (timestamped)

// Module declarations
pub mod core;
pub mod models;
pub mod paths;
pub mod render;
pub mod resolver;
pub mod runner;
pub mod store;

// Re-exports for convenience
pub use crate::core::time::{Clock, FixedClock, SystemClock, TimeParts, TIMESTAMP_FORMAT};
pub use models::{
    request::{RunRequest, TemplateArgs, TemplateSpec},
    template::Template,
};
pub use paths::{
    LocationError, LocationKind, ObjectStoreComponents, RequestContext, ResolvedLocation,
};
pub use render::{RenderError, TemplateRenderer};
pub use resolver::{OutputPathResolver, ResolutionSource, ResolveError, ResolvedOutput};
pub use runner::{
    DirectoryEnsurer, ExecutionError, ExecutionResult, LocalDirectoryEnsurer, NotebookExecutor,
    RunCoordinator, RunError, RunOutcome,
};
pub use store::{InMemoryTemplateStore, StoreError, TemplateStore};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn notebook_runner_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::gateway::PyRunGateway>()?;
    Ok(())
}
