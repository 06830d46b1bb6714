//! Run coordination engine
//!
//! Drives one notebook run end to end:
//!
//! ```text
//! For each request:
//! 1. Validate the output spec (template and explicit path are exclusive)
//! 2. Resolve the output location (precedence + rendering)
//! 3. Ensure the output directory exists (local paths only)
//! 4. Join directory and timestamped output filename
//! 5. Execute the notebook through the collaborator
//! 6. Extract the status code from the result data, if the notebook set one
//! ```
//!
//! The execution engine, directory creation and template storage are
//! collaborator seams; the coordinator owns no I/O of its own beyond
//! what those collaborators do.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::{Clock, SystemClock};
use crate::models::RunRequest;
use crate::paths::{self, LocationError};
use crate::resolver::{OutputPathResolver, ResolutionSource, ResolveError};
use crate::store::TemplateStore;

/// Key in the result data that carries a caller-defined status code
const STATUS_CODE_KEY: &str = "statusCode";

/// Failure reported by the execution engine
///
/// Execution engines may carry their own HTTP-equivalent code
/// (object-storage client errors usually arrive with one); without one
/// the failure is treated as server-side.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionError {
    message: String,
    code: Option<u16>,
}

impl ExecutionError {
    /// Failure with no HTTP-equivalent code
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach an HTTP-equivalent code
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// HTTP-equivalent code, if the engine supplied one
    pub fn code(&self) -> Option<u16> {
        self.code
    }
}

/// What the execution engine hands back for a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Structured result data extracted from the executed notebook
    pub data: serde_json::Value,

    /// Executed notebook body, when the engine can return it
    pub notebook: Option<serde_json::Value>,
}

impl ExecutionResult {
    /// Result carrying only extracted data
    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            data,
            notebook: None,
        }
    }
}

/// Opaque notebook execution collaborator
///
/// `execute` runs the notebook at `input_path` with `parameters` injected
/// and writes the executed copy to `output_path`.
pub trait NotebookExecutor: Send + Sync {
    fn execute(
        &self,
        input_path: &str,
        output_path: &str,
        parameters: &serde_json::Value,
    ) -> Result<ExecutionResult, ExecutionError>;
}

/// Directory creation collaborator
///
/// `ensure` is idempotent: creating a directory that already exists is a
/// no-op. Only invoked for output paths that are not object storage.
pub trait DirectoryEnsurer: Send + Sync {
    fn ensure(&self, path: &str) -> std::io::Result<()>;
}

/// [`DirectoryEnsurer`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDirectoryEnsurer;

impl DirectoryEnsurer for LocalDirectoryEnsurer {
    fn ensure(&self, path: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(path)
    }
}

/// Errors from a notebook run
#[derive(Debug, Error)]
pub enum RunError {
    /// Notebook reference could not be preprocessed
    #[error(transparent)]
    Location(#[from] LocationError),

    /// Output location could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Output directory could not be created
    #[error("cannot create output directory {path}: {source}")]
    DirectoryCreate {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The execution engine failed
    #[error("notebook execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

impl RunError {
    /// HTTP-equivalent status for the caller's response mapping
    ///
    /// Every failure is deterministic and local-recoverable; the caller
    /// turns this into a response rather than retrying.
    pub fn status_code(&self) -> u16 {
        match self {
            RunError::Location(_) => 400,
            RunError::Resolve(ResolveError::TemplateNotFound { .. }) => 404,
            RunError::Resolve(_) => 400,
            RunError::DirectoryCreate { .. } => 500,
            RunError::Execution(e) => e.code().unwrap_or(500),
        }
    }

    /// Whether the failure is the caller's to fix
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Outcome of one completed notebook run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Unique identifier for this run
    run_id: Uuid,

    /// Path the notebook was read from
    input_path: String,

    /// Full path the executed notebook was written to
    output_path: String,

    /// Strategy that chose the output location
    source: ResolutionSource,

    /// Structured result data extracted from the executed notebook
    result: serde_json::Value,

    /// Executed notebook body, when the request asked for it
    notebook: Option<serde_json::Value>,

    /// Status code the notebook embedded in its result data, if any
    status_code: Option<u16>,
}

impl RunOutcome {
    /// Unique run identifier
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Path the notebook was read from
    pub fn input_path(&self) -> &str {
        &self.input_path
    }

    /// Full path the executed notebook was written to
    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    /// Strategy that chose the output location
    pub fn source(&self) -> &ResolutionSource {
        &self.source
    }

    /// Structured result data
    pub fn result(&self) -> &serde_json::Value {
        &self.result
    }

    /// Executed notebook body, when requested
    pub fn notebook(&self) -> Option<&serde_json::Value> {
        self.notebook.as_ref()
    }

    /// Status code embedded in the result data, if any
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }
}

/// Coordinates one notebook run across the collaborator seams
///
/// # Example
///
/// ```rust,ignore
/// use notebook_runner_core_rs::{InMemoryTemplateStore, RunCoordinator, RunRequest};
///
/// let coordinator = RunCoordinator::new(Box::new(KernelExecutor::connect()?));
/// let store = InMemoryTemplateStore::new();
///
/// let request = RunRequest::prepare("data/notebooks/report", None, coordinator.clock())?;
/// let outcome = coordinator.run(&store, &request)?;
/// println!("written to {}", outcome.output_path());
/// ```
pub struct RunCoordinator {
    executor: Box<dyn NotebookExecutor>,
    directories: Box<dyn DirectoryEnsurer>,
    clock: Box<dyn Clock>,
    resolver: OutputPathResolver,
}

impl RunCoordinator {
    /// Coordinator with the local-filesystem directory collaborator and
    /// the system clock
    pub fn new(executor: Box<dyn NotebookExecutor>) -> Self {
        Self {
            executor,
            directories: Box::new(LocalDirectoryEnsurer),
            clock: Box::new(SystemClock),
            resolver: OutputPathResolver::new(),
        }
    }

    /// Replace the directory collaborator
    pub fn with_directories(mut self, directories: Box<dyn DirectoryEnsurer>) -> Self {
        self.directories = directories;
        self
    }

    /// Replace the clock (fixed clocks make runs reproducible in tests)
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Clock used for request preparation and resolution
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Resolve a request's output location without executing anything
    ///
    /// Validation included; useful for dry runs and the CLI.
    pub fn resolve(
        &self,
        store: &dyn TemplateStore,
        request: &RunRequest,
    ) -> Result<crate::resolver::ResolvedOutput, RunError> {
        OutputPathResolver::validate(request)?;
        Ok(self
            .resolver
            .resolve(store, request, self.clock.as_ref())?)
    }

    /// Execute one notebook run
    pub fn run(
        &self,
        store: &dyn TemplateStore,
        request: &RunRequest,
    ) -> Result<RunOutcome, RunError> {
        let resolved = self.resolve(store, request)?;
        let out_dir = resolved.path();

        // Object storage needs no pre-created directories.
        if !paths::is_object_store_path(out_dir) {
            self.directories
                .ensure(out_dir)
                .map_err(|source| RunError::DirectoryCreate {
                    path: out_dir.to_string(),
                    source,
                })?;
        }

        let output_path = paths::join_output(out_dir, request.computed_output_filename());
        let run_id = Uuid::new_v4();

        tracing::info!(
            %run_id,
            input = request.notebook_source_path(),
            output = output_path.as_str(),
            "executing notebook"
        );

        let result = self.executor.execute(
            request.notebook_source_path(),
            &output_path,
            request.parameters(),
        )?;

        let status_code = extract_status_code(&result.data);
        let notebook = if request.wants_notebook() {
            result.notebook
        } else {
            None
        };

        Ok(RunOutcome {
            run_id,
            input_path: request.notebook_source_path().to_string(),
            output_path,
            source: resolved.source().clone(),
            result: result.data,
            notebook,
            status_code,
        })
    }
}

/// Pull a caller-defined status code out of result data
///
/// Only integral values in the valid HTTP range count; anything else is
/// ignored rather than poisoning the response.
fn extract_status_code(data: &serde_json::Value) -> Option<u16> {
    let raw = data.get(STATUS_CODE_KEY)?.as_i64()?;
    u16::try_from(raw).ok().filter(|c| (100..=599).contains(c))
}
