//! Run request model
//!
//! A [`RunRequest`] is the per-invocation value the HTTP layer hands to
//! the core after preprocessing: which notebook to execute, where it
//! lives, how the caller wants the output location chosen, and the
//! parameters to inject. Requests are constructed fresh per call and
//! never persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::time::{Clock, TimeParts};
use crate::paths::{self, LocationError, LocationKind, RequestContext};

/// Reserved argument: output filename of the current run
pub const ARG_NOTEBOOK_NAME: &str = "notebook_name";

/// Arguments available to template placeholders under the `args` namespace
///
/// Caller-supplied values are ordinary entries. The four time-derived
/// arguments (`timestamp`, `year`, `month`, `day`) are injected
/// immediately before rendering and override caller values of the same
/// names, so every render is stamped with the actual resolution time.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use notebook_runner_core_rs::{TemplateArgs, TimeParts};
///
/// let mut args = TemplateArgs::new();
/// args.insert("team", "analytics");
/// args.insert("timestamp", "not-a-real-time");
///
/// let parts = TimeParts::at(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap());
/// args.apply_time(&parts);
///
/// assert_eq!(args.get("team"), Some("analytics"));
/// assert_eq!(args.get("timestamp"), Some("20240309143005"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateArgs {
    values: BTreeMap<String, String>,
}

impl TemplateArgs {
    /// Empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an argument
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up an argument
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    /// Set the reserved `notebook_name` argument
    pub fn set_notebook_name(&mut self, filename: &str) {
        self.insert(ARG_NOTEBOOK_NAME, filename);
    }

    /// Inject the time-derived arguments, overriding any caller values
    pub fn apply_time(&mut self, parts: &TimeParts) {
        self.insert("timestamp", parts.timestamp());
        self.insert("year", parts.year());
        self.insert("month", parts.month());
        self.insert("day", parts.day());
    }

    /// All arguments, by name
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

impl FromIterator<(String, String)> for TemplateArgs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A run request's reference to a stored template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Name of the stored template to render
    name: String,

    /// Caller-supplied render arguments
    #[serde(default)]
    args: TemplateArgs,
}

impl TemplateSpec {
    /// Reference a template by name, with no extra arguments
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: TemplateArgs::new(),
        }
    }

    /// Attach a render argument
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name, value);
        self
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Caller-supplied render arguments
    pub fn args(&self) -> &TemplateArgs {
        &self.args
    }
}

/// A preprocessed request to execute one notebook
///
/// Built with [`RunRequest::prepare`], which runs the pure preprocessing
/// step (location classification, filename construction) exactly once,
/// then decorated with builder methods.
///
/// # Example
/// ```
/// use notebook_runner_core_rs::{FixedClock, LocationKind, RunRequest, TemplateSpec};
/// use chrono::{TimeZone, Utc};
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap());
/// let request = RunRequest::prepare("bucket/home/user/report", Some(LocationKind::ObjectStore), &clock)
///     .unwrap()
///     .with_template(TemplateSpec::named("daily"));
///
/// assert_eq!(request.computed_output_filename(), "report_out_20240309143005.ipynb");
/// assert_eq!(request.notebook_source_path(), "s3://bucket/home/user/report.ipynb");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Template the caller asked for, if any
    requested_template: Option<TemplateSpec>,

    /// Output path the caller supplied directly, if any
    explicit_output_path: Option<String>,

    /// Preprocessed location context
    context: RequestContext,

    /// Parameters injected into the notebook (arbitrary JSON)
    parameters: serde_json::Value,

    /// Whether the executed notebook body should be returned alongside
    /// the result data
    return_notebook: bool,
}

impl RunRequest {
    /// Preprocess a raw notebook reference into a request
    ///
    /// # Errors
    ///
    /// [`LocationError`] when the reference is empty, or targets object
    /// storage without a bucket segment.
    pub fn prepare(
        notebook: &str,
        location: Option<LocationKind>,
        clock: &dyn Clock,
    ) -> Result<Self, LocationError> {
        let parts = TimeParts::now(clock);
        let context = paths::prepare(notebook, location, &parts)?;
        Ok(Self {
            requested_template: None,
            explicit_output_path: None,
            context,
            parameters: serde_json::Value::Null,
            return_notebook: false,
        })
    }

    /// Request rendering of a stored template
    ///
    /// A spec with an empty name is treated as absent.
    pub fn with_template(mut self, spec: TemplateSpec) -> Self {
        self.requested_template = Some(spec).filter(|s| !s.name.is_empty());
        self
    }

    /// Supply the output path directly
    ///
    /// An empty path is treated as absent.
    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.explicit_output_path = Some(path.into()).filter(|p| !p.is_empty());
        self
    }

    /// Attach notebook parameters
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Ask for the executed notebook body in the outcome
    pub fn returning_notebook(mut self) -> Self {
        self.return_notebook = true;
        self
    }

    /// Template the caller asked for
    pub fn requested_template(&self) -> Option<&TemplateSpec> {
        self.requested_template.as_ref()
    }

    /// Output path the caller supplied directly
    pub fn explicit_output_path(&self) -> Option<&str> {
        self.explicit_output_path.as_deref()
    }

    /// Preprocessed location context
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Full path to the input notebook
    pub fn notebook_source_path(&self) -> &str {
        &self.context.input_path
    }

    /// Timestamped output filename for this run
    pub fn computed_output_filename(&self) -> &str {
        &self.context.output_filename
    }

    /// Notebook parameters
    pub fn parameters(&self) -> &serde_json::Value {
        &self.parameters
    }

    /// Whether the outcome should carry the executed notebook body
    pub fn wants_notebook(&self) -> bool {
        self.return_notebook
    }
}
