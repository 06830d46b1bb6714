//! PyO3 gateway for the run service
//!
//! The Python HTTP layer holds one gateway per process. Template CRUD,
//! preprocessing, resolution and runs all go through it; the notebook
//! execution engine itself stays on the Python side and is passed in as
//! a callable.
//!
//! # Example (from Python)
//!
//! ```python
//! from notebook_runner_core_rs import RunGateway
//!
//! gw = RunGateway()
//! gw.add_template("daily", "s3://reports/{{args.year}}/{{args.month}}/", default=True)
//!
//! def execute(input_path, output_path, parameters):
//!     result = pm.execute_notebook(input_path, output_path, parameters=parameters)
//!     return sb.read_notebook(output_path).scraps.data_dict, result
//!
//! outcome = gw.run("bucket/home/user/report", execute, location="s3",
//!                  parameters={"alpha": 1})
//! print(outcome["output_path"], outcome["result"])
//! ```

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyTuple};

use crate::core::time::SystemClock;
use crate::models::{RunRequest, Template, TemplateSpec};
use crate::paths::{self, LocationKind, ResolvedLocation};
use crate::resolver::OutputPathResolver;
use crate::runner::{ExecutionError, ExecutionResult, NotebookExecutor, RunCoordinator};
use crate::store::{InMemoryTemplateStore, TemplateStore};

use super::types::{
    components_to_py, context_to_py, extract_optional, extract_required, json_to_py,
    outcome_to_py, parse_location_kind, py_to_json, resolution_source_label, run_error_to_py,
    store_error_to_py, template_to_py,
};

/// Execution engine adapter around a Python callable
///
/// The callable receives `(input_path, output_path, parameters)` and
/// returns the result data dict, optionally as a `(data, notebook)`
/// tuple when the executed notebook body is available.
struct PyCallableExecutor {
    callback: Py<PyAny>,
}

impl NotebookExecutor for PyCallableExecutor {
    fn execute(
        &self,
        input_path: &str,
        output_path: &str,
        parameters: &serde_json::Value,
    ) -> Result<ExecutionResult, ExecutionError> {
        Python::with_gil(|py| {
            let params = json_to_py(py, parameters)
                .map_err(|e| ExecutionError::new(format!("cannot convert parameters: {}", e)))?;

            let returned = self
                .callback
                .bind(py)
                .call1((input_path, output_path, params))
                .map_err(|e| ExecutionError::new(e.to_string()))?;

            // A 2-tuple is (data, notebook); anything else is bare data.
            if let Ok(pair) = returned.downcast::<PyTuple>() {
                if pair.len() == 2 {
                    let item0 = pair
                        .get_item(0)
                        .map_err(|e| ExecutionError::new(e.to_string()))?;
                    let data =
                        py_to_json(&item0).map_err(|e| ExecutionError::new(e.to_string()))?;
                    let item1 = pair
                        .get_item(1)
                        .map_err(|e| ExecutionError::new(e.to_string()))?;
                    let notebook =
                        py_to_json(&item1).map_err(|e| ExecutionError::new(e.to_string()))?;
                    return Ok(ExecutionResult {
                        data,
                        notebook: Some(notebook),
                    });
                }
            }

            let data = py_to_json(&returned).map_err(|e| ExecutionError::new(e.to_string()))?;
            Ok(ExecutionResult::with_data(data))
        })
    }
}

/// Python entry point to the run service core
#[pyclass(name = "RunGateway")]
pub struct PyRunGateway {
    store: InMemoryTemplateStore,
}

#[pymethods]
impl PyRunGateway {
    /// Gateway with an empty template store and no default pointer
    #[new]
    fn new() -> Self {
        Self {
            store: InMemoryTemplateStore::new(),
        }
    }

    /// Add a template, optionally marking it default
    ///
    /// Raises `ValueError` if the name is taken.
    #[pyo3(signature = (name, content, default = false))]
    fn add_template(&mut self, name: &str, content: &str, default: bool) -> PyResult<()> {
        self.store
            .insert(Template::new(name, content))
            .map_err(store_error_to_py)?;
        if default {
            self.store.set_default(name).map_err(store_error_to_py)?;
        }
        Ok(())
    }

    /// Replace a template's content, optionally changing its default status
    ///
    /// `default=True` points the default at this template; `default=False`
    /// clears the pointer when this template currently holds it.
    #[pyo3(signature = (name, content, default = None))]
    fn update_template(
        &mut self,
        name: &str,
        content: &str,
        default: Option<bool>,
    ) -> PyResult<()> {
        self.store
            .update(Template::new(name, content))
            .map_err(store_error_to_py)?;
        match default {
            Some(true) => self.store.set_default(name).map_err(store_error_to_py)?,
            Some(false) if self.store.default_name() == Some(name) => self.store.clear_default(),
            _ => {}
        }
        Ok(())
    }

    /// Delete a template, clearing the default pointer if it named it
    fn delete_template(&mut self, name: &str) -> PyResult<()> {
        self.store.delete(name).map_err(store_error_to_py)?;
        Ok(())
    }

    /// Point the default at an existing template
    fn set_default(&mut self, name: &str) -> PyResult<()> {
        self.store.set_default(name).map_err(store_error_to_py)
    }

    /// Clear the default pointer
    fn clear_default(&mut self) {
        self.store.clear_default();
    }

    /// The current default template, or `None`
    fn default_template(&self, py: Python<'_>) -> PyResult<Option<Py<PyDict>>> {
        self.store
            .get_default()
            .map(|t| template_to_py(py, &t))
            .transpose()
    }

    /// All templates, ordered by name
    fn list_templates(&self, py: Python<'_>) -> PyResult<Vec<Py<PyDict>>> {
        self.store
            .list()
            .into_iter()
            .map(|t| template_to_py(py, t))
            .collect()
    }

    /// Output filename a run started now would produce
    fn build_output_filename(&self, notebook: &str) -> String {
        let parts = crate::core::time::TimeParts::now(&SystemClock);
        paths::build_output_filename(notebook, &parts)
    }

    /// Classify a notebook reference
    ///
    /// Returns a dict with the storage kind and, for object storage, the
    /// bucket / home / user / remaining decomposition. Raises
    /// `ValueError` for references that cannot be decomposed.
    #[pyo3(signature = (notebook, location = None))]
    fn classify_location(
        &self,
        py: Python<'_>,
        notebook: &str,
        location: Option<&str>,
    ) -> PyResult<Py<PyDict>> {
        let kind = parse_location_kind(location)?;
        let classified =
            paths::classify(notebook, kind).map_err(|e| run_error_to_py(e.into()))?;

        let dict = PyDict::new(py);
        match &classified {
            ResolvedLocation::ObjectStore(components) => {
                dict.set_item("location", "s3")?;
                dict.set_item("components", components_to_py(py, components)?)?;
            }
            ResolvedLocation::Local { directory } => {
                dict.set_item("location", "local")?;
                dict.set_item("directory", directory)?;
            }
        }
        Ok(dict.unbind())
    }

    /// Preprocess a notebook reference into the structured request context
    #[pyo3(signature = (notebook, location = None))]
    fn prepare(
        &self,
        py: Python<'_>,
        notebook: &str,
        location: Option<&str>,
    ) -> PyResult<Py<PyDict>> {
        let request = self.build_request(notebook, location, None, None, None, None, false)?;
        context_to_py(py, request.context())
    }

    /// Resolve the output location without executing anything
    ///
    /// Returns `{"path": ..., "source": ...}` where `source` names the
    /// winning strategy.
    #[pyo3(signature = (notebook, location = None, template = None, template_args = None, output_path = None))]
    fn resolve_output(
        &self,
        py: Python<'_>,
        notebook: &str,
        location: Option<&str>,
        template: Option<&str>,
        template_args: Option<&Bound<'_, PyDict>>,
        output_path: Option<&str>,
    ) -> PyResult<Py<PyDict>> {
        let request =
            self.build_request(notebook, location, template, template_args, output_path, None, false)?;

        OutputPathResolver::validate(&request).map_err(|e| run_error_to_py(e.into()))?;
        let resolved = OutputPathResolver::new()
            .resolve(&self.store, &request, &SystemClock)
            .map_err(|e| run_error_to_py(e.into()))?;

        let dict = PyDict::new(py);
        dict.set_item("path", resolved.path())?;
        dict.set_item("source", resolution_source_label(resolved.source()))?;
        Ok(dict.unbind())
    }

    /// Execute a notebook run
    ///
    /// `executor` is a callable `(input_path, output_path, parameters)`
    /// returning the result data dict, or a `(data, notebook)` tuple.
    /// Raises `KeyError` for a missing template, `ValueError` for
    /// malformed requests, `RuntimeError` for execution failures.
    #[pyo3(signature = (notebook, executor, location = None, template = None,
                        template_args = None, output_path = None, parameters = None,
                        return_notebook = false))]
    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        py: Python<'_>,
        notebook: &str,
        executor: Py<PyAny>,
        location: Option<&str>,
        template: Option<&str>,
        template_args: Option<&Bound<'_, PyDict>>,
        output_path: Option<&str>,
        parameters: Option<&Bound<'_, PyAny>>,
        return_notebook: bool,
    ) -> PyResult<Py<PyDict>> {
        let request = self.build_request(
            notebook,
            location,
            template,
            template_args,
            output_path,
            parameters,
            return_notebook,
        )?;
        self.execute_request(py, request, executor)
    }

    /// Execute a run described by a request-body dict
    ///
    /// `payload` mirrors the HTTP request body:
    /// `{"parameters": ..., "template": {"name": ..., "args": {...}},
    ///   "outputNotebookPath": ..., "returnNotebook": ...}` - all keys
    /// optional.
    #[pyo3(signature = (notebook, executor, payload, location = None))]
    fn run_payload(
        &self,
        py: Python<'_>,
        notebook: &str,
        executor: Py<PyAny>,
        payload: &Bound<'_, PyDict>,
        location: Option<&str>,
    ) -> PyResult<Py<PyDict>> {
        let template_spec: Option<Bound<'_, PyDict>> = extract_optional(payload, "template")?;
        let (template_name, template_args) = match &template_spec {
            Some(spec) => (
                Some(extract_required::<String>(spec, "name")?),
                extract_optional::<Bound<'_, PyDict>>(spec, "args")?,
            ),
            None => (None, None),
        };
        let output_path: Option<String> = extract_optional(payload, "outputNotebookPath")?;
        let return_notebook: bool =
            extract_optional(payload, "returnNotebook")?.unwrap_or(false);
        let parameters = payload.get_item("parameters")?;

        let request = self.build_request(
            notebook,
            location,
            template_name.as_deref(),
            template_args.as_ref(),
            output_path.as_deref(),
            parameters.as_ref(),
            return_notebook,
        )?;
        self.execute_request(py, request, executor)
    }
}

impl PyRunGateway {
    /// Run an assembled request through a fresh coordinator
    fn execute_request(
        &self,
        py: Python<'_>,
        request: RunRequest,
        executor: Py<PyAny>,
    ) -> PyResult<Py<PyDict>> {
        let coordinator = RunCoordinator::new(Box::new(PyCallableExecutor { callback: executor }));
        let outcome = coordinator
            .run(&self.store, &request)
            .map_err(run_error_to_py)?;
        outcome_to_py(py, &outcome)
    }

    /// Shared request assembly for `prepare`, `resolve_output` and `run`
    #[allow(clippy::too_many_arguments)]
    fn build_request(
        &self,
        notebook: &str,
        location: Option<&str>,
        template: Option<&str>,
        template_args: Option<&Bound<'_, PyDict>>,
        output_path: Option<&str>,
        parameters: Option<&Bound<'_, PyAny>>,
        return_notebook: bool,
    ) -> PyResult<RunRequest> {
        let kind: Option<LocationKind> = parse_location_kind(location)?;

        let mut request = RunRequest::prepare(notebook, kind, &SystemClock)
            .map_err(|e| run_error_to_py(e.into()))?;

        if let Some(name) = template {
            let mut spec = TemplateSpec::named(name);
            if let Some(args) = template_args {
                for (key, value) in args.iter() {
                    spec = spec.with_arg(key.extract::<String>()?, value.extract::<String>()?);
                }
            }
            request = request.with_template(spec);
        }
        if let Some(path) = output_path {
            request = request.with_output_path(path);
        }
        if let Some(params) = parameters {
            request = request.with_parameters(py_to_json(params)?);
        }
        if return_notebook {
            request = request.returning_notebook();
        }
        Ok(request)
    }
}
