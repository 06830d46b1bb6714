//! Type conversion utilities for the FFI boundary
//!
//! Converts between core types and Python objects (dicts, lists,
//! scalars), and maps core errors onto Python exception kinds the HTTP
//! layer already knows how to translate into responses.

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyList, PyString, PyTuple};

use crate::models::Template;
use crate::paths::{LocationKind, ObjectStoreComponents, RequestContext, ResolvedLocation};
use crate::resolver::ResolutionSource;
use crate::runner::{RunError, RunOutcome};
use crate::store::StoreError;

/// Extract a required field from a Python dict with a clear error message
pub fn extract_required<'py, T>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<T>
where
    T: FromPyObject<'py>,
{
    dict.get_item(key)?
        .ok_or_else(|| PyValueError::new_err(format!("Missing required field '{}'", key)))?
        .extract()
}

/// Extract an optional field from a Python dict
///
/// Missing key and `None` value both come back as `None`; only a type
/// mismatch is an error.
pub fn extract_optional<'py, T>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Option<T>>
where
    T: FromPyObject<'py>,
{
    match dict.get_item(key)? {
        Some(value) if !value.is_none() => Ok(Some(value.extract()?)),
        _ => Ok(None),
    }
}

/// Parse the `location` request field
///
/// Accepts `s3` and `local` (case-insensitive); `None` lets the scheme
/// prefix decide.
pub fn parse_location_kind(location: Option<&str>) -> PyResult<Option<LocationKind>> {
    match location.map(|l| l.to_ascii_lowercase()).as_deref() {
        None => Ok(None),
        Some("s3") => Ok(Some(LocationKind::ObjectStore)),
        Some("local") => Ok(Some(LocationKind::Local)),
        Some(_) => Err(PyValueError::new_err("Check 'location' parameter.")),
    }
}

/// Convert JSON into Python objects
pub fn json_to_py(py: Python<'_>, value: &serde_json::Value) -> PyResult<Py<PyAny>> {
    Ok(match value {
        serde_json::Value::Null => py.None(),
        serde_json::Value::Bool(b) => PyBool::new(py, *b).to_owned().into_any().unbind(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into_pyobject(py)?.into_any().unbind()
            } else if let Some(u) = n.as_u64() {
                u.into_pyobject(py)?.into_any().unbind()
            } else {
                n.as_f64()
                    .unwrap_or(f64::NAN)
                    .into_pyobject(py)?
                    .into_any()
                    .unbind()
            }
        }
        serde_json::Value::String(s) => PyString::new(py, s).into_any().unbind(),
        serde_json::Value::Array(items) => {
            let list = PyList::empty(py);
            for item in items {
                list.append(json_to_py(py, item)?)?;
            }
            list.into_any().unbind()
        }
        serde_json::Value::Object(map) => {
            let dict = PyDict::new(py);
            for (key, item) in map {
                dict.set_item(key, json_to_py(py, item)?)?;
            }
            dict.into_any().unbind()
        }
    })
}

/// Convert Python objects into JSON
///
/// Booleans are checked before integers: Python bools extract as ints.
pub fn py_to_json(value: &Bound<'_, PyAny>) -> PyResult<serde_json::Value> {
    if value.is_none() {
        return Ok(serde_json::Value::Null);
    }
    if let Ok(b) = value.downcast::<PyBool>() {
        return Ok(serde_json::Value::Bool(b.is_true()));
    }
    if let Ok(i) = value.extract::<i64>() {
        return Ok(serde_json::Value::from(i));
    }
    if let Ok(f) = value.extract::<f64>() {
        return Ok(serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null));
    }
    if let Ok(s) = value.extract::<String>() {
        return Ok(serde_json::Value::String(s));
    }
    if let Ok(list) = value.downcast::<PyList>() {
        let mut items = Vec::with_capacity(list.len());
        for item in list.iter() {
            items.push(py_to_json(&item)?);
        }
        return Ok(serde_json::Value::Array(items));
    }
    if let Ok(tuple) = value.downcast::<PyTuple>() {
        let mut items = Vec::with_capacity(tuple.len());
        for item in tuple.iter() {
            items.push(py_to_json(&item)?);
        }
        return Ok(serde_json::Value::Array(items));
    }
    if let Ok(dict) = value.downcast::<PyDict>() {
        let mut map = serde_json::Map::new();
        for (key, item) in dict.iter() {
            map.insert(key.extract::<String>()?, py_to_json(&item)?);
        }
        return Ok(serde_json::Value::Object(map));
    }
    Err(PyTypeError::new_err(format!(
        "unsupported value type: {}",
        value.get_type().name()?
    )))
}

/// Convert a template to a `{"name", "content"}` dict
pub fn template_to_py(py: Python<'_>, template: &Template) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("name", template.name())?;
    dict.set_item("content", template.content())?;
    Ok(dict.unbind())
}

/// Convert a preprocessed request context to a dict
pub fn context_to_py(py: Python<'_>, context: &RequestContext) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item(
        "location",
        match context.location.kind() {
            LocationKind::ObjectStore => "s3",
            LocationKind::Local => "local",
        },
    )?;
    dict.set_item("input_path", &context.input_path)?;
    dict.set_item("source_dir", &context.source_dir)?;
    dict.set_item("output_filename", &context.output_filename)?;
    if let ResolvedLocation::ObjectStore(components) = &context.location {
        dict.set_item("components", components_to_py(py, components)?)?;
    }
    Ok(dict.unbind())
}

/// Convert object-storage components to a dict
pub fn components_to_py(
    py: Python<'_>,
    components: &ObjectStoreComponents,
) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("bucket", &components.bucket)?;
    dict.set_item("home", components.home.as_deref())?;
    dict.set_item("user", components.user.as_deref())?;
    dict.set_item("remaining", &components.remaining)?;
    Ok(dict.unbind())
}

/// Convert a run outcome to the response dict handed back to the caller
pub fn outcome_to_py(py: Python<'_>, outcome: &RunOutcome) -> PyResult<Py<PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("run_id", outcome.run_id().to_string())?;
    dict.set_item("input_path", outcome.input_path())?;
    dict.set_item("output_path", outcome.output_path())?;
    dict.set_item("source", resolution_source_label(outcome.source()))?;
    dict.set_item("result", json_to_py(py, outcome.result())?)?;
    if let Some(notebook) = outcome.notebook() {
        dict.set_item("notebook", json_to_py(py, notebook)?)?;
    }
    if let Some(code) = outcome.status_code() {
        dict.set_item("status_code", code)?;
    }
    Ok(dict.unbind())
}

/// Stable label for the strategy that chose the output location
pub fn resolution_source_label(source: &ResolutionSource) -> &'static str {
    match source {
        ResolutionSource::NamedTemplate { .. } => "named_template",
        ResolutionSource::ExplicitPath => "explicit_path",
        ResolutionSource::DefaultTemplate { .. } => "default_template",
        ResolutionSource::SourceDirectory => "source_directory",
    }
}

/// Map a run failure onto the Python exception kind the HTTP layer
/// translates mechanically: lookup failures raise `KeyError`, other
/// client errors `ValueError`, server-side failures `RuntimeError`.
pub fn run_error_to_py(error: RunError) -> PyErr {
    match error.status_code() {
        404 => PyKeyError::new_err(error.to_string()),
        code if (400..500).contains(&code) => PyValueError::new_err(error.to_string()),
        _ => PyRuntimeError::new_err(error.to_string()),
    }
}

/// Map a store failure onto a Python exception
pub fn store_error_to_py(error: StoreError) -> PyErr {
    match error {
        StoreError::UnknownTemplate { .. } => PyKeyError::new_err(error.to_string()),
        StoreError::AlreadyExists { .. } => PyValueError::new_err(error.to_string()),
    }
}
