//! Integration tests for the run coordination pipeline
//!
//! The execution engine and directory collaborator are mocked; the
//! coordinator is exercised end to end through `RunCoordinator::run`.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use notebook_runner_core_rs::{
    DirectoryEnsurer, ExecutionError, ExecutionResult, FixedClock, InMemoryTemplateStore,
    LocalDirectoryEnsurer, LocationKind, NotebookExecutor, ResolutionSource, RunCoordinator,
    RunError, RunRequest, Template, TemplateSpec,
};
use serde_json::json;

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap())
}

type CallLog = Arc<Mutex<Vec<(String, String, serde_json::Value)>>>;

/// Executor that records its invocations and returns a canned response
struct MockExecutor {
    calls: CallLog,
    response: Result<ExecutionResult, (String, Option<u16>)>,
}

impl MockExecutor {
    fn returning(result: ExecutionResult) -> (Self, CallLog) {
        let calls = CallLog::default();
        (
            Self {
                calls: Arc::clone(&calls),
                response: Ok(result),
            },
            calls,
        )
    }

    fn failing(message: &str, code: Option<u16>) -> Self {
        Self {
            calls: CallLog::default(),
            response: Err((message.to_string(), code)),
        }
    }
}

impl NotebookExecutor for MockExecutor {
    fn execute(
        &self,
        input_path: &str,
        output_path: &str,
        parameters: &serde_json::Value,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.calls.lock().unwrap().push((
            input_path.to_string(),
            output_path.to_string(),
            parameters.clone(),
        ));
        match &self.response {
            Ok(result) => Ok(result.clone()),
            Err((message, Some(code))) => Err(ExecutionError::new(message).with_code(*code)),
            Err((message, None)) => Err(ExecutionError::new(message)),
        }
    }
}

/// Directory collaborator that records ensured paths
#[derive(Clone, Default)]
struct RecordingDirs {
    ensured: Arc<Mutex<Vec<String>>>,
}

impl DirectoryEnsurer for RecordingDirs {
    fn ensure(&self, path: &str) -> std::io::Result<()> {
        self.ensured.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

fn coordinator_with(
    executor: MockExecutor,
    dirs: RecordingDirs,
) -> RunCoordinator {
    RunCoordinator::new(Box::new(executor))
        .with_directories(Box::new(dirs))
        .with_clock(Box::new(clock()))
}

#[test]
fn test_local_run_creates_directory_and_executes() {
    let (executor, calls) =
        MockExecutor::returning(ExecutionResult::with_data(json!({"rows": 42})));
    let dirs = RecordingDirs::default();
    let coordinator = coordinator_with(executor, dirs.clone());

    let store = InMemoryTemplateStore::new();
    let request = RunRequest::prepare("data/notebooks/report", None, &clock())
        .unwrap()
        .with_output_path("/data/out/")
        .with_parameters(json!({"alpha": 1}));

    let outcome = coordinator.run(&store, &request).unwrap();

    // Directory ensured exactly once, for the resolved directory.
    assert_eq!(dirs.ensured.lock().unwrap().as_slice(), ["/data/out/"]);

    // Executor saw the preprocessed input and the joined output path.
    let recorded = calls.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    let (input, output, params) = &recorded[0];
    assert_eq!(input, "data/notebooks/report.ipynb");
    assert_eq!(output, "/data/out/report_out_20240309143005.ipynb");
    assert_eq!(params, &json!({"alpha": 1}));

    assert_eq!(outcome.output_path(), "/data/out/report_out_20240309143005.ipynb");
    assert_eq!(outcome.source(), &ResolutionSource::ExplicitPath);
    assert_eq!(outcome.result(), &json!({"rows": 42}));
    assert_eq!(outcome.status_code(), None);
}

#[test]
fn test_object_store_run_skips_directory_creation() {
    let (executor, _) = MockExecutor::returning(ExecutionResult::with_data(json!({})));
    let dirs = RecordingDirs::default();
    let coordinator = coordinator_with(executor, dirs.clone());

    let store = InMemoryTemplateStore::new();
    let request = RunRequest::prepare(
        "bucket/home/user/notebook",
        Some(LocationKind::ObjectStore),
        &clock(),
    )
    .unwrap();

    let outcome = coordinator.run(&store, &request).unwrap();

    assert!(dirs.ensured.lock().unwrap().is_empty());
    assert_eq!(
        outcome.output_path(),
        "s3://bucket/home/user/notebook_out_20240309143005.ipynb"
    );
    assert_eq!(outcome.source(), &ResolutionSource::SourceDirectory);
}

#[test]
fn test_status_code_extracted_from_result_data() {
    let (executor, _) = MockExecutor::returning(ExecutionResult::with_data(
        json!({"statusCode": 201, "rows": 10}),
    ));
    let coordinator = coordinator_with(executor, RecordingDirs::default());

    let store = InMemoryTemplateStore::new();
    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_output_path("/out/");

    let outcome = coordinator.run(&store, &request).unwrap();
    assert_eq!(outcome.status_code(), Some(201));
}

#[test]
fn test_notebook_body_returned_only_when_requested() {
    let result = ExecutionResult {
        data: json!({}),
        notebook: Some(json!({"cells": []})),
    };

    let (executor, _) = MockExecutor::returning(result.clone());
    let coordinator = coordinator_with(executor, RecordingDirs::default());
    let store = InMemoryTemplateStore::new();

    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_output_path("/out/");
    let outcome = coordinator.run(&store, &request).unwrap();
    assert!(outcome.notebook().is_none());

    let (executor, _) = MockExecutor::returning(result);
    let coordinator = coordinator_with(executor, RecordingDirs::default());
    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_output_path("/out/")
        .returning_notebook();
    let outcome = coordinator.run(&store, &request).unwrap();
    assert_eq!(outcome.notebook(), Some(&json!({"cells": []})));
}

#[test]
fn test_conflicting_output_spec_rejected_before_execution() {
    let (executor, calls) = MockExecutor::returning(ExecutionResult::with_data(json!({})));
    let coordinator = coordinator_with(executor, RecordingDirs::default());

    let store = InMemoryTemplateStore::new();
    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_template(TemplateSpec::named("t"))
        .with_output_path("/out/");

    let err = coordinator.run(&store, &request).unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(err.is_client_error());
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_missing_template_maps_to_not_found() {
    let (executor, _) = MockExecutor::returning(ExecutionResult::with_data(json!({})));
    let coordinator = coordinator_with(executor, RecordingDirs::default());

    let store = InMemoryTemplateStore::new();
    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_template(TemplateSpec::named("absent"));

    let err = coordinator.run(&store, &request).unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(err.is_client_error());
}

#[test]
fn test_execution_failure_carries_engine_code() {
    let coordinator = coordinator_with(
        MockExecutor::failing("storage refused", Some(403)),
        RecordingDirs::default(),
    );
    let store = InMemoryTemplateStore::new();
    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_output_path("/out/");

    let err = coordinator.run(&store, &request).unwrap_err();
    assert!(matches!(err, RunError::Execution(_)));
    assert_eq!(err.status_code(), 403);
}

#[test]
fn test_execution_failure_without_code_is_server_side() {
    let coordinator = coordinator_with(
        MockExecutor::failing("kernel died", None),
        RecordingDirs::default(),
    );
    let store = InMemoryTemplateStore::new();
    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_output_path("/out/");

    let err = coordinator.run(&store, &request).unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert!(!err.is_client_error());
}

#[test]
fn test_default_template_drives_run_output() {
    let (executor, calls) = MockExecutor::returning(ExecutionResult::with_data(json!({})));
    let coordinator = coordinator_with(executor, RecordingDirs::default());

    let mut store = InMemoryTemplateStore::new();
    store
        .insert(Template::new("daily", "/srv/runs/{{args.year}}/"))
        .unwrap();
    store.set_default("daily").unwrap();

    let request = RunRequest::prepare("a/b/nb", None, &clock()).unwrap();
    let outcome = coordinator.run(&store, &request).unwrap();

    assert_eq!(outcome.output_path(), "/srv/runs/2024/nb_out_20240309143005.ipynb");
    assert_eq!(
        outcome.source(),
        &ResolutionSource::DefaultTemplate {
            name: "daily".to_string()
        }
    );
    assert_eq!(
        calls.lock().unwrap()[0].1,
        "/srv/runs/2024/nb_out_20240309143005.ipynb"
    );
}

#[test]
fn test_local_directory_ensurer_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("a").join("b");
    let nested_str = nested.to_str().unwrap();

    let ensurer = LocalDirectoryEnsurer;
    ensurer.ensure(nested_str).unwrap();
    assert!(nested.is_dir());

    // Second call is a no-op, not an error.
    ensurer.ensure(nested_str).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn test_run_ids_are_unique() {
    let (executor, _) = MockExecutor::returning(ExecutionResult::with_data(json!({})));
    let coordinator = coordinator_with(executor, RecordingDirs::default());
    let store = InMemoryTemplateStore::new();

    let request = RunRequest::prepare("a/b/nb", None, &clock())
        .unwrap()
        .with_output_path("/out/");

    let first = coordinator.run(&store, &request).unwrap();
    let second = coordinator.run(&store, &request).unwrap();
    assert_ne!(first.run_id(), second.run_id());
}
