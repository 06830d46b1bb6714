//! Tests for output path resolution precedence
//!
//! Strategy order: named template, explicit path, default template,
//! source directory. First match wins.

use chrono::{TimeZone, Utc};
use notebook_runner_core_rs::{
    FixedClock, InMemoryTemplateStore, LocationKind, OutputPathResolver, ResolutionSource,
    ResolveError, RunRequest, Template, TemplateSpec,
};

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap())
}

fn object_store_request() -> RunRequest {
    RunRequest::prepare(
        "bucket/home/user/notebook",
        Some(LocationKind::ObjectStore),
        &clock(),
    )
    .unwrap()
}

#[test]
fn test_named_template_wins_over_default() {
    let mut store = InMemoryTemplateStore::new();
    store
        .insert(Template::new("named", "/named/{{args.year}}/"))
        .unwrap();
    store
        .insert(Template::new("fallback", "/default/"))
        .unwrap();
    store.set_default("fallback").unwrap();

    let request = object_store_request().with_template(TemplateSpec::named("named"));
    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(resolved.path(), "/named/2024/");
    assert_eq!(
        resolved.source(),
        &ResolutionSource::NamedTemplate {
            name: "named".to_string()
        }
    );
}

#[test]
fn test_missing_template_is_not_found_regardless_of_other_arguments() {
    let store = InMemoryTemplateStore::new();
    let request = object_store_request().with_template(TemplateSpec::named("absent"));

    let err = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap_err();

    assert!(matches!(err, ResolveError::TemplateNotFound { name } if name == "absent"));
}

#[test]
fn test_explicit_path_without_placeholders_renders_to_itself() {
    let store = InMemoryTemplateStore::new();
    let request = object_store_request().with_output_path("/data/out/");

    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(resolved.path(), "/data/out/");
    assert_eq!(resolved.source(), &ResolutionSource::ExplicitPath);
}

#[test]
fn test_explicit_path_may_embed_placeholders() {
    let store = InMemoryTemplateStore::new();
    let request = object_store_request().with_output_path("/data/{{args.timestamp}}/");

    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(resolved.path(), "/data/20240309143005/");
}

#[test]
fn test_default_template_used_when_nothing_requested() {
    let mut store = InMemoryTemplateStore::new();
    store
        .insert(Template::new("daily", "s3://reports/{{args.notebook_name}}-dir/"))
        .unwrap();
    store.set_default("daily").unwrap();

    let request = object_store_request();
    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(
        resolved.path(),
        "s3://reports/notebook_out_20240309143005.ipynb-dir/"
    );
    assert_eq!(
        resolved.source(),
        &ResolutionSource::DefaultTemplate {
            name: "daily".to_string()
        }
    );
}

#[test]
fn test_source_directory_when_no_default_pointer() {
    // Templates exist but none is marked default: the pointer being
    // unset falls through to the notebook's own directory.
    let mut store = InMemoryTemplateStore::new();
    store.insert(Template::new("daily", "/ignored/")).unwrap();

    let request = object_store_request();
    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(resolved.path(), "s3://bucket/home/user/");
    assert_eq!(resolved.source(), &ResolutionSource::SourceDirectory);
}

#[test]
fn test_cleared_default_behaves_like_no_default() {
    let mut store = InMemoryTemplateStore::new();
    store.insert(Template::new("daily", "/elsewhere/")).unwrap();
    store.set_default("daily").unwrap();
    store.clear_default();

    let request = object_store_request();
    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(resolved.source(), &ResolutionSource::SourceDirectory);
}

#[test]
fn test_template_args_flow_into_render() {
    let mut store = InMemoryTemplateStore::new();
    store
        .insert(Template::new("team", "/srv/{{args.team}}/{{args.year}}/"))
        .unwrap();

    let request = object_store_request()
        .with_template(TemplateSpec::named("team").with_arg("team", "analytics"));

    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(resolved.path(), "/srv/analytics/2024/");
}

#[test]
fn test_caller_cannot_override_time_args() {
    let mut store = InMemoryTemplateStore::new();
    store
        .insert(Template::new("stamped", "/runs/{{args.timestamp}}/"))
        .unwrap();

    let request = object_store_request()
        .with_template(TemplateSpec::named("stamped").with_arg("timestamp", "spoofed"));

    let resolved = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap();

    assert_eq!(resolved.path(), "/runs/20240309143005/");
}

#[test]
fn test_unresolvable_placeholder_in_template_fails() {
    let mut store = InMemoryTemplateStore::new();
    store
        .insert(Template::new("broken", "/data/{{args.cluster}}/"))
        .unwrap();

    let request = object_store_request().with_template(TemplateSpec::named("broken"));

    let err = OutputPathResolver::new()
        .resolve(&store, &request, &clock())
        .unwrap_err();
    assert!(matches!(err, ResolveError::Render(_)));
}

#[test]
fn test_validate_rejects_template_plus_explicit_path() {
    let request = object_store_request()
        .with_template(TemplateSpec::named("t"))
        .with_output_path("/data/out/");

    let err = OutputPathResolver::validate(&request).unwrap_err();
    assert!(matches!(err, ResolveError::ConflictingOutputSpec));
}

#[test]
fn test_resolution_is_deterministic_for_fixed_clock() {
    let mut store = InMemoryTemplateStore::new();
    store
        .insert(Template::new("daily", "/runs/{{args.timestamp}}/{{args.notebook_name}}/"))
        .unwrap();
    store.set_default("daily").unwrap();

    let resolver = OutputPathResolver::new();
    let request = object_store_request();

    let first = resolver.resolve(&store, &request, &clock()).unwrap();
    let second = resolver.resolve(&store, &request, &clock()).unwrap();
    assert_eq!(first, second);
}
