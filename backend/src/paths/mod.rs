//! Notebook reference preprocessing
//!
//! Every run request arrives with a raw notebook reference such as
//! `s3://bucket/home/user/report.ipynb` or `data/notebooks/report`. Before
//! any resolution happens the reference is decomposed into a structured
//! [`RequestContext`]: where the notebook lives, the path the execution
//! engine should read, the directory used as the last-resort output
//! location, and the timestamped output filename.
//!
//! Everything in this module is a pure function of its inputs; the
//! caller runs it once per request instead of re-deriving path fields
//! in every handler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::time::TimeParts;

/// Notebook filename extension expected by the execution engine
const NOTEBOOK_EXT: &str = ".ipynb";

/// Scheme prefix restored onto object-storage paths
const OBJECT_STORE_SCHEME: &str = "s3://";

/// Errors from notebook reference preprocessing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    /// Object-storage reference with no path segments before the filename.
    /// A bare filename has no bucket, so no output path can be built from it.
    #[error("invalid notebook location: {reference:?} has no bucket segment")]
    InvalidLocation { reference: String },

    /// Empty notebook reference
    #[error("empty notebook reference")]
    EmptyReference,
}

/// Kind of storage a notebook reference targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Object storage (an `s3://`-style service)
    ObjectStore,
    /// Local filesystem
    Local,
}

/// Decomposed object-storage reference
///
/// Only the bucket is mandatory; shallow references legitimately omit the
/// home and user segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreComponents {
    /// First path segment (required)
    pub bucket: String,
    /// Second path segment, if present
    pub home: Option<String>,
    /// Third path segment, if present
    pub user: Option<String>,
    /// Remaining segments past the user, `/`-joined (may be empty)
    pub remaining: String,
}

/// Where a notebook reference points, after classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedLocation {
    /// Object storage, decomposed into its segments
    ObjectStore(ObjectStoreComponents),
    /// Local filesystem directory holding the notebook
    Local {
        /// Directory portion of the reference, with trailing `/`
        directory: String,
    },
}

impl ResolvedLocation {
    /// Storage kind of this location
    pub fn kind(&self) -> LocationKind {
        match self {
            ResolvedLocation::ObjectStore(_) => LocationKind::ObjectStore,
            ResolvedLocation::Local { .. } => LocationKind::Local,
        }
    }
}

/// Structured request context produced by [`prepare`]
///
/// This is the value the resolver and run coordinator consume instead of
/// re-deriving path fields from the raw reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Classified storage location
    pub location: ResolvedLocation,

    /// Full path to the input notebook, scheme included for object storage
    pub input_path: String,

    /// Directory containing the input notebook, with trailing `/`.
    /// Used as the fallback output location when nothing else applies.
    pub source_dir: String,

    /// Timestamped output filename: `<base>_out_<timestamp>.ipynb`
    pub output_filename: String,
}

/// Split an `s3://`-style scheme prefix off a reference
///
/// Returns the scheme (without `://`) and the remainder. References
/// without a scheme come back unchanged.
pub fn split_scheme(reference: &str) -> (Option<&str>, &str) {
    match reference.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() => (Some(scheme), rest),
        _ => (None, reference),
    }
}

/// Build the output filename for a raw notebook reference
///
/// Takes the last `/`-segment of the reference, appends `.ipynb` when the
/// extension is missing, and derives `<base>_out_<timestamp>.ipynb`. The
/// timestamp makes every run's artifact unique, so an output never
/// overwrites the source notebook or a previous run.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use notebook_runner_core_rs::{paths, TimeParts};
///
/// let parts = TimeParts::at(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap());
/// let name = paths::build_output_filename("bucket/home/user/report", &parts);
/// assert_eq!(name, "report_out_20240309143005.ipynb");
/// ```
pub fn build_output_filename(reference: &str, parts: &TimeParts) -> String {
    let (_, trimmed) = split_scheme(reference);
    let filename = trimmed.rsplit('/').next().unwrap_or(trimmed);

    let base = filename.strip_suffix(NOTEBOOK_EXT).unwrap_or(filename);
    format!("{}_out_{}{}", base, parts.timestamp(), NOTEBOOK_EXT)
}

/// Classify a notebook reference as object storage or local
///
/// An explicit `location` wins; otherwise a scheme prefix marks object
/// storage and its absence means local. Object-storage references are
/// decomposed into bucket / home / user / remaining segments; a reference
/// with no segments before the filename is rejected, since no path can be
/// constructed from it.
///
/// # Example
/// ```
/// use notebook_runner_core_rs::paths::{self, LocationKind, ResolvedLocation};
///
/// let loc = paths::classify("bucket/home/user/report", Some(LocationKind::ObjectStore)).unwrap();
/// match loc {
///     ResolvedLocation::ObjectStore(c) => {
///         assert_eq!(c.bucket, "bucket");
///         assert_eq!(c.home.as_deref(), Some("home"));
///         assert_eq!(c.user.as_deref(), Some("user"));
///         assert_eq!(c.remaining, "");
///     }
///     _ => unreachable!(),
/// }
/// ```
pub fn classify(
    reference: &str,
    location: Option<LocationKind>,
) -> Result<ResolvedLocation, LocationError> {
    let (scheme, trimmed) = split_scheme(reference);
    if trimmed.is_empty() {
        return Err(LocationError::EmptyReference);
    }

    let kind = location.unwrap_or(match scheme {
        Some(_) => LocationKind::ObjectStore,
        None => LocationKind::Local,
    });

    let mut segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    // Last segment is the notebook filename, not part of the directory.
    segments.pop();

    match kind {
        LocationKind::ObjectStore => {
            if segments.is_empty() {
                return Err(LocationError::InvalidLocation {
                    reference: reference.to_string(),
                });
            }
            Ok(ResolvedLocation::ObjectStore(ObjectStoreComponents {
                bucket: segments[0].to_string(),
                home: segments.get(1).map(|s| s.to_string()),
                user: segments.get(2).map(|s| s.to_string()),
                remaining: segments.get(3..).unwrap_or(&[]).join("/"),
            }))
        }
        LocationKind::Local => {
            let directory = if segments.is_empty() {
                // Bare filename: run from the current directory rather
                // than the filesystem root.
                "./".to_string()
            } else if trimmed.starts_with('/') {
                format!("/{}/", segments.join("/"))
            } else {
                format!("{}/", segments.join("/"))
            };
            Ok(ResolvedLocation::Local { directory })
        }
    }
}

/// Preprocess a raw notebook reference into a [`RequestContext`]
///
/// Pure: the only inputs are the reference, the optional explicit
/// location, and a clock reading.
pub fn prepare(
    reference: &str,
    location: Option<LocationKind>,
    parts: &TimeParts,
) -> Result<RequestContext, LocationError> {
    let classified = classify(reference, location)?;
    let output_filename = build_output_filename(reference, parts);

    let (_, trimmed) = split_scheme(reference);
    let filename = notebook_filename(trimmed);

    let (input_path, source_dir) = match &classified {
        ResolvedLocation::ObjectStore(c) => {
            let mut dir = format!("{}{}", OBJECT_STORE_SCHEME, c.bucket);
            for segment in [c.home.as_deref(), c.user.as_deref()].into_iter().flatten() {
                dir.push('/');
                dir.push_str(segment);
            }
            if !c.remaining.is_empty() {
                dir.push('/');
                dir.push_str(&c.remaining);
            }
            dir.push('/');
            (format!("{}{}", dir, filename), dir)
        }
        ResolvedLocation::Local { directory } => {
            (format!("{}{}", directory, filename), directory.clone())
        }
    };

    Ok(RequestContext {
        location: classified,
        input_path,
        source_dir,
        output_filename,
    })
}

/// Join a resolved output directory and the output filename
///
/// The resolved path is a directory; avoid doubling the separator when a
/// template already rendered a trailing `/`.
pub fn join_output(directory: &str, filename: &str) -> String {
    if directory.ends_with('/') {
        format!("{}{}", directory, filename)
    } else {
        format!("{}/{}", directory, filename)
    }
}

/// Whether a resolved output path targets object storage
///
/// Object-storage paths need no directory pre-created; everything else
/// does.
pub fn is_object_store_path(path: &str) -> bool {
    split_scheme(path).0.is_some()
}

/// Filename segment of a reference, `.ipynb` extension enforced
fn notebook_filename(trimmed: &str) -> String {
    let filename = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if filename.ends_with(NOTEBOOK_EXT) {
        filename.to_string()
    } else {
        format!("{}{}", filename, NOTEBOOK_EXT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parts() -> TimeParts {
        TimeParts::at(Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 5).unwrap())
    }

    #[test]
    fn test_split_scheme() {
        assert_eq!(split_scheme("s3://bucket/nb"), (Some("s3"), "bucket/nb"));
        assert_eq!(split_scheme("bucket/nb"), (None, "bucket/nb"));
        assert_eq!(split_scheme("://odd"), (None, "://odd"));
    }

    #[test]
    fn test_filename_extension_enforced() {
        assert_eq!(notebook_filename("a/b/report"), "report.ipynb");
        assert_eq!(notebook_filename("a/b/report.ipynb"), "report.ipynb");
    }

    #[test]
    fn test_bare_local_reference_uses_current_dir() {
        let ctx = prepare("report.ipynb", None, &parts()).unwrap();
        assert_eq!(ctx.source_dir, "./");
        assert_eq!(ctx.input_path, "./report.ipynb");
    }

    #[test]
    fn test_absolute_local_reference() {
        let ctx = prepare("/data/notebooks/report.ipynb", None, &parts()).unwrap();
        assert_eq!(ctx.source_dir, "/data/notebooks/");
        assert_eq!(ctx.input_path, "/data/notebooks/report.ipynb");
    }
}
