//! Output path resolution
//!
//! Given a run request and the template store, decide where the executed
//! notebook's output is written. Four strategies are tried in a fixed
//! precedence, first match wins:
//!
//! 1. A template the caller named → look it up, render its content
//! 2. An output path the caller supplied directly → render it
//! 3. The store's default template → render its content
//! 4. The notebook's own source directory → render it
//!
//! A named template and an explicit output path are mutually exclusive;
//! callers reject that combination with [`OutputPathResolver::validate`]
//! before resolving. The four time-derived arguments are injected
//! immediately before rendering and override caller values, so the render
//! is stamped with the actual resolution time.
//!
//! Resolution is a pure function of the request, the store contents and
//! one clock reading. Directory creation happens later, in the run
//! coordinator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::time::{Clock, TimeParts};
use crate::models::{RunRequest, TemplateArgs};
use crate::render::{RenderError, TemplateRenderer};
use crate::store::TemplateStore;

/// Errors from output path resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The caller named a template the store does not hold
    #[error("no template: {name}")]
    TemplateNotFound { name: String },

    /// A placeholder could not be resolved against the supplied arguments
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The caller supplied both a template and an explicit output path
    #[error("either an output path or a template is supported, not both")]
    ConflictingOutputSpec,
}

/// Which strategy produced a resolved path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Strategy 1: template the caller named
    NamedTemplate { name: String },

    /// Strategy 2: output path the caller supplied directly
    ExplicitPath,

    /// Strategy 3: the store's default template
    DefaultTemplate { name: String },

    /// Strategy 4: the notebook's own source directory
    SourceDirectory,
}

/// A resolved output location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOutput {
    /// Rendered output directory
    path: String,

    /// Strategy that won
    source: ResolutionSource,
}

impl ResolvedOutput {
    /// Rendered output directory
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Strategy that produced the path
    pub fn source(&self) -> &ResolutionSource {
        &self.source
    }

    /// Consume into the rendered path
    pub fn into_path(self) -> String {
        self.path
    }
}

/// Applies the resolution precedence and renders the winning value
#[derive(Debug, Default)]
pub struct OutputPathResolver {
    renderer: TemplateRenderer,
}

impl OutputPathResolver {
    pub fn new() -> Self {
        Self {
            renderer: TemplateRenderer::new(),
        }
    }

    /// Reject requests that specify both a template and an explicit path
    ///
    /// Callers run this before [`resolve`](Self::resolve); the precedence
    /// itself assumes the combination is already ruled out.
    pub fn validate(request: &RunRequest) -> Result<(), ResolveError> {
        if request.requested_template().is_some() && request.explicit_output_path().is_some() {
            return Err(ResolveError::ConflictingOutputSpec);
        }
        Ok(())
    }

    /// Resolve the output location for a request
    ///
    /// Pure aside from the store lookup and one clock reading.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::TemplateNotFound`] when the named template is
    ///   absent from the store, regardless of the other arguments
    /// - [`ResolveError::Render`] when the winning value contains a
    ///   placeholder the arguments cannot satisfy
    pub fn resolve(
        &self,
        store: &dyn TemplateStore,
        request: &RunRequest,
        clock: &dyn Clock,
    ) -> Result<ResolvedOutput, ResolveError> {
        let mut args = request
            .requested_template()
            .map(|spec| spec.args().clone())
            .unwrap_or_default();
        args.set_notebook_name(request.computed_output_filename());
        args.apply_time(&TimeParts::now(clock));

        let resolved = self.apply_precedence(store, request, &args)?;
        tracing::debug!(
            path = resolved.path.as_str(),
            source = ?resolved.source,
            "resolved output location"
        );
        Ok(resolved)
    }

    fn apply_precedence(
        &self,
        store: &dyn TemplateStore,
        request: &RunRequest,
        args: &TemplateArgs,
    ) -> Result<ResolvedOutput, ResolveError> {
        if let Some(spec) = request.requested_template() {
            let template =
                store
                    .get(spec.name())
                    .ok_or_else(|| ResolveError::TemplateNotFound {
                        name: spec.name().to_string(),
                    })?;
            return Ok(ResolvedOutput {
                path: self.renderer.render(template.content(), args)?,
                source: ResolutionSource::NamedTemplate {
                    name: template.name().to_string(),
                },
            });
        }

        if let Some(path) = request.explicit_output_path() {
            return Ok(ResolvedOutput {
                path: self.renderer.render(path, args)?,
                source: ResolutionSource::ExplicitPath,
            });
        }

        if let Some(default) = store.get_default() {
            return Ok(ResolvedOutput {
                path: self.renderer.render(default.content(), args)?,
                source: ResolutionSource::DefaultTemplate {
                    name: default.name().to_string(),
                },
            });
        }

        Ok(ResolvedOutput {
            path: self.renderer.render(&request.context().source_dir, args)?,
            source: ResolutionSource::SourceDirectory,
        })
    }
}
