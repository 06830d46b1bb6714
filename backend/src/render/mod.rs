//! Output-location rendering
//!
//! Template content and user-supplied output paths are handlebars-style
//! strings whose placeholders read from the `args` namespace:
//! `{{args.timestamp}}`, `{{args.notebook_name}}`, and so on.
//!
//! Rendering is strict: a placeholder that cannot be resolved against the
//! supplied arguments is a hard error, never an empty substitution. A
//! silently-blanked placeholder would send notebook output to a malformed
//! path.

use handlebars::Handlebars;
use thiserror::Error;

use crate::models::TemplateArgs;

/// A placeholder could not be resolved, or the template is malformed
///
/// The underlying engine error names the offending placeholder.
#[derive(Debug, Error)]
#[error("cannot render output location: {source}")]
pub struct RenderError {
    #[from]
    source: handlebars::RenderError,
}

/// Strict placeholder-substitution engine
///
/// Escaping is disabled: rendered output is a filesystem or object-store
/// path, not HTML.
///
/// # Example
/// ```
/// use notebook_runner_core_rs::{TemplateArgs, TemplateRenderer};
///
/// let renderer = TemplateRenderer::new();
/// let mut args = TemplateArgs::new();
/// args.insert("year", "2024");
///
/// let path = renderer.render("s3://reports/{{args.year}}/", &args).unwrap();
/// assert_eq!(path, "s3://reports/2024/");
///
/// // Content without placeholders renders to itself.
/// assert_eq!(renderer.render("/data/out/", &args).unwrap(), "/data/out/");
///
/// // Unknown placeholders are a hard error.
/// assert!(renderer.render("{{args.missing}}/", &args).is_err());
/// ```
#[derive(Debug)]
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Create a renderer in strict mode with escaping disabled
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    /// Render `content` against `args`
    ///
    /// # Errors
    ///
    /// [`RenderError`] when a placeholder has no value in `args` or the
    /// template syntax is invalid.
    pub fn render(&self, content: &str, args: &TemplateArgs) -> Result<String, RenderError> {
        let data = serde_json::json!({ "args": args.values() });
        Ok(self.registry.render_template(content, &data)?)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}
