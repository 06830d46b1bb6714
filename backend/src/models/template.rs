//! Template model
//!
//! A template is a named string whose content may embed `{{args.*}}`
//! placeholders describing where an executed notebook's output should be
//! written. Templates are created and mutated through the template store;
//! the resolver only ever reads them.

use serde::{Deserialize, Serialize};

/// Named output-location pattern
///
/// # Example
/// ```
/// use notebook_runner_core_rs::Template;
///
/// let t = Template::new("daily", "s3://reports/{{args.year}}/{{args.month}}/");
/// assert_eq!(t.name(), "daily");
/// assert!(t.content().contains("{{args.year}}"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Unique template name (store key)
    name: String,

    /// Output location pattern, may embed `{{args.*}}` placeholders
    content: String,
}

impl Template {
    /// Create a template
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw (unrendered) content
    pub fn content(&self) -> &str {
        &self.content
    }
}
