//! Template storage
//!
//! The resolver consumes templates through the read-only [`TemplateStore`]
//! trait; the persistent store behind the HTTP layer implements it.
//! [`InMemoryTemplateStore`] is the reference implementation used by
//! tests, the CLI, and the FFI gateway.
//!
//! # Critical Invariants
//!
//! 1. **Pointer validity**: the default pointer, when set, names a
//!    template that exists in the store
//! 2. **Atomic reassignment**: deleting the current default clears the
//!    pointer in the same operation; it is never left dangling
//! 3. **Name uniqueness**: template names are unique keys
//!
//! The default pointer is an explicit field the store maintains on every
//! mutation, never a side effect of some other write.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::Template;

/// Errors from template store mutations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Insert of a name that is already taken
    #[error("template exists: {name}")]
    AlreadyExists { name: String },

    /// Update, delete or set-default of a name that is not present
    #[error("no template: {name}")]
    UnknownTemplate { name: String },
}

/// Read-only template lookup used by the resolver
///
/// Implementations guarantee read-after-write consistency and external
/// synchronization; the resolver takes no locks of its own.
pub trait TemplateStore: Send + Sync {
    /// Look up a template by name
    fn get(&self, name: &str) -> Option<Template>;

    /// The current default template, if the default pointer is set
    ///
    /// `None` covers both "no pointer" and "pointer explicitly cleared";
    /// the two are indistinguishable to the resolver on purpose.
    fn get_default(&self) -> Option<Template>;
}

/// In-memory template store
///
/// # Example
/// ```
/// use notebook_runner_core_rs::{InMemoryTemplateStore, Template, TemplateStore};
///
/// let mut store = InMemoryTemplateStore::new();
/// store.insert(Template::new("daily", "s3://reports/{{args.day}}/")).unwrap();
/// store.set_default("daily").unwrap();
///
/// assert_eq!(store.get_default().unwrap().name(), "daily");
///
/// store.delete("daily").unwrap();
/// assert!(store.get_default().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplateStore {
    /// Templates by name
    templates: BTreeMap<String, Template>,

    /// Name of the current default template, if any
    default_name: Option<String>,
}

impl InMemoryTemplateStore {
    /// Empty store with no default pointer
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new template
    ///
    /// # Errors
    ///
    /// [`StoreError::AlreadyExists`] if the name is taken.
    pub fn insert(&mut self, template: Template) -> Result<(), StoreError> {
        let name = template.name().to_string();
        if self.templates.contains_key(&name) {
            return Err(StoreError::AlreadyExists { name });
        }
        self.templates.insert(name, template);
        Ok(())
    }

    /// Replace the content of an existing template
    ///
    /// The default pointer is untouched: a template keeps its default
    /// status across content updates.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownTemplate`] if the name is not present.
    pub fn update(&mut self, template: Template) -> Result<(), StoreError> {
        let name = template.name().to_string();
        if !self.templates.contains_key(&name) {
            return Err(StoreError::UnknownTemplate { name });
        }
        self.templates.insert(name, template);
        Ok(())
    }

    /// Delete a template, clearing the default pointer if it named it
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownTemplate`] if the name is not present.
    pub fn delete(&mut self, name: &str) -> Result<Template, StoreError> {
        let removed = self
            .templates
            .remove(name)
            .ok_or_else(|| StoreError::UnknownTemplate {
                name: name.to_string(),
            })?;
        if self.default_name.as_deref() == Some(name) {
            self.default_name = None;
        }
        Ok(removed)
    }

    /// Point the default at an existing template
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownTemplate`] if the name is not present; the
    /// pointer is left unchanged in that case.
    pub fn set_default(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.templates.contains_key(name) {
            return Err(StoreError::UnknownTemplate {
                name: name.to_string(),
            });
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Clear the default pointer without deleting anything
    pub fn clear_default(&mut self) {
        self.default_name = None;
    }

    /// Name the default pointer currently references
    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// All templates, ordered by name
    pub fn list(&self) -> Vec<&Template> {
        self.templates.values().collect()
    }

    /// Number of stored templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the store holds no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn get(&self, name: &str) -> Option<Template> {
        self.templates.get(name).cloned()
    }

    fn get_default(&self) -> Option<Template> {
        self.default_name
            .as_deref()
            .and_then(|name| self.templates.get(name))
            .cloned()
    }
}
