//! Pluggable type system.
//!
//! The core never interprets type ids itself; every question about an id,
//! a schema or an instance goes through a [`TypeSystemPlugin`]. Each runtime
//! owns exactly one plugin instance: [`crate::MfeRegistry`] takes the plugin
//! by value at construction and never hands out an owning reference, so two
//! isolated runtimes cannot end up sharing one schema registry.
//!
//! [`InMemoryTypeSystem`] is the bundled implementation.

mod builtin;
mod memory;
mod schema;

pub use memory::InMemoryTypeSystem;
pub use schema::validate_value;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One validation failure, located by a dotted path into the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Outcome of validating an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn failure(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_errors(vec![ValidationError::new(path, message)])
    }
}

/// Outcome of comparing two versions of a type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub compatible: bool,
    pub breaking: bool,
    pub changes: Vec<String>,
}

/// Outcome of runtime attribute resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeResult {
    pub resolved: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
}

impl AttributeResult {
    pub fn resolved(value: Value) -> Self {
        Self {
            resolved: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn unresolved(error: impl Into<String>) -> Self {
        Self {
            resolved: false,
            value: None,
            error: Some(error.into()),
        }
    }
}

/// Components used to build a type id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeIdParts {
    pub vendor: String,
    pub package: String,
    pub namespace: String,
    pub type_name: String,
    pub ver_major: u32,
    pub ver_minor: Option<u32>,
}

/// Capability interface of a schema/identifier engine.
pub trait TypeSystemPlugin: Send + Sync {
    /// Plugin name, for diagnostics.
    fn name(&self) -> &str;

    fn is_valid_type_id(&self, type_id: &str) -> bool;

    fn build_type_id(&self, parts: &TypeIdParts) -> Result<String>;

    /// Implementation-defined metadata about `type_id`. The core only logs
    /// or forwards it.
    fn parse_type_id(&self, type_id: &str) -> Result<Value>;

    fn register_schema(&self, type_id: &str, schema: Value) -> Result<()>;

    fn get_schema(&self, type_id: &str) -> Option<Value>;

    /// Register an instance (object with an `id` field) so its attributes
    /// can be resolved at runtime.
    fn register_instance(&self, instance: Value) -> Result<()>;

    /// Forget a registered instance. Unknown ids are ignored.
    fn unregister_instance(&self, id: &str);

    fn validate_instance(&self, type_id: &str, instance: &Value) -> ValidationResult;

    /// Validate against a schema resolved at runtime rather than registered.
    fn validate_against_schema(&self, schema: &Value, instance: &Value) -> ValidationResult;

    /// Ids matching `pattern` (`*` wildcard), at most `limit`.
    fn query(&self, pattern: &str, limit: Option<usize>) -> Vec<String>;

    /// Whether `type_id` is `base_type_id` or derived from it.
    fn is_type_of(&self, type_id: &str, base_type_id: &str) -> bool;

    fn check_compatibility(&self, old_type_id: &str, new_type_id: &str) -> CompatibilityResult;

    /// Resolve `path` (dotted) on the instance or schema registered as `type_id`.
    fn get_attribute(&self, type_id: &str, path: &str) -> AttributeResult;
}
