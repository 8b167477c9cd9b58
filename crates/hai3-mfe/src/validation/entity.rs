//! Schema validation of domains, entries and extensions.

use serde::Serialize;

use crate::error::{MfeError, Result};
use crate::type_system::{TypeSystemPlugin, ValidationError, ValidationResult};
use crate::types::{
    Domain, Entry, Extension, HAI3_ACTION_LOAD_EXT, HAI3_DOMAIN_TYPE, HAI3_ENTRY_TYPE,
    HAI3_EXTENSION_TYPE,
};

fn validate_entity<T: Serialize>(
    plugin: &dyn TypeSystemPlugin,
    base_type: &str,
    id: &str,
    entity: &T,
) -> ValidationResult {
    let mut errors = Vec::new();
    if !plugin.is_valid_type_id(id) {
        errors.push(ValidationError::new("id", format!("'{}' is not a valid type id", id)));
    }
    match serde_json::to_value(entity) {
        Ok(instance) => errors.extend(plugin.validate_instance(base_type, &instance).errors),
        Err(e) => errors.push(ValidationError::new("", e.to_string())),
    }
    ValidationResult::from_errors(errors)
}

/// Validate a domain against the domain base schema and its own invariants.
pub fn validate_domain_schema(plugin: &dyn TypeSystemPlugin, domain: &Domain) -> ValidationResult {
    let mut result = validate_entity(plugin, HAI3_DOMAIN_TYPE, &domain.id, domain);
    if domain.default_action_timeout == 0
        && !result.errors.iter().any(|e| e.path == "defaultActionTimeout")
    {
        result
            .errors
            .push(ValidationError::new("defaultActionTimeout", "must be > 0"));
    }
    if !domain.supports_action(HAI3_ACTION_LOAD_EXT) {
        result.errors.push(ValidationError::new(
            "actions",
            format!("every domain must support '{}'", HAI3_ACTION_LOAD_EXT),
        ));
    }
    ValidationResult::from_errors(result.errors)
}

pub fn validate_entry_schema(plugin: &dyn TypeSystemPlugin, entry: &Entry) -> ValidationResult {
    validate_entity(plugin, HAI3_ENTRY_TYPE, &entry.id, entry)
}

pub fn validate_extension_schema(
    plugin: &dyn TypeSystemPlugin,
    extension: &Extension,
) -> ValidationResult {
    validate_entity(plugin, HAI3_EXTENSION_TYPE, &extension.id, extension)
}

/// Fail with `TypeConformance` unless `type_id` derives from `base`.
pub fn ensure_type_of(plugin: &dyn TypeSystemPlugin, type_id: &str, base: &str) -> Result<()> {
    if plugin.is_type_of(type_id, base) {
        Ok(())
    } else {
        Err(MfeError::TypeConformance {
            type_id: type_id.to_string(),
            expected_base: base.to_string(),
        })
    }
}

/// Turn a failed result into a `SchemaValidation` error.
pub fn into_schema_error(type_id: &str, result: ValidationResult) -> Result<()> {
    if result.valid {
        Ok(())
    } else {
        Err(MfeError::SchemaValidation {
            type_id: type_id.to_string(),
            errors: result.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_system::InMemoryTypeSystem;

    const DOMAIN: &str = "gts.hai3.mfes.ext.domain.v1~acme.app.layout.sidebar.v1";

    #[test]
    fn test_valid_domain() {
        let plugin = InMemoryTypeSystem::new();
        let domain = Domain::new(DOMAIN, 30_000).with_actions([HAI3_ACTION_LOAD_EXT]);
        assert!(validate_domain_schema(&plugin, &domain).valid);
    }

    #[test]
    fn test_zero_timeout_rejected_once() {
        let plugin = InMemoryTypeSystem::new();
        let domain = Domain::new(DOMAIN, 0).with_actions([HAI3_ACTION_LOAD_EXT]);
        let result = validate_domain_schema(&plugin, &domain);
        assert!(!result.valid);
        let timeout_errors = result
            .errors
            .iter()
            .filter(|e| e.path == "defaultActionTimeout")
            .count();
        assert_eq!(timeout_errors, 1);
    }

    #[test]
    fn test_domain_without_load_rejected() {
        let plugin = InMemoryTypeSystem::new();
        let domain = Domain::new(DOMAIN, 30_000);
        let result = validate_domain_schema(&plugin, &domain);
        assert!(result.errors.iter().any(|e| e.path == "actions"));
    }

    #[test]
    fn test_type_conformance() {
        let plugin = InMemoryTypeSystem::new();
        assert!(ensure_type_of(&plugin, DOMAIN, HAI3_DOMAIN_TYPE).is_ok());
        let err = ensure_type_of(&plugin, DOMAIN, HAI3_ENTRY_TYPE).unwrap_err();
        assert!(matches!(err, MfeError::TypeConformance { .. }));
    }
}
