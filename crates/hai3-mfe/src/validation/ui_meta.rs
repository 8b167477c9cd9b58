//! Dynamic `uiMeta` validation.
//!
//! The schema an extension's `uiMeta` must satisfy lives on its domain and is
//! only known once that domain is registered, so it is resolved through the
//! type system at validation time.

use serde_json::Value;

use crate::type_system::{TypeSystemPlugin, ValidationResult};
use crate::types::Extension;

/// Attribute of a domain instance holding the uiMeta schema.
pub const EXTENSIONS_UI_META_ATTRIBUTE: &str = "extensionsUiMeta";

/// Validate `extension.ui_meta` against its domain's `extensionsUiMeta`.
///
/// An attribute that cannot be resolved is a failure. A string attribute is
/// treated as the type id of a registered schema; anything else is used as
/// an inline schema.
pub fn validate_extension_ui_meta(
    plugin: &dyn TypeSystemPlugin,
    extension: &Extension,
) -> ValidationResult {
    let attribute = plugin.get_attribute(&extension.domain, EXTENSIONS_UI_META_ATTRIBUTE);
    if !attribute.resolved {
        return ValidationResult::failure(
            EXTENSIONS_UI_META_ATTRIBUTE,
            format!(
                "cannot resolve {} of domain '{}': {}",
                EXTENSIONS_UI_META_ATTRIBUTE,
                extension.domain,
                attribute.error.unwrap_or_else(|| "unknown error".to_string())
            ),
        );
    }

    match attribute.value {
        Some(Value::String(schema_type_id)) => {
            plugin.validate_instance(&schema_type_id, &extension.ui_meta)
        }
        Some(schema) => plugin.validate_against_schema(&schema, &extension.ui_meta),
        None => ValidationResult::failure(
            EXTENSIONS_UI_META_ATTRIBUTE,
            format!("domain '{}' resolved an empty schema", extension.domain),
        ),
    }
}
