//! Schemas of the HAI3 first-class types, registered by
//! [`super::InMemoryTypeSystem::new`].

use serde_json::{json, Value};

use crate::types::{
    HAI3_ACTION_LOAD_EXT, HAI3_ACTION_TYPE, HAI3_ACTION_UNLOAD_EXT, HAI3_DOMAIN_TYPE,
    HAI3_ENTRY_TYPE, HAI3_EXTENSION_TYPE, HAI3_SHARED_PROPERTY_LANGUAGE,
    HAI3_SHARED_PROPERTY_THEME,
};

fn id_list() -> Value {
    json!({ "type": "array", "items": { "type": "string", "minLength": 1 } })
}

fn lifecycle_payload() -> Value {
    json!({
        "type": "object",
        "required": ["extensionId"],
        "properties": { "extensionId": { "type": "string", "minLength": 1 } }
    })
}

pub(super) fn builtin_schemas() -> Vec<(&'static str, Value)> {
    vec![
        (
            HAI3_DOMAIN_TYPE,
            json!({
                "type": "object",
                "required": [
                    "id", "sharedProperties", "actions", "extensionsActions",
                    "extensionsUiMeta", "defaultActionTimeout"
                ],
                "properties": {
                    "id": { "type": "string", "minLength": 1 },
                    "sharedProperties": id_list(),
                    "actions": id_list(),
                    "domainActions": id_list(),
                    "extensionsActions": id_list(),
                    "extensionsUiMeta": { "type": ["object", "string"] },
                    "defaultActionTimeout": { "type": "integer", "exclusiveMinimum": 0 }
                }
            }),
        ),
        (
            HAI3_ENTRY_TYPE,
            json!({
                "type": "object",
                "required": ["id", "requiredProperties", "actions", "domainActions"],
                "properties": {
                    "id": { "type": "string", "minLength": 1 },
                    "requiredProperties": id_list(),
                    "optionalProperties": id_list(),
                    "actions": id_list(),
                    "domainActions": id_list(),
                    "loader": {
                        "type": "object",
                        "required": ["kind"],
                        "properties": {
                            "kind": { "enum": ["abstract", "moduleFederation"] },
                            "manifest": { "type": "string", "minLength": 1 },
                            "exposedModule": { "type": "string", "minLength": 1 }
                        }
                    }
                }
            }),
        ),
        (
            HAI3_EXTENSION_TYPE,
            json!({
                "type": "object",
                "required": ["id", "domain", "entry"],
                "properties": {
                    "id": { "type": "string", "minLength": 1 },
                    "domain": { "type": "string", "minLength": 1 },
                    "entry": { "type": "string", "minLength": 1 }
                }
            }),
        ),
        (
            HAI3_ACTION_TYPE,
            json!({
                "type": "object",
                "required": ["type", "target"],
                "properties": {
                    "type": { "type": "string", "minLength": 1 },
                    "target": { "type": "string", "minLength": 1 },
                    "timeout": { "type": "integer", "exclusiveMinimum": 0 }
                }
            }),
        ),
        (HAI3_ACTION_LOAD_EXT, lifecycle_payload()),
        (HAI3_ACTION_UNLOAD_EXT, lifecycle_payload()),
        (
            HAI3_SHARED_PROPERTY_THEME,
            json!({ "type": "string", "minLength": 1 }),
        ),
        (
            HAI3_SHARED_PROPERTY_LANGUAGE,
            json!({ "type": "string", "minLength": 2 }),
        ),
    ]
}
