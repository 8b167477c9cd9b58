//! Extension binding and shared property value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Binding of one entry into one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub id: String,
    pub domain: String,
    pub entry: String,
    /// Instance data checked against the domain's `extensionsUiMeta`.
    #[serde(default = "empty_object")]
    pub ui_meta: Value,
}

impl Extension {
    pub fn new(
        id: impl Into<String>,
        domain: impl Into<String>,
        entry: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            entry: entry.into(),
            ui_meta: empty_object(),
        }
    }

    pub fn with_ui_meta(mut self, ui_meta: Value) -> Self {
        self.ui_meta = ui_meta;
        self
    }
}

/// Domain-to-extension read-only value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedProperty {
    pub id: String,
    pub value: Value,
}

impl SharedProperty {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}
