//! Domain: a declared mount point and its contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mount-point contract.
///
/// All ids are opaque type descriptors. Lists keep declaration order so that
/// diagnostics derived from them are reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    /// Shared property types this domain offers to its extensions.
    #[serde(default)]
    pub shared_properties: Vec<String>,
    /// Structural actions the domain itself supports (load/unload).
    #[serde(default)]
    pub actions: Vec<String>,
    /// Action types the domain may emit to extensions.
    #[serde(default)]
    pub domain_actions: Vec<String>,
    /// Action types the domain accepts from extensions.
    #[serde(default)]
    pub extensions_actions: Vec<String>,
    /// Schema (inline object or type id string) every extension's `uiMeta`
    /// must satisfy.
    pub extensions_ui_meta: Value,
    /// Timeout in milliseconds for actions that carry no override. Must be > 0.
    pub default_action_timeout: u64,
}

impl Domain {
    pub fn new(id: impl Into<String>, default_action_timeout: u64) -> Self {
        Self {
            id: id.into(),
            shared_properties: Vec::new(),
            actions: Vec::new(),
            domain_actions: Vec::new(),
            extensions_actions: Vec::new(),
            extensions_ui_meta: serde_json::json!({ "type": "object" }),
            default_action_timeout,
        }
    }

    pub fn with_shared_properties<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared_properties = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_actions<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_domain_actions<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_actions = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extensions_actions<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions_actions = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extensions_ui_meta(mut self, schema: Value) -> Self {
        self.extensions_ui_meta = schema;
        self
    }

    pub fn offers_property(&self, property_id: &str) -> bool {
        self.shared_properties.iter().any(|p| p == property_id)
    }

    pub fn supports_action(&self, action_type: &str) -> bool {
        self.actions.iter().any(|a| a == action_type)
    }
}
