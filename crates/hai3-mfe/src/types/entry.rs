//! Entry: the portable contract of a deployable unit.

use serde::{Deserialize, Serialize};

/// How the unit behind an entry is loaded.
///
/// One closed set of loader kinds instead of a family of derived entry types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LoaderKind {
    /// Pure contract, nothing to load.
    #[default]
    Abstract,
    /// Remote container described by a manifest, exposing a named module.
    ModuleFederation {
        manifest: String,
        #[serde(rename = "exposedModule")]
        exposed_module: String,
    },
}

/// Communication contract of an extension unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub required_properties: Vec<String>,
    #[serde(default)]
    pub optional_properties: Vec<String>,
    /// Action types this unit emits to its domain.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Action types this unit handles when sent by its domain.
    #[serde(default)]
    pub domain_actions: Vec<String>,
    #[serde(default)]
    pub loader: LoaderKind,
}

impl Entry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required_properties: Vec::new(),
            optional_properties: Vec::new(),
            actions: Vec::new(),
            domain_actions: Vec::new(),
            loader: LoaderKind::Abstract,
        }
    }

    pub fn with_required_properties<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_properties = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_optional_properties<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_properties = ids.into_iter().map(Into::into).collect();
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

    pub fn with_module_federation(
        mut self,
        manifest: impl Into<String>,
        exposed_module: impl Into<String>,
    ) -> Self {
        self.loader = LoaderKind::ModuleFederation {
            manifest: manifest.into(),
            exposed_module: exposed_module.into(),
        };
        self
    }

    /// Whether the entry reads `property_id`, required or optional.
    pub fn declares_property(&self, property_id: &str) -> bool {
        self.required_properties
            .iter()
            .chain(self.optional_properties.iter())
            .any(|p| p == property_id)
    }

    pub fn emits_action(&self, action_type: &str) -> bool {
        self.actions.iter().any(|a| a == action_type)
    }

    pub fn handles_domain_action(&self, action_type: &str) -> bool {
        self.domain_actions.iter().any(|a| a == action_type)
    }
}
