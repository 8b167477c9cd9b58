//! Backend source of domain and extension instances.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::{Domain, Extension};

/// Incremental change pushed by a [`TypeInstanceProvider`].
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceUpdate {
    DomainAdded(Domain),
    DomainRemoved { id: String },
    ExtensionAdded(Extension),
    ExtensionRemoved { id: String },
}

impl InstanceUpdate {
    /// Id of the instance the update refers to.
    pub fn instance_id(&self) -> &str {
        match self {
            Self::DomainAdded(domain) => &domain.id,
            Self::ExtensionAdded(extension) => &extension.id,
            Self::DomainRemoved { id } | Self::ExtensionRemoved { id } => id,
        }
    }
}

/// Supplies domains, extensions and entries registered on a backend.
#[async_trait]
pub trait TypeInstanceProvider: Send + Sync {
    async fn fetch_domains(&self) -> Result<Vec<Domain>>;

    async fn fetch_extensions(&self) -> Result<Vec<Extension>>;

    /// Any instance by id, typically an entry the registry has not cached.
    async fn fetch_instance(&self, id: &str) -> Result<Option<Value>>;

    /// Live feed of instance changes.
    fn subscribe_to_updates(&self) -> broadcast::Receiver<InstanceUpdate>;
}
