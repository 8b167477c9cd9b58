//! Container handles and the runtime coordinator.
//!
//! The coordinator maps a container handle to the runtime mounted into it.
//! It is owned by one [`crate::MfeRegistry`]; entries are added on mount and
//! removed on unmount, never implicitly.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::bridge::HostBridge;
use crate::error::Result;

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle to a host-side container an extension renders into.
///
/// Identity is the numeric id; the label is for diagnostics only, so two
/// handles with the same label are still different containers.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    id: u64,
    label: Arc<str>,
}

impl ContainerHandle {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            label: Arc::from(label.as_ref()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for ContainerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContainerHandle {}

impl std::hash::Hash for ContainerHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.label, self.id)
    }
}

/// Supplies containers for extensions a domain loads through `load_ext`.
#[async_trait]
pub trait ContainerProvider: Send + Sync {
    async fn get_container(&self, extension_id: &str) -> Result<ContainerHandle>;

    /// Called after the extension in `container` was unmounted.
    async fn release_container(&self, _extension_id: &str, _container: &ContainerHandle) {}
}

/// What is mounted in a container.
#[derive(Clone)]
pub struct RuntimeConnection {
    pub extension_id: String,
    pub domain_id: String,
    pub bridge: HostBridge,
}

/// Container-keyed registry of live runtimes.
#[derive(Default)]
pub struct RuntimeCoordinator {
    connections: DashMap<ContainerHandle, RuntimeConnection>,
}

impl RuntimeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `container` with a runtime. Returns the connection that was
    /// already there, if any.
    pub fn register(
        &self,
        container: ContainerHandle,
        connection: RuntimeConnection,
    ) -> Option<RuntimeConnection> {
        self.connections.insert(container, connection)
    }

    pub fn get(&self, container: &ContainerHandle) -> Option<RuntimeConnection> {
        self.connections.get(container).map(|c| c.value().clone())
    }

    pub fn remove(&self, container: &ContainerHandle) -> Option<RuntimeConnection> {
        self.connections.remove(container).map(|(_, c)| c)
    }

    pub fn contains(&self, container: &ContainerHandle) -> bool {
        self.connections.contains_key(container)
    }

    /// Extension id mounted in `container`, if any.
    pub fn occupant(&self, container: &ContainerHandle) -> Option<String> {
        self.connections
            .get(container)
            .map(|c| c.value().extension_id.clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_identity_ignores_label() {
        let a = ContainerHandle::new("slot");
        let b = ContainerHandle::new("slot");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.label(), "slot");
    }
}
