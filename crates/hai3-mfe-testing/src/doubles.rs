//! Test doubles for the collaborators the registry consumes.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use hai3_mfe::bridge::ExtensionBridge;
use hai3_mfe::coordinator::{ContainerHandle, ContainerProvider};
use hai3_mfe::error::{MfeError, Result};
use hai3_mfe::loader::{BundleLoader, LoadedBundle, MfeLifecycle};
use hai3_mfe::provider::{InstanceUpdate, TypeInstanceProvider};
use hai3_mfe::types::{Action, Domain, Entry, Extension};
use hai3_mfe::ActionHandler;

/// Call observed by a [`RecordingLifecycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCall {
    Mount { container: u64, extension_id: String },
    Unmount { container: u64 },
}

/// Lifecycle that records calls and keeps the last bridge it was given.
#[derive(Default)]
pub struct RecordingLifecycle {
    calls: Mutex<Vec<LifecycleCall>>,
    bridge: Mutex<Option<ExtensionBridge>>,
    fail_mount: bool,
    mount_delay: Option<Duration>,
    unmount_delay: Option<Duration>,
}

impl RecordingLifecycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Lifecycle whose `mount` always fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_mount: true,
            ..Self::default()
        })
    }

    /// Lifecycle whose `mount` takes `delay` to complete.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            mount_delay: Some(delay),
            ..Self::default()
        })
    }

    /// Lifecycle whose `mount` fails after `delay`.
    pub fn failing_after(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail_mount: true,
            mount_delay: Some(delay),
            ..Self::default()
        })
    }

    /// Lifecycle whose `unmount` takes `delay` to complete.
    pub fn slow_unmount(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            unmount_delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<LifecycleCall> {
        self.calls.lock().clone()
    }

    pub fn mount_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LifecycleCall::Mount { .. }))
            .count()
    }

    pub fn unmount_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LifecycleCall::Unmount { .. }))
            .count()
    }

    /// Extension side of the bridge handed to the last `mount`.
    pub fn bridge(&self) -> Option<ExtensionBridge> {
        self.bridge.lock().clone()
    }
}

#[async_trait]
impl MfeLifecycle for RecordingLifecycle {
    async fn mount(&self, container: &ContainerHandle, bridge: ExtensionBridge) -> Result<()> {
        if let Some(delay) = self.mount_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_mount {
            return Err(MfeError::load(bridge.extension_id(), "mount rejected"));
        }
        self.calls.lock().push(LifecycleCall::Mount {
            container: container.id(),
            extension_id: bridge.extension_id().to_string(),
        });
        *self.bridge.lock() = Some(bridge);
        Ok(())
    }

    async fn unmount(&self, container: &ContainerHandle) -> Result<()> {
        if let Some(delay) = self.unmount_delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(LifecycleCall::Unmount {
            container: container.id(),
        });
        Ok(())
    }
}

/// Bundle loader serving lifecycles registered per entry id.
#[derive(Default)]
pub struct InMemoryBundleLoader {
    lifecycles: RwLock<HashMap<String, Arc<dyn MfeLifecycle>>>,
    fallback: Option<Arc<dyn MfeLifecycle>>,
    loads: AtomicUsize,
    preloaded: Mutex<Vec<String>>,
}

impl InMemoryBundleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader returning `lifecycle` for every entry.
    pub fn serving(lifecycle: Arc<dyn MfeLifecycle>) -> Self {
        Self {
            fallback: Some(lifecycle),
            ..Self::default()
        }
    }

    pub fn with_lifecycle(self, entry_id: impl Into<String>, lifecycle: Arc<dyn MfeLifecycle>) -> Self {
        self.lifecycles.write().insert(entry_id.into(), lifecycle);
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn preloaded(&self) -> Vec<String> {
        self.preloaded.lock().clone()
    }
}

#[async_trait]
impl BundleLoader for InMemoryBundleLoader {
    async fn load(&self, entry: &Entry) -> Result<LoadedBundle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let lifecycle = self
            .lifecycles
            .read()
            .get(&entry.id)
            .cloned()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| MfeError::load(&entry.id, "no bundle for entry"))?;
        Ok(LoadedBundle::new(lifecycle))
    }

    async fn preload(&self, entries: &[Entry]) -> Result<()> {
        self.preloaded
            .lock()
            .extend(entries.iter().map(|e| e.id.clone()));
        Ok(())
    }
}

/// Instance provider backed by in-memory lists and a broadcast feed.
pub struct StaticInstanceProvider {
    domains: RwLock<Vec<Domain>>,
    extensions: RwLock<Vec<Extension>>,
    instances: RwLock<HashMap<String, Value>>,
    updates: broadcast::Sender<InstanceUpdate>,
}

impl Default for StaticInstanceProvider {
    fn default() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            domains: RwLock::new(Vec::new()),
            extensions: RwLock::new(Vec::new()),
            instances: RwLock::new(HashMap::new()),
            updates,
        }
    }
}

impl StaticInstanceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_domain(&self, domain: Domain) {
        self.domains.write().push(domain);
    }

    pub fn add_extension(&self, extension: Extension) {
        self.extensions.write().push(extension);
    }

    /// Make an entry resolvable through `fetch_instance`.
    pub fn add_entry(&self, entry: &Entry) {
        if let Ok(value) = serde_json::to_value(entry) {
            self.instances.write().insert(entry.id.clone(), value);
        }
    }

    /// Push an update to live subscribers. Returns the number of receivers.
    pub fn push(&self, update: InstanceUpdate) -> usize {
        self.updates.send(update).unwrap_or(0)
    }
}

#[async_trait]
impl TypeInstanceProvider for StaticInstanceProvider {
    async fn fetch_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.domains.read().clone())
    }

    async fn fetch_extensions(&self) -> Result<Vec<Extension>> {
        Ok(self.extensions.read().clone())
    }

    async fn fetch_instance(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.instances.read().get(id).cloned())
    }

    fn subscribe_to_updates(&self) -> broadcast::Receiver<InstanceUpdate> {
        self.updates.subscribe()
    }
}

/// Hands out a fresh container per request and records releases.
#[derive(Default)]
pub struct StaticContainerProvider {
    issued: Mutex<Vec<(String, ContainerHandle)>>,
    released: Mutex<HashSet<u64>>,
}

impl StaticContainerProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn issued(&self) -> Vec<(String, ContainerHandle)> {
        self.issued.lock().clone()
    }

    pub fn is_released(&self, container: &ContainerHandle) -> bool {
        self.released.lock().contains(&container.id())
    }
}

#[async_trait]
impl ContainerProvider for StaticContainerProvider {
    async fn get_container(&self, extension_id: &str) -> Result<ContainerHandle> {
        let container = ContainerHandle::new(format!("slot:{}", extension_id));
        self.issued
            .lock()
            .push((extension_id.to_string(), container.clone()));
        Ok(container)
    }

    async fn release_container(&self, _extension_id: &str, container: &ContainerHandle) {
        self.released.lock().insert(container.id());
    }
}

/// Action handler that records what it receives.
#[derive(Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<Action>>,
    delay: Option<Duration>,
    reject_with: Option<String>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Handler that completes after `delay`.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Handler that rejects every action.
    pub fn rejecting(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reject_with: Some(message.into()),
            ..Self::default()
        })
    }

    pub fn received(&self) -> Vec<Action> {
        self.received.lock().clone()
    }

    pub fn received_types(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .map(|a| a.action_type.clone())
            .collect()
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn handle(&self, action: &Action) -> Result<()> {
        self.received.lock().push(action.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reject_with {
            Some(message) => Err(MfeError::action_failed(&action.action_type, message.clone())),
            None => Ok(()),
        }
    }
}
