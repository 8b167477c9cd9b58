//! Extension/domain mediator.
//!
//! [`MfeRegistry`] owns every domain and extension of one runtime:
//! - Domain and extension registration with schema, contract and uiMeta checks
//! - Mount/unmount orchestration through the bundle loader and bridges
//! - Shared property updates fanned out to mounted extensions
//! - Backend sync through a [`TypeInstanceProvider`]
//!
//! Lock order is always domains before extensions. No guard is held across a
//! call into a loader, lifecycle or handler.

mod lifecycle;
mod sync;
mod targets;

pub use sync::{RefreshReport, UpdateSubscription};

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::actions::{ActionsChainsMediator, ChainOptions, ChainResult, DynActionHandler};
use crate::bridge::HostBridge;
use crate::config::MfeConfig;
use crate::coordinator::{ContainerHandle, ContainerProvider, RuntimeCoordinator};
use crate::error::{MfeError, Result};
use crate::events::{EventBus, EventReceiver, MfeEvent};
use crate::loader::{BundleLoader, MfeLifecycle};
use crate::provider::TypeInstanceProvider;
use crate::type_system::{InMemoryTypeSystem, TypeSystemPlugin};
use crate::types::{
    ActionsChain, Domain, Entry, Extension, HAI3_DOMAIN_TYPE, HAI3_ENTRY_TYPE,
    HAI3_EXTENSION_TYPE,
};
use crate::validation::{
    ensure_type_of, into_schema_error, validate_contract, validate_domain_schema,
    validate_entry_schema, validate_extension_schema, validate_extension_ui_meta,
};
use targets::RegistryTargets;

/// Host-side collaborators attached to a domain at registration.
#[derive(Clone, Default)]
pub struct DomainOptions {
    /// Supplies containers for `load_ext`.
    pub container_provider: Option<Arc<dyn ContainerProvider>>,
    /// Receives non-structural actions targeted at the domain.
    pub action_handler: Option<DynActionHandler>,
    /// Receives actions mounted extensions send to the host.
    pub extension_action_handler: Option<DynActionHandler>,
}

impl DomainOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container_provider(mut self, provider: Arc<dyn ContainerProvider>) -> Self {
        self.container_provider = Some(provider);
        self
    }

    pub fn with_action_handler(mut self, handler: DynActionHandler) -> Self {
        self.action_handler = Some(handler);
        self
    }

    pub fn with_extension_action_handler(mut self, handler: DynActionHandler) -> Self {
        self.extension_action_handler = Some(handler);
        self
    }
}

/// Lifecycle state of a registered extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionStatus {
    Registered,
    Mounted,
}

struct DomainState {
    domain: Domain,
    /// Current shared property values
    properties: HashMap<String, Value>,
    /// Extensions bound to this domain
    bound_extensions: BTreeSet<String>,
    options: DomainOptions,
}

struct MountState {
    container: ContainerHandle,
    bridge: HostBridge,
    lifecycle: Arc<dyn MfeLifecycle>,
}

struct ExtensionState {
    extension: Extension,
    entry: Entry,
    mount: Option<MountState>,
}

struct RegistryShared {
    type_system: Arc<dyn TypeSystemPlugin>,
    config: MfeConfig,
    /// Registered domains
    domains: RwLock<HashMap<String, DomainState>>,
    /// Registered extensions
    extensions: RwLock<HashMap<String, ExtensionState>>,
    /// Known entries, consulted before the instance provider
    entries: RwLock<HashMap<String, Entry>>,
    /// Per-extension mount/unmount serialization
    lifecycle_locks: SyncMutex<HashMap<String, Arc<Mutex<()>>>>,
    coordinator: RuntimeCoordinator,
    events: EventBus,
    chains: Arc<ActionsChainsMediator>,
    bundle_loader: Option<Arc<dyn BundleLoader>>,
    instance_provider: Option<Arc<dyn TypeInstanceProvider>>,
}

/// Builder for [`MfeRegistry`].
#[derive(Default)]
pub struct MfeRegistryBuilder {
    type_system: Option<Arc<dyn TypeSystemPlugin>>,
    bundle_loader: Option<Arc<dyn BundleLoader>>,
    instance_provider: Option<Arc<dyn TypeInstanceProvider>>,
    config: Option<MfeConfig>,
}

impl MfeRegistryBuilder {
    /// Type system owned by this runtime. Taken by value so that one plugin
    /// instance can never back two registries.
    pub fn type_system(mut self, plugin: impl TypeSystemPlugin + 'static) -> Self {
        self.type_system = Some(Arc::new(plugin));
        self
    }

    pub fn bundle_loader(mut self, loader: Arc<dyn BundleLoader>) -> Self {
        self.bundle_loader = Some(loader);
        self
    }

    pub fn instance_provider(mut self, provider: Arc<dyn TypeInstanceProvider>) -> Self {
        self.instance_provider = Some(provider);
        self
    }

    pub fn config(mut self, config: MfeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> MfeRegistry {
        let type_system = self
            .type_system
            .unwrap_or_else(|| Arc::new(InMemoryTypeSystem::new()));
        let config = self.config.unwrap_or_default();

        let shared = Arc::new_cyclic(|weak| {
            let chains = ActionsChainsMediator::new(
                Arc::new(RegistryTargets::new(weak.clone())),
                Arc::clone(&type_system),
                config.max_chain_depth,
            );
            RegistryShared {
                type_system,
                events: EventBus::with_capacity(config.event_channel_capacity),
                config,
                domains: RwLock::new(HashMap::new()),
                extensions: RwLock::new(HashMap::new()),
                entries: RwLock::new(HashMap::new()),
                lifecycle_locks: SyncMutex::new(HashMap::new()),
                coordinator: RuntimeCoordinator::new(),
                chains: Arc::new(chains),
                bundle_loader: self.bundle_loader,
                instance_provider: self.instance_provider,
            }
        });

        MfeRegistry { shared }
    }
}

/// Mediator for the domains and extensions of one runtime.
#[derive(Clone)]
pub struct MfeRegistry {
    shared: Arc<RegistryShared>,
}

impl Default for MfeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MfeRegistry {
    /// Registry with the in-memory type system and default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MfeRegistryBuilder {
        MfeRegistryBuilder::default()
    }

    pub fn type_system(&self) -> &dyn TypeSystemPlugin {
        self.shared.type_system.as_ref()
    }

    pub fn config(&self) -> &MfeConfig {
        &self.shared.config
    }

    pub fn coordinator(&self) -> &RuntimeCoordinator {
        &self.shared.coordinator
    }

    pub fn subscribe_events(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    // ========== Domains ==========

    /// Register a domain with no host-side collaborators.
    pub async fn register_domain(&self, domain: Domain) -> Result<()> {
        self.register_domain_with(domain, DomainOptions::default()).await
    }

    /// Register a domain. A known id is rejected, never overwritten.
    pub async fn register_domain_with(&self, domain: Domain, options: DomainOptions) -> Result<()> {
        let plugin = self.type_system();
        into_schema_error(&domain.id, validate_domain_schema(plugin, &domain))?;
        ensure_type_of(plugin, &domain.id, HAI3_DOMAIN_TYPE)?;
        let instance = serde_json::to_value(&domain)?;

        let domain_id = domain.id.clone();
        {
            let mut domains = self.shared.domains.write().await;
            if domains.contains_key(&domain_id) {
                return Err(MfeError::DomainAlreadyRegistered(domain_id));
            }
            plugin.register_instance(instance)?;
            domains.insert(
                domain_id.clone(),
                DomainState {
                    domain,
                    properties: HashMap::new(),
                    bound_extensions: BTreeSet::new(),
                    options,
                },
            );
        }

        info!(domain_id = %domain_id, "Domain registered");
        self.shared
            .events
            .publish(MfeEvent::DomainRegistered { domain_id });
        Ok(())
    }

    /// Unregister a domain and every extension bound to it. Idempotent.
    pub async fn unregister_domain(&self, domain_id: &str) -> Result<()> {
        let bound: Vec<String> = match self.shared.domains.read().await.get(domain_id) {
            Some(state) => state.bound_extensions.iter().cloned().collect(),
            None => return Ok(()),
        };

        for extension_id in &bound {
            self.unregister_extension(extension_id).await?;
        }

        if self.shared.domains.write().await.remove(domain_id).is_none() {
            return Ok(());
        }
        self.type_system().unregister_instance(domain_id);

        info!(domain_id, cascaded = bound.len(), "Domain unregistered");
        self.shared.events.publish(MfeEvent::DomainUnregistered {
            domain_id: domain_id.to_string(),
        });
        Ok(())
    }

    // ========== Entries ==========

    /// Add an entry to the local cache consulted during extension
    /// registration. A known id is replaced.
    pub async fn register_entry(&self, entry: Entry) -> Result<()> {
        let plugin = self.type_system();
        into_schema_error(&entry.id, validate_entry_schema(plugin, &entry))?;
        ensure_type_of(plugin, &entry.id, HAI3_ENTRY_TYPE)?;
        plugin.register_instance(serde_json::to_value(&entry)?)?;

        debug!(entry_id = %entry.id, "Entry registered");
        self.shared
            .entries
            .write()
            .await
            .insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn resolve_entry(&self, entry_id: &str) -> Result<Entry> {
        if let Some(entry) = self.shared.entries.read().await.get(entry_id) {
            return Ok(entry.clone());
        }

        let provider = self
            .shared
            .instance_provider
            .as_ref()
            .ok_or_else(|| MfeError::EntryNotFound(entry_id.to_string()))?;
        let instance = provider
            .fetch_instance(entry_id)
            .await?
            .ok_or_else(|| MfeError::EntryNotFound(entry_id.to_string()))?;
        let entry: Entry = serde_json::from_value(instance)?;

        debug!(entry_id, "Entry resolved from instance provider");
        self.shared
            .entries
            .write()
            .await
            .insert(entry_id.to_string(), entry.clone());
        Ok(entry)
    }

    // ========== Extensions ==========

    /// Validate and register an extension. It starts unmounted.
    pub async fn register_extension(&self, extension: Extension) -> Result<()> {
        if self.domain(&extension.domain).await.is_none() {
            return Err(MfeError::DomainNotRegistered(extension.domain.clone()));
        }
        if self.shared.extensions.read().await.contains_key(&extension.id) {
            return Err(MfeError::ExtensionAlreadyRegistered(extension.id.clone()));
        }

        let entry = self.validate_binding(&extension).await?;
        self.store_extension(extension, entry).await
    }

    /// Every registration check short of the duplicate check. Returns the
    /// resolved entry.
    async fn validate_binding(&self, extension: &Extension) -> Result<Entry> {
        let domain = self
            .domain(&extension.domain)
            .await
            .ok_or_else(|| MfeError::DomainNotRegistered(extension.domain.clone()))?;

        let plugin = self.type_system();
        into_schema_error(&extension.id, validate_extension_schema(plugin, extension))?;
        ensure_type_of(plugin, &extension.id, HAI3_EXTENSION_TYPE)?;

        let entry = self.resolve_entry(&extension.entry).await?;
        into_schema_error(&entry.id, validate_entry_schema(plugin, &entry))?;

        let contract = validate_contract(&entry, &domain);
        if !contract.valid {
            return Err(MfeError::ContractMismatch {
                extension_id: extension.id.clone(),
                entry_id: entry.id.clone(),
                domain_id: domain.id.clone(),
                errors: contract.errors,
            });
        }

        let ui_meta = validate_extension_ui_meta(plugin, extension);
        if !ui_meta.valid {
            return Err(MfeError::UiMetaValidation {
                extension_id: extension.id.clone(),
                domain_id: domain.id.clone(),
                errors: ui_meta.errors,
            });
        }
        Ok(entry)
    }

    /// Insert an already validated binding.
    async fn store_extension(&self, extension: Extension, entry: Entry) -> Result<()> {
        let extension_id = extension.id.clone();
        let domain_id = extension.domain.clone();
        let instance = serde_json::to_value(&extension)?;
        {
            let mut domains = self.shared.domains.write().await;
            let mut extensions = self.shared.extensions.write().await;
            let domain_state = domains
                .get_mut(&domain_id)
                .ok_or_else(|| MfeError::DomainNotRegistered(domain_id.clone()))?;
            if extensions.contains_key(&extension_id) {
                return Err(MfeError::ExtensionAlreadyRegistered(extension_id));
            }
            self.type_system().register_instance(instance)?;
            domain_state.bound_extensions.insert(extension_id.clone());
            extensions.insert(
                extension_id.clone(),
                ExtensionState {
                    extension,
                    entry,
                    mount: None,
                },
            );
        }

        info!(extension_id = %extension_id, domain_id = %domain_id, "Extension registered");
        self.shared.events.publish(MfeEvent::ExtensionRegistered {
            extension_id,
            domain_id,
        });
        Ok(())
    }

    /// Unmount (if needed) and remove an extension. Idempotent.
    pub async fn unregister_extension(&self, extension_id: &str) -> Result<()> {
        let lock = self.lifecycle_lock(extension_id);
        let _guard = lock.lock().await;

        if !self.shared.extensions.read().await.contains_key(extension_id) {
            return Ok(());
        }
        self.unmount_locked(extension_id).await;

        let removed = {
            let mut domains = self.shared.domains.write().await;
            let mut extensions = self.shared.extensions.write().await;
            let removed = extensions.remove(extension_id);
            if let Some(state) = &removed {
                if let Some(domain) = domains.get_mut(&state.extension.domain) {
                    domain.bound_extensions.remove(extension_id);
                }
            }
            removed
        };
        self.release_lifecycle_lock(extension_id, &lock);

        let Some(state) = removed else {
            return Ok(());
        };
        self.type_system().unregister_instance(extension_id);

        info!(extension_id, domain_id = %state.extension.domain, "Extension unregistered");
        self.shared.events.publish(MfeEvent::ExtensionUnregistered {
            extension_id: extension_id.to_string(),
            domain_id: state.extension.domain,
        });
        Ok(())
    }

    fn lifecycle_lock(&self, extension_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.shared.lifecycle_locks.lock();
        Arc::clone(locks.entry(extension_id.to_string()).or_default())
    }

    /// Drop the table entry for `lock` unless another task still holds it.
    /// A waiter keeps the entry, so a re-registered id reuses the same mutex.
    fn release_lifecycle_lock(&self, extension_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.shared.lifecycle_locks.lock();
        let idle = locks
            .get(extension_id)
            .is_some_and(|current| Arc::ptr_eq(current, lock) && Arc::strong_count(current) == 2);
        if idle {
            locks.remove(extension_id);
        }
    }

    // ========== Actions ==========

    /// Execute an actions chain. Never fails; see [`ChainResult`].
    pub async fn execute_actions_chain(&self, chain: &ActionsChain, options: ChainOptions) -> ChainResult {
        self.shared.chains.execute_actions_chain(chain, options).await
    }

    /// Warm the bundle loader for `entries`.
    pub async fn preload(&self, entries: &[Entry]) -> Result<()> {
        match &self.shared.bundle_loader {
            Some(loader) => loader.preload(entries).await,
            None => Ok(()),
        }
    }

    // ========== Queries ==========

    pub async fn domain(&self, domain_id: &str) -> Option<Domain> {
        self.shared
            .domains
            .read()
            .await
            .get(domain_id)
            .map(|s| s.domain.clone())
    }

    /// Registered domain ids, sorted.
    pub async fn domain_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.shared.domains.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn domain_property(&self, domain_id: &str, property_id: &str) -> Option<Value> {
        self.shared
            .domains
            .read()
            .await
            .get(domain_id)
            .and_then(|s| s.properties.get(property_id).cloned())
    }

    pub async fn entry(&self, entry_id: &str) -> Option<Entry> {
        self.shared.entries.read().await.get(entry_id).cloned()
    }

    pub async fn extension(&self, extension_id: &str) -> Option<Extension> {
        self.shared
            .extensions
            .read()
            .await
            .get(extension_id)
            .map(|s| s.extension.clone())
    }

    /// Ids of the extensions bound to a domain, sorted.
    pub async fn extensions_for_domain(&self, domain_id: &str) -> Vec<String> {
        self.shared
            .domains
            .read()
            .await
            .get(domain_id)
            .map(|s| s.bound_extensions.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// `None` when the extension is not registered.
    pub async fn extension_state(&self, extension_id: &str) -> Option<ExtensionStatus> {
        self.shared
            .extensions
            .read()
            .await
            .get(extension_id)
            .map(|s| match s.mount {
                Some(_) => ExtensionStatus::Mounted,
                None => ExtensionStatus::Registered,
            })
    }

    pub async fn is_mounted(&self, extension_id: &str) -> bool {
        self.extension_state(extension_id).await == Some(ExtensionStatus::Mounted)
    }

    /// Host side of the bridge of a mounted extension.
    pub async fn host_bridge(&self, extension_id: &str) -> Option<HostBridge> {
        self.shared
            .extensions
            .read()
            .await
            .get(extension_id)
            .and_then(|s| s.mount.as_ref().map(|m| m.bridge.clone()))
    }

    pub fn bridge_for_container(&self, container: &ContainerHandle) -> Option<HostBridge> {
        self.shared.coordinator.get(container).map(|c| c.bridge)
    }
}
