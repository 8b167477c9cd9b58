//! Mount, unmount and shared property fan-out.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{MfeRegistry, MountState};
use crate::bridge::HostBridge;
use crate::coordinator::{ContainerHandle, RuntimeConnection};
use crate::error::{MfeError, Result};
use crate::events::MfeEvent;

impl MfeRegistry {
    /// Load an extension's bundle and mount it into `container`.
    ///
    /// Mount and unmount of one extension are serialized, so at most one
    /// bridge exists per extension.
    pub async fn mount_extension(&self, extension_id: &str, container: ContainerHandle) -> Result<()> {
        let lock = self.lifecycle_lock(extension_id);
        let _guard = lock.lock().await;

        let (extension, entry) = {
            let extensions = self.shared.extensions.read().await;
            let state = extensions
                .get(extension_id)
                .ok_or_else(|| MfeError::ExtensionNotRegistered(extension_id.to_string()))?;
            if state.mount.is_some() {
                return Err(MfeError::ExtensionAlreadyMounted(extension_id.to_string()));
            }
            (state.extension.clone(), state.entry.clone())
        };

        if let Some(occupant) = self.shared.coordinator.occupant(&container) {
            return Err(MfeError::load(
                extension_id,
                format!("container {} already hosts '{}'", container, occupant),
            ));
        }

        let loader = self
            .shared
            .bundle_loader
            .clone()
            .ok_or_else(|| MfeError::load(&entry.id, "no bundle loader configured"))?;
        let bundle = loader.load(&entry).await?;

        let bridge = HostBridge::new(&extension, &entry, self.shared.chains.clone());
        {
            let domains = self.shared.domains.read().await;
            if let Some(domain) = domains.get(&extension.domain) {
                for (property_id, value) in &domain.properties {
                    if entry.declares_property(property_id) {
                        bridge.update_property(property_id, value.clone());
                    }
                }
                if let Some(handler) = &domain.options.extension_action_handler {
                    bridge.on_host_action(handler.clone());
                }
            }
        }

        if let Err(e) = bundle
            .lifecycle
            .mount(&container, bridge.extension_bridge())
            .await
        {
            bridge.dispose();
            warn!(extension_id, error = %e, "Extension mount failed");
            return Err(match e {
                MfeError::Load { .. } => e,
                other => MfeError::load(extension_id, other.to_string()),
            });
        }

        {
            let mut extensions = self.shared.extensions.write().await;
            match extensions.get_mut(extension_id) {
                Some(state) => {
                    state.mount = Some(MountState {
                        container: container.clone(),
                        bridge: bridge.clone(),
                        lifecycle: bundle.lifecycle.clone(),
                    });
                }
                None => {
                    bridge.dispose();
                    return Err(MfeError::ExtensionNotRegistered(extension_id.to_string()));
                }
            }
        }

        self.shared.coordinator.register(
            container.clone(),
            RuntimeConnection {
                extension_id: extension_id.to_string(),
                domain_id: extension.domain.clone(),
                bridge,
            },
        );

        info!(
            extension_id,
            domain_id = %extension.domain,
            container = %container,
            "Extension mounted"
        );
        self.shared.events.publish(MfeEvent::ExtensionMounted {
            extension_id: extension_id.to_string(),
            domain_id: extension.domain,
            container: container.id(),
        });
        Ok(())
    }

    /// Unmount an extension. Idempotent; unknown ids are a no-op.
    pub async fn unmount_extension(&self, extension_id: &str) -> Result<()> {
        let lock = self.lifecycle_lock(extension_id);
        let _guard = lock.lock().await;
        self.unmount_locked(extension_id).await;
        Ok(())
    }

    /// Container the extension is mounted in, if any.
    pub async fn mounted_container(&self, extension_id: &str) -> Option<ContainerHandle> {
        self.shared
            .extensions
            .read()
            .await
            .get(extension_id)
            .and_then(|s| s.mount.as_ref().map(|m| m.container.clone()))
    }

    /// Caller holds the extension's lifecycle lock.
    ///
    /// Registry state, the coordinator and the bridge are torn down before
    /// the lifecycle is awaited, so a caller dropping this future midway
    /// never leaves a container mapped to a live bridge.
    pub(super) async fn unmount_locked(&self, extension_id: &str) -> Option<ContainerHandle> {
        let (mount, domain_id) = {
            let mut extensions = self.shared.extensions.write().await;
            let state = extensions.get_mut(extension_id)?;
            (state.mount.take()?, state.extension.domain.clone())
        };

        mount.bridge.dispose();
        self.shared.coordinator.remove(&mount.container);

        info!(extension_id, domain_id = %domain_id, "Extension unmounted");
        self.shared.events.publish(MfeEvent::ExtensionUnmounted {
            extension_id: extension_id.to_string(),
            domain_id,
        });

        if let Err(e) = mount.lifecycle.unmount(&mount.container).await {
            warn!(extension_id, error = %e, "Extension unmount reported an error");
        }
        Some(mount.container)
    }

    /// Set a shared property of a domain and push it to every mounted
    /// extension whose entry declares it.
    pub async fn update_domain_property(
        &self,
        domain_id: &str,
        property_id: &str,
        value: Value,
    ) -> Result<()> {
        let plugin = self.type_system();
        if plugin.get_schema(property_id).is_some() {
            let result = plugin.validate_instance(property_id, &value);
            if !result.valid {
                return Err(MfeError::SchemaValidation {
                    type_id: property_id.to_string(),
                    errors: result.errors,
                });
            }
        }

        let bound: Vec<String> = {
            let mut domains = self.shared.domains.write().await;
            let state = domains
                .get_mut(domain_id)
                .ok_or_else(|| MfeError::DomainNotRegistered(domain_id.to_string()))?;
            if !state.domain.offers_property(property_id) {
                return Err(MfeError::UnknownSharedProperty {
                    domain_id: domain_id.to_string(),
                    property_id: property_id.to_string(),
                });
            }
            state
                .properties
                .insert(property_id.to_string(), value.clone());
            state.bound_extensions.iter().cloned().collect()
        };

        let bridges: Vec<HostBridge> = {
            let extensions = self.shared.extensions.read().await;
            bound
                .iter()
                .filter_map(|id| extensions.get(id))
                .filter(|s| s.entry.declares_property(property_id))
                .filter_map(|s| s.mount.as_ref().map(|m| m.bridge.clone()))
                .collect()
        };
        for bridge in &bridges {
            bridge.update_property(property_id, value.clone());
        }

        debug!(domain_id, property_id, receivers = bridges.len(), "Domain property updated");
        self.shared.events.publish(MfeEvent::DomainPropertyUpdated {
            domain_id: domain_id.to_string(),
            property_id: property_id.to_string(),
        });
        Ok(())
    }
}
