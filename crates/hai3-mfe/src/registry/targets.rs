//! Action targets backed by the registry.

use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::debug;

use super::{MfeRegistry, RegistryShared};
use crate::actions::{ActionHandler, ActionTarget, ActionTargetResolver};
use crate::coordinator::ContainerProvider;
use crate::error::{MfeError, Result};
use crate::types::{Action, HAI3_ACTION_LOAD_EXT, HAI3_ACTION_UNLOAD_EXT};

fn upgrade(registry: &Weak<RegistryShared>) -> Result<MfeRegistry> {
    registry
        .upgrade()
        .map(|shared| MfeRegistry { shared })
        .ok_or_else(|| MfeError::Provider("registry dropped".to_string()))
}

/// Resolves chain targets to registered domains or mounted extensions.
pub(super) struct RegistryTargets {
    registry: Weak<RegistryShared>,
}

impl RegistryTargets {
    pub(super) fn new(registry: Weak<RegistryShared>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ActionTargetResolver for RegistryTargets {
    async fn resolve(&self, target: &str) -> Result<ActionTarget> {
        let registry = upgrade(&self.registry)?;

        if let Some(domain) = registry.domain(target).await {
            return Ok(ActionTarget::Domain {
                domain,
                handler: Arc::new(DomainActionDispatcher {
                    registry: self.registry.clone(),
                    domain_id: target.to_string(),
                }),
            });
        }

        let (domain_id, bridge) = {
            let extensions = registry.shared.extensions.read().await;
            let state = extensions
                .get(target)
                .ok_or_else(|| MfeError::ActionTargetNotFound(target.to_string()))?;
            let bridge = state.mount.as_ref().map(|m| m.bridge.clone()).ok_or_else(|| {
                MfeError::ActionTargetNotFound(format!("extension '{}' is not mounted", target))
            })?;
            (state.extension.domain.clone(), bridge)
        };

        let domain = registry
            .domain(&domain_id)
            .await
            .ok_or(MfeError::DomainNotRegistered(domain_id))?;
        Ok(ActionTarget::Extension { domain, bridge })
    }
}

/// Handles actions targeted at a domain: `load_ext` and `unload_ext`
/// directly, anything else through the domain's own handler.
struct DomainActionDispatcher {
    registry: Weak<RegistryShared>,
    domain_id: String,
}

/// Mount or unmount requested through a domain action.
///
/// Runs on its own task: the chain mediator drops a delivery that exceeds
/// its timeout, and a half-finished mount or unmount must still run to the
/// end and release its container.
struct LifecycleWork {
    registry: MfeRegistry,
    domain_id: String,
    action: Action,
}

impl LifecycleWork {
    async fn run(self) -> Result<()> {
        match self.action.action_type.as_str() {
            HAI3_ACTION_LOAD_EXT => self.load().await,
            _ => self.unload().await,
        }
    }

    fn extension_id(&self) -> Result<String> {
        self.action
            .payload
            .as_ref()
            .and_then(|p| p.get("extensionId"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                MfeError::action_failed(&self.action.action_type, "payload lacks 'extensionId'")
            })
    }

    async fn load(&self) -> Result<()> {
        let extension_id = self.extension_id()?;
        self.ensure_bound(&extension_id).await?;
        if self.registry.is_mounted(&extension_id).await {
            debug!(extension_id = %extension_id, "Extension already mounted, load is a no-op");
            return Ok(());
        }

        let provider = self.container_provider().await?;
        let container = provider.get_container(&extension_id).await?;
        if let Err(e) = self
            .registry
            .mount_extension(&extension_id, container.clone())
            .await
        {
            provider.release_container(&extension_id, &container).await;
            return Err(e);
        }
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        let extension_id = self.extension_id()?;
        self.ensure_bound(&extension_id).await?;

        let lock = self.registry.lifecycle_lock(&extension_id);
        let container = {
            let _guard = lock.lock().await;
            self.registry.unmount_locked(&extension_id).await
        };
        if let Some(container) = container {
            if let Ok(provider) = self.container_provider().await {
                provider.release_container(&extension_id, &container).await;
            }
        }
        Ok(())
    }

    async fn ensure_bound(&self, extension_id: &str) -> Result<()> {
        match self.registry.extension(extension_id).await {
            Some(extension) if extension.domain == self.domain_id => Ok(()),
            Some(_) => Err(MfeError::action_failed(
                &self.action.action_type,
                format!("extension '{}' is not bound to '{}'", extension_id, self.domain_id),
            )),
            None => Err(MfeError::ExtensionNotRegistered(extension_id.to_string())),
        }
    }

    async fn container_provider(&self) -> Result<Arc<dyn ContainerProvider>> {
        self.registry
            .shared
            .domains
            .read()
            .await
            .get(&self.domain_id)
            .and_then(|s| s.options.container_provider.clone())
            .ok_or_else(|| {
                MfeError::action_failed(
                    &self.action.action_type,
                    format!("domain '{}' has no container provider", self.domain_id),
                )
            })
    }
}

#[async_trait]
impl ActionHandler for DomainActionDispatcher {
    async fn handle(&self, action: &Action) -> Result<()> {
        let registry = upgrade(&self.registry)?;
        match action.action_type.as_str() {
            HAI3_ACTION_LOAD_EXT | HAI3_ACTION_UNLOAD_EXT => {
                let work = LifecycleWork {
                    registry,
                    domain_id: self.domain_id.clone(),
                    action: action.clone(),
                };
                tokio::spawn(work.run()).await.map_err(|e| {
                    MfeError::action_failed(&action.action_type, format!("lifecycle task failed: {}", e))
                })?
            }
            _ => {
                let handler = registry
                    .shared
                    .domains
                    .read()
                    .await
                    .get(&self.domain_id)
                    .and_then(|s| s.options.action_handler.clone())
                    .ok_or_else(|| MfeError::NoActionHandler(self.domain_id.clone()))?;
                handler.handle(action).await
            }
        }
    }
}
