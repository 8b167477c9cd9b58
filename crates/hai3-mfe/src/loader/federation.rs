//! Module-federation style bundle loader.
//!
//! Resolution for an entry with [`LoaderKind::ModuleFederation`]:
//! manifest (cached by id) → shared dependency check → remote container
//! (cached by remote name) → exposed module → lifecycle.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::manifest::{Manifest, ManifestFetcher};
use super::{BundleLoader, LoadedBundle, MfeLifecycle};
use crate::error::{MfeError, Result};
use crate::types::{Entry, LoaderKind};

/// A module exposed by a remote container.
#[derive(Clone)]
pub struct RemoteModule {
    pub name: String,
    /// `None` when the module does not export a mount/unmount lifecycle.
    pub lifecycle: Option<Arc<dyn MfeLifecycle>>,
}

impl RemoteModule {
    pub fn new(name: impl Into<String>, lifecycle: Arc<dyn MfeLifecycle>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Some(lifecycle),
        }
    }

    pub fn without_lifecycle(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: None,
        }
    }
}

/// An initialised remote container.
#[async_trait]
pub trait RemoteContainer: Send + Sync {
    async fn get_module(&self, exposed_module: &str) -> Result<RemoteModule>;
}

/// Fetches and initialises the container a manifest describes.
#[async_trait]
pub trait RemoteContainerLoader: Send + Sync {
    async fn load_container(&self, manifest: &Manifest) -> Result<Arc<dyn RemoteContainer>>;
}

/// [`BundleLoader`] for module-federation entries.
pub struct FederatedBundleLoader {
    fetcher: Arc<dyn ManifestFetcher>,
    containers: Arc<dyn RemoteContainerLoader>,
    /// Versions of libraries the host shares with remote containers.
    host_shared: HashMap<String, semver::Version>,
    manifest_cache: RwLock<HashMap<String, Manifest>>,
    container_cache: RwLock<HashMap<String, Arc<dyn RemoteContainer>>>,
}

impl FederatedBundleLoader {
    pub fn new(fetcher: Arc<dyn ManifestFetcher>, containers: Arc<dyn RemoteContainerLoader>) -> Self {
        Self {
            fetcher,
            containers,
            host_shared: HashMap::new(),
            manifest_cache: RwLock::new(HashMap::new()),
            container_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Declare a library version the host provides.
    pub fn with_shared_version(mut self, name: impl Into<String>, version: semver::Version) -> Self {
        self.host_shared.insert(name.into(), version);
        self
    }

    pub fn cached_manifests(&self) -> usize {
        self.manifest_cache.read().len()
    }

    pub fn cached_containers(&self) -> usize {
        self.container_cache.read().len()
    }

    pub fn clear_cache(&self) {
        self.manifest_cache.write().clear();
        self.container_cache.write().clear();
    }

    async fn manifest(&self, manifest_id: &str) -> Result<Manifest> {
        let cached = self.manifest_cache.read().get(manifest_id).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let manifest = self.fetcher.fetch(manifest_id).await?;
        debug!(manifest_id, remote = %manifest.remote_name, "Manifest resolved");
        self.manifest_cache
            .write()
            .insert(manifest_id.to_string(), manifest.clone());
        Ok(manifest)
    }

    async fn container(&self, manifest: &Manifest) -> Result<Arc<dyn RemoteContainer>> {
        let cached = self.container_cache.read().get(&manifest.remote_name).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let container = self
            .containers
            .load_container(manifest)
            .await
            .map_err(|e| match e {
                MfeError::Load { .. } => e,
                other => MfeError::load(&manifest.remote_name, other.to_string()),
            })?;
        info!(remote = %manifest.remote_name, "Remote container initialised");
        self.container_cache
            .write()
            .insert(manifest.remote_name.clone(), Arc::clone(&container));
        Ok(container)
    }

    /// Singleton dependencies must be satisfied by the host. Others fall
    /// back to the container's own copy.
    fn check_shared_dependencies(&self, manifest: &Manifest) -> Result<()> {
        for dependency in &manifest.shared_dependencies {
            let requirement = semver::VersionReq::parse(&dependency.required_version).map_err(|e| {
                MfeError::load(
                    &manifest.id,
                    format!("invalid version requirement for '{}': {}", dependency.name, e),
                )
            })?;

            let provided = self.host_shared.get(&dependency.name);
            let satisfied = provided.is_some_and(|v| requirement.matches(v));
            if satisfied {
                continue;
            }

            if dependency.singleton {
                return Err(MfeError::VersionMismatch {
                    dependency: dependency.name.clone(),
                    required: dependency.required_version.clone(),
                    provided: provided.map_or_else(|| "none".to_string(), ToString::to_string),
                });
            }
            warn!(
                manifest_id = %manifest.id,
                dependency = %dependency.name,
                required = %dependency.required_version,
                "Host version not compatible, container uses its own copy"
            );
        }
        Ok(())
    }
}

fn federation_target(entry: &Entry) -> Result<(&str, &str)> {
    match &entry.loader {
        LoaderKind::ModuleFederation {
            manifest,
            exposed_module,
        } => Ok((manifest.as_str(), exposed_module.as_str())),
        LoaderKind::Abstract => Err(MfeError::load(&entry.id, "entry has no loader metadata")),
    }
}

#[async_trait]
impl BundleLoader for FederatedBundleLoader {
    async fn load(&self, entry: &Entry) -> Result<LoadedBundle> {
        let (manifest_id, exposed_module) = federation_target(entry)?;

        let manifest = self.manifest(manifest_id).await?;
        self.check_shared_dependencies(&manifest)?;
        let container = self.container(&manifest).await?;

        let module = container
            .get_module(exposed_module)
            .await
            .map_err(|e| MfeError::load(&entry.id, format!("module '{}': {}", exposed_module, e)))?;

        let lifecycle = module.lifecycle.ok_or_else(|| {
            MfeError::load(
                &entry.id,
                format!("module '{}' does not expose a mount/unmount lifecycle", module.name),
            )
        })?;

        debug!(entry_id = %entry.id, module = %exposed_module, "Bundle loaded");
        Ok(LoadedBundle::new(lifecycle).with_manifest(manifest))
    }

    async fn preload(&self, entries: &[Entry]) -> Result<()> {
        let mut seen = HashSet::new();
        let manifest_ids: Vec<&str> = entries
            .iter()
            .filter_map(|entry| match &entry.loader {
                LoaderKind::ModuleFederation { manifest, .. } => Some(manifest.as_str()),
                LoaderKind::Abstract => None,
            })
            .filter(|id| seen.insert(*id))
            .collect();

        futures::future::try_join_all(manifest_ids.into_iter().map(|id| async move {
            let manifest = self.manifest(id).await?;
            self.check_shared_dependencies(&manifest)?;
            self.container(&manifest).await
        }))
        .await?;
        Ok(())
    }
}
