//! Bundle loading seams.
//!
//! The registry never loads code itself. It asks a [`BundleLoader`] for the
//! lifecycle of an entry and drives that lifecycle on mount and unmount.

mod federation;
mod manifest;

pub use federation::{FederatedBundleLoader, RemoteContainer, RemoteContainerLoader, RemoteModule};
pub use manifest::{
    CompositeManifestFetcher, Manifest, ManifestFetcher, RegistryManifestFetcher,
    SharedDependency, UrlManifestFetcher,
};

use async_trait::async_trait;
use std::sync::Arc;

use crate::bridge::ExtensionBridge;
use crate::coordinator::ContainerHandle;
use crate::error::Result;
use crate::types::Entry;

/// Mount/unmount lifecycle exposed by a loaded extension unit.
#[async_trait]
pub trait MfeLifecycle: Send + Sync {
    async fn mount(&self, container: &ContainerHandle, bridge: ExtensionBridge) -> Result<()>;

    async fn unmount(&self, container: &ContainerHandle) -> Result<()>;
}

/// A loaded extension unit.
#[derive(Clone)]
pub struct LoadedBundle {
    pub lifecycle: Arc<dyn MfeLifecycle>,
    /// Manifest the bundle was resolved from, when the loader used one.
    pub manifest: Option<Manifest>,
}

impl LoadedBundle {
    pub fn new(lifecycle: Arc<dyn MfeLifecycle>) -> Self {
        Self {
            lifecycle,
            manifest: None,
        }
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

impl std::fmt::Debug for LoadedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedBundle")
            .field("manifest", &self.manifest.as_ref().map(|m| &m.id))
            .finish_non_exhaustive()
    }
}

/// Resolves an entry to a runnable lifecycle.
#[async_trait]
pub trait BundleLoader: Send + Sync {
    async fn load(&self, entry: &Entry) -> Result<LoadedBundle>;

    /// Warm caches for `entries`. The default does nothing.
    async fn preload(&self, _entries: &[Entry]) -> Result<()> {
        Ok(())
    }
}
