//! Manifests and the strategies that fetch them.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::MfeConfig;
use crate::error::{MfeError, Result};

/// Describes one remote container and what it needs from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    /// Location of the container's entry script.
    pub remote_entry: String,
    /// Name the container registers itself under.
    pub remote_name: String,
    #[serde(default)]
    pub shared_dependencies: Vec<SharedDependency>,
    /// Entry type ids this container exposes.
    #[serde(default)]
    pub entries: Vec<String>,
}

impl Manifest {
    pub fn new(
        id: impl Into<String>,
        remote_entry: impl Into<String>,
        remote_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            remote_entry: remote_entry.into(),
            remote_name: remote_name.into(),
            shared_dependencies: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn with_shared_dependency(mut self, dependency: SharedDependency) -> Self {
        self.shared_dependencies.push(dependency);
        self
    }
}

/// A library the container expects the host to share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDependency {
    pub name: String,
    /// Semver requirement, e.g. `^18.2`.
    pub required_version: String,
    #[serde(default)]
    pub singleton: bool,
}

impl SharedDependency {
    pub fn new(name: impl Into<String>, required_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_version: required_version.into(),
            singleton: false,
        }
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }
}

/// Fetches a manifest by id.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, manifest_id: &str) -> Result<Manifest>;
}

/// Fetches manifests over HTTP.
///
/// An id that is already an `http(s)` URL is fetched as is. Other ids are
/// resolved against the base URL as `{base}/{id}.json`.
pub struct UrlManifestFetcher {
    client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl UrlManifestFetcher {
    /// Fetcher using the timeout from [`MfeConfig::from_env`].
    pub fn new() -> Result<Self> {
        Self::from_config(&MfeConfig::from_env())
    }

    pub fn from_config(config: &MfeConfig) -> Result<Self> {
        Self::with_timeout(config.manifest_fetch_timeout)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MfeError::load("manifest", format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: None,
            timeout,
        })
    }

    /// Per-request timeout of the underlying client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn resolve_url(&self, manifest_id: &str) -> Result<String> {
        if manifest_id.starts_with("http://") || manifest_id.starts_with("https://") {
            return Ok(manifest_id.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!("{}/{}.json", base, manifest_id)),
            None => Err(MfeError::load(
                manifest_id,
                "manifest id is not a URL and no base URL is configured",
            )),
        }
    }
}

#[async_trait]
impl ManifestFetcher for UrlManifestFetcher {
    async fn fetch(&self, manifest_id: &str) -> Result<Manifest> {
        let url = self.resolve_url(manifest_id)?;
        debug!(manifest_id, url = %url, "Fetching manifest");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MfeError::load(manifest_id, format!("HTTP error: {}", e)))?;

        if !response.status().is_success() {
            return Err(MfeError::load(
                manifest_id,
                format!("manifest request returned {}", response.status().as_u16()),
            ));
        }

        response
            .json::<Manifest>()
            .await
            .map_err(|e| MfeError::load(manifest_id, format!("JSON decode error: {}", e)))
    }
}

/// Serves manifests registered ahead of time.
#[derive(Default)]
pub struct RegistryManifestFetcher {
    manifests: RwLock<HashMap<String, Manifest>>,
}

impl RegistryManifestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a manifest under its own id.
    pub fn register(&self, manifest: Manifest) {
        self.manifests.write().insert(manifest.id.clone(), manifest);
    }

    pub fn len(&self) -> usize {
        self.manifests.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.read().is_empty()
    }
}

#[async_trait]
impl ManifestFetcher for RegistryManifestFetcher {
    async fn fetch(&self, manifest_id: &str) -> Result<Manifest> {
        self.manifests
            .read()
            .get(manifest_id)
            .cloned()
            .ok_or_else(|| MfeError::load(manifest_id, "manifest not registered"))
    }
}

/// Tries several fetchers in order and returns the first manifest found.
#[derive(Default)]
pub struct CompositeManifestFetcher {
    fetchers: Vec<Arc<dyn ManifestFetcher>>,
}

impl CompositeManifestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ManifestFetcher>) -> Self {
        self.fetchers.push(fetcher);
        self
    }
}

#[async_trait]
impl ManifestFetcher for CompositeManifestFetcher {
    async fn fetch(&self, manifest_id: &str) -> Result<Manifest> {
        if self.fetchers.is_empty() {
            return Err(MfeError::load(manifest_id, "no manifest fetchers configured"));
        }

        let mut failures = Vec::with_capacity(self.fetchers.len());
        for fetcher in &self.fetchers {
            match fetcher.fetch(manifest_id).await {
                Ok(manifest) => return Ok(manifest),
                Err(e) => failures.push(e.to_string()),
            }
        }
        Err(MfeError::load(manifest_id, failures.join("; ")))
    }
}
