//! Backend synchronisation.
//!
//! Everything here goes through the same `register_*`/`unregister_*` calls a
//! host makes by hand; there is no second way for an instance to enter the
//! registry.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::MfeRegistry;
use crate::error::{MfeError, Result};
use crate::provider::{InstanceUpdate, TypeInstanceProvider};
use crate::types::Extension;

/// Outcome of [`MfeRegistry::refresh_extensions_from_backend`].
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub domains_registered: usize,
    pub extensions_registered: usize,
    /// Instance id and the reason it was rejected.
    pub failures: Vec<(String, MfeError)>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Live backend feed started by [`MfeRegistry::subscribe_to_updates`].
pub struct UpdateSubscription {
    task: JoinHandle<()>,
}

impl UpdateSubscription {
    /// Stop applying updates.
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl MfeRegistry {
    fn instance_provider(&self) -> Result<Arc<dyn TypeInstanceProvider>> {
        self.shared
            .instance_provider
            .clone()
            .ok_or_else(|| MfeError::Provider("no instance provider configured".to_string()))
    }

    /// Register every domain, then every extension, the backend knows about.
    ///
    /// Instances already registered are skipped. A rejected instance is
    /// recorded in the report and does not stop the refresh.
    pub async fn refresh_extensions_from_backend(&self) -> Result<RefreshReport> {
        let provider = self.instance_provider()?;
        let mut report = RefreshReport::default();

        for domain in provider.fetch_domains().await? {
            if self.domain(&domain.id).await.is_some() {
                continue;
            }
            let id = domain.id.clone();
            match self.register_domain(domain).await {
                Ok(()) => report.domains_registered += 1,
                Err(e) => {
                    warn!(domain_id = %id, error = %e, "Backend domain rejected");
                    report.failures.push((id, e));
                }
            }
        }

        for extension in provider.fetch_extensions().await? {
            if self.extension(&extension.id).await.is_some() {
                continue;
            }
            let id = extension.id.clone();
            match self.register_extension(extension).await {
                Ok(()) => report.extensions_registered += 1,
                Err(e) => {
                    warn!(extension_id = %id, error = %e, "Backend extension rejected");
                    report.failures.push((id, e));
                }
            }
        }

        info!(
            domains = report.domains_registered,
            extensions = report.extensions_registered,
            failures = report.failures.len(),
            "Backend refresh complete"
        );
        Ok(report)
    }

    /// Apply the provider's incremental updates until unsubscribed.
    pub fn subscribe_to_updates(&self) -> Result<UpdateSubscription> {
        let mut rx = self.instance_provider()?.subscribe_to_updates();
        let registry = Arc::downgrade(&self.shared);

        let task = tokio::spawn(async move {
            loop {
                let update = match rx.recv().await {
                    Ok(update) => update,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Instance update feed lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(shared) = registry.upgrade() else { break };
                let registry = MfeRegistry { shared };
                let id = update.instance_id().to_string();
                if let Err(e) = registry.apply_update(update).await {
                    warn!(instance_id = %id, error = %e, "Instance update rejected");
                }
            }
            debug!("Instance update feed closed");
        });

        Ok(UpdateSubscription { task })
    }

    /// Apply one backend change.
    pub async fn apply_update(&self, update: InstanceUpdate) -> Result<()> {
        match update {
            InstanceUpdate::DomainAdded(domain) => {
                if self.domain(&domain.id).await.as_ref() == Some(&domain) {
                    return Ok(());
                }
                self.register_domain(domain).await
            }
            InstanceUpdate::DomainRemoved { id } => self.unregister_domain(&id).await,
            InstanceUpdate::ExtensionAdded(extension) => {
                match self.extension(&extension.id).await {
                    Some(existing) if existing == extension => Ok(()),
                    Some(_) => self.reregister_extension(extension).await,
                    None => self.register_extension(extension).await,
                }
            }
            InstanceUpdate::ExtensionRemoved { id } => self.unregister_extension(&id).await,
        }
    }

    /// Replace the binding registered under `extension.id`.
    ///
    /// The replacement is validated first; if it is rejected the old binding
    /// stays untouched. Otherwise the old binding is unmounted and
    /// unregistered, and the replacement starts unmounted.
    pub async fn reregister_extension(&self, extension: Extension) -> Result<()> {
        let entry = self.validate_binding(&extension).await?;
        self.unregister_extension(&extension.id).await?;
        self.store_extension(extension, entry).await
    }
}
