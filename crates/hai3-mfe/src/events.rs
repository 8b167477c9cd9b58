//! Lifecycle notifications.
//!
//! Events are fire-and-forget: publishing never fails and never blocks, and
//! nothing in the registry depends on who, if anyone, is listening. Slow
//! subscribers may miss events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::defaults::EVENT_CHANNEL_CAPACITY;

/// Lifecycle event published by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MfeEvent {
    #[serde(rename_all = "camelCase")]
    DomainRegistered { domain_id: String },
    #[serde(rename_all = "camelCase")]
    DomainUnregistered { domain_id: String },
    #[serde(rename_all = "camelCase")]
    ExtensionRegistered {
        extension_id: String,
        domain_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ExtensionUnregistered {
        extension_id: String,
        domain_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ExtensionMounted {
        extension_id: String,
        domain_id: String,
        container: u64,
    },
    #[serde(rename_all = "camelCase")]
    ExtensionUnmounted {
        extension_id: String,
        domain_id: String,
    },
    #[serde(rename_all = "camelCase")]
    DomainPropertyUpdated {
        domain_id: String,
        property_id: String,
    },
}

impl MfeEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::DomainRegistered { .. } => "domainRegistered",
            Self::DomainUnregistered { .. } => "domainUnregistered",
            Self::ExtensionRegistered { .. } => "extensionRegistered",
            Self::ExtensionUnregistered { .. } => "extensionUnregistered",
            Self::ExtensionMounted { .. } => "extensionMounted",
            Self::ExtensionUnmounted { .. } => "extensionUnmounted",
            Self::DomainPropertyUpdated { .. } => "domainPropertyUpdated",
        }
    }
}

/// Envelope data attached to every published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    pub source: String,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            source: source.into(),
        }
    }
}

/// Broadcast bus for [`MfeEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<(MfeEvent, EventMetadata)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event. Returns `true` if at least one subscriber exists.
    pub fn publish(&self, event: MfeEvent) -> bool {
        self.publish_with_source(event, "registry")
    }

    pub fn publish_with_source(&self, event: MfeEvent, source: impl Into<String>) -> bool {
        self.tx.send((event, EventMetadata::new(source))).is_ok()
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of an [`EventBus`] subscription.
pub struct EventReceiver {
    rx: broadcast::Receiver<(MfeEvent, EventMetadata)>,
}

impl EventReceiver {
    /// Next event, or `None` once the bus is gone. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<(MfeEvent, EventMetadata)> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<(MfeEvent, EventMetadata)> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
