//! Shared property snapshot and fan-out.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::types::SharedProperty;

/// Callback invoked with every update a subscription matches.
pub type PropertyCallback = Arc<dyn Fn(&SharedProperty) + Send + Sync>;

struct Subscriber {
    /// `None` subscribes to every property.
    property_id: Option<String>,
    callback: PropertyCallback,
}

/// Current property values plus live subscribers.
///
/// Updates reach only the subscribers registered at the time of the update;
/// a late subscriber reads the current value with [`PropertyStore::get`].
#[derive(Default)]
pub(crate) struct PropertyStore {
    values: RwLock<HashMap<String, Value>>,
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
}

impl PropertyStore {
    pub(crate) fn get(&self, property_id: &str) -> Option<Value> {
        self.values.read().get(property_id).cloned()
    }

    pub(crate) fn update(&self, property_id: &str, value: Value) {
        self.values
            .write()
            .insert(property_id.to_string(), value.clone());

        let callbacks: Vec<PropertyCallback> = self
            .subscribers
            .read()
            .values()
            .filter(|s| s.property_id.as_deref().map_or(true, |id| id == property_id))
            .map(|s| Arc::clone(&s.callback))
            .collect();

        if callbacks.is_empty() {
            return;
        }
        let property = SharedProperty::new(property_id, value);
        for callback in callbacks {
            callback(&property);
        }
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        property_id: Option<String>,
        callback: PropertyCallback,
    ) -> PropertySubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(
            id,
            Subscriber {
                property_id,
                callback,
            },
        );
        PropertySubscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub(crate) fn clear(&self) {
        self.subscribers.write().clear();
        self.values.write().clear();
    }
}

/// Handle returned by property subscriptions.
///
/// Dropping the handle keeps the subscription alive; call
/// [`PropertySubscription::unsubscribe`] to end it.
pub struct PropertySubscription {
    store: Weak<PropertyStore>,
    id: u64,
}

impl PropertySubscription {
    /// Stop receiving updates. No-op if the bridge is already disposed.
    pub fn unsubscribe(self) {
        if let Some(store) = self.store.upgrade() {
            store.subscribers.write().remove(&self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|store| store.subscribers.read().contains_key(&self.id))
    }
}
