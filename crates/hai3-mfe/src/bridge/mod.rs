//! Bridge between a host mount point and one isolated extension instance.
//!
//! A bridge has two faces over one shared channel:
//!
//! ```text
//!   host side                                   extension side
//! ┌──────────────────────┐                    ┌──────────────────────┐
//! │ HostBridge           │  property updates  │ ExtensionBridge      │
//! │  update_property ────┼───────────────────▶│  subscribe/get       │
//! │  on_host_action  ◀───┼─── action queue ───┼─ request_host_action │
//! │  deliver_action  ────┼───────────────────▶│  action handler      │
//! │  send_actions_chain  │                    │                      │
//! │  dispose             │                    │                      │
//! └──────────────────────┘                    └──────────────────────┘
//! ```
//!
//! Neither side touches the other's state except through these methods.

mod properties;

pub use properties::{PropertyCallback, PropertySubscription};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::actions::{ActionsChainsMediator, ChainOptions, ChainResult, DynActionHandler};
use crate::error::{MfeError, Result};
use crate::types::{Action, ActionsChain, Entry, Extension, SharedProperty};
use properties::PropertyStore;

struct HostActionRequest {
    action: Action,
    ack: oneshot::Sender<Result<()>>,
}

struct BridgeInner {
    instance_id: String,
    extension_id: String,
    domain_id: String,
    entry: Entry,
    properties: Arc<PropertyStore>,
    host_handler: RwLock<Option<DynActionHandler>>,
    extension_handler: RwLock<Option<DynActionHandler>>,
    requests: mpsc::UnboundedSender<HostActionRequest>,
    pump: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl BridgeInner {
    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(MfeError::BridgeDisposed(self.instance_id.clone()))
        } else {
            Ok(())
        }
    }
}

/// Host-facing side of a bridge.
#[derive(Clone)]
pub struct HostBridge {
    inner: Arc<BridgeInner>,
    chains: Arc<ActionsChainsMediator>,
}

/// Extension-facing, read-only side of a bridge.
#[derive(Clone)]
pub struct ExtensionBridge {
    inner: Arc<BridgeInner>,
}

impl HostBridge {
    /// Create a bridge scoped to `extension` and its resolved `entry`.
    ///
    /// Must be called inside a Tokio runtime: the host-action queue is
    /// drained by a spawned task.
    pub(crate) fn new(
        extension: &Extension,
        entry: &Entry,
        chains: Arc<ActionsChainsMediator>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(BridgeInner {
            instance_id: uuid::Uuid::new_v4().to_string(),
            extension_id: extension.id.clone(),
            domain_id: extension.domain.clone(),
            entry: entry.clone(),
            properties: Arc::new(PropertyStore::default()),
            host_handler: RwLock::new(None),
            extension_handler: RwLock::new(None),
            requests: tx,
            pump: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });
        let pump = tokio::spawn(pump_host_actions(Arc::downgrade(&inner), rx));
        *inner.pump.lock() = Some(pump);
        debug!(
            extension_id = %inner.extension_id,
            bridge = %inner.instance_id,
            "Bridge created"
        );
        Self { inner, chains }
    }

    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    pub fn extension_id(&self) -> &str {
        &self.inner.extension_id
    }

    pub fn domain_id(&self) -> &str {
        &self.inner.domain_id
    }

    /// The extension-facing side, handed to the extension on mount.
    pub fn extension_bridge(&self) -> ExtensionBridge {
        ExtensionBridge {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Push a property value to live subscribers. Ignored once disposed.
    pub fn update_property(&self, property_id: &str, value: Value) {
        if self.inner.ensure_live().is_err() {
            return;
        }
        self.inner.properties.update(property_id, value);
    }

    /// Install the handler for actions the extension sends to the host.
    pub fn on_host_action(&self, handler: DynActionHandler) {
        *self.inner.host_handler.write() = Some(handler);
    }

    /// Run an actions chain through this runtime's chain mediator.
    pub async fn send_actions_chain(&self, chain: &ActionsChain, options: ChainOptions) -> ChainResult {
        self.chains.execute_actions_chain(chain, options).await
    }

    /// Deliver a domain action to the extension's handler and wait for it.
    pub(crate) async fn deliver_action(&self, action: &Action) -> Result<()> {
        self.inner.ensure_live()?;
        if !self.inner.entry.handles_domain_action(&action.action_type) {
            return Err(MfeError::UndeclaredAction {
                extension_id: self.inner.extension_id.clone(),
                action_type: action.action_type.clone(),
            });
        }
        let handler = self
            .inner
            .extension_handler
            .read()
            .clone()
            .ok_or_else(|| MfeError::NoActionHandler(self.inner.extension_id.clone()))?;
        handler.handle(action).await
    }

    /// Tear the bridge down. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.properties.clear();
        *self.inner.host_handler.write() = None;
        *self.inner.extension_handler.write() = None;
        if let Some(pump) = self.inner.pump.lock().take() {
            pump.abort();
        }
        debug!(
            extension_id = %self.inner.extension_id,
            bridge = %self.inner.instance_id,
            "Bridge disposed"
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl ExtensionBridge {
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    pub fn extension_id(&self) -> &str {
        &self.inner.extension_id
    }

    pub fn domain_id(&self) -> &str {
        &self.inner.domain_id
    }

    /// Send an action to the host, addressed to this extension's domain.
    ///
    /// Resolves once the host has accepted the action for handling, not when
    /// the handler finishes. The type must be one the entry declares in
    /// `actions`.
    pub async fn request_host_action(
        &self,
        action_type: &str,
        payload: Option<Value>,
    ) -> Result<()> {
        self.inner.ensure_live()?;
        if !self.inner.entry.emits_action(action_type) {
            return Err(MfeError::UndeclaredAction {
                extension_id: self.inner.extension_id.clone(),
                action_type: action_type.to_string(),
            });
        }

        let mut action = Action::new(action_type, self.inner.domain_id.clone());
        action.payload = payload;

        let (ack, acked) = oneshot::channel();
        self.inner
            .requests
            .send(HostActionRequest { action, ack })
            .map_err(|_| MfeError::BridgeDisposed(self.inner.instance_id.clone()))?;
        acked
            .await
            .map_err(|_| MfeError::BridgeDisposed(self.inner.instance_id.clone()))?
    }

    /// Watch one property. The callback sees updates made after this call.
    pub fn subscribe_to_property<F>(&self, property_id: &str, callback: F) -> Result<PropertySubscription>
    where
        F: Fn(&SharedProperty) + Send + Sync + 'static,
    {
        self.subscribe(Some(property_id.to_string()), Arc::new(callback))
    }

    /// Watch every property.
    pub fn subscribe_to_all_properties<F>(&self, callback: F) -> Result<PropertySubscription>
    where
        F: Fn(&SharedProperty) + Send + Sync + 'static,
    {
        self.subscribe(None, Arc::new(callback))
    }

    fn subscribe(
        &self,
        property_id: Option<String>,
        callback: PropertyCallback,
    ) -> Result<PropertySubscription> {
        self.inner.ensure_live()?;
        let subscription = self.inner.properties.subscribe(property_id, callback);
        // A dispose racing the subscribe may have cleared the store already.
        if let Err(e) = self.inner.ensure_live() {
            subscription.unsubscribe();
            return Err(e);
        }
        Ok(subscription)
    }

    /// Current value of a property, if the host has set one.
    pub fn get_property(&self, property_id: &str) -> Option<Value> {
        self.inner.properties.get(property_id)
    }

    /// Install the handler for actions the domain sends to this extension.
    pub fn register_action_handler(&self, handler: DynActionHandler) -> Result<()> {
        self.inner.ensure_live()?;
        *self.inner.extension_handler.write() = Some(handler);
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

async fn pump_host_actions(
    inner: Weak<BridgeInner>,
    mut rx: mpsc::UnboundedReceiver<HostActionRequest>,
) {
    while let Some(request) = rx.recv().await {
        let Some(bridge) = inner.upgrade() else { break };
        let handler = bridge.host_handler.read().clone();
        let Some(handler) = handler else {
            let _ = request
                .ack
                .send(Err(MfeError::NoActionHandler(bridge.domain_id.clone())));
            continue;
        };

        if request.ack.send(Ok(())).is_err() {
            debug!(
                extension_id = %bridge.extension_id,
                action_type = %request.action.action_type,
                "Requester gone, host action dropped"
            );
            continue;
        }

        let extension_id = bridge.extension_id.clone();
        drop(bridge);
        tokio::spawn(async move {
            if let Err(e) = handler.handle(&request.action).await {
                warn!(
                    extension_id = %extension_id,
                    action_type = %request.action.action_type,
                    error = %e,
                    "Host action handler failed"
                );
            }
        });
    }
}
