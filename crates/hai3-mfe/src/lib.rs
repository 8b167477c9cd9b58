//! HAI3 micro-frontend core.
//!
//! Composes independently deployed extensions into declared mount points
//! (domains) without shared state:
//! - Contract and dynamic uiMeta validation of extension bindings
//! - Bridges, the only channel between a host and a mounted extension
//! - Actions chains with per-action timeouts and fallback branches
//!
//! ```text
//! register_domain ─▶ register_extension ─▶ mount_extension ─▶ bridge
//!                     (schema, contract,     (bundle loader,     ▲
//!                      uiMeta)                coordinator)       │
//!                                                   actions chain mediator
//! ```

pub mod actions;
pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod loader;
pub mod provider;
pub mod registry;
pub mod type_system;
pub mod types;
pub mod validation;

pub use actions::{
    action_handler, ActionHandler, ActionsChainsMediator, ChainOptions, ChainResult,
    DynActionHandler,
};
pub use bridge::{ExtensionBridge, HostBridge, PropertySubscription};
pub use config::MfeConfig;
pub use coordinator::{ContainerHandle, ContainerProvider, RuntimeConnection, RuntimeCoordinator};
pub use error::{ErrorKind, MfeError, Result};
pub use events::{EventBus, EventMetadata, EventReceiver, MfeEvent};
pub use loader::{BundleLoader, LoadedBundle, MfeLifecycle};
pub use provider::{InstanceUpdate, TypeInstanceProvider};
pub use registry::{
    DomainOptions, ExtensionStatus, MfeRegistry, MfeRegistryBuilder, RefreshReport,
    UpdateSubscription,
};
pub use type_system::{InMemoryTypeSystem, TypeSystemPlugin, ValidationError, ValidationResult};
pub use types::{Action, ActionsChain, Domain, Entry, Extension, LoaderKind, SharedProperty};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::actions::{action_handler, ActionHandler, ChainOptions, ChainResult};
    pub use crate::bridge::{ExtensionBridge, HostBridge};
    pub use crate::coordinator::{ContainerHandle, ContainerProvider};
    pub use crate::error::{ErrorKind, MfeError, Result};
    pub use crate::loader::{BundleLoader, LoadedBundle, MfeLifecycle};
    pub use crate::registry::{DomainOptions, ExtensionStatus, MfeRegistry};
    pub use crate::type_system::TypeSystemPlugin;
    pub use crate::types::*;
}
