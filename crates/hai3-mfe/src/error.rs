//! Error types for the MFE core.
//!
//! Every failure the core can report is one variant of [`MfeError`]. Each
//! variant carries the ids involved so callers can branch on
//! [`MfeError::kind`] and still produce rich diagnostics.

use crate::type_system::ValidationError;
use crate::validation::ContractError;

/// Result type for MFE operations.
pub type Result<T> = std::result::Result<T, MfeError>;

/// Closed set of error kinds, one per [`MfeError`] variant family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SchemaValidation,
    ContractMismatch,
    UiMetaValidation,
    UnsupportedDomainAction,
    Load,
    ChainExecution,
    VersionMismatch,
    TypeConformance,
    NotRegistered,
    AlreadyRegistered,
    AlreadyMounted,
    UndeclaredAction,
    ActionDelivery,
    Timeout,
    BridgeDisposed,
    Provider,
    Serialization,
}

/// MFE errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MfeError {
    #[error("schema validation failed for '{type_id}': {}", join(.errors))]
    SchemaValidation {
        type_id: String,
        errors: Vec<ValidationError>,
    },

    #[error(
        "contract mismatch between entry '{entry_id}' and domain '{domain_id}': {}",
        join(.errors)
    )]
    ContractMismatch {
        extension_id: String,
        entry_id: String,
        domain_id: String,
        errors: Vec<ContractError>,
    },

    #[error("uiMeta of extension '{extension_id}' rejected by domain '{domain_id}': {}", join(.errors))]
    UiMetaValidation {
        extension_id: String,
        domain_id: String,
        errors: Vec<ValidationError>,
    },

    #[error("action '{action_type}' is not supported by domain '{domain_id}'")]
    UnsupportedDomainAction {
        action_type: String,
        domain_id: String,
    },

    #[error("load failed for '{target}': {message}")]
    Load { target: String, message: String },

    #[error("action chain failed at '{failed_action}': {cause}")]
    ChainExecution {
        failed_action: String,
        path: Vec<String>,
        #[source]
        cause: Box<MfeError>,
    },

    #[error("version mismatch for '{dependency}': required {required}, provided {provided}")]
    VersionMismatch {
        dependency: String,
        required: String,
        provided: String,
    },

    #[error("type '{type_id}' does not conform to '{expected_base}'")]
    TypeConformance {
        type_id: String,
        expected_base: String,
    },

    #[error("domain not registered: {0}")]
    DomainNotRegistered(String),

    #[error("domain already registered: {0}")]
    DomainAlreadyRegistered(String),

    #[error("extension not registered: {0}")]
    ExtensionNotRegistered(String),

    #[error("extension already registered: {0}")]
    ExtensionAlreadyRegistered(String),

    #[error("extension already mounted: {0}")]
    ExtensionAlreadyMounted(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("shared property '{property_id}' is not offered by domain '{domain_id}'")]
    UnknownSharedProperty {
        domain_id: String,
        property_id: String,
    },

    #[error("action '{action_type}' is not declared by the entry of extension '{extension_id}'")]
    UndeclaredAction {
        extension_id: String,
        action_type: String,
    },

    #[error("action target not found: {0}")]
    ActionTargetNotFound(String),

    #[error("no action handler registered for '{0}'")]
    NoActionHandler(String),

    #[error("invalid payload for action '{action_type}': {}", join(.errors))]
    PayloadValidation {
        action_type: String,
        errors: Vec<ValidationError>,
    },

    #[error("action '{action_type}' failed: {message}")]
    ActionFailed {
        action_type: String,
        message: String,
    },

    #[error("action '{action_type}' exceeded {timeout_ms}ms")]
    ActionTimeout { action_type: String, timeout_ms: u64 },

    #[error("action chain exceeded {timeout_ms}ms")]
    ChainTimeout { timeout_ms: u64 },

    #[error("action chain deeper than {max_depth} nodes")]
    ChainDepthExceeded { max_depth: usize },

    #[error("bridge disposed: {0}")]
    BridgeDisposed(String),

    #[error("instance provider error: {0}")]
    Provider(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MfeError {
    /// Discriminant used by callers that branch on the failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            Self::ContractMismatch { .. } => ErrorKind::ContractMismatch,
            Self::UiMetaValidation { .. } => ErrorKind::UiMetaValidation,
            Self::UnsupportedDomainAction { .. } => ErrorKind::UnsupportedDomainAction,
            Self::Load { .. } => ErrorKind::Load,
            Self::ChainExecution { .. } | Self::ChainDepthExceeded { .. } => {
                ErrorKind::ChainExecution
            }
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::TypeConformance { .. } => ErrorKind::TypeConformance,
            Self::DomainNotRegistered(_)
            | Self::ExtensionNotRegistered(_)
            | Self::EntryNotFound(_)
            | Self::UnknownSharedProperty { .. } => ErrorKind::NotRegistered,
            Self::DomainAlreadyRegistered(_) | Self::ExtensionAlreadyRegistered(_) => {
                ErrorKind::AlreadyRegistered
            }
            Self::ExtensionAlreadyMounted(_) => ErrorKind::AlreadyMounted,
            Self::UndeclaredAction { .. } => ErrorKind::UndeclaredAction,
            Self::ActionTargetNotFound(_)
            | Self::NoActionHandler(_)
            | Self::PayloadValidation { .. }
            | Self::ActionFailed { .. } => ErrorKind::ActionDelivery,
            Self::ActionTimeout { .. } | Self::ChainTimeout { .. } => ErrorKind::Timeout,
            Self::BridgeDisposed(_) => ErrorKind::BridgeDisposed,
            Self::Provider(_) => ErrorKind::Provider,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether this failure is a per-action or whole-chain timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Shorthand for a handler rejection.
    pub fn action_failed(action_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActionFailed {
            action_type: action_type.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a bundle/manifest/container failure.
    pub fn load(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            target: target.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MfeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MfeError::UnsupportedDomainAction {
            action_type: "refresh".to_string(),
            domain_id: "sidebar".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "action 'refresh' is not supported by domain 'sidebar'"
        );

        let err = MfeError::SchemaValidation {
            type_id: "t".to_string(),
            errors: vec![
                ValidationError::new("a", "missing"),
                ValidationError::new("b", "wrong type"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "schema validation failed for 't': a: missing; b: wrong type"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            MfeError::ActionTimeout {
                action_type: "a".into(),
                timeout_ms: 10
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert!(MfeError::ChainTimeout { timeout_ms: 1 }.is_timeout());
        assert!(!MfeError::action_failed("a", "boom").is_timeout());
        assert_eq!(
            MfeError::DomainNotRegistered("d".into()).kind(),
            ErrorKind::NotRegistered
        );
    }
}
