//! HAI3 well-known type ids.
//!
//! Ids follow the GTS layout understood by the bundled type system:
//! `gts.<vendor>.<package>.<namespace>.<type>.v<major>~`, with derived types
//! chained after the base segment.

/// Base type of every domain.
pub const HAI3_DOMAIN_TYPE: &str = "gts.hai3.mfes.ext.domain.v1~";
/// Base type of every entry.
pub const HAI3_ENTRY_TYPE: &str = "gts.hai3.mfes.mfe.entry.v1~";
/// Base type of every extension.
pub const HAI3_EXTENSION_TYPE: &str = "gts.hai3.mfes.ext.extension.v1~";
/// Base type of every action.
pub const HAI3_ACTION_TYPE: &str = "gts.hai3.mfes.comm.action.v1~";
/// Base type of every shared property.
pub const HAI3_SHARED_PROPERTY_TYPE: &str = "gts.hai3.mfes.comm.shared_property.v1~";

/// Structural action: load and mount an extension into the domain.
/// Every domain must declare it.
pub const HAI3_ACTION_LOAD_EXT: &str =
    "gts.hai3.mfes.comm.action.v1~hai3.mfes.lifecycle.load_ext.v1~";
/// Structural action: unmount an extension from the domain. Optional per domain.
pub const HAI3_ACTION_UNLOAD_EXT: &str =
    "gts.hai3.mfes.comm.action.v1~hai3.mfes.lifecycle.unload_ext.v1~";

/// Current UI theme.
pub const HAI3_SHARED_PROPERTY_THEME: &str =
    "gts.hai3.mfes.comm.shared_property.v1~hai3.mfes.comm.theme.v1~";
/// Current UI language.
pub const HAI3_SHARED_PROPERTY_LANGUAGE: &str =
    "gts.hai3.mfes.comm.shared_property.v1~hai3.mfes.comm.language.v1~";

/// Structural actions handled by the domain itself rather than forwarded.
pub const STRUCTURAL_ACTIONS: [&str; 2] = [HAI3_ACTION_LOAD_EXT, HAI3_ACTION_UNLOAD_EXT];

/// Whether `action_type` is one of the structural lifecycle actions.
pub fn is_structural_action(action_type: &str) -> bool {
    STRUCTURAL_ACTIONS.contains(&action_type)
}
