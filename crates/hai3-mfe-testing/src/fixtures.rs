//! Fixture builders.
//!
//! Ids are derived from the HAI3 base types so they pass the bundled type
//! system's conformance checks.

use hai3_mfe::types::{
    Domain, Entry, Extension, HAI3_ACTION_LOAD_EXT, HAI3_ACTION_TYPE, HAI3_ACTION_UNLOAD_EXT,
    HAI3_DOMAIN_TYPE, HAI3_ENTRY_TYPE, HAI3_EXTENSION_TYPE, HAI3_SHARED_PROPERTY_LANGUAGE,
    HAI3_SHARED_PROPERTY_THEME, HAI3_SHARED_PROPERTY_TYPE,
};

/// Default timeout of fixture domains, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub fn domain_id(name: &str) -> String {
    format!("{}acme.test.layout.{}.v1~", HAI3_DOMAIN_TYPE, name)
}

pub fn entry_id(name: &str) -> String {
    format!("{}acme.test.mfe.{}.v1~", HAI3_ENTRY_TYPE, name)
}

pub fn extension_id(name: &str) -> String {
    format!("{}acme.test.ext.{}.v1~", HAI3_EXTENSION_TYPE, name)
}

pub fn action_id(name: &str) -> String {
    format!("{}acme.test.comm.{}.v1~", HAI3_ACTION_TYPE, name)
}

pub fn property_id(name: &str) -> String {
    format!("{}acme.test.comm.{}.v1~", HAI3_SHARED_PROPERTY_TYPE, name)
}

/// Domain offering theme and language, supporting load and unload.
pub fn domain(name: &str) -> Domain {
    Domain::new(domain_id(name), DEFAULT_TIMEOUT_MS)
        .with_shared_properties([HAI3_SHARED_PROPERTY_THEME, HAI3_SHARED_PROPERTY_LANGUAGE])
        .with_actions([HAI3_ACTION_LOAD_EXT, HAI3_ACTION_UNLOAD_EXT])
}

/// Entry requiring theme and handling load and unload.
pub fn entry(name: &str) -> Entry {
    Entry::new(entry_id(name))
        .with_required_properties([HAI3_SHARED_PROPERTY_THEME])
        .with_domain_actions([HAI3_ACTION_LOAD_EXT, HAI3_ACTION_UNLOAD_EXT])
}

pub fn extension(name: &str, domain: &Domain, entry: &Entry) -> Extension {
    Extension::new(extension_id(name), domain.id.clone(), entry.id.clone())
}
