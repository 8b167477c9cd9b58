//! Contract, schema and uiMeta validation.
//!
//! Everything here returns structured results; only the registry turns a
//! failed result into an [`crate::MfeError`].

mod contract;
mod entity;
mod ui_meta;

pub use contract::{validate_contract, ContractError, ContractErrorKind, ContractValidationResult};
pub use entity::{
    ensure_type_of, into_schema_error, validate_domain_schema, validate_entry_schema,
    validate_extension_schema,
};
pub use ui_meta::{validate_extension_ui_meta, EXTENSIONS_UI_META_ATTRIBUTE};
