//! Data model shared by every component.

pub mod action;
pub mod constants;
pub mod domain;
pub mod entry;
pub mod extension;

pub use action::{Action, ActionsChain};
pub use constants::*;
pub use domain::Domain;
pub use entry::{Entry, LoaderKind};
pub use extension::{Extension, SharedProperty};
