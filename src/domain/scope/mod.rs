//! Scope catalog domain types

mod catalog;

pub use catalog::{toggle_category, ApiScope, ScopeCatalog};
