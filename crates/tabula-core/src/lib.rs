//! Core types and traits for Tabula.
//!
//! This crate provides the foundational abstractions for the table layer:
//!
//! - `Error`/`Result` taxonomy shared by every operation
//! - `Value` dynamic SQL values, including the `DEFAULT` placeholder marker
//! - `Heading`/`Attribute` table headings
//! - `TableId` validated table identity and backtick quoting
//! - `Connection` trait for synchronous database access
//! - `Catalog` registry of declared tables
//! - `DependencyGraph` foreign-key dependency cache
//! - `ExternalStore` for offloaded blob/attachment/filepath contents
//! - `MockConnection` scripted test double

pub mod blob;
pub mod catalog;
pub mod connection;
pub mod error;
pub mod external;
pub mod graph;
pub mod heading;
pub mod identifiers;
pub mod mock;
pub mod row;
pub mod types;
pub mod value;

pub use catalog::{Catalog, TableRecord};
pub use connection::{ConfirmMode, Connection, Settings};
pub use error::{Error, QueryError, Result, SuggestedError};
pub use external::{ExternalStore, MemoryStore, StoreRef};
pub use graph::{DependencyGraph, ForeignKey};
pub use heading::{Attribute, AttributeKind, Heading, IndexSpec, ValueAdapter};
pub use identifiers::{TableId, is_valid_name, quote_ident};
pub use mock::{MockConnection, Reply, TxEvent};
pub use row::{ColumnInfo, Row};
pub use types::SqlType;
pub use value::Value;

/// Recover the guard from a poisoned mutex instead of panicking.
pub(crate) fn relock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
