//! Table operations: the `Table` abstraction with restriction composition,
//! the insert/update families, the graph-driven cascading delete, schema
//! reflection and the audit log.

pub mod condition;
pub mod delete;
pub mod describe;
pub mod insert;
pub mod log;
pub mod parts;
pub mod placeholder;
pub mod registry;
pub mod table;
pub mod update;

pub use condition::{Restriction, make_condition, where_clause};
pub use insert::{InsertOptions, InsertSource, QuerySource, RowInput, RowMap};
pub use log::Log;
pub use parts::MasterRow;
pub use placeholder::Placeholder;
pub use registry::NameRegistry;
pub use table::Table;
pub use update::OnPopulated;

/// Recover the guard from a poisoned mutex instead of panicking.
pub(crate) fn relock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
