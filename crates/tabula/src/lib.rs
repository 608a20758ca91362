//! Tabula: a dependency-graph-aware relational table layer.
//!
//! Tables are declared from structured definitions, tracked in a catalog,
//! and connected by a foreign-key dependency graph. Mutations respect that
//! graph: deletes cascade down to referencing rows in their own
//! transaction, updates can be checked against downstream auto-populated
//! tables, and every schema change and destructive operation is recorded
//! in a per-database event log.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula::{
//!     Attribute, Connection, ForeignKeyDef, InsertOptions, RowMap, SqlType,
//!     Table, TableDefinition, TableId,
//! };
//!
//! fn declare_and_insert(conn: Arc<dyn Connection>) -> tabula::Result<()> {
//!     let subject = Table::bound(
//!         conn.clone(),
//!         TableId::new("lab", "subject")?,
//!         TableDefinition::new("experimental subjects")
//!             .key(Attribute::new("subject_id", SqlType::BigInt)),
//!         None,
//!     );
//!     subject.declare()?;
//!
//!     let session = Table::bound(
//!         conn,
//!         TableId::new("lab", "session")?,
//!         TableDefinition::new("recording sessions")
//!             .foreign_key(ForeignKeyDef::new(subject.id().clone()).in_key(true))
//!             .key(Attribute::new("session_id", SqlType::BigInt)),
//!         None,
//!     );
//!     session.declare()?;
//!
//!     subject.insert1(RowMap::new().with("subject_id", 1i64), &InsertOptions::new())?;
//!     Ok(())
//! }
//! ```

pub use tabula_core::{
    Attribute, AttributeKind, Catalog, ColumnInfo, ConfirmMode, Connection, DependencyGraph,
    Error, ExternalStore, ForeignKey, Heading, IndexSpec, MemoryStore, MockConnection,
    QueryError, Reply, Result, Row, Settings, SqlType, StoreRef, SuggestedError, TableId,
    TableRecord, TxEvent, Value, ValueAdapter, is_valid_name, quote_ident,
};
pub use tabula_schema::{AlterPlan, Declaration, ForeignKeyDef, TableDefinition, alter, declare};
pub use tabula_table::{
    InsertOptions, InsertSource, Log, MasterRow, NameRegistry, OnPopulated, Placeholder,
    QuerySource, Restriction, RowInput, RowMap, Table, make_condition, where_clause,
};
