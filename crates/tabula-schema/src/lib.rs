//! Table declaration and alteration compilers.
//!
//! `TableDefinition` is the structured description of a table: its own
//! attributes, foreign keys and indexes. `declare` compiles a definition
//! into CREATE TABLE SQL plus the compiled heading; `alter` diffs a new
//! definition against the declared one and emits ALTER clauses.

pub mod alter;
pub mod declare;
pub mod definition;

pub use alter::{AlterPlan, alter};
pub use declare::{Declaration, declare};
pub use definition::{ForeignKeyDef, TableDefinition};
