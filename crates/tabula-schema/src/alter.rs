//! Diff a new definition against the declared table and emit ALTER clauses.

use tabula_core::{Attribute, Catalog, Error, ForeignKey, Heading, Result, TableId, quote_ident};

use crate::declare::declare;
use crate::definition::TableDefinition;

/// The output of diffing: clauses for one ALTER TABLE statement, stores
/// needed by added attributes, and the new heading to register on success.
#[derive(Debug, Clone)]
pub struct AlterPlan {
    pub clauses: Vec<String>,
    pub external_stores: Vec<String>,
    pub heading: Heading,
    pub foreign_keys: Vec<(String, ForeignKey)>,
}

impl AlterPlan {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Compile `definition` and diff it against the declared state of `id`.
///
/// Only secondary attributes may change. Primary key or foreign key changes
/// are refused; drop and re-declare instead.
pub fn alter(id: &TableId, definition: &TableDefinition, catalog: &Catalog) -> Result<AlterPlan> {
    let full_name = id.full_name();
    let Some(old) = catalog.record(&full_name) else {
        return Err(Error::invalid(format!(
            "cannot alter {full_name}: table is not declared"
        )));
    };

    let new = declare(id, definition, catalog)?;

    let old_key: Vec<&str> = old.heading.primary_key();
    let new_key: Vec<&str> = new.heading.primary_key();
    if old_key != new_key {
        return Err(Error::invalid(format!(
            "cannot alter {full_name}: primary key changes are not supported"
        )));
    }
    if old.foreign_keys != new.foreign_keys {
        return Err(Error::invalid(format!(
            "cannot alter {full_name}: foreign key changes are not supported"
        )));
    }

    let mut clauses = Vec::new();
    let mut external_stores = Vec::new();

    for attr in new.heading.secondary() {
        match old.heading.get(&attr.name) {
            None => {
                clauses.push(format!("ADD COLUMN {}", render_column(attr)));
                if let Some(store) = &attr.store {
                    if !external_stores.contains(store) {
                        external_stores.push(store.clone());
                    }
                }
            }
            Some(existing) if existing != attr => {
                if existing.in_key {
                    return Err(Error::invalid(format!(
                        "cannot alter {full_name}: `{}` is a primary key attribute",
                        attr.name
                    )));
                }
                clauses.push(format!("MODIFY COLUMN {}", render_column(attr)));
                if let Some(store) = &attr.store {
                    if existing.store.as_deref() != Some(store)
                        && !external_stores.contains(store)
                    {
                        external_stores.push(store.clone());
                    }
                }
            }
            Some(_) => {}
        }
    }
    for attr in old.heading.secondary() {
        if !new.heading.contains(&attr.name) {
            clauses.push(format!("DROP COLUMN {}", quote_ident(&attr.name)));
        }
    }

    tracing::debug!(table = %full_name, clauses = clauses.len(), "computed alter plan");

    Ok(AlterPlan {
        clauses,
        external_stores,
        heading: new.heading,
        foreign_keys: new.foreign_keys,
    })
}

fn render_column(attr: &Attribute) -> String {
    let mut parts = vec![quote_ident(&attr.name), attr.sql_type.sql_name()];
    if attr.nullable {
        parts.push("NULL".to_string());
    } else {
        parts.push("NOT NULL".to_string());
    }
    if let Some(default) = &attr.default {
        parts.push(format!("DEFAULT {default}"));
    }
    if !attr.comment.is_empty() {
        parts.push(format!("COMMENT \"{}\"", attr.comment));
    }
    parts.join(" ")
}
