//! Reconstructing definitions from a declared table.
//!
//! `definition_from_schema` inverts declaration: it rebuilds a
//! `TableDefinition` from the catalog heading and foreign-key edges, good
//! enough to re-declare the same table. `describe` renders that definition
//! as readable text.

use std::collections::BTreeSet;

use tabula_core::{Attribute, Error, ForeignKey, Result, TableId};
use tabula_schema::{ForeignKeyDef, TableDefinition};

use crate::table::Table;

impl Table {
    /// Rebuild this table's definition from the catalog.
    ///
    /// Attributes that arrived through a foreign key are folded back into
    /// the reference; the supporting index declaration adds for a non-key
    /// foreign key is suppressed.
    pub fn definition_from_schema(&self) -> Result<TableDefinition> {
        let heading = self.heading()?;
        let record = self
            .conn
            .catalog()
            .record(&self.full_table_name())
            .ok_or_else(|| {
                Error::invalid(format!("table {} is not declared", self.full_table_name()))
            })?;

        let mut definition = TableDefinition::new(heading.comment.clone())
            .auto_populated(heading.auto_populated);

        let mut consumed: BTreeSet<String> = BTreeSet::new();
        for (parent_name, fk) in &record.foreign_keys {
            let mut def = ForeignKeyDef::new(TableId::from_full_name(parent_name)?)
                .in_key(fk.primary);
            for (child, parent) in &fk.attr_map {
                consumed.insert(child.clone());
                if child != parent {
                    def = def.map(child.clone(), parent.clone());
                }
            }
            definition = definition.foreign_key(def);
        }

        for attr in heading.attributes() {
            if consumed.contains(&attr.name) {
                continue;
            }
            definition = if attr.in_key {
                definition.key(attr.clone())
            } else {
                definition.attribute(attr.clone())
            };
        }

        for index in &heading.indexes {
            if supports_foreign_key(index, &record.foreign_keys) {
                continue;
            }
            let names: Vec<&str> = index.attributes.iter().map(String::as_str).collect();
            definition = definition.index(&names, index.unique);
        }
        Ok(definition)
    }

    /// Render the definition as text, one line per attribute or reference.
    pub fn describe(&self) -> Result<String> {
        let definition = self.definition_from_schema()?;
        let mut lines = Vec::new();
        if !definition.comment.is_empty() {
            lines.push(format!("# {}", definition.comment));
        }

        let key_fks = definition.foreign_keys.iter().filter(|fk| fk.in_key);
        let secondary_fks = definition.foreign_keys.iter().filter(|fk| !fk.in_key);

        for fk in key_fks {
            lines.push(self.reference_line(fk));
        }
        for attr in definition.attributes.iter().filter(|a| a.in_key) {
            lines.push(attribute_line(attr));
        }
        lines.push("---".to_string());
        for fk in secondary_fks {
            lines.push(self.reference_line(fk));
        }
        for attr in definition.attributes.iter().filter(|a| !a.in_key) {
            lines.push(attribute_line(attr));
        }
        for index in &definition.indexes {
            let unique = if index.unique { "UNIQUE " } else { "" };
            lines.push(format!("{unique}INDEX ({})", index.attributes.join(", ")));
        }
        lines.push(String::new());
        Ok(lines.join("\n"))
    }

    /// `-> Class`, using the registered class name when one exists,
    /// with renamed attributes rendered as a projection.
    fn reference_line(&self, fk: &ForeignKeyDef) -> String {
        let parent = fk.parent.full_name();
        let class = self
            .registry
            .as_ref()
            .and_then(|r| r.lookup(&parent))
            .unwrap_or(parent);
        if fk.attr_map.is_empty() {
            format!("-> {class}")
        } else {
            let renames: Vec<String> = fk
                .attr_map
                .iter()
                .map(|(child, parent)| format!("{child}=\"{parent}\""))
                .collect();
            format!("-> {class}.proj({})", renames.join(", "))
        }
    }
}

fn supports_foreign_key(index: &tabula_core::IndexSpec, fks: &[(String, ForeignKey)]) -> bool {
    !index.unique
        && fks
            .iter()
            .any(|(_, fk)| fk.child_attributes() == index.attributes)
}

fn attribute_line(attr: &Attribute) -> String {
    let mut line = attr.name.clone();
    if let Some(default) = &attr.default {
        line.push('=');
        line.push_str(default);
    } else if attr.nullable {
        line.push_str("=null");
    }
    line.push_str(" : ");
    line.push_str(&attr.sql_type.sql_name().to_lowercase());
    if attr.auto_increment {
        line.push_str(" auto_increment");
    }
    if !attr.comment.is_empty() {
        line.push_str(&format!(" # {}", attr.comment));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabula_core::{Connection, MockConnection, Reply, SqlType};
    use crate::registry::NameRegistry;

    fn declared_pair(conn: &Arc<MockConnection>, registry: Option<Arc<NameRegistry>>) -> Table {
        let conn_dyn = conn.clone() as Arc<dyn Connection>;
        conn.expect("CREATE TABLE", Reply::Affected(0));
        let subject = Table::bound(
            conn_dyn.clone(),
            TableId::new("lab", "subject").unwrap(),
            TableDefinition::new("experimental subjects")
                .key(Attribute::new("subject_id", SqlType::BigInt).comment("institution id")),
            registry.clone(),
        );
        subject.declare().unwrap();

        conn.expect("CREATE TABLE", Reply::Affected(0));
        let session = Table::bound(
            conn_dyn,
            TableId::new("lab", "session").unwrap(),
            TableDefinition::new("recording sessions")
                .foreign_key(ForeignKeyDef::new(subject.id().clone()).in_key(true))
                .key(Attribute::new("session_id", SqlType::BigInt))
                .attribute(
                    Attribute::new("rig", SqlType::VarChar(32)).default("'bench'"),
                )
                .attribute(Attribute::new("notes", SqlType::Text).nullable(true)),
            registry,
        );
        session.declare().unwrap();
        session
    }

    #[test]
    fn definition_round_trips() {
        let conn = Arc::new(MockConnection::quiet());
        let session = declared_pair(&conn, None);

        let rebuilt = session.definition_from_schema().unwrap();
        assert_eq!(rebuilt.comment, "recording sessions");
        assert_eq!(rebuilt.foreign_keys.len(), 1);
        assert!(rebuilt.foreign_keys[0].in_key);
        assert!(rebuilt.foreign_keys[0].attr_map.is_empty());
        // subject_id was folded back into the reference.
        let names: Vec<&str> = rebuilt.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["session_id", "rig", "notes"]);

        // Re-declaring from the rebuilt definition compiles to the same
        // heading.
        let redeclared = tabula_schema::declare(
            &TableId::new("lab", "session2").unwrap(),
            &rebuilt,
            &conn.catalog(),
        )
        .unwrap();
        assert_eq!(
            redeclared.heading,
            conn.catalog().heading("`lab`.`session`").unwrap()
        );
    }

    #[test]
    fn describe_renders_references_and_defaults() {
        let conn = Arc::new(MockConnection::quiet());
        let registry = Arc::new(NameRegistry::new());
        registry.register("`lab`.`subject`", "Subject");
        let session = declared_pair(&conn, Some(registry));

        let text = session.describe().unwrap();
        assert!(text.starts_with("# recording sessions\n"));
        assert!(text.contains("-> Subject\n"));
        assert!(text.contains("session_id : bigint"));
        assert!(text.contains("\n---\n"));
        assert!(text.contains("rig='bench' : varchar(32)"));
        assert!(text.contains("notes=null : text"));
    }

    #[test]
    fn foreign_key_index_suppressed_and_alias_projected() {
        let conn = Arc::new(MockConnection::quiet());
        let conn_dyn = conn.clone() as Arc<dyn Connection>;

        conn.expect("CREATE TABLE", Reply::Affected(0));
        let subject = Table::bound(
            conn_dyn.clone(),
            TableId::new("lab", "subject").unwrap(),
            TableDefinition::new("subjects")
                .key(Attribute::new("subject_id", SqlType::BigInt)),
            None,
        );
        subject.declare().unwrap();

        // A non-key aliased reference gets a supporting index at declare
        // time; describing must not re-emit it.
        conn.expect("CREATE TABLE", Reply::Affected(0));
        let transplant = Table::bound(
            conn_dyn,
            TableId::new("lab", "transplant").unwrap(),
            TableDefinition::new("transplants")
                .key(Attribute::new("transplant_id", SqlType::BigInt))
                .foreign_key(
                    ForeignKeyDef::new(subject.id().clone()).map("donor_id", "subject_id"),
                )
                .index(&["transplant_id", "donor_id"], true),
            None,
        );
        transplant.declare().unwrap();

        let rebuilt = transplant.definition_from_schema().unwrap();
        assert_eq!(rebuilt.indexes.len(), 1);
        assert!(rebuilt.indexes[0].unique);

        let text = transplant.describe().unwrap();
        assert!(text.contains("-> `lab`.`subject`.proj(donor_id=\"subject_id\")"));
        assert!(text.contains("UNIQUE INDEX (transplant_id, donor_id)"));
        assert!(!text.contains("\nINDEX (donor_id)"));
    }
}
