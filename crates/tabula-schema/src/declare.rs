//! Compile a table definition into CREATE TABLE SQL and a heading.

use tabula_core::{
    Attribute, Catalog, Error, ForeignKey, Heading, IndexSpec, Result, TableId, is_valid_name,
    quote_ident,
};

use crate::definition::TableDefinition;

/// The output of compiling a definition: the statement to run, the stores it
/// needs resolved first, and the compiled heading plus foreign-key edges to
/// register in the catalog.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub sql: String,
    pub external_stores: Vec<String>,
    pub heading: Heading,
    pub foreign_keys: Vec<(String, ForeignKey)>,
}

/// Compile `definition` for `id`, resolving foreign keys against `catalog`.
///
/// Inherited attributes take their type, kind and comment from the parent's
/// primary key. Parents must already be declared.
pub fn declare(id: &TableId, definition: &TableDefinition, catalog: &Catalog) -> Result<Declaration> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut foreign_keys: Vec<(String, ForeignKey)> = Vec::new();
    let mut fk_clauses: Vec<String> = Vec::new();
    let mut indexes: Vec<IndexSpec> = definition.indexes.clone();

    for attr in &definition.attributes {
        if !is_valid_name(&attr.name) {
            return Err(Error::invalid(format!(
                "invalid attribute name `{}` in {}",
                attr.name,
                id.full_name()
            )));
        }
    }

    // In-key foreign keys first, then declared keys, then the rest.
    for fk_def in definition.foreign_keys.iter().filter(|f| f.in_key) {
        compile_foreign_key(
            id,
            fk_def,
            catalog,
            &mut attributes,
            &mut foreign_keys,
            &mut fk_clauses,
            &mut indexes,
        )?;
    }
    for attr in definition.attributes.iter().filter(|a| a.in_key) {
        push_attribute(id, attr.clone(), &mut attributes)?;
    }
    for attr in definition.attributes.iter().filter(|a| !a.in_key) {
        push_attribute(id, attr.clone(), &mut attributes)?;
    }
    for fk_def in definition.foreign_keys.iter().filter(|f| !f.in_key) {
        compile_foreign_key(
            id,
            fk_def,
            catalog,
            &mut attributes,
            &mut foreign_keys,
            &mut fk_clauses,
            &mut indexes,
        )?;
    }

    let primary_key: Vec<&str> = attributes
        .iter()
        .filter(|a| a.in_key)
        .map(|a| a.name.as_str())
        .collect();
    if primary_key.is_empty() {
        return Err(Error::invalid(format!(
            "table {} must have a primary key",
            id.full_name()
        )));
    }

    let mut external_stores: Vec<String> = Vec::new();
    for attr in &attributes {
        if let Some(store) = &attr.store {
            if !external_stores.contains(store) {
                external_stores.push(store.clone());
            }
        }
    }

    let sql = render_create(id, definition, &attributes, &primary_key, &fk_clauses, &indexes);

    let heading = Heading::new(attributes)?
        .with_indexes(indexes)
        .with_comment(definition.comment.clone())
        .with_auto_populated(definition.auto_populated);

    Ok(Declaration {
        sql,
        external_stores,
        heading,
        foreign_keys,
    })
}

fn push_attribute(id: &TableId, attr: Attribute, attributes: &mut Vec<Attribute>) -> Result<()> {
    if attributes.iter().any(|a| a.name == attr.name) {
        return Err(Error::invalid(format!(
            "duplicate attribute `{}` in {}",
            attr.name,
            id.full_name()
        )));
    }
    attributes.push(attr);
    Ok(())
}

fn compile_foreign_key(
    id: &TableId,
    fk_def: &crate::definition::ForeignKeyDef,
    catalog: &Catalog,
    attributes: &mut Vec<Attribute>,
    foreign_keys: &mut Vec<(String, ForeignKey)>,
    fk_clauses: &mut Vec<String>,
    indexes: &mut Vec<IndexSpec>,
) -> Result<()> {
    let parent_full = fk_def.parent.full_name();
    let Some(parent) = catalog.record(&parent_full) else {
        return Err(Error::invalid(format!(
            "cannot declare {}: referenced table {parent_full} is not declared",
            id.full_name()
        )));
    };

    let parent_key: Vec<&Attribute> = parent
        .heading
        .attributes()
        .iter()
        .filter(|a| a.in_key)
        .collect();
    if parent_key.is_empty() {
        return Err(Error::invalid(format!(
            "referenced table {parent_full} has no primary key"
        )));
    }
    for (_, parent_attr) in &fk_def.attr_map {
        if !parent_key.iter().any(|a| &a.name == parent_attr) {
            return Err(Error::invalid(format!(
                "foreign key to {parent_full} renames `{parent_attr}`, which is not in its primary key"
            )));
        }
    }

    let mut attr_map = Vec::with_capacity(parent_key.len());
    for parent_attr in &parent_key {
        let child_name = fk_def.child_name(&parent_attr.name).to_string();
        attr_map.push((child_name.clone(), parent_attr.name.clone()));
        // Shared attributes inherited by an earlier key are not re-added.
        if attributes.iter().any(|a| a.name == child_name) {
            continue;
        }
        let mut inherited = (*parent_attr).clone();
        inherited.name = child_name;
        inherited.in_key = fk_def.in_key;
        inherited.auto_increment = false;
        inherited.default = None;
        attributes.push(inherited);
    }

    let child_attrs: Vec<String> = attr_map.iter().map(|(c, _)| c.clone()).collect();
    let quoted_children: Vec<String> = child_attrs.iter().map(|a| quote_ident(a)).collect();
    let quoted_parents: Vec<String> = attr_map.iter().map(|(_, p)| quote_ident(p)).collect();
    fk_clauses.push(format!(
        "FOREIGN KEY ({}) REFERENCES {parent_full} ({}) ON UPDATE CASCADE ON DELETE RESTRICT",
        quoted_children.join(","),
        quoted_parents.join(",")
    ));

    // Secondary foreign keys get a supporting index; in-key references are
    // covered by the primary key.
    if !fk_def.in_key && !indexes.iter().any(|i| i.attributes == child_attrs) {
        indexes.push(IndexSpec {
            attributes: child_attrs,
            unique: false,
        });
    }

    foreign_keys.push((
        parent_full,
        ForeignKey {
            aliased: attr_map.iter().any(|(c, p)| c != p),
            primary: fk_def.in_key,
            attr_map,
        },
    ));
    Ok(())
}

fn render_create(
    id: &TableId,
    definition: &TableDefinition,
    attributes: &[Attribute],
    primary_key: &[&str],
    fk_clauses: &[String],
    indexes: &[IndexSpec],
) -> String {
    let mut lines: Vec<String> = Vec::new();
    for attr in attributes {
        lines.push(render_column(attr));
    }
    let quoted_key: Vec<String> = primary_key.iter().map(|a| quote_ident(a)).collect();
    lines.push(format!("PRIMARY KEY ({})", quoted_key.join(",")));
    lines.extend(fk_clauses.iter().cloned());
    for index in indexes {
        let quoted: Vec<String> = index.attributes.iter().map(|a| quote_ident(a)).collect();
        let unique = if index.unique { "UNIQUE " } else { "" };
        lines.push(format!("{unique}INDEX ({})", quoted.join(",")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE=InnoDB, COMMENT \"{}\"",
        id.full_name(),
        lines.join(",\n"),
        definition.comment
    )
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
    if attr.auto_increment {
        parts.push("AUTO_INCREMENT".to_string());
    }
    if !attr.comment.is_empty() {
        parts.push(format!("COMMENT \"{}\"", attr.comment));
    }
    parts.join(" ")
}
