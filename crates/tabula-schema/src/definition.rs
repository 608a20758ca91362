//! Structured table definitions.

use tabula_core::{Attribute, IndexSpec, TableId};

/// A foreign key in a definition: references the parent's full primary key.
///
/// `attr_map` renames child attributes relative to the parent; unmapped
/// parent key attributes keep their names. An empty map is the common
/// unaliased case.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub parent: TableId,
    /// Pairs of (child attribute, parent attribute) for renamed attributes.
    pub attr_map: Vec<(String, String)>,
    /// Whether the referencing attributes belong to the child's primary key.
    pub in_key: bool,
}

impl ForeignKeyDef {
    pub fn new(parent: TableId) -> Self {
        Self {
            parent,
            attr_map: Vec::new(),
            in_key: false,
        }
    }

    pub fn in_key(mut self, in_key: bool) -> Self {
        self.in_key = in_key;
        self
    }

    /// Rename one referencing attribute: `child` in this table references
    /// `parent_attr` in the parent.
    pub fn map(mut self, child: impl Into<String>, parent_attr: impl Into<String>) -> Self {
        self.attr_map.push((child.into(), parent_attr.into()));
        self
    }

    pub fn is_aliased(&self) -> bool {
        self.attr_map.iter().any(|(c, p)| c != p)
    }

    /// The child-side name for a parent key attribute.
    pub fn child_name<'a>(&'a self, parent_attr: &'a str) -> &'a str {
        self.attr_map
            .iter()
            .find(|(_, p)| p == parent_attr)
            .map_or(parent_attr, |(c, _)| c.as_str())
    }
}

/// The declared shape of a table, before compilation against the catalog.
///
/// Attribute order is meaningful: primary key attributes and in-key foreign
/// keys come first, in the order supplied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDefinition {
    pub comment: String,
    pub auto_populated: bool,
    pub attributes: Vec<Attribute>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub indexes: Vec<IndexSpec>,
}

impl TableDefinition {
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
            ..Self::default()
        }
    }

    pub fn auto_populated(mut self, auto_populated: bool) -> Self {
        self.auto_populated = auto_populated;
        self
    }

    /// Add a primary key attribute.
    pub fn key(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute.in_key(true));
        self
    }

    /// Add a secondary attribute.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute.in_key(false));
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn index(mut self, attributes: &[&str], unique: bool) -> Self {
        self.indexes.push(IndexSpec {
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
            unique,
        });
        self
    }
}
