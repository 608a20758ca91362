//! Table headings: ordered attribute lists with key, index and storage info.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::SqlType;
use crate::value::Value;

/// Converts caller-supplied values into storable ones before encoding.
/// Applied before any other placeholder processing.
pub trait ValueAdapter: Send + Sync {
    fn put(&self, value: Value) -> Result<Value>;
}

/// How an attribute's values are encoded on insert/update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Stored as-is
    Plain,
    /// 16-byte UUID; string inputs are parsed
    Uuid,
    /// Packed binary blob, optionally offloaded to an external store
    Blob,
    /// File attachment: contents inline or a store reference
    Attachment,
    /// Managed file path tracked through an external store
    Filepath,
}

/// A single attribute of a table heading.
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub sql_type: SqlType,
    pub in_key: bool,
    pub nullable: bool,
    pub default: Option<String>,
    pub auto_increment: bool,
    pub kind: AttributeKind,
    pub store: Option<String>,
    pub comment: String,
    pub adapter: Option<Arc<dyn ValueAdapter>>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            in_key: false,
            nullable: false,
            default: None,
            auto_increment: false,
            kind: AttributeKind::Plain,
            store: None,
            comment: String::new(),
            adapter: None,
        }
    }

    pub fn in_key(mut self, in_key: bool) -> Self {
        self.in_key = in_key;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    pub fn kind(mut self, kind: AttributeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn ValueAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn is_numeric(&self) -> bool {
        self.sql_type.is_numeric()
    }

    /// Whether values of this attribute live in an external store.
    pub fn is_external(&self) -> bool {
        self.store.is_some()
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("sql_type", &self.sql_type)
            .field("in_key", &self.in_key)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("auto_increment", &self.auto_increment)
            .field("kind", &self.kind)
            .field("store", &self.store)
            .field("comment", &self.comment)
            .field("adapter", &self.adapter.is_some())
            .finish()
    }
}

// Adapters are opaque callables; equality covers the declared shape only.
impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.sql_type == other.sql_type
            && self.in_key == other.in_key
            && self.nullable == other.nullable
            && self.default == other.default
            && self.auto_increment == other.auto_increment
            && self.kind == other.kind
            && self.store == other.store
            && self.comment == other.comment
    }
}

/// A secondary index over a set of attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub attributes: Vec<String>,
    pub unique: bool,
}

/// An ordered table heading: primary key attributes first by convention,
/// plus indexes, the table comment and the auto-populated flag.
#[derive(Debug, Clone, Default)]
pub struct Heading {
    attributes: Vec<Attribute>,
    index_of: HashMap<String, usize>,
    pub indexes: Vec<IndexSpec>,
    pub comment: String,
    pub auto_populated: bool,
}

impl Heading {
    pub fn new(attributes: Vec<Attribute>) -> Result<Self> {
        let mut index_of = HashMap::with_capacity(attributes.len());
        for (i, attr) in attributes.iter().enumerate() {
            if index_of.insert(attr.name.clone(), i).is_some() {
                return Err(Error::invalid(format!(
                    "duplicate attribute `{}` in heading",
                    attr.name
                )));
            }
        }
        Ok(Self {
            attributes,
            index_of,
            indexes: Vec::new(),
            comment: String::new(),
            auto_populated: false,
        })
    }

    pub fn with_indexes(mut self, indexes: Vec<IndexSpec>) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_auto_populated(mut self, auto_populated: bool) -> Self {
        self.auto_populated = auto_populated;
        self
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn primary_key(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.in_key)
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn secondary(&self) -> Vec<&Attribute> {
        self.attributes.iter().filter(|a| !a.in_key).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.index_of.get(name).map(|&i| &self.attributes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl PartialEq for Heading {
    fn eq(&self, other: &Self) -> bool {
        self.attributes == other.attributes
            && self.indexes == other.indexes
            && self.comment == other.comment
            && self.auto_populated == other.auto_populated
    }
}
