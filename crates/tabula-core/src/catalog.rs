//! Registry of declared tables.
//!
//! The catalog is the connection's authoritative record of every table this
//! process has declared or discovered: compiled headings plus foreign-key
//! edges. Free tables read their headings from here, and the dependency
//! graph rebuilds itself from here after invalidation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::graph::ForeignKey;
use crate::heading::Heading;
use crate::identifiers::TableId;
use crate::relock;

/// Everything the catalog knows about one table.
#[derive(Debug, Clone)]
pub struct TableRecord {
    pub heading: Heading,
    /// Parent full name plus the resolved edge, in declaration order.
    pub foreign_keys: Vec<(String, ForeignKey)>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    inner: Mutex<BTreeMap<String, TableRecord>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: &TableId, record: TableRecord) {
        relock(&self.inner).insert(id.full_name(), record);
    }

    pub fn remove(&self, full_name: &str) {
        relock(&self.inner).remove(full_name);
    }

    pub fn contains(&self, full_name: &str) -> bool {
        relock(&self.inner).contains_key(full_name)
    }

    pub fn heading(&self, full_name: &str) -> Option<Heading> {
        relock(&self.inner).get(full_name).map(|r| r.heading.clone())
    }

    pub fn record(&self, full_name: &str) -> Option<TableRecord> {
        relock(&self.inner).get(full_name).cloned()
    }

    /// All records in name order.
    pub fn records(&self) -> Vec<(String, TableRecord)> {
        relock(&self.inner)
            .iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }

    /// Table names declared in `database`, unqualified, in name order.
    pub fn table_names(&self, database: &str) -> Vec<String> {
        let prefix = format!("`{database}`.`");
        relock(&self.inner)
            .keys()
            .filter_map(|full| {
                full.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_suffix('`'))
                    .map(str::to_string)
            })
            .collect()
    }
}
