//! Mapping from full table names to user-facing class names.
//!
//! Populated explicitly when a schema is bound; `describe` uses it to render
//! foreign keys as `-> ClassName` instead of raw quoted names.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::relock;

#[derive(Debug, Default)]
pub struct NameRegistry {
    names: Mutex<BTreeMap<String, String>>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, full_name: impl Into<String>, class_name: impl Into<String>) {
        relock(&self.names).insert(full_name.into(), class_name.into());
    }

    pub fn lookup(&self, full_name: &str) -> Option<String> {
        relock(&self.names).get(full_name).cloned()
    }
}
