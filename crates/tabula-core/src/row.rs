//! Result row representation.

use std::sync::Arc;

use crate::value::Value;

/// Column metadata shared across all rows of a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    pub names: Vec<String>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// A single result row with its column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<ColumnInfo>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Build a single row from name/value pairs. Test helper and mock driver
    /// convenience; result sets from a real driver share one `ColumnInfo`.
    pub fn from_pairs(pairs: Vec<(&str, Value)>) -> Self {
        let names = pairs.iter().map(|(n, _)| (*n).to_string()).collect();
        let values = pairs.into_iter().map(|(_, v)| v).collect();
        Self {
            columns: Arc::new(ColumnInfo::new(names)),
            values,
        }
    }

    pub fn columns(&self) -> &ColumnInfo {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_index() {
        let row = Row::from_pairs(vec![
            ("subject_id", Value::BigInt(7)),
            ("species", Value::Text("mouse".to_string())),
        ]);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get(0), Some(&Value::BigInt(7)));
        assert_eq!(
            row.get_by_name("species"),
            Some(&Value::Text("mouse".to_string()))
        );
        assert_eq!(row.get_by_name("missing"), None);
    }
}
