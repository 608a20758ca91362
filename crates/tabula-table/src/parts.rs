//! Master/part tables and transactional master+parts inserts.

use std::sync::Arc;

use tabula_core::{Error, Result, Value};

use crate::insert::{InsertOptions, RowInput, RowMap};
use crate::relock;
use crate::table::Table;

/// One master row with the rows of its part tables, keyed by part name.
///
/// A part entry of `None` is explicitly skipped; a part with no entry at
/// all is an error when `raise_part_missing` is set.
#[derive(Debug, Clone, Default)]
pub struct MasterRow {
    pub row: RowMap,
    parts: Vec<(String, Option<Vec<RowInput>>)>,
}

impl MasterRow {
    pub fn new(row: RowMap) -> Self {
        Self {
            row,
            parts: Vec::new(),
        }
    }

    pub fn part(mut self, name: impl Into<String>, rows: Option<Vec<RowInput>>) -> Self {
        self.parts.push((name.into(), rows));
        self
    }

    fn entry(&self, name: &str) -> Option<&Option<Vec<RowInput>>> {
        self.parts.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }
}

impl Table {
    /// The part tables of this master, memoized: children whose name is
    /// `master__part`.
    pub fn part_tables(&self) -> Result<Arc<Vec<Table>>> {
        if let Some(parts) = relock(&self.part_cache).clone() {
            return Ok(parts);
        }
        let mut parts = Vec::new();
        for (name, _) in self.children(None) {
            let table = Table::free(self.conn.clone(), &name)?;
            if table.id().part_suffix_of(self.id()).is_some() {
                parts.push(table);
            }
        }
        let parts = Arc::new(parts);
        *relock(&self.part_cache) = Some(parts.clone());
        Ok(parts)
    }

    pub fn has_part_tables(&self) -> Result<bool> {
        Ok(!self.part_tables()?.is_empty())
    }

    /// Insert one master row and its part rows in a single transaction.
    ///
    /// The master's primary key values are propagated into every part row.
    /// If a transaction is already open, the insert joins it.
    pub fn insert1p(
        &self,
        master: &MasterRow,
        raise_part_missing: bool,
        options: &InsertOptions,
    ) -> Result<()> {
        let own_transaction = !self.conn.in_transaction();
        if own_transaction {
            self.conn.start_transaction()?;
        }
        let result = self.insert1p_inner(master, raise_part_missing, options);
        match result {
            Ok(()) => {
                if own_transaction {
                    self.conn.commit_transaction()?;
                }
                Ok(())
            }
            Err(err) => {
                if own_transaction {
                    let _ = self.conn.cancel_transaction();
                }
                Err(err)
            }
        }
    }

    /// Insert several master rows with their parts, one transaction each.
    pub fn insertp(
        &self,
        rows: &[MasterRow],
        raise_part_missing: bool,
        options: &InsertOptions,
    ) -> Result<()> {
        for row in rows {
            self.insert1p(row, raise_part_missing, options)?;
        }
        Ok(())
    }

    fn insert1p_inner(
        &self,
        master: &MasterRow,
        raise_part_missing: bool,
        options: &InsertOptions,
    ) -> Result<()> {
        let heading = self.heading()?;
        self.insert1(RowInput::Map(master.row.clone()), options)?;

        let mut key_pairs: Vec<(String, Value)> = Vec::new();
        for name in heading.primary_key() {
            let Some(value) = master.row.get(name) else {
                return Err(Error::invalid(format!(
                    "master row must supply its full primary key; `{name}` is missing"
                )));
            };
            key_pairs.push((name.to_string(), value.clone()));
        }

        for part in self.part_tables()?.iter() {
            let Some(suffix) = part.id().part_suffix_of(self.id()) else {
                continue;
            };
            let rows = match master.entry(suffix) {
                None if raise_part_missing => {
                    return Err(Error::invalid(format!(
                        "no rows supplied for part table `{suffix}`"
                    )));
                }
                None | Some(None) => continue,
                Some(Some(rows)) => rows,
            };

            // Parts that rename the master key cannot receive propagated
            // key values; their rows must be inserted explicitly.
            let renames = self
                .children(None)
                .into_iter()
                .any(|(name, fk)| name == part.full_table_name() && fk.aliased);
            if renames {
                return Err(Error::invalid(format!(
                    "part table `{suffix}` renames the master primary key; \
                     insert its rows directly",
                )));
            }

            for row in rows {
                let RowInput::Map(map) = row else {
                    return Err(Error::invalid(format!(
                        "part rows for `{suffix}` must be maps when inserted through the master"
                    )));
                };
                let mut merged = map.clone();
                for (name, value) in &key_pairs {
                    if !merged.contains(name) {
                        merged = merged.with(name.clone(), value.clone());
                    }
                }
                part.insert1(RowInput::Map(merged), options)?;
            }
        }
        Ok(())
    }
}
