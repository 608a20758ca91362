//! The update family: keyed single-row updates and checked saves.

use tabula_core::{Error, Result, Value};

use crate::condition::{Restriction, where_clause};
use crate::delete::child_restriction;
use crate::insert::RowMap;
use crate::placeholder::{EncodedField, encode_field};
use crate::table::Table;

/// What to do when an update would touch a row with populated dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnPopulated {
    /// Refuse the update
    Raise,
    /// Warn and proceed
    Warn,
    /// Proceed silently
    Ignore,
}

impl Table {
    /// Update exactly one row, identified by the full primary key in `row`.
    ///
    /// Requires an unrestricted table instance: the row to update is named
    /// by the key, not by an accumulated restriction. Non-key values of
    /// `Value::Null` reset the attribute to its column default.
    pub fn update1(&self, row: &RowMap) -> Result<u64> {
        let heading = self.heading()?;
        if !self.restriction.is_all() {
            return Err(Error::invalid(
                "update1 requires an unrestricted table instance",
            ));
        }
        for name in row.names() {
            if !heading.contains(name) {
                return Err(Error::unknown_attribute(name));
            }
        }
        let key = heading.primary_key();
        let mut key_pairs: Vec<(String, Value)> = Vec::with_capacity(key.len());
        for name in &key {
            let Some(value) = row.get(name) else {
                return Err(Error::invalid(format!(
                    "update1 requires the full primary key; `{name}` is missing"
                )));
            };
            key_pairs.push(((*name).to_string(), value.clone()));
        }

        let restriction = Restriction::Equal(key_pairs);
        if self.restrict(restriction.clone()).count()? != 1 {
            return Err(Error::invalid(
                "update1 requires exactly one existing row to update",
            ));
        }

        let updates: Vec<(&str, &Value)> = row
            .iter()
            .filter(|(n, _)| !key.contains(&n.as_str()))
            .map(|(n, v)| (n.as_str(), v))
            .collect();
        if updates.is_empty() {
            return Err(Error::invalid("update1 received no non-key attributes"));
        }

        self.run_update(&heading, &restriction, &updates)
    }

    /// Update one attribute of the single row matched by the current
    /// restriction, after checking downstream auto-populated tables.
    pub fn save_update(
        &self,
        name: &str,
        value: Value,
        reload: bool,
        on_populated: OnPopulated,
    ) -> Result<u64> {
        self.save_updates(&RowMap::new().with(name, value), reload, on_populated)
    }

    /// Update non-key attributes of the single row matched by the current
    /// restriction.
    ///
    /// Before touching the row, every downstream auto-populated table is
    /// checked for rows computed from it; `on_populated` decides whether
    /// that blocks, warns or is ignored.
    pub fn save_updates(
        &self,
        updates: &RowMap,
        reload: bool,
        on_populated: OnPopulated,
    ) -> Result<u64> {
        let heading = self.heading()?;
        let key = heading.primary_key();
        for name in updates.names() {
            if !heading.contains(name) {
                return Err(Error::unknown_attribute(name));
            }
            if key.contains(&name) {
                return Err(Error::invalid(format!(
                    "cannot update primary key attribute `{name}`"
                )));
            }
        }
        if updates.is_empty() {
            return Err(Error::invalid("no updates supplied"));
        }
        if self.count()? != 1 {
            return Err(Error::invalid(
                "save_updates requires a restriction matching exactly one row",
            ));
        }

        if reload {
            self.conn.dependencies().invalidate();
        }
        self.check_downstream(on_populated)?;

        let pairs: Vec<(&str, &Value)> =
            updates.iter().map(|(n, v)| (n.as_str(), v)).collect();
        self.run_update(&heading, &self.restriction, &pairs)
    }

    fn run_update(
        &self,
        heading: &tabula_core::Heading,
        restriction: &Restriction,
        updates: &[(&str, &Value)],
    ) -> Result<u64> {
        let mut fields: Vec<EncodedField> = Vec::with_capacity(updates.len());
        for (name, value) in updates {
            if let Some(field) = encode_field(
                &self.conn,
                self.database(),
                heading,
                name,
                (*value).clone(),
                false,
            )? {
                fields.push(field);
            }
        }
        let set: Vec<String> = fields
            .iter()
            .map(|f| format!("{}={}", tabula_core::quote_ident(&f.name), f.placeholder.as_sql()))
            .collect();
        let args: Vec<Value> = fields.iter().filter_map(|f| f.value.clone()).collect();
        let sql = format!(
            "UPDATE {} SET {}{}",
            self.full_table_name(),
            set.join(","),
            where_clause(heading, restriction)?
        );
        self.conn.execute(&sql, &args)
    }

    /// Walk all children recursively looking for auto-populated tables with
    /// rows derived from the restricted rows of `self`.
    fn check_downstream(&self, on_populated: OnPopulated) -> Result<()> {
        if on_populated == OnPopulated::Ignore {
            return Ok(());
        }
        for (name, fk) in self.children(None) {
            let child = Table::free(self.conn.clone(), &name)?;
            let restricted = child.restrict(child_restriction(self, &child, &fk)?);
            if restricted.heading()?.auto_populated && restricted.count()? > 0 {
                let message = format!(
                    "the row has dependent entries in the auto-populated table {name}; \
                     delete them first to force recomputation"
                );
                match on_populated {
                    OnPopulated::Raise => return Err(Error::invalid(message)),
                    OnPopulated::Warn => tracing::warn!("{message}"),
                    OnPopulated::Ignore => {}
                }
            }
            restricted.check_downstream(on_populated)?;
        }
        Ok(())
    }
}
