//! The `Table` abstraction: identity, heading, restriction and schema ops.

use std::sync::{Arc, Mutex};

use tabula_core::{
    Connection, DependencyGraph, Error, ForeignKey, Heading, Result, TableId, TableRecord, Value,
    quote_ident,
};
use tabula_schema::TableDefinition;

use crate::condition::{Restriction, where_clause};
use crate::log::Log;
use crate::registry::NameRegistry;
use crate::relock;

/// A handle on one table through one connection, carrying an accumulated
/// restriction. Handles are cheap to clone; restriction composition clones.
pub struct Table {
    pub(crate) conn: Arc<dyn Connection>,
    pub(crate) id: TableId,
    pub(crate) definition: Option<TableDefinition>,
    pub(crate) registry: Option<Arc<NameRegistry>>,
    pub(crate) restriction: Restriction,
    pub(crate) heading_cache: Mutex<Option<Arc<Heading>>>,
    pub(crate) part_cache: Mutex<Option<Arc<Vec<Table>>>>,
    pub(crate) log_cache: Mutex<Option<Arc<Log>>>,
    pub(crate) in_populate: bool,
}

impl Clone for Table {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            id: self.id.clone(),
            definition: self.definition.clone(),
            registry: self.registry.clone(),
            restriction: self.restriction.clone(),
            heading_cache: Mutex::new(relock(&self.heading_cache).clone()),
            part_cache: Mutex::new(relock(&self.part_cache).clone()),
            log_cache: Mutex::new(relock(&self.log_cache).clone()),
            in_populate: self.in_populate,
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("restriction", &self.restriction)
            .field("in_populate", &self.in_populate)
            .finish_non_exhaustive()
    }
}

impl Table {
    /// A table bound to its definition, ready to declare and mutate.
    pub fn bound(
        conn: Arc<dyn Connection>,
        id: TableId,
        definition: TableDefinition,
        registry: Option<Arc<NameRegistry>>,
    ) -> Self {
        Self {
            conn,
            id,
            definition: Some(definition),
            registry,
            restriction: Restriction::All,
            heading_cache: Mutex::new(None),
            part_cache: Mutex::new(None),
            log_cache: Mutex::new(None),
            in_populate: false,
        }
    }

    /// A free table: any graph node materialized from its fully qualified
    /// name. Has no definition; its heading is served from the catalog.
    pub fn free(conn: Arc<dyn Connection>, full_name: &str) -> Result<Self> {
        let id = TableId::from_full_name(full_name)?;
        Ok(Self {
            conn,
            id,
            definition: None,
            registry: None,
            restriction: Restriction::All,
            heading_cache: Mutex::new(None),
            part_cache: Mutex::new(None),
            log_cache: Mutex::new(None),
            in_populate: false,
        })
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    pub fn id(&self) -> &TableId {
        &self.id
    }

    pub fn database(&self) -> &str {
        self.id.database()
    }

    pub fn table_name(&self) -> &str {
        self.id.name()
    }

    pub fn full_table_name(&self) -> String {
        self.id.full_name()
    }

    pub fn definition(&self) -> Option<&TableDefinition> {
        self.definition.as_ref()
    }

    pub fn restriction(&self) -> &Restriction {
        &self.restriction
    }

    /// A copy restricted by `restriction`, conjoined with the current one.
    pub fn restrict(&self, restriction: Restriction) -> Table {
        let mut table = self.clone();
        table.restriction = std::mem::take(&mut table.restriction).and(restriction);
        table
    }

    /// A copy marked as operating inside its populate routine, allowing
    /// direct inserts into an auto-populated table.
    pub fn for_populate(&self) -> Table {
        let mut table = self.clone();
        table.in_populate = true;
        table
    }

    /// The table's heading, from the cache or the catalog.
    pub fn heading(&self) -> Result<Arc<Heading>> {
        if let Some(heading) = relock(&self.heading_cache).clone() {
            return Ok(heading);
        }
        let heading = self
            .conn
            .catalog()
            .heading(&self.full_table_name())
            .ok_or_else(|| {
                Error::invalid(format!("table {} is not declared", self.full_table_name()))
            })?;
        let heading = Arc::new(heading);
        *relock(&self.heading_cache) = Some(heading.clone());
        Ok(heading)
    }

    pub(crate) fn invalidate_heading(&self) {
        *relock(&self.heading_cache) = None;
        *relock(&self.part_cache) = None;
    }

    pub fn primary_key(&self) -> Result<Vec<String>> {
        Ok(self
            .heading()?
            .primary_key()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Number of rows matching the current restriction.
    pub fn count(&self) -> Result<u64> {
        let heading = self.heading()?;
        let sql = format!(
            "SELECT count(*) FROM {}{}",
            self.full_table_name(),
            where_clause(&heading, &self.restriction)?
        );
        let rows = self.conn.query(&sql, &[])?;
        rows.first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .map(|n| n.max(0) as u64)
            .ok_or_else(|| Error::invalid("count query returned no rows"))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// Whether the table exists, from the catalog or by asking the server.
    pub fn is_declared(&self) -> Result<bool> {
        if self.conn.catalog().contains(&self.full_table_name()) {
            return Ok(true);
        }
        let sql = format!(
            "SHOW TABLES in {} LIKE \"{}\"",
            quote_ident(self.database()),
            self.table_name()
        );
        Ok(!self.conn.query(&sql, &[])?.is_empty())
    }

    /// Total of data and index sizes reported by the server, in bytes.
    pub fn size_on_disk(&self) -> Result<u64> {
        let sql = format!(
            "SHOW TABLE STATUS FROM {} WHERE NAME=\"{}\"",
            quote_ident(self.database()),
            self.table_name()
        );
        let rows = self.conn.query(&sql, &[])?;
        let row = rows.first().ok_or_else(|| {
            Error::invalid(format!("table {} is not declared", self.full_table_name()))
        })?;
        let data = row
            .get_by_name("Data_length")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let index = row
            .get_by_name("Index_length")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok((data + index).max(0) as u64)
    }

    /// The connection's dependency graph, loaded from the catalog if stale.
    pub(crate) fn ensure_graph(&self) -> Arc<DependencyGraph> {
        let graph = self.conn.dependencies();
        if !graph.is_loaded() {
            graph.load_from(&self.conn.catalog());
        }
        graph
    }

    /// Parent tables with their foreign-key edges. `primary` filters by
    /// whether the edge is part of this table's primary key.
    pub fn parents(&self, primary: Option<bool>) -> Vec<(String, ForeignKey)> {
        self.ensure_graph().parents(&self.full_table_name(), primary)
    }

    pub fn children(&self, primary: Option<bool>) -> Vec<(String, ForeignKey)> {
        self.ensure_graph().children(&self.full_table_name(), primary)
    }

    /// This table and everything downstream, in topological order.
    pub fn descendants(&self) -> Vec<String> {
        self.ensure_graph().descendants(&self.full_table_name())
    }

    pub fn ancestors(&self) -> Vec<String> {
        self.ensure_graph().ancestors(&self.full_table_name())
    }

    pub fn parent_tables(&self, primary: Option<bool>) -> Result<Vec<(Table, ForeignKey)>> {
        self.parents(primary)
            .into_iter()
            .map(|(name, fk)| Ok((Table::free(self.conn.clone(), &name)?, fk)))
            .collect()
    }

    pub fn child_tables(&self, primary: Option<bool>) -> Result<Vec<(Table, ForeignKey)>> {
        self.children(primary)
            .into_iter()
            .map(|(name, fk)| Ok((Table::free(self.conn.clone(), &name)?, fk)))
            .collect()
    }

    /// Declare this table: compile the definition, resolve external stores,
    /// run CREATE TABLE and register the result.
    ///
    /// Declaring the identical table again is a no-op. Privilege errors are
    /// demoted to a warning: the table is assumed to exist.
    pub fn declare(&self) -> Result<()> {
        if self.conn.in_transaction() {
            return Err(Error::invalid(
                "cannot declare a table inside a transaction",
            ));
        }
        let Some(definition) = &self.definition else {
            return Err(Error::invalid(format!(
                "table {} has no definition to declare",
                self.full_table_name()
            )));
        };
        let catalog = self.conn.catalog();
        let declaration = tabula_schema::declare(&self.id, definition, &catalog)?;

        if let Some(existing) = catalog.heading(&self.full_table_name()) {
            if existing == declaration.heading {
                tracing::debug!(table = %self.full_table_name(), "table already declared");
                return Ok(());
            }
            return Err(Error::invalid(format!(
                "table {} is already declared with a different definition",
                self.full_table_name()
            )));
        }

        for store in &declaration.external_stores {
            self.conn.external_store(self.database(), store)?;
        }
        match self.conn.execute(&declaration.sql, &[]) {
            Ok(_) => {}
            Err(err) if err.is_access() => {
                tracing::warn!(
                    table = %self.full_table_name(),
                    error = %err,
                    "insufficient privileges to declare; assuming the table exists"
                );
            }
            Err(err) => return Err(err),
        }
        catalog.register(
            &self.id,
            TableRecord {
                heading: declaration.heading,
                foreign_keys: declaration.foreign_keys,
            },
        );
        self.conn.dependencies().invalidate();
        self.invalidate_heading();
        self.audit(&format!("Declared {}", self.full_table_name()));
        tracing::info!(table = %self.full_table_name(), "declared table");
        Ok(())
    }

    /// Alter this table to match its definition, confirming per settings.
    pub fn alter(&self) -> Result<()> {
        if self.conn.in_transaction() {
            return Err(Error::invalid("cannot alter a table inside a transaction"));
        }
        let Some(definition) = &self.definition else {
            return Err(Error::invalid(format!(
                "table {} has no definition to alter",
                self.full_table_name()
            )));
        };
        let catalog = self.conn.catalog();
        let plan = tabula_schema::alter(&self.id, definition, &catalog)?;
        if plan.is_empty() {
            tracing::info!(table = %self.full_table_name(), "nothing to alter");
            return Ok(());
        }
        let sql = format!(
            "ALTER TABLE {}\n\t{}",
            self.full_table_name(),
            plan.clauses.join(",\n\t")
        );
        if !self.conn.settings().confirmed(&format!("{sql}\n\nExecute?")) {
            tracing::info!(table = %self.full_table_name(), "alter cancelled");
            return Ok(());
        }
        for store in &plan.external_stores {
            self.conn.external_store(self.database(), store)?;
        }
        match self.conn.execute(&sql, &[]) {
            Ok(_) => {}
            Err(err) if err.is_access() => {
                tracing::warn!(
                    table = %self.full_table_name(),
                    error = %err,
                    "insufficient privileges to alter"
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        }
        catalog.register(
            &self.id,
            TableRecord {
                heading: plan.heading,
                foreign_keys: plan.foreign_keys,
            },
        );
        self.conn.dependencies().invalidate();
        self.invalidate_heading();
        self.audit(&format!("Altered {}", self.full_table_name()));
        tracing::info!(table = %self.full_table_name(), "altered table");
        Ok(())
    }

    /// Best-effort audit log entry; failures become warnings.
    pub(crate) fn audit(&self, event: &str) {
        if !self.conn.settings().audit_log || self.table_name().starts_with('~') {
            return;
        }
        let log = {
            let mut cache = relock(&self.log_cache);
            if let Some(log) = cache.clone() {
                log
            } else {
                match Log::new(self.conn.clone(), self.database()) {
                    Ok(log) => {
                        let log = Arc::new(log);
                        *cache = Some(log.clone());
                        log
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "could not open the event log");
                        return;
                    }
                }
            }
        };
        log.record(event);
    }
}
