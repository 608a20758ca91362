//! The per-database event log.
//!
//! Every schema change and destructive operation leaves a row in `~log`.
//! Logging is best-effort: a failed log write warns and never fails the
//! operation that triggered it.

use std::sync::Arc;

use tabula_core::{Attribute, Connection, Result, SqlType, TableId};
use tabula_schema::TableDefinition;

use crate::insert::{InsertOptions, RowInput, RowMap};
use crate::table::Table;

pub struct Log {
    table: Table,
}

impl Log {
    /// Open the event log of `database`, declaring `~log` on first use.
    pub fn new(conn: Arc<dyn Connection>, database: &str) -> Result<Log> {
        let id = TableId::new(database, "~log")?;
        let definition = TableDefinition::new("event logging table")
            .key(Attribute::new("id", SqlType::BigInt).auto_increment(true))
            .attribute(
                Attribute::new("timestamp", SqlType::Timestamp)
                    .default("CURRENT_TIMESTAMP")
                    .comment("automatic timestamp"),
            )
            .attribute(Attribute::new("version", SqlType::VarChar(12)).comment("client version"))
            .attribute(Attribute::new("user", SqlType::VarChar(255)))
            .attribute(Attribute::new("host", SqlType::VarChar(255)))
            .attribute(Attribute::new("event", SqlType::VarChar(255)));
        let table = Table::bound(conn.clone(), id, definition, None);
        if !conn.catalog().contains(&table.full_table_name()) {
            table.declare()?;
        }
        Ok(Log { table })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Record one event. Over-long events are truncated to fit the column.
    pub fn record(&self, event: &str) {
        let event: String = event.chars().take(255).collect();
        let row = RowMap::new()
            .with("version", env!("CARGO_PKG_VERSION"))
            .with("user", self.table.connection().user_name())
            .with(
                "host",
                std::env::var("HOSTNAME").unwrap_or_default(),
            )
            .with("event", event);
        // The auto-increment key never collides, so no duplicate handling.
        let options = InsertOptions::new().ignore_extra_fields(true);
        if let Err(err) = self.table.insert1(RowInput::Map(row), &options) {
            tracing::warn!(error = %err, "could not write to the event log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::{MockConnection, Reply};

    #[test]
    fn declares_once_and_records() {
        let conn = Arc::new(MockConnection::quiet());
        conn.expect("CREATE TABLE IF NOT EXISTS `lab`.`~log`", Reply::Affected(0));

        let log = Log::new(conn.clone() as Arc<dyn Connection>, "lab").unwrap();
        // Reopening finds the table in the catalog and runs no DDL.
        let ddl_count = conn.executed().len();
        let log2 = Log::new(conn.clone() as Arc<dyn Connection>, "lab").unwrap();
        assert_eq!(conn.executed().len(), ddl_count);
        drop(log2);

        conn.expect("INSERT INTO `lab`.`~log`", Reply::Affected(1));
        log.record("Declared `lab`.`subject`");
        let sql = conn.executed().last().cloned().unwrap();
        assert!(sql.contains("`version`"));
        assert!(sql.contains("`user`"));
        assert!(sql.contains("`event`"));
        assert!(!sql.contains("`id`"));
    }

    #[test]
    fn record_failure_is_swallowed() {
        let conn = Arc::new(MockConnection::quiet());
        conn.expect("CREATE TABLE", Reply::Affected(0));
        let log = Log::new(conn.clone() as Arc<dyn Connection>, "lab").unwrap();

        conn.expect(
            "INSERT INTO `lab`.`~log`",
            Reply::Fail(tabula_core::Error::invalid("server gone")),
        );
        log.record("an event");
    }
}
