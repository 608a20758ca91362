//! Cascading delete and drop.

use tabula_core::{Error, ForeignKey, Result};

use crate::condition::{Restriction, make_condition, where_clause};
use crate::table::Table;

/// Translate a parent's restriction into one on a child table, for cascading
/// deletes and downstream checks.
///
/// Three cases, in order:
/// 1. The edge renames attributes: restrict the child by a subquery
///    projecting the parent's key through the rename.
/// 2. The parent's restriction only names attributes of the child's primary
///    key: the restriction applies to the child verbatim.
/// 3. Otherwise: restrict the child by a subquery over the join attributes.
pub(crate) fn child_restriction(
    parent: &Table,
    child: &Table,
    fk: &ForeignKey,
) -> Result<Restriction> {
    let parent_heading = parent.heading()?;

    if !fk.aliased {
        if let Some(attrs) = parent.restriction.attributes() {
            let child_heading = child.heading()?;
            let child_key = child_heading.primary_key();
            if attrs.iter().all(|a| child_key.contains(&a.as_str())) {
                return Ok(parent.restriction.clone());
            }
        }
    }

    let parent_attrs: Vec<String> = fk
        .parent_attributes()
        .iter()
        .map(|a| tabula_core::quote_ident(a))
        .collect();
    let condition = make_condition(&parent_heading, &parent.restriction)?;
    let select = format!(
        "SELECT {} FROM {}{}",
        parent_attrs.join(","),
        parent.full_table_name(),
        condition.map_or(String::new(), |c| format!(" WHERE {c}")),
    );
    Ok(Restriction::In {
        attributes: fk.child_attributes().iter().map(|a| (*a).to_string()).collect(),
        select,
    })
}

impl Table {
    /// Delete matching rows without cascading. Returns the row count.
    pub fn delete_quick(&self) -> Result<u64> {
        let heading = self.heading()?;
        let sql = format!(
            "DELETE FROM {}{}",
            self.full_table_name(),
            where_clause(&heading, &self.restriction)?
        );
        let count = self.conn.execute(&sql, &[])?;
        self.audit(&truncate(&sql, 255));
        Ok(count)
    }

    /// Delete matching rows, recursing into restricted children whenever the
    /// database reports an integrity violation. Returns the total count and
    /// a human-readable summary, one line per table.
    pub(crate) fn cascade(&self) -> Result<(u64, String)> {
        if self.count()? == 0 {
            return Ok((0, String::new()));
        }
        let mut total = 0;
        let mut message = String::new();

        let deleted = match self.delete_quick() {
            Ok(n) => n,
            Err(err) if err.is_integrity() => {
                for (name, fk) in self.children(None) {
                    let child = Table::free(self.conn.clone(), &name)?;
                    let restricted = child.restrict(child_restriction(self, &child, &fk)?);
                    let (n, msg) = restricted.cascade()?;
                    total += n;
                    message.push_str(&msg);
                }
                self.delete_quick()?
            }
            Err(err) => return Err(err),
        };

        total += deleted;
        tracing::info!(table = %self.full_table_name(), rows = deleted, "deleted");
        message.push_str(&format!(
            "Deleting {deleted} rows from {}\n",
            self.full_table_name()
        ));
        Ok((total, message))
    }

    /// Cascading delete with transaction and confirmation handling.
    ///
    /// With `transaction` the whole cascade commits or rolls back as one
    /// unit; nesting inside an open transaction is refused in safemode and
    /// silently joins it otherwise. `safemode` defaults to the connection
    /// setting; when on, a nonzero cascade asks for confirmation before
    /// committing.
    pub fn delete(&self, transaction: bool, safemode: Option<bool>) -> Result<u64> {
        let settings = self.conn.settings();
        let safemode = safemode.unwrap_or(settings.safemode);

        let mut own_transaction = transaction;
        if own_transaction {
            if self.conn.in_transaction() {
                if safemode {
                    return Err(Error::invalid(
                        "delete cannot use a transaction inside an open transaction; \
                         call delete(false, ..) or commit first",
                    ));
                }
                own_transaction = false;
            } else {
                self.conn.start_transaction()?;
            }
        }

        let (count, message) = match self.cascade() {
            Ok(result) => result,
            Err(err) => {
                if own_transaction {
                    let _ = self.conn.cancel_transaction();
                }
                return Err(err);
            }
        };

        if count == 0 {
            tracing::info!(table = %self.full_table_name(), "nothing to delete");
            if own_transaction {
                self.conn.cancel_transaction()?;
            }
        } else if !safemode || settings.confirmed(&format!("{message}Commit deletes?")) {
            if own_transaction {
                self.conn.commit_transaction()?;
                tracing::info!(table = %self.full_table_name(), rows = count, "deletes committed");
            }
        } else {
            if own_transaction {
                self.conn.cancel_transaction()?;
            }
            tracing::info!(table = %self.full_table_name(), "deletes cancelled");
            return Ok(0);
        }
        Ok(count)
    }

    /// Drop this table without touching dependents.
    pub fn drop_quick(&self) -> Result<()> {
        let sql = format!("DROP TABLE {}", self.full_table_name());
        self.conn.execute(&sql, &[])?;
        self.audit(&sql);
        self.conn.catalog().remove(&self.full_table_name());
        self.conn.dependencies().invalidate();
        self.invalidate_heading();
        tracing::info!(table = %self.full_table_name(), "dropped table");
        Ok(())
    }

    /// Drop this table and every dependent table, children first.
    ///
    /// In safemode (unless `force`) the list of tables and their row counts
    /// must be confirmed first.
    pub fn drop(&self, force: bool) -> Result<()> {
        if !self.restriction.is_all() {
            return Err(Error::invalid(
                "cannot drop a restricted table; drop the unrestricted table instead",
            ));
        }
        let tables = self.descendants();
        let settings = self.conn.settings();
        if settings.safemode && !force {
            let mut prompt = String::new();
            for name in &tables {
                let count = Table::free(self.conn.clone(), name)?.count()?;
                prompt.push_str(&format!("{name} ({count} rows)\n"));
            }
            if !settings.confirmed(&format!("{prompt}Proceed to drop?")) {
                tracing::info!(table = %self.full_table_name(), "drop cancelled");
                return Ok(());
            }
        }
        for name in tables.iter().rev() {
            Table::free(self.conn.clone(), name)?.drop_quick()?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = 0;
    for (idx, _) in s.char_indices() {
        if idx > max {
            break;
        }
        end = idx;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabula_core::{
        Attribute, Connection, MockConnection, QueryError, Reply, SqlType, TableId, TxEvent, Value,
    };
    use tabula_schema::{ForeignKeyDef, TableDefinition};

    fn integrity() -> Error {
        Error::Integrity(
            QueryError::new("Cannot delete or update a parent row").with_sqlstate("23000"),
        )
    }

    /// subject <- session <- trial
    fn declare_chain(conn: &Arc<MockConnection>) -> (Table, Table, Table) {
        let conn_dyn = conn.clone() as Arc<dyn Connection>;
        conn.expect("CREATE TABLE", Reply::Affected(0));
        let subject = Table::bound(
            conn_dyn.clone(),
            TableId::new("lab", "subject").unwrap(),
            TableDefinition::new("subjects").key(Attribute::new("subject_id", SqlType::BigInt)),
            None,
        );
        subject.declare().unwrap();

        conn.expect("CREATE TABLE", Reply::Affected(0));
        let session = Table::bound(
            conn_dyn.clone(),
            TableId::new("lab", "session").unwrap(),
            TableDefinition::new("sessions")
                .foreign_key(ForeignKeyDef::new(subject.id().clone()).in_key(true))
                .key(Attribute::new("session_id", SqlType::BigInt)),
            None,
        );
        session.declare().unwrap();

        conn.expect("CREATE TABLE", Reply::Affected(0));
        let trial = Table::bound(
            conn_dyn,
            TableId::new("lab", "trial").unwrap(),
            TableDefinition::new("trials")
                .foreign_key(ForeignKeyDef::new(session.id().clone()).in_key(true))
                .key(Attribute::new("trial_id", SqlType::BigInt)),
            None,
        );
        trial.declare().unwrap();
        (subject, session, trial)
    }

    #[test]
    fn cascade_recurses_on_integrity_error() {
        let conn = Arc::new(MockConnection::quiet());
        let (subject, _, _) = declare_chain(&conn);
        let subject = subject.restrict(Restriction::key([("subject_id", Value::BigInt(1))]));

        // subject: count, blocked delete
        conn.expect("SELECT count(*) FROM `lab`.`subject`", Reply::count(1));
        conn.expect("DELETE FROM `lab`.`subject`", Reply::Fail(integrity()));
        // session inherits the key restriction verbatim: count, blocked delete
        conn.expect("SELECT count(*) FROM `lab`.`session`", Reply::count(2));
        conn.expect("DELETE FROM `lab`.`session`", Reply::Fail(integrity()));
        // trial: count, delete succeeds
        conn.expect("SELECT count(*) FROM `lab`.`trial`", Reply::count(3));
        conn.expect("DELETE FROM `lab`.`trial`", Reply::Affected(3));
        // retry session, then retry subject
        conn.expect("DELETE FROM `lab`.`session`", Reply::Affected(2));
        conn.expect("DELETE FROM `lab`.`subject`", Reply::Affected(1));

        let deleted = subject.delete(true, None).unwrap();
        assert_eq!(deleted, 6);
        assert_eq!(conn.transactions(), vec![TxEvent::Start, TxEvent::Commit]);
        assert_eq!(conn.remaining_expectations(), 0);

        // Children were deleted before their parents. The blocked first
        // attempts are in the statement log too, so compare the last (the
        // successful) DELETE per table.
        let executed = conn.executed();
        let position = |fragment: &str| {
            executed
                .iter()
                .rposition(|sql| sql.starts_with("DELETE") && sql.contains(fragment))
                .unwrap()
        };
        assert!(position("`lab`.`trial`") < position("`lab`.`session`"));
        assert!(position("`lab`.`session`") < position("`lab`.`subject`"));

        // The session delete reused the subject's key restriction.
        assert!(executed
            .iter()
            .any(|sql| sql.starts_with("DELETE FROM `lab`.`session`")
                && sql.contains("`subject_id`=1")));
    }

    #[test]
    fn delete_rolls_back_on_error() {
        let conn = Arc::new(MockConnection::quiet());
        let (subject, _, _) = declare_chain(&conn);

        conn.expect("SELECT count(*)", Reply::count(1));
        conn.expect(
            "DELETE FROM `lab`.`subject`",
            Reply::Fail(Error::Query(QueryError::new("server exploded"))),
        );
        assert!(subject.delete(true, None).is_err());
        assert_eq!(conn.transactions(), vec![TxEvent::Start, TxEvent::Cancel]);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn empty_delete_rolls_back() {
        let conn = Arc::new(MockConnection::quiet());
        let (subject, _, _) = declare_chain(&conn);

        conn.expect("SELECT count(*)", Reply::count(0));
        assert_eq!(subject.delete(true, None).unwrap(), 0);
        assert_eq!(conn.transactions(), vec![TxEvent::Start, TxEvent::Cancel]);
    }

    #[test]
    fn nested_transaction_rules() {
        let conn = Arc::new(MockConnection::quiet());
        let (subject, _, _) = declare_chain(&conn);
        conn.start_transaction().unwrap();

        // Safemode on: refused.
        assert!(subject.delete(true, Some(true)).is_err());

        // Safemode off: joins the open transaction, no commit of its own.
        conn.expect("SELECT count(*)", Reply::count(1));
        conn.expect("DELETE FROM `lab`.`subject`", Reply::Affected(1));
        assert_eq!(subject.delete(true, Some(false)).unwrap(), 1);
        assert!(conn.in_transaction());
        assert_eq!(conn.transactions(), vec![TxEvent::Start]);
    }

    #[test]
    fn declined_confirmation_cancels() {
        let conn = Arc::new(
            MockConnection::new().with_settings(
                tabula_core::Settings::default()
                    .confirm(tabula_core::ConfirmMode::DenyAll)
                    .audit_log(false),
            ),
        );
        let (subject, _, _) = declare_chain(&conn);

        conn.expect("SELECT count(*)", Reply::count(1));
        conn.expect("DELETE FROM `lab`.`subject`", Reply::Affected(1));
        assert_eq!(subject.delete(true, None).unwrap(), 0);
        assert_eq!(conn.transactions(), vec![TxEvent::Start, TxEvent::Cancel]);
    }

    #[test]
    fn drop_descends_children_first() {
        let conn = Arc::new(MockConnection::quiet());
        let (subject, _, _) = declare_chain(&conn);

        conn.expect("DROP TABLE `lab`.`trial`", Reply::Affected(0));
        conn.expect("DROP TABLE `lab`.`session`", Reply::Affected(0));
        conn.expect("DROP TABLE `lab`.`subject`", Reply::Affected(0));
        subject.drop(false).unwrap();

        assert_eq!(conn.remaining_expectations(), 0);
        assert!(!conn.catalog().contains("`lab`.`subject`"));
        assert!(!conn.catalog().contains("`lab`.`trial`"));
    }

    #[test]
    fn restricted_drop_refused() {
        let conn = Arc::new(MockConnection::quiet());
        let (subject, _, _) = declare_chain(&conn);
        let restricted = subject.restrict(Restriction::key([("subject_id", Value::BigInt(1))]));
        assert!(restricted.drop(false).is_err());
    }

    #[test]
    fn aliased_edge_uses_projection_subquery() {
        let conn = Arc::new(MockConnection::quiet());
        let conn_dyn = conn.clone() as Arc<dyn Connection>;

        conn.expect("CREATE TABLE", Reply::Affected(0));
        let subject = Table::bound(
            conn_dyn.clone(),
            TableId::new("lab", "subject").unwrap(),
            TableDefinition::new("subjects").key(Attribute::new("subject_id", SqlType::BigInt)),
            None,
        );
        subject.declare().unwrap();

        conn.expect("CREATE TABLE", Reply::Affected(0));
        let pairing = Table::bound(
            conn_dyn,
            TableId::new("lab", "pairing").unwrap(),
            TableDefinition::new("pairings")
                .key(Attribute::new("pairing_id", SqlType::BigInt))
                .foreign_key(
                    ForeignKeyDef::new(subject.id().clone()).map("partner_id", "subject_id"),
                ),
            None,
        );
        pairing.declare().unwrap();

        let restricted = subject.restrict(Restriction::key([("subject_id", Value::BigInt(7))]));
        let (name, fk) = restricted.children(None).into_iter().next().unwrap();
        let child = Table::free(restricted.connection().clone(), &name).unwrap();
        let restriction = child_restriction(&restricted, &child, &fk).unwrap();

        let Restriction::In { attributes, select } = restriction else {
            panic!("expected a subquery restriction");
        };
        assert_eq!(attributes, vec!["partner_id"]);
        assert_eq!(
            select,
            "SELECT `subject_id` FROM `lab`.`subject` WHERE `subject_id`=7"
        );
    }

    #[test]
    fn truncate_is_byte_bounded_and_char_safe() {
        assert_eq!(truncate("short", 255), "short");
        // 200 two-byte chars = 400 bytes; the cut lands on a char boundary
        // and the result never exceeds the byte limit.
        let wide = "é".repeat(200);
        let cut = truncate(&wide, 255);
        assert!(cut.len() <= 255);
        assert_eq!(cut, "é".repeat(127));
        assert_eq!(truncate("abcdef", 3), "abc");
    }

    #[test]
    fn opaque_restriction_falls_back_to_join() {
        let conn = Arc::new(MockConnection::quiet());
        let (subject, _session, _) = declare_chain(&conn);

        let restricted =
            subject.restrict(Restriction::Condition("subject_id > 3".to_string()));
        let (name, fk) = restricted.children(None).into_iter().next().unwrap();
        let child = Table::free(restricted.connection().clone(), &name).unwrap();
        let restriction = child_restriction(&restricted, &child, &fk).unwrap();

        let Restriction::In { attributes, select } = restriction else {
            panic!("expected a subquery restriction");
        };
        assert_eq!(attributes, vec!["subject_id"]);
        assert!(select.contains("WHERE subject_id > 3"));
    }
}
