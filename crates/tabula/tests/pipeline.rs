//! End-to-end scenarios over a scripted connection: declaring a small
//! pipeline, inserting into it, cascading deletes through it and reflecting
//! it back out.

use std::sync::Arc;

use tabula::{
    Attribute, ConfirmMode, Connection, Error, ForeignKeyDef, InsertOptions, MockConnection,
    NameRegistry, QueryError, Reply, Restriction, RowInput, RowMap, Settings, SqlType, Table,
    TableDefinition, TableId, TxEvent, Value,
};

fn integrity() -> Error {
    Error::Integrity(QueryError::new("Cannot delete or update a parent row").with_sqlstate("23000"))
}

/// subject <- session <- trial, with optional class names registered.
fn declare_chain(
    conn: &Arc<MockConnection>,
    registry: Option<Arc<NameRegistry>>,
) -> (Table, Table, Table) {
    let conn_dyn = conn.clone() as Arc<dyn Connection>;

    conn.expect("CREATE TABLE IF NOT EXISTS `lab`.`subject`", Reply::Affected(0));
    let subject = Table::bound(
        conn_dyn.clone(),
        TableId::new("lab", "subject").unwrap(),
        TableDefinition::new("experimental subjects")
            .key(Attribute::new("subject_id", SqlType::BigInt))
            .attribute(Attribute::new("species", SqlType::VarChar(32)).default("'mouse'")),
        registry.clone(),
    );
    subject.declare().unwrap();

    conn.expect("CREATE TABLE IF NOT EXISTS `lab`.`session`", Reply::Affected(0));
    let session = Table::bound(
        conn_dyn.clone(),
        TableId::new("lab", "session").unwrap(),
        TableDefinition::new("recording sessions")
            .foreign_key(ForeignKeyDef::new(subject.id().clone()).in_key(true))
            .key(Attribute::new("session_id", SqlType::BigInt)),
        registry.clone(),
    );
    session.declare().unwrap();

    conn.expect("CREATE TABLE IF NOT EXISTS `lab`.`trial`", Reply::Affected(0));
    let trial = Table::bound(
        conn_dyn,
        TableId::new("lab", "trial").unwrap(),
        TableDefinition::new("trials within a session")
            .foreign_key(ForeignKeyDef::new(session.id().clone()).in_key(true))
            .key(Attribute::new("trial_id", SqlType::BigInt)),
        registry,
    );
    trial.declare().unwrap();
    (subject, session, trial)
}

#[test]
fn declare_insert_and_cascade_delete() {
    let conn = Arc::new(MockConnection::quiet());
    let (subject, session, trial) = declare_chain(&conn, None);

    conn.expect("INSERT INTO `lab`.`subject`", Reply::Affected(2));
    subject
        .insert(
            vec![
                RowInput::Map(RowMap::new().with("subject_id", 1i64).with("species", "rat")),
                RowInput::Map(RowMap::new().with("subject_id", 2i64).with("species", Value::Null)),
            ],
            &InsertOptions::new(),
        )
        .unwrap();

    conn.expect("INSERT INTO `lab`.`session`", Reply::Affected(1));
    session
        .insert1(
            RowMap::new().with("subject_id", 1i64).with("session_id", 1i64),
            &InsertOptions::new(),
        )
        .unwrap();

    conn.expect("INSERT INTO `lab`.`trial`", Reply::Affected(2));
    trial
        .insert(
            vec![
                RowInput::Map(
                    RowMap::new()
                        .with("subject_id", 1i64)
                        .with("session_id", 1i64)
                        .with("trial_id", 1i64),
                ),
                RowInput::Map(
                    RowMap::new()
                        .with("subject_id", 1i64)
                        .with("session_id", 1i64)
                        .with("trial_id", 2i64),
                ),
            ],
            &InsertOptions::new(),
        )
        .unwrap();

    // Deleting subject 1 is blocked twice by integrity errors and recurses
    // down to trials before retrying on the way back up.
    let one = subject.restrict(Restriction::key([("subject_id", Value::BigInt(1))]));
    conn.expect("SELECT count(*) FROM `lab`.`subject`", Reply::count(1));
    conn.expect("DELETE FROM `lab`.`subject`", Reply::Fail(integrity()));
    conn.expect("SELECT count(*) FROM `lab`.`session`", Reply::count(1));
    conn.expect("DELETE FROM `lab`.`session`", Reply::Fail(integrity()));
    conn.expect("SELECT count(*) FROM `lab`.`trial`", Reply::count(2));
    conn.expect("DELETE FROM `lab`.`trial`", Reply::Affected(2));
    conn.expect("DELETE FROM `lab`.`session`", Reply::Affected(1));
    conn.expect("DELETE FROM `lab`.`subject`", Reply::Affected(1));

    assert_eq!(one.delete(true, None).unwrap(), 4);
    assert_eq!(conn.transactions(), vec![TxEvent::Start, TxEvent::Commit]);
    assert_eq!(conn.remaining_expectations(), 0);

    // The blocked first attempts are recorded too; the last DELETE per
    // table is the one that succeeded.
    let executed = conn.executed();
    let delete_position = |fragment: &str| {
        executed
            .iter()
            .rposition(|sql| sql.starts_with("DELETE") && sql.contains(fragment))
            .unwrap()
    };
    assert!(delete_position("`lab`.`trial`") < delete_position("`lab`.`session`"));
    assert!(delete_position("`lab`.`session`") < delete_position("`lab`.`subject`"));
}

#[test]
fn failed_cascade_rolls_back() {
    let conn = Arc::new(MockConnection::quiet());
    let (subject, _, _) = declare_chain(&conn, None);

    conn.expect("SELECT count(*)", Reply::count(1));
    conn.expect(
        "DELETE FROM `lab`.`subject`",
        Reply::Fail(Error::Query(QueryError::new("lost connection"))),
    );
    assert!(subject.delete(true, None).is_err());
    assert_eq!(conn.transactions(), vec![TxEvent::Start, TxEvent::Cancel]);
    assert!(!conn.in_transaction());
}

#[test]
fn bulk_insert_fails_before_any_sql() {
    let conn = Arc::new(MockConnection::quiet());
    let (subject, _, _) = declare_chain(&conn, None);
    let statements_before = conn.executed().len();

    // The second row names a field the first row did not; nothing reaches
    // the database.
    let rows = vec![
        RowInput::Map(RowMap::new().with("subject_id", 1i64)),
        RowInput::Map(RowMap::new().with("subject_id", 2i64).with("species", "rat")),
    ];
    assert!(subject.insert(rows, &InsertOptions::new()).is_err());
    assert_eq!(conn.executed().len(), statements_before);
}

#[test]
fn redeclaration_rules() {
    let conn = Arc::new(MockConnection::quiet());
    let (subject, _, _) = declare_chain(&conn, None);

    // Identical redeclaration runs no SQL.
    let statements_before = conn.executed().len();
    subject.declare().unwrap();
    assert_eq!(conn.executed().len(), statements_before);

    // A conflicting one is refused.
    let conflicting = Table::bound(
        conn.clone() as Arc<dyn Connection>,
        TableId::new("lab", "subject").unwrap(),
        TableDefinition::new("subjects").key(Attribute::new("subject_id", SqlType::Integer)),
        None,
    );
    assert!(conflicting.declare().is_err());
}

#[test]
fn schema_changes_and_deletes_hit_the_event_log() {
    let conn = Arc::new(
        MockConnection::new()
            .with_settings(Settings::default().confirm(ConfirmMode::AcceptAll)),
    );
    let conn_dyn = conn.clone() as Arc<dyn Connection>;

    // First declaration also declares `~log` before recording into it.
    conn.expect("CREATE TABLE IF NOT EXISTS `lab`.`subject`", Reply::Affected(0));
    conn.expect("CREATE TABLE IF NOT EXISTS `lab`.`~log`", Reply::Affected(0));
    conn.expect("INSERT INTO `lab`.`~log`", Reply::Affected(1));
    let subject = Table::bound(
        conn_dyn,
        TableId::new("lab", "subject").unwrap(),
        TableDefinition::new("subjects").key(Attribute::new("subject_id", SqlType::BigInt)),
        None,
    );
    subject.declare().unwrap();

    // A quick delete records the statement it ran.
    conn.expect("DELETE FROM `lab`.`subject`", Reply::Affected(1));
    conn.expect("INSERT INTO `lab`.`~log`", Reply::Affected(1));
    let one = subject.restrict(Restriction::key([("subject_id", Value::BigInt(1))]));
    assert_eq!(one.delete_quick().unwrap(), 1);
    assert_eq!(conn.remaining_expectations(), 0);
}

#[test]
fn describe_round_trips_through_the_catalog() {
    let conn = Arc::new(MockConnection::quiet());
    let registry = Arc::new(NameRegistry::new());
    registry.register("`lab`.`subject`", "Subject");
    registry.register("`lab`.`session`", "Session");
    let (_, session, _) = declare_chain(&conn, Some(registry));

    let text = session.describe().unwrap();
    assert!(text.contains("# recording sessions"));
    assert!(text.contains("-> Subject"));
    assert!(text.contains("session_id : bigint"));

    // The rebuilt definition compiles to the declared heading.
    let rebuilt = session.definition_from_schema().unwrap();
    let compiled = tabula::declare(
        &TableId::new("lab", "session_copy").unwrap(),
        &rebuilt,
        &conn.catalog(),
    )
    .unwrap();
    assert_eq!(
        compiled.heading,
        conn.catalog().heading("`lab`.`session`").unwrap()
    );
}

#[test]
fn update_checks_downstream_populated_tables() {
    let conn = Arc::new(MockConnection::quiet());
    let conn_dyn = conn.clone() as Arc<dyn Connection>;

    conn.expect("CREATE TABLE", Reply::Affected(0));
    let subject = Table::bound(
        conn_dyn.clone(),
        TableId::new("lab", "subject").unwrap(),
        TableDefinition::new("subjects")
            .key(Attribute::new("subject_id", SqlType::BigInt))
            .attribute(Attribute::new("weight", SqlType::Double).nullable(true)),
        None,
    );
    subject.declare().unwrap();

    conn.expect("CREATE TABLE", Reply::Affected(0));
    let stats = Table::bound(
        conn_dyn,
        TableId::new("lab", "subject_stats").unwrap(),
        TableDefinition::new("derived statistics")
            .auto_populated(true)
            .foreign_key(ForeignKeyDef::new(subject.id().clone()).in_key(true)),
        None,
    );
    stats.declare().unwrap();

    // Direct inserts into the populated table are refused.
    assert!(stats
        .insert1(RowMap::new().with("subject_id", 1i64), &InsertOptions::new())
        .is_err());

    // And updating a subject with computed stats is blocked.
    let one = subject.restrict(Restriction::key([("subject_id", Value::BigInt(1))]));
    conn.expect("SELECT count(*) FROM `lab`.`subject`", Reply::count(1));
    conn.expect("SELECT count(*) FROM `lab`.`subject_stats`", Reply::count(1));
    let err = one
        .save_update(
            "weight",
            Value::Double(19.5),
            false,
            tabula::OnPopulated::Raise,
        )
        .unwrap_err();
    assert!(err.to_string().contains("subject_stats"));
}
