//! Scripted in-memory connection for tests.
//!
//! The mock replays a script of expected statements: each expectation names
//! a fragment the statement must contain and the reply to produce. Every
//! statement and transaction event is recorded for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::catalog::Catalog;
use crate::connection::{ConfirmMode, Connection, Settings};
use crate::error::{Error, Result};
use crate::external::{ExternalStore, MemoryStore};
use crate::graph::DependencyGraph;
use crate::relock;
use crate::row::Row;
use crate::value::Value;

/// The scripted reply to one expected statement.
#[derive(Debug)]
pub enum Reply {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(Error),
}

impl Reply {
    /// A one-row `count(*)` result.
    pub fn count(n: i64) -> Reply {
        Reply::Rows(vec![Row::from_pairs(vec![("count(*)", Value::BigInt(n))])])
    }
}

#[derive(Debug)]
struct Expectation {
    fragment: String,
    reply: Reply,
}

/// Transaction events in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    Start,
    Commit,
    Cancel,
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<Expectation>,
    executed: Vec<String>,
    transactions: Vec<TxEvent>,
    in_transaction: bool,
}

/// A scripted connection double with a real catalog and dependency graph.
pub struct MockConnection {
    catalog: Arc<Catalog>,
    graph: Arc<DependencyGraph>,
    state: Mutex<MockState>,
    stores: Mutex<HashMap<(String, String), Arc<MemoryStore>>>,
    settings: Settings,
    user: String,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(Catalog::new()),
            graph: Arc::new(DependencyGraph::new()),
            state: Mutex::new(MockState::default()),
            stores: Mutex::new(HashMap::new()),
            settings: Settings::default(),
            user: "mock@localhost".to_string(),
        }
    }

    /// A mock with prompts auto-accepted and audit logging off, for tests
    /// that exercise data paths rather than confirmation flow.
    pub fn quiet() -> Self {
        Self::new().with_settings(
            Settings::default()
                .safemode(false)
                .confirm(ConfirmMode::AcceptAll)
                .audit_log(false),
        )
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Append one expectation to the script.
    pub fn expect(&self, fragment: impl Into<String>, reply: Reply) {
        relock(&self.state).script.push_back(Expectation {
            fragment: fragment.into(),
            reply,
        });
    }

    /// Every statement run so far, in order.
    pub fn executed(&self) -> Vec<String> {
        relock(&self.state).executed.clone()
    }

    pub fn transactions(&self) -> Vec<TxEvent> {
        relock(&self.state).transactions.clone()
    }

    pub fn remaining_expectations(&self) -> usize {
        relock(&self.state).script.len()
    }

    /// The typed in-memory store for assertions on offloaded contents.
    pub fn memory_store(&self, database: &str, store: &str) -> Arc<MemoryStore> {
        relock(&self.stores)
            .entry((database.to_string(), store.to_string()))
            .or_default()
            .clone()
    }

    fn next_reply(&self, sql: &str) -> Result<Reply> {
        let mut state = relock(&self.state);
        state.executed.push(sql.to_string());
        let Some(expectation) = state.script.pop_front() else {
            return Err(Error::invalid(format!("unexpected statement: {sql}")));
        };
        if !sql.contains(&expectation.fragment) {
            return Err(Error::invalid(format!(
                "statement `{sql}` does not match expected fragment `{}`",
                expectation.fragment
            )));
        }
        Ok(expectation.reply)
    }
}

impl Connection for MockConnection {
    fn query(&self, sql: &str, _args: &[Value]) -> Result<Vec<Row>> {
        match self.next_reply(sql)? {
            Reply::Rows(rows) => Ok(rows),
            Reply::Affected(_) => Ok(Vec::new()),
            Reply::Fail(err) => Err(err),
        }
    }

    fn execute(&self, sql: &str, _args: &[Value]) -> Result<u64> {
        match self.next_reply(sql)? {
            Reply::Affected(n) => Ok(n),
            Reply::Rows(_) => Ok(0),
            Reply::Fail(err) => Err(err),
        }
    }

    fn in_transaction(&self) -> bool {
        relock(&self.state).in_transaction
    }

    fn start_transaction(&self) -> Result<()> {
        let mut state = relock(&self.state);
        if state.in_transaction {
            return Err(Error::Transaction("transaction already open".to_string()));
        }
        state.in_transaction = true;
        state.transactions.push(TxEvent::Start);
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        let mut state = relock(&self.state);
        if !state.in_transaction {
            return Err(Error::Transaction("no open transaction".to_string()));
        }
        state.in_transaction = false;
        state.transactions.push(TxEvent::Commit);
        Ok(())
    }

    fn cancel_transaction(&self) -> Result<()> {
        let mut state = relock(&self.state);
        if !state.in_transaction {
            return Err(Error::Transaction("no open transaction".to_string()));
        }
        state.in_transaction = false;
        state.transactions.push(TxEvent::Cancel);
        Ok(())
    }

    fn dependencies(&self) -> Arc<DependencyGraph> {
        self.graph.clone()
    }

    fn catalog(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }

    fn external_store(&self, database: &str, store: &str) -> Result<Arc<dyn ExternalStore>> {
        Ok(self.memory_store(database, store))
    }

    fn user_name(&self) -> String {
        self.user.clone()
    }

    fn settings(&self) -> Settings {
        self.settings
    }
}
