//! The synchronous database connection trait and its settings.

use std::io::Write as _;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::external::ExternalStore;
use crate::graph::DependencyGraph;
use crate::row::Row;
use crate::value::Value;

/// How destructive operations ask for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmMode {
    /// Prompt on stdin and require a literal "yes"
    #[default]
    Interactive,
    /// Answer every prompt with yes
    AcceptAll,
    /// Answer every prompt with no
    DenyAll,
}

/// Per-connection behavior switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Require confirmation before committing deletes and drops
    pub safemode: bool,
    pub confirm: ConfirmMode,
    /// Write audit log entries for schema and delete operations
    pub audit_log: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            safemode: true,
            confirm: ConfirmMode::Interactive,
            audit_log: true,
        }
    }
}

impl Settings {
    pub fn safemode(mut self, safemode: bool) -> Self {
        self.safemode = safemode;
        self
    }

    pub fn confirm(mut self, confirm: ConfirmMode) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn audit_log(mut self, audit_log: bool) -> Self {
        self.audit_log = audit_log;
        self
    }

    /// Resolve a yes/no prompt under the configured confirmation mode.
    pub fn confirmed(&self, prompt: &str) -> bool {
        match self.confirm {
            ConfirmMode::AcceptAll => true,
            ConfirmMode::DenyAll => false,
            ConfirmMode::Interactive => {
                print!("{prompt} [yes, No]: ");
                if std::io::stdout().flush().is_err() {
                    return false;
                }
                let mut answer = String::new();
                if std::io::stdin().read_line(&mut answer).is_err() {
                    return false;
                }
                answer.trim().eq_ignore_ascii_case("yes")
            }
        }
    }
}

/// A synchronous database connection.
///
/// The trait is object-safe; tables hold an `Arc<dyn Connection>`. The
/// connection owns the schema catalog, the dependency graph cache and any
/// configured external stores.
pub trait Connection: Send + Sync {
    /// Run a statement that returns rows. `args` bind `%s` placeholders in
    /// order.
    fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, args: &[Value]) -> Result<u64>;

    fn in_transaction(&self) -> bool;

    fn start_transaction(&self) -> Result<()>;

    fn commit_transaction(&self) -> Result<()>;

    fn cancel_transaction(&self) -> Result<()>;

    /// The connection-owned dependency graph cache.
    fn dependencies(&self) -> Arc<DependencyGraph>;

    /// The connection-owned registry of declared tables.
    fn catalog(&self) -> Arc<Catalog>;

    /// Resolve a configured external store for `database`.
    fn external_store(&self, database: &str, store: &str) -> Result<Arc<dyn ExternalStore>>;

    /// The authenticated user, as `user@host`.
    fn user_name(&self) -> String;

    fn settings(&self) -> Settings;
}
