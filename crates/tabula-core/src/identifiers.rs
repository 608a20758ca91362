//! Identifier validation and quoting, plus validated table identity.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Leading `~` and `#` are reserved for internal and computed tables.
    RE.get_or_init(|| Regex::new(r"^[~#]?[a-zA-Z_][a-zA-Z0-9_]*$").unwrap())
}

/// Check a database, table or attribute name against the identifier grammar.
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= 64 && name_pattern().is_match(name)
}

/// Quote an identifier with MySQL backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{name}`")
}

/// A fully qualified table identity: database plus table name, both validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    database: String,
    name: String,
}

impl TableId {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let database = database.into();
        let name = name.into();
        if !is_valid_name(&database) {
            return Err(Error::invalid(format!("invalid database name `{database}`")));
        }
        if !is_valid_name(&name) {
            return Err(Error::invalid(format!("invalid table name `{name}`")));
        }
        Ok(Self { database, name })
    }

    /// Parse a quoted fully qualified name of the form `` `db`.`table` ``.
    pub fn from_full_name(full: &str) -> Result<Self> {
        let parts: Vec<&str> = full.split("`.`").collect();
        if parts.len() == 2 {
            let database = parts[0].strip_prefix('`');
            let name = parts[1].strip_suffix('`');
            if let (Some(database), Some(name)) = (database, name) {
                return Self::new(database, name);
            }
        }
        Err(Error::invalid(format!(
            "malformed full table name `{full}`, expected `db`.`table`"
        )))
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backtick-quoted fully qualified name used in SQL.
    pub fn full_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.database), quote_ident(&self.name))
    }

    /// The identity of a part table of this master, named `master__part`.
    pub fn part(&self, part_name: &str) -> Result<TableId> {
        TableId::new(&self.database, format!("{}__{part_name}", self.name))
    }

    /// If this table is a part of `master`, the part name after the
    /// `master__` prefix.
    pub fn part_suffix_of<'a>(&'a self, master: &TableId) -> Option<&'a str> {
        if self.database != master.database {
            return None;
        }
        self.name
            .strip_prefix(master.name())
            .and_then(|rest| rest.strip_prefix("__"))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
