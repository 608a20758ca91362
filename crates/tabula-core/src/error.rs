//! Error types for Tabula operations.

use std::fmt;

/// The primary error type for all Tabula operations.
#[derive(Debug)]
pub enum Error {
    /// Contract violations: bad definitions, malformed rows, misuse of an API
    Invalid(String),
    /// Query execution errors reported by the database
    Query(QueryError),
    /// Referential integrity violations (foreign key constraints)
    Integrity(QueryError),
    /// Duplicate entry for a unique key
    Duplicate(SuggestedError),
    /// A row names an attribute the heading does not have
    UnknownAttribute(SuggestedError),
    /// Insufficient privileges for a DDL statement
    Access(QueryError),
    /// Transaction state errors
    Transaction(String),
    /// External store failures
    Store(String),
    /// Serialization/deserialization errors
    Serde(String),
    /// I/O errors
    Io(std::io::Error),
}

/// A database error with its originating statement and SQLSTATE, when known.
#[derive(Debug)]
pub struct QueryError {
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sql: None,
            sqlstate: None,
            message: message.into(),
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

/// An error that may carry an actionable suggestion for the caller.
#[derive(Debug)]
pub struct SuggestedError {
    pub message: String,
    pub suggestion: Option<String>,
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid(message.into())
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Error::Duplicate(SuggestedError {
            message: message.into(),
            suggestion: None,
        })
    }

    pub fn unknown_attribute(name: &str) -> Self {
        Error::UnknownAttribute(SuggestedError {
            message: format!("unknown attribute `{name}`"),
            suggestion: None,
        })
    }

    /// Attach an actionable hint to a `Duplicate` or `UnknownAttribute` error.
    /// Other variants pass through unchanged.
    pub fn suggest(self, hint: &str) -> Self {
        match self {
            Error::Duplicate(mut e) => {
                e.suggestion = Some(hint.to_string());
                Error::Duplicate(e)
            }
            Error::UnknownAttribute(mut e) => {
                e.suggestion = Some(hint.to_string());
                Error::UnknownAttribute(e)
            }
            other => other,
        }
    }

    /// Is this a referential integrity violation?
    pub fn is_integrity(&self) -> bool {
        matches!(self, Error::Integrity(_))
    }

    /// Is this a privilege error (swallowed around DDL)?
    pub fn is_access(&self) -> bool {
        matches!(self, Error::Access(_))
    }

    /// Is this a duplicate-key violation?
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate(_))
    }

    /// Get SQLSTATE if available (e.g., "23000" for integrity violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) | Error::Integrity(q) | Error::Access(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) | Error::Integrity(q) | Error::Access(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Invalid(msg) => write!(f, "Invalid operation: {}", msg),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Integrity(e) => write!(f, "Integrity error: {}", e),
            Error::Duplicate(e) => write!(f, "Duplicate entry: {}", e),
            Error::UnknownAttribute(e) => write!(f, "{}", e),
            Error::Access(e) => write!(f, "Access denied: {}", e),
            Error::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            Error::Store(msg) => write!(f, "Store error: {}", msg),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for SuggestedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suggestion {
            Some(hint) => write!(f, "{}. {}", self.message, hint),
            None => write!(f, "{}", self.message),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

/// Result type alias for Tabula operations.
pub type Result<T> = std::result::Result<T, Error>;
