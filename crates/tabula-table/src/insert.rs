//! Row inputs and the insert family.

use tabula_core::{Error, Result, Value, quote_ident};

use crate::placeholder::{RowToInsert, build_row};
use crate::table::Table;

/// An ordered attribute-name-to-value mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowMap(Vec<(String, Value)>);

impl RowMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for RowMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One row of input: named attributes or a full positional sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RowInput {
    Map(RowMap),
    Sequence(Vec<Value>),
}

impl From<RowMap> for RowInput {
    fn from(map: RowMap) -> Self {
        RowInput::Map(map)
    }
}

impl From<Vec<Value>> for RowInput {
    fn from(values: Vec<Value>) -> Self {
        RowInput::Sequence(values)
    }
}

/// A SELECT statement used as an insert source.
///
/// The select list is carried per field so that individual fields can be
/// dropped when the target heading does not have them.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySource {
    /// Names of the selected fields, in select-list order.
    pub fields: Vec<String>,
    /// Select-list fragments, aligned with `fields`.
    pub expressions: Vec<String>,
    /// The remainder of the query, starting at FROM.
    pub tail: String,
}

/// What to insert: literal rows or a query.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Rows(Vec<RowInput>),
    Query(QuerySource),
}

impl From<Vec<RowInput>> for InsertSource {
    fn from(rows: Vec<RowInput>) -> Self {
        InsertSource::Rows(rows)
    }
}

impl From<RowInput> for InsertSource {
    fn from(row: RowInput) -> Self {
        InsertSource::Rows(vec![row])
    }
}

impl From<RowMap> for InsertSource {
    fn from(map: RowMap) -> Self {
        InsertSource::Rows(vec![RowInput::Map(map)])
    }
}

impl From<QuerySource> for InsertSource {
    fn from(query: QuerySource) -> Self {
        InsertSource::Query(query)
    }
}

/// Behavior switches for the insert family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOptions {
    /// Use REPLACE instead of INSERT
    pub replace: bool,
    /// Silently skip duplicate primary keys
    pub skip_duplicates: bool,
    /// Drop fields the heading does not have instead of failing
    pub ignore_extra_fields: bool,
    /// Permit direct inserts into an auto-populated table
    pub allow_direct_insert: bool,
}

impl InsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn skip_duplicates(mut self, skip_duplicates: bool) -> Self {
        self.skip_duplicates = skip_duplicates;
        self
    }

    pub fn ignore_extra_fields(mut self, ignore_extra_fields: bool) -> Self {
        self.ignore_extra_fields = ignore_extra_fields;
        self
    }

    pub fn allow_direct_insert(mut self, allow_direct_insert: bool) -> Self {
        self.allow_direct_insert = allow_direct_insert;
        self
    }
}

impl Table {
    /// Insert rows or the result of a query. Returns the number of rows
    /// inserted.
    ///
    /// All rows are encoded before any SQL runs: a bad row anywhere in the
    /// batch fails the whole insert without touching the database.
    pub fn insert(&self, source: impl Into<InsertSource>, options: &InsertOptions) -> Result<u64> {
        let heading = self.heading()?;
        if heading.auto_populated && !options.allow_direct_insert && !self.in_populate {
            return Err(Error::invalid(format!(
                "{} is auto-populated; direct inserts are only allowed from its populate \
                 routine or with allow_direct_insert",
                self.full_table_name()
            )));
        }

        match source.into() {
            InsertSource::Query(query) => self.insert_from_query(&heading, &query, options),
            InsertSource::Rows(rows) => {
                if rows.is_empty() {
                    return Ok(0);
                }
                let mut field_list: Vec<String> = Vec::new();
                let mut encoded: Vec<RowToInsert> = Vec::with_capacity(rows.len());
                for row in &rows {
                    encoded.push(build_row(
                        &self.conn,
                        self.database(),
                        &heading,
                        row,
                        &mut field_list,
                        options.ignore_extra_fields,
                    )?);
                }

                let columns: Vec<String> = field_list.iter().map(|f| quote_ident(f)).collect();
                let tuples: Vec<String> =
                    encoded.iter().map(RowToInsert::placeholder_list).collect();
                let sql = format!(
                    "{} INTO {}({}) VALUES {}{}",
                    if options.replace { "REPLACE" } else { "INSERT" },
                    self.full_table_name(),
                    columns.join(","),
                    tuples.join(","),
                    self.on_duplicate_suffix(&heading, options, false)?,
                );
                let args: Vec<Value> = encoded
                    .iter()
                    .flat_map(RowToInsert::bound_values)
                    .cloned()
                    .collect();

                self.conn.execute(&sql, &args).map_err(enrich)
            }
        }
    }

    /// Insert a single row.
    pub fn insert1(&self, row: impl Into<RowInput>, options: &InsertOptions) -> Result<u64> {
        self.insert(InsertSource::Rows(vec![row.into()]), options)
    }

    fn insert_from_query(
        &self,
        heading: &tabula_core::Heading,
        query: &QuerySource,
        options: &InsertOptions,
    ) -> Result<u64> {
        if query.fields.len() != query.expressions.len() {
            return Err(Error::invalid(format!(
                "query source has {} fields but {} select expressions",
                query.fields.len(),
                query.expressions.len()
            )));
        }
        let mut columns: Vec<String> = Vec::with_capacity(query.fields.len());
        let mut select: Vec<String> = Vec::with_capacity(query.fields.len());
        for (field, expression) in query.fields.iter().zip(&query.expressions) {
            if heading.contains(field) {
                columns.push(quote_ident(field));
                select.push(expression.clone());
            } else if !options.ignore_extra_fields {
                return Err(Error::unknown_attribute(field));
            }
        }
        if columns.is_empty() {
            return Err(Error::invalid(
                "query source selects no fields of the target heading",
            ));
        }
        let sql = format!(
            "{} INTO {}({}) SELECT {} {}{}",
            if options.replace { "REPLACE" } else { "INSERT" },
            self.full_table_name(),
            columns.join(","),
            select.join(","),
            query.tail,
            self.on_duplicate_suffix(heading, options, true)?,
        );
        self.conn.execute(&sql, &[]).map_err(enrich)
    }

    fn on_duplicate_suffix(
        &self,
        heading: &tabula_core::Heading,
        options: &InsertOptions,
        qualify: bool,
    ) -> Result<String> {
        if !options.skip_duplicates || options.replace {
            return Ok(String::new());
        }
        let Some(first_key) = heading.primary_key().first().copied() else {
            return Err(Error::invalid(format!(
                "skip_duplicates requires a primary key on {}",
                self.full_table_name()
            )));
        };
        let quoted = quote_ident(first_key);
        Ok(if qualify {
            format!(
                " ON DUPLICATE KEY UPDATE {quoted}={}.{quoted}",
                self.full_table_name()
            )
        } else {
            format!(" ON DUPLICATE KEY UPDATE {quoted}={quoted}")
        })
    }
}

/// Attach actionable hints to errors the caller can fix with an option.
fn enrich(err: Error) -> Error {
    match &err {
        Error::Duplicate(_) => {
            err.suggest("To ignore duplicate entries, set skip_duplicates=true.")
        }
        Error::UnknownAttribute(_) => {
            err.suggest("To ignore extra fields, set ignore_extra_fields=true.")
        }
        _ => err,
    }
}
