//! The row placeholder builder.
//!
//! One shared encoder turns caller-supplied attribute values into SQL
//! placeholders and bound parameters. `insert`, `update1` and
//! `save_updates` all go through here, so value handling cannot diverge
//! between them.

use std::path::Path;
use std::sync::Arc;

use tabula_core::{
    Attribute, AttributeKind, Connection, Error, Heading, Result, Value, blob, quote_ident,
};

use crate::insert::RowInput;

/// How one attribute appears in the VALUES/SET clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// A bound parameter
    Parameter,
    /// The DEFAULT keyword; no parameter is bound
    Default,
}

impl Placeholder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Placeholder::Parameter => "%s",
            Placeholder::Default => "DEFAULT",
        }
    }
}

/// One encoded attribute: name, placeholder, and the bound value when the
/// placeholder is a parameter.
#[derive(Debug, Clone)]
pub(crate) struct EncodedField {
    pub name: String,
    pub placeholder: Placeholder,
    pub value: Option<Value>,
}

/// One fully encoded row ready for SQL assembly. `names` and `placeholders`
/// are index-aligned; `values` holds a bound value exactly where the
/// placeholder is a parameter.
#[derive(Debug, Clone)]
pub(crate) struct RowToInsert {
    pub names: Vec<String>,
    pub placeholders: Vec<Placeholder>,
    pub values: Vec<Option<Value>>,
}

impl RowToInsert {
    /// `(%s,DEFAULT,%s,...)`
    pub fn placeholder_list(&self) -> String {
        let parts: Vec<&str> = self.placeholders.iter().map(|p| p.as_sql()).collect();
        format!("({})", parts.join(","))
    }

    pub fn bound_values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().flatten()
    }

    /// ``SET `a`=%s,`b`=DEFAULT``
    pub fn set_clause(&self) -> String {
        let parts: Vec<String> = self
            .names
            .iter()
            .zip(&self.placeholders)
            .map(|(name, ph)| format!("{}={}", quote_ident(name), ph.as_sql()))
            .collect();
        parts.join(",")
    }
}

/// Encode one attribute value. Returns `None` when the field is unknown and
/// `ignore_extra_fields` is set.
pub(crate) fn encode_field(
    conn: &Arc<dyn Connection>,
    database: &str,
    heading: &Heading,
    name: &str,
    value: Value,
    ignore_extra_fields: bool,
) -> Result<Option<EncodedField>> {
    let Some(attr) = heading.get(name) else {
        if ignore_extra_fields {
            return Ok(None);
        }
        return Err(Error::unknown_attribute(name));
    };

    let value = match &attr.adapter {
        Some(adapter) => adapter.put(value)?,
        None => value,
    };

    // Null, explicit DEFAULT, NaN and empty strings for numeric attributes
    // all defer to the column default.
    let empty_numeric = attr.is_numeric() && (value.is_nan() || value.as_str() == Some(""));
    if value.is_null() || value.is_default() || empty_numeric {
        return Ok(Some(EncodedField {
            name: name.to_string(),
            placeholder: Placeholder::Default,
            value: None,
        }));
    }

    let encoded = match attr.kind {
        AttributeKind::Plain => encode_plain(attr, value)?,
        AttributeKind::Uuid => encode_uuid(attr, value)?,
        AttributeKind::Blob => encode_blob(conn, database, attr, &value)?,
        AttributeKind::Attachment => encode_attachment(conn, database, attr, &value)?,
        AttributeKind::Filepath => encode_filepath(conn, database, attr, &value)?,
    };

    Ok(Some(EncodedField {
        name: name.to_string(),
        placeholder: Placeholder::Parameter,
        value: Some(encoded),
    }))
}

fn encode_plain(attr: &Attribute, value: Value) -> Result<Value> {
    if !attr.is_numeric() {
        return Ok(value);
    }
    match value {
        Value::Bool(b) => Ok(Value::BigInt(i64::from(b))),
        Value::Text(s) => {
            if let Ok(n) = s.parse::<i64>() {
                Ok(Value::BigInt(n))
            } else if let Ok(x) = s.parse::<f64>() {
                Ok(Value::Double(x))
            } else {
                Err(Error::invalid(format!(
                    "cannot convert '{s}' to a number for attribute `{}`",
                    attr.name
                )))
            }
        }
        other => Ok(other),
    }
}

fn encode_uuid(attr: &Attribute, value: Value) -> Result<Value> {
    match value {
        Value::Uuid(bytes) => Ok(Value::Bytes(bytes.to_vec())),
        Value::Bytes(bytes) if bytes.len() == 16 => Ok(Value::Bytes(bytes)),
        Value::Text(s) => {
            let parsed = uuid_from_str(&s).ok_or_else(|| {
                Error::invalid(format!("malformed UUID '{s}' for attribute `{}`", attr.name))
            })?;
            Ok(Value::Bytes(parsed.to_vec()))
        }
        other => Err(Error::invalid(format!(
            "attribute `{}` requires a UUID, got {}",
            attr.name,
            other.type_name()
        ))),
    }
}

fn uuid_from_str(s: &str) -> Option<[u8; 16]> {
    uuid::Uuid::parse_str(s).ok().map(|u| *u.as_bytes())
}

fn encode_blob(
    conn: &Arc<dyn Connection>,
    database: &str,
    attr: &Attribute,
    value: &Value,
) -> Result<Value> {
    let packed = blob::pack(value)?;
    match &attr.store {
        Some(store) => {
            let reference = conn.external_store(database, store)?.put(&packed)?;
            Ok(reference.into_value())
        }
        None => Ok(Value::Bytes(packed)),
    }
}

fn encode_attachment(
    conn: &Arc<dyn Connection>,
    database: &str,
    attr: &Attribute,
    value: &Value,
) -> Result<Value> {
    let Some(path) = value.as_str() else {
        return Err(Error::invalid(format!(
            "attachment attribute `{}` requires a file path",
            attr.name
        )));
    };
    let path = Path::new(path);
    match &attr.store {
        Some(store) => {
            let reference = conn
                .external_store(database, store)?
                .upload_attachment(path)?;
            Ok(reference.into_value())
        }
        None => {
            // Inline attachments carry the file name and contents together,
            // separated by a NUL.
            let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
                Error::invalid(format!(
                    "attachment path has no file name: {}",
                    path.display()
                ))
            })?;
            let contents = std::fs::read(path)?;
            let mut buffer = name.as_bytes().to_vec();
            buffer.push(0);
            buffer.extend_from_slice(&contents);
            Ok(Value::Bytes(buffer))
        }
    }
}

fn encode_filepath(
    conn: &Arc<dyn Connection>,
    database: &str,
    attr: &Attribute,
    value: &Value,
) -> Result<Value> {
    let Some(path) = value.as_str() else {
        return Err(Error::invalid(format!(
            "filepath attribute `{}` requires a file path",
            attr.name
        )));
    };
    let Some(store) = &attr.store else {
        return Err(Error::invalid(format!(
            "filepath attribute `{}` requires a configured store",
            attr.name
        )));
    };
    let reference = conn
        .external_store(database, store)?
        .upload_filepath(Path::new(path))?;
    Ok(reference.into_value())
}

/// Encode one row, enforcing the shared field set across a batch.
///
/// The first row fixes `field_list`; later rows must supply the same fields
/// (any order) and are reordered to match.
pub(crate) fn build_row(
    conn: &Arc<dyn Connection>,
    database: &str,
    heading: &Heading,
    row: &RowInput,
    field_list: &mut Vec<String>,
    ignore_extra_fields: bool,
) -> Result<RowToInsert> {
    let pairs: Vec<(String, Value)> = match row {
        RowInput::Map(map) => map.iter().map(|(n, v)| (n.clone(), v.clone())).collect(),
        RowInput::Sequence(values) => {
            if values.len() != heading.len() {
                return Err(Error::invalid(format!(
                    "sequence row has {} values but the heading has {} attributes",
                    values.len(),
                    heading.len()
                )));
            }
            heading
                .names()
                .into_iter()
                .map(str::to_string)
                .zip(values.iter().cloned())
                .collect()
        }
    };

    let mut encoded: Vec<EncodedField> = Vec::with_capacity(pairs.len());
    for (name, value) in pairs {
        if let Some(field) =
            encode_field(conn, database, heading, &name, value, ignore_extra_fields)?
        {
            if encoded.iter().any(|f| f.name == field.name) {
                return Err(Error::invalid(format!("duplicate attribute `{}` in row", field.name)));
            }
            encoded.push(field);
        }
    }
    if encoded.is_empty() {
        return Err(Error::invalid("row has no attributes to insert"));
    }

    if field_list.is_empty() {
        field_list.extend(encoded.iter().map(|f| f.name.clone()));
    } else {
        let mut expected: Vec<&str> = field_list.iter().map(String::as_str).collect();
        let mut actual: Vec<&str> = encoded.iter().map(|f| f.name.as_str()).collect();
        expected.sort_unstable();
        actual.sort_unstable();
        if expected != actual {
            return Err(Error::invalid(
                "attempt to insert rows with different field sets in one batch",
            ));
        }
    }

    // Reorder to the batch field order.
    let mut names = Vec::with_capacity(field_list.len());
    let mut placeholders = Vec::with_capacity(field_list.len());
    let mut values = Vec::with_capacity(field_list.len());
    for name in field_list.iter() {
        if let Some(field) = encoded.iter().find(|f| &f.name == name) {
            names.push(field.name.clone());
            placeholders.push(field.placeholder);
            values.push(field.value.clone());
        }
    }

    Ok(RowToInsert {
        names,
        placeholders,
        values,
    })
}
