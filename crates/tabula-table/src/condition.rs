//! Restrictions and the WHERE clause compiler.

use tabula_core::{Error, Heading, Result, Value, quote_ident};

/// A composable restriction on a table's rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Restriction {
    /// No restriction
    #[default]
    All,
    /// A raw SQL condition fragment
    Condition(String),
    /// Attribute equality, `IS NULL` for null values
    Equal(Vec<(String, Value)>),
    /// Membership in a subquery's projection
    In {
        attributes: Vec<String>,
        select: String,
    },
    /// Conjunction
    And(Vec<Restriction>),
}

impl Restriction {
    pub fn key<I, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        Restriction::Equal(pairs.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Restriction::All)
    }

    /// Conjoin with another restriction, absorbing `All` and flattening
    /// nested conjunctions.
    pub fn and(self, other: Restriction) -> Restriction {
        match (self, other) {
            (Restriction::All, r) | (r, Restriction::All) => r,
            (Restriction::And(mut left), Restriction::And(right)) => {
                left.extend(right);
                Restriction::And(left)
            }
            (Restriction::And(mut left), r) => {
                left.push(r);
                Restriction::And(left)
            }
            (l, Restriction::And(mut right)) => {
                right.insert(0, l);
                Restriction::And(right)
            }
            (l, r) => Restriction::And(vec![l, r]),
        }
    }

    /// The attribute names this restriction constrains, where determinable.
    /// Raw conditions return `None`: their attributes cannot be known
    /// without parsing SQL.
    pub fn attributes(&self) -> Option<Vec<String>> {
        match self {
            Restriction::All => Some(Vec::new()),
            Restriction::Condition(_) => None,
            Restriction::Equal(pairs) => Some(pairs.iter().map(|(n, _)| n.clone()).collect()),
            Restriction::In { attributes, .. } => Some(attributes.clone()),
            Restriction::And(parts) => {
                let mut names = Vec::new();
                for part in parts {
                    names.extend(part.attributes()?);
                }
                Some(names)
            }
        }
    }
}

/// Render a restriction into a WHERE condition. `None` means unrestricted.
/// Attribute names are validated against the heading.
pub fn make_condition(heading: &Heading, restriction: &Restriction) -> Result<Option<String>> {
    match restriction {
        Restriction::All => Ok(None),
        Restriction::Condition(sql) => Ok(Some(sql.clone())),
        Restriction::Equal(pairs) => {
            if pairs.is_empty() {
                return Ok(None);
            }
            let mut terms = Vec::with_capacity(pairs.len());
            for (name, value) in pairs {
                if !heading.contains(name) {
                    return Err(Error::unknown_attribute(name));
                }
                if value.is_null() {
                    terms.push(format!("{} IS NULL", quote_ident(name)));
                } else {
                    terms.push(format!("{}={}", quote_ident(name), value.to_sql_literal()));
                }
            }
            Ok(Some(terms.join(" AND ")))
        }
        Restriction::In { attributes, select } => {
            for name in attributes {
                if !heading.contains(name) {
                    return Err(Error::unknown_attribute(name));
                }
            }
            let quoted: Vec<String> = attributes.iter().map(|a| quote_ident(a)).collect();
            let lhs = if quoted.len() == 1 {
                quoted[0].clone()
            } else {
                format!("({})", quoted.join(","))
            };
            Ok(Some(format!("{lhs} IN ({select})")))
        }
        Restriction::And(parts) => {
            let mut rendered = Vec::new();
            for part in parts {
                if let Some(cond) = make_condition(heading, part)? {
                    rendered.push(cond);
                }
            }
            match rendered.len() {
                0 => Ok(None),
                1 => Ok(Some(rendered.remove(0))),
                _ => Ok(Some(
                    rendered
                        .iter()
                        .map(|c| format!("({c})"))
                        .collect::<Vec<_>>()
                        .join(" AND "),
                )),
            }
        }
    }
}

/// Render the full ` WHERE ...` suffix, empty when unrestricted.
pub fn where_clause(heading: &Heading, restriction: &Restriction) -> Result<String> {
    Ok(match make_condition(heading, restriction)? {
        Some(condition) => format!(" WHERE {condition}"),
        None => String::new(),
    })
}
