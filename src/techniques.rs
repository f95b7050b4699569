//! MITRE list-column normalization and explosion

use serde_json::Value;

use crate::error_handling::{ReportError, ReportResult};
use crate::row::{Column, EnrichedRow};

/// One exploded observation: a source row and one of its list values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exploded<'a> {
    pub row: &'a EnrichedRow,
    /// `None` when the list element was null or not a scalar
    pub value: Option<&'a Value>,
}

impl<'a> Exploded<'a> {
    /// Text of the value, or `None` for null, empty or container values
    pub fn text(&self) -> Option<String> {
        match self.value? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Normalize a raw list-column value to a list.
///
/// null → empty, string → singleton, list → unchanged, anything else → empty.
pub fn normalize(raw: Option<&Value>) -> &[Value] {
    match raw {
        Some(Value::Array(items)) => items.as_slice(),
        Some(value @ Value::String(_)) => std::slice::from_ref(value),
        _ => &[],
    }
}

/// Explode a list column: n-element lists give n observations, empty lists none
pub fn explode<'a, I>(rows: I, column: Column) -> ReportResult<Vec<Exploded<'a>>>
where
    I: IntoIterator<Item = &'a EnrichedRow>,
{
    if !column.is_list() {
        return Err(ReportError::configuration(format!(
            "{} is not a list column",
            column
        )));
    }
    Ok(rows
        .into_iter()
        .flat_map(|row| {
            normalize(row.row.raw_list(column))
                .iter()
                .map(move |value| Exploded {
                    row,
                    value: Some(value).filter(|v| !v.is_null()),
                })
        })
        .collect())
}

/// Exploded values with null and empty entries filtered out, in row order
pub fn exploded_values<'a, I>(rows: I, column: Column) -> ReportResult<Vec<String>>
where
    I: IntoIterator<Item = &'a EnrichedRow>,
{
    Ok(explode(rows, column)?
        .iter()
        .filter_map(Exploded::text)
        .collect())
}
