//! Frequency aggregation over categorical columns
//!
//! Counts are grouped by exact string equality and ranked by count
//! descending. Equal counts keep first-seen order, so the same input always
//! yields the same ranking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error_handling::{ReportError, ReportResult};
use crate::row::{Column, EnrichedRow};

/// Default number of categories kept in a chart
pub const DEFAULT_TOP_N: usize = 15;

/// One ranked category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Ranked categories, possibly truncated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub column: String,
    pub entries: Vec<CategoryCount>,
    /// Observations counted before truncation
    pub total_observations: u64,
    /// Distinct categories before truncation
    pub distinct_categories: usize,
}

impl AggregateResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keep the `n` highest-ranked entries
    pub fn top(mut self, n: usize) -> Self {
        self.entries.truncate(n);
        self
    }

    pub fn max_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count).max().unwrap_or(0)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.category.as_str())
    }
}

impl fmt::Display for AggregateResult {
    /// Two-column listing, widest category first column
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .entries
            .iter()
            .map(|e| e.category.chars().count())
            .max()
            .unwrap_or(0)
            .max(self.column.chars().count());
        writeln!(f, "{:<width$}  count", self.column, width = width)?;
        for entry in &self.entries {
            writeln!(f, "{:<width$}  {}", entry.category, entry.count, width = width)?;
        }
        Ok(())
    }
}

/// Count every non-null value, ranked, without truncation.
///
/// Returns `EmptyAggregate` when nothing was counted.
pub fn value_counts<I, S>(column: &str, values: I) -> ReportResult<AggregateResult>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<CategoryCount> = Vec::new();
    let mut total = 0u64;

    for value in values.into_iter().flatten() {
        let value = value.as_ref();
        total += 1;
        match index.get(value) {
            Some(&position) => entries[position].count += 1,
            None => {
                index.insert(value.to_string(), entries.len());
                entries.push(CategoryCount {
                    category: value.to_string(),
                    count: 1,
                });
            }
        }
    }

    if entries.is_empty() {
        return Err(ReportError::empty_aggregate(column));
    }

    // stable: equal counts stay in first-seen order
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    let distinct_categories = entries.len();
    Ok(AggregateResult {
        column: column.to_string(),
        entries,
        total_observations: total,
        distinct_categories,
    })
}

/// Ranked counts truncated to `top_n`
pub fn aggregate<I, S>(column: &str, values: I, top_n: usize) -> ReportResult<AggregateResult>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    Ok(value_counts(column, values)?.top(top_n))
}

/// Ranked counts of a scalar column over enriched rows.
///
/// List columns must be exploded first and are rejected here.
pub fn aggregate_column<'a, I>(
    rows: I,
    column: Column,
    top_n: usize,
) -> ReportResult<AggregateResult>
where
    I: IntoIterator<Item = &'a EnrichedRow>,
{
    if column.is_list() {
        return Err(ReportError::list_column(column.name()));
    }
    aggregate(
        column.name(),
        rows.into_iter().map(|row| row.category(column)),
        top_n,
    )
}

/// Counts of an integer column ordered by key ascending
pub fn counts_by_key<I>(values: I) -> Vec<(i64, u64)>
where
    I: IntoIterator<Item = Option<i64>>,
{
    let mut counts = std::collections::BTreeMap::new();
    for value in values.into_iter().flatten() {
        *counts.entry(value).or_insert(0u64) += 1;
    }
    counts.into_iter().collect()
}
