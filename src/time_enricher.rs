//! Calendar bucketing of row timestamps
//!
//! Timestamps are bucketed by the wall-clock time they were written with.
//! An offset, when present, is kept but never converted.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::error_handling::{ReportError, ReportResult};
use crate::row::{Column, EnrichedRow, EnrichedRowSet, FlatRow, RowSet};

/// Default timestamp column
pub const DEFAULT_TIMESTAMP_COLUMN: Column = Column::Timestamp;

/// Column tried when the default is absent from the schema
pub const FALLBACK_TIMESTAMP_COLUMN: Column = Column::EventTime;

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Calendar buckets derived from one timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarBuckets {
    pub date: NaiveDate,
    pub day: String,
    pub month: String,
    pub iso_week: u32,
}

impl CalendarBuckets {
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        let date = datetime.date();
        Self {
            date,
            day: date.format("%Y-%m-%d").to_string(),
            month: date.format("%Y-%m").to_string(),
            iso_week: date.iso_week().week(),
        }
    }
}

/// Parse a timestamp to its local wall-clock time
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.naive_local());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Pick the timestamp column against the observed schema
pub fn resolve_timestamp_column(rows: &RowSet, requested: Option<Column>) -> ReportResult<Column> {
    let requested = requested.unwrap_or(DEFAULT_TIMESTAMP_COLUMN);
    if rows.has_column(requested) {
        return Ok(requested);
    }
    if rows.has_column(FALLBACK_TIMESTAMP_COLUMN) {
        debug!(
            "Column {} absent, falling back to {}",
            requested, FALLBACK_TIMESTAMP_COLUMN
        );
        return Ok(FALLBACK_TIMESTAMP_COLUMN);
    }
    Err(ReportError::schema_missing([
        requested.name(),
        FALLBACK_TIMESTAMP_COLUMN.name(),
    ]))
}

fn enrich_row(row: FlatRow, column: Column) -> EnrichedRow {
    let buckets = row
        .text(column)
        .as_deref()
        .and_then(parse_timestamp)
        .map(CalendarBuckets::from_datetime);
    match buckets {
        Some(b) => EnrichedRow {
            row,
            date: Some(b.date),
            day: Some(b.day),
            month: Some(b.month),
            iso_week: Some(b.iso_week),
        },
        None => EnrichedRow::bare(row),
    }
}

/// Append `date`, `day`, `month` and `iso_week` to every row.
///
/// Rows whose timestamp is missing or unparseable keep null buckets.
pub fn enrich(rows: RowSet, requested: Option<Column>) -> ReportResult<EnrichedRowSet> {
    if let Some(column) = requested {
        if column.is_list() || column.is_derived() {
            return Err(ReportError::configuration(format!(
                "{} cannot be used as a timestamp column",
                column
            )));
        }
    }
    let column = resolve_timestamp_column(&rows, requested)?;

    let RowSet { rows, mut columns } = rows;
    let enriched: Vec<EnrichedRow> = rows.into_iter().map(|row| enrich_row(row, column)).collect();

    let unparsed = enriched.iter().filter(|r| r.date.is_none()).count();
    if unparsed > 0 {
        info!("{} of {} rows have no usable {}", unparsed, enriched.len(), column);
    }

    columns.extend([Column::Date, Column::Day, Column::Month, Column::IsoWeek]);
    Ok(EnrichedRowSet {
        rows: enriched,
        columns,
        time_column: Some(column),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_set(rows: Vec<FlatRow>, columns: &[Column]) -> RowSet {
        RowSet {
            rows,
            columns: columns.iter().copied().collect(),
        }
    }

    fn stamped(ts: &str) -> FlatRow {
        FlatRow {
            timestamp: Some(ts.to_string()),
            ..FlatRow::new()
        }
    }

    #[test]
    fn test_parse_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 8, 15)
            .unwrap()
            .and_hms_milli_opt(10, 20, 30, 123)
            .unwrap();
        assert_eq!(parse_timestamp("2024-08-15T10:20:30.123Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-08-15T10:20:30.123+0000"), Some(expected));
        assert_eq!(parse_timestamp("2024-08-15 10:20:30.123"), Some(expected));
        assert!(parse_timestamp("2024-08-15").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_offset_is_not_converted() {
        let parsed = parse_timestamp("2024-08-31T23:30:00-03:00").unwrap();
        let buckets = CalendarBuckets::from_datetime(parsed);
        assert_eq!(buckets.day, "2024-08-31");
        assert_eq!(buckets.month, "2024-08");
    }

    #[test]
    fn test_iso_week_boundaries() {
        let week = |s: &str| CalendarBuckets::from_datetime(parse_timestamp(s).unwrap()).iso_week;
        assert_eq!(week("2024-12-30T00:00:00Z"), 1);
        assert_eq!(week("2021-01-03T00:00:00Z"), 53);
        assert_eq!(week("2024-08-15T00:00:00Z"), 33);
    }

    #[test]
    fn test_enrich_keeps_unparseable_rows() {
        let rows = row_set(
            vec![stamped("2024-09-02T08:00:00Z"), stamped("garbage"), FlatRow::new()],
            &[Column::Timestamp],
        );
        let enriched = enrich(rows, None).unwrap();
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched.time_column, Some(Column::Timestamp));
        assert_eq!(enriched.rows[0].month.as_deref(), Some("2024-09"));
        assert_eq!(enriched.rows[0].day.as_deref(), Some("2024-09-02"));
        assert_eq!(enriched.rows[0].iso_week, Some(36));
        assert!(enriched.rows[1].date.is_none());
        assert!(enriched.rows[2].month.is_none());
        assert!(enriched.has_column(Column::Month));
    }

    #[test]
    fn test_fallback_column() {
        let row = FlatRow {
            event_time: Some("2024-10-01T00:00:00.000+0000".to_string()),
            ..FlatRow::new()
        };
        let enriched = enrich(row_set(vec![row], &[Column::EventTime]), None).unwrap();
        assert_eq!(enriched.time_column, Some(Column::EventTime));
        assert_eq!(enriched.rows[0].month.as_deref(), Some("2024-10"));
    }

    #[test]
    fn test_schema_missing() {
        let err = enrich(row_set(vec![FlatRow::new()], &[Column::RuleLevel]), None).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_MISSING");
    }

    #[test]
    fn test_rejects_non_timestamp_column() {
        let rows = row_set(vec![], &[Column::MitreTechniques]);
        assert!(enrich(rows, Some(Column::MitreTechniques)).is_err());
    }
}
