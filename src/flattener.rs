//! Record flattening for Wazuh NDJSON exports
//! Maps nested alert documents onto the flat row schema and loads whole files

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error_handling::{ErrorContext, ReportError, ReportResult};
use crate::field_path::{coalesce, FieldPath};
use crate::row::{Column, FlatRow, RowSet};

/// Ordered candidate paths feeding one output column
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: Column,
    pub candidates: &'static [FieldPath],
}

/// Field map from Wazuh alert documents to flat columns
pub const WAZUH_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        column: Column::Timestamp,
        candidates: &[FieldPath::new(&["@timestamp"])],
    },
    FieldSpec {
        column: Column::EventTime,
        candidates: &[FieldPath::new(&["timestamp"])],
    },
    FieldSpec {
        column: Column::RuleId,
        candidates: &[FieldPath::new(&["rule", "id"])],
    },
    FieldSpec {
        column: Column::RuleLevel,
        candidates: &[FieldPath::new(&["rule", "level"])],
    },
    FieldSpec {
        column: Column::RuleDescription,
        candidates: &[FieldPath::new(&["rule", "description"])],
    },
    FieldSpec {
        column: Column::AgentId,
        candidates: &[FieldPath::new(&["agent", "id"])],
    },
    FieldSpec {
        column: Column::AgentName,
        candidates: &[FieldPath::new(&["agent", "name"])],
    },
    FieldSpec {
        column: Column::FullLog,
        candidates: &[FieldPath::new(&["full_log"])],
    },
    FieldSpec {
        column: Column::Location,
        candidates: &[FieldPath::new(&["location"])],
    },
    FieldSpec {
        column: Column::MitreTechniques,
        candidates: &[
            FieldPath::new(&["rule", "mitre_techniques"]),
            FieldPath::new(&["data", "sca", "check", "compliance", "mitre_techniques"]),
        ],
    },
    FieldSpec {
        column: Column::MitreTactics,
        candidates: &[
            FieldPath::new(&["rule", "mitre_tactics"]),
            FieldPath::new(&["data", "sca", "check", "compliance", "mitre_tactics"]),
        ],
    },
];

/// One flattened record and the columns whose keys it carried
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    pub row: FlatRow,
    pub columns: BTreeSet<Column>,
}

/// Per-source load counters
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LoadStats {
    pub source: String,
    pub lines: usize,
    pub records: usize,
    pub blank_lines: usize,
    pub malformed: usize,
}

/// Rows of every loaded source, concatenated in load order
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub rows: RowSet,
    pub sources: Vec<LoadStats>,
}

impl LoadReport {
    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|s| s.records).sum()
    }

    pub fn total_malformed(&self) -> usize {
        self.sources.iter().map(|s| s.malformed).sum()
    }
}

/// Flattens raw records through a fixed field map
#[derive(Debug, Clone, Copy)]
pub struct RecordFlattener {
    fields: &'static [FieldSpec],
}

impl Default for RecordFlattener {
    fn default() -> Self {
        Self::new(WAZUH_FIELDS)
    }
}

impl RecordFlattener {
    pub fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Flatten one record. Fails only when the document is not an object.
    pub fn flatten(&self, record: &Value) -> ReportResult<Flattened> {
        if !record.is_object() {
            return Err(ReportError::invalid_record(format!(
                "top-level document is {}, expected object",
                kind_of(record)
            )));
        }

        let mut row = FlatRow::new();
        let mut columns = BTreeSet::new();
        for spec in self.fields {
            if spec.candidates.iter().any(|path| path.lookup(record).key_exists()) {
                columns.insert(spec.column);
            }
            if let Some(value) = coalesce(record, spec.candidates) {
                assign(&mut row, spec.column, value);
            }
        }
        Ok(Flattened { row, columns })
    }

    /// Flatten every line of an NDJSON stream.
    ///
    /// Malformed lines are dropped and counted; only read failures are fatal.
    pub fn flatten_reader<R: BufRead>(
        &self,
        reader: R,
        source_name: &str,
    ) -> ReportResult<(RowSet, LoadStats)> {
        let mut rows = RowSet::new();
        let mut stats = LoadStats {
            source: source_name.to_string(),
            ..LoadStats::default()
        };

        for (index, chunk) in reader.split(b'\n').enumerate() {
            let line_no = index + 1;
            let mut bytes =
                chunk.with_io_context(|| format!("Failed to read {}", source_name))?;
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            stats.lines += 1;

            if bytes.iter().all(u8::is_ascii_whitespace) {
                stats.blank_lines += 1;
                continue;
            }

            let parsed = serde_json::from_slice::<Value>(&bytes)
                .map_err(|e| ReportError::invalid_record(e.to_string()))
                .and_then(|record| self.flatten(&record));
            match parsed {
                Ok(flattened) => {
                    rows.rows.push(flattened.row);
                    rows.columns.extend(flattened.columns);
                    stats.records += 1;
                }
                Err(e) => {
                    stats.malformed += 1;
                    debug!("{}", e.at_line(source_name, line_no));
                }
            }
        }

        info!(
            "Loaded {} records from {} ({} malformed, {} blank)",
            stats.records, source_name, stats.malformed, stats.blank_lines
        );
        Ok((rows, stats))
    }

    /// Flatten one NDJSON file
    pub fn flatten_file(&self, path: &Path) -> ReportResult<(RowSet, LoadStats)> {
        let file =
            File::open(path).with_io_context(|| format!("Failed to open {}", path.display()))?;
        self.flatten_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Flatten files independently and concatenate in the given order
    pub fn load_files(&self, paths: &[PathBuf]) -> ReportResult<LoadReport> {
        let mut report = LoadReport::default();
        for path in paths {
            let (rows, stats) = self.flatten_file(path)?;
            report.rows.append(rows);
            report.sources.push(stats);
        }
        if report.total_malformed() > 0 {
            info!("Skipped {} malformed records in total", report.total_malformed());
        }
        Ok(report)
    }
}

fn assign(row: &mut FlatRow, column: Column, value: &Value) {
    match column {
        Column::Timestamp => row.timestamp = text_of(value),
        Column::EventTime => row.event_time = text_of(value),
        Column::RuleId => row.rule_id = text_of(value),
        Column::RuleLevel => row.rule_level = level_of(value),
        Column::RuleDescription => row.rule_description = text_of(value),
        Column::AgentId => row.agent_id = text_of(value),
        Column::AgentName => row.agent_name = text_of(value),
        Column::FullLog => row.full_log = text_of(value),
        Column::Location => row.location = text_of(value),
        Column::MitreTechniques => row.mitre_techniques = Some(value.clone()),
        Column::MitreTactics => row.mitre_tactics = Some(value.clone()),
        Column::Date | Column::Day | Column::Month | Column::IsoWeek => {}
    }
}

/// Scalar text: strings as-is, numbers and booleans rendered, containers dropped
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn level_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn flatten(record: Value) -> Flattened {
        RecordFlattener::default().flatten(&record).unwrap()
    }

    #[test]
    fn test_full_alert() {
        let flat = flatten(json!({
            "@timestamp": "2024-08-15T10:20:30.123Z",
            "timestamp": "2024-08-15T10:20:30.123+0000",
            "rule": {
                "id": "5710",
                "level": 5,
                "description": "sshd: Attempt to login using a non-existent user",
                "mitre_techniques": ["T1110"]
            },
            "agent": {"id": "001", "name": "web-01"},
            "full_log": "Aug 15 10:20:30 web-01 sshd[123]: Invalid user admin",
            "location": "/var/log/auth.log"
        }));
        let row = flat.row;
        assert_eq!(row.timestamp.as_deref(), Some("2024-08-15T10:20:30.123Z"));
        assert_eq!(row.event_time.as_deref(), Some("2024-08-15T10:20:30.123+0000"));
        assert_eq!(row.rule_level, Some(5));
        assert_eq!(row.rule_id.as_deref(), Some("5710"));
        assert_eq!(row.agent_name.as_deref(), Some("web-01"));
        assert_eq!(row.location.as_deref(), Some("/var/log/auth.log"));
        assert_eq!(row.mitre_techniques, Some(json!(["T1110"])));
        assert!(flat.columns.contains(&Column::MitreTechniques));
        assert!(!flat.columns.contains(&Column::MitreTactics));
    }

    #[test]
    fn test_missing_rule_object_yields_nulls() {
        let flat = flatten(json!({"@timestamp": "2024-08-01T00:00:00Z", "location": "200.1.1.1"}));
        assert!(flat.row.rule_level.is_none());
        assert!(flat.row.rule_description.is_none());
        assert!(!flat.columns.contains(&Column::RuleLevel));
        assert!(flat.columns.contains(&Column::Timestamp));
    }

    #[test]
    fn test_null_key_counts_as_column() {
        let flat = flatten(json!({"timestamp": null}));
        assert!(flat.row.event_time.is_none());
        assert!(flat.columns.contains(&Column::EventTime));
    }

    #[test]
    fn test_technique_coalesce_paths() {
        let sca = |v: Value| {
            json!({"data": {"sca": {"check": {"compliance": {"mitre_techniques": v}}}}})
        };

        let only_b = flatten(sca(json!("T1059")));
        assert_eq!(only_b.row.mitre_techniques, Some(json!("T1059")));

        let mut both = sca(json!("T1059"));
        both["rule"] = json!({"mitre_techniques": ["T1110", "T1021"]});
        assert_eq!(flatten(both).row.mitre_techniques, Some(json!(["T1110", "T1021"])));

        let mut a_null = sca(json!("T1059"));
        a_null["rule"] = json!({"mitre_techniques": null});
        assert_eq!(flatten(a_null).row.mitre_techniques, Some(json!("T1059")));

        assert_eq!(flatten(json!({"rule": {"level": 3}})).row.mitre_techniques, None);
    }

    #[test]
    fn test_scalar_coercion() {
        let flat = flatten(json!({
            "rule": {"level": "12", "id": 5501, "description": {"nested": true}},
            "agent": {"name": ["a", "b"]}
        }));
        assert_eq!(flat.row.rule_level, Some(12));
        assert_eq!(flat.row.rule_id.as_deref(), Some("5501"));
        assert!(flat.row.rule_description.is_none());
        assert!(flat.row.agent_name.is_none());

        assert_eq!(flatten(json!({"rule": {"level": "high"}})).row.rule_level, None);
        assert_eq!(flatten(json!({"rule": {"level": 4.0}})).row.rule_level, Some(4));
    }

    #[test]
    fn test_non_object_fails() {
        let flattener = RecordFlattener::default();
        let err = flattener.flatten(&json!([1, 2])).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RECORD");
        assert!(err.is_skip());
        assert!(err.to_string().contains("an array"));
        assert!(flattener.flatten(&json!(null)).is_err());
        assert!(flattener.flatten(&json!("text")).is_err());
        assert!(flattener.flatten(&json!({})).is_ok());
    }

    #[test]
    fn test_reader_skips_malformed_and_blank_lines() {
        let input = concat!(
            "{\"rule\": {\"level\": 3}}\n",
            "\n",
            "not json\n",
            "[1, 2, 3]\r\n",
            "{\"rule\": {\"level\": 10}}\r\n",
        );
        let (rows, stats) = RecordFlattener::default()
            .flatten_reader(Cursor::new(input), "inline")
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows[0].rule_level, Some(3));
        assert_eq!(rows.rows[1].rule_level, Some(10));
        assert_eq!(stats.records, 2);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.blank_lines, 1);
    }

    #[test]
    fn test_reader_invalid_utf8_is_malformed() {
        let mut input = b"{\"location\": \"a\"}\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let (rows, stats) = RecordFlattener::default()
            .flatten_reader(Cursor::new(input), "bytes")
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = RecordFlattener::default()
            .load_files(&[PathBuf::from("/nonexistent/wazuh.ndjson")])
            .unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
