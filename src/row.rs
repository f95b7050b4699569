//! Row Definitions
//!
//! This module defines the flat row produced from one Wazuh record, the
//! enriched row carrying calendar buckets, and the row sets that travel
//! through the pipeline together with their observed schema.
//!
//! # Columns
//!
//! - **Time**: `@timestamp`, `timestamp`
//! - **Rule**: `rule.id`, `rule.level`, `rule.description`
//! - **Agent**: `agent.id`, `agent.name`
//! - **Payload**: `full_log`, `location`
//! - **MITRE** (list-valued): `mitre_techniques`, `mitre_tactics`
//! - **Derived**: `date`, `day`, `month`, `iso_week`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error_handling::ReportError;

/// A named column of the flat row schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Column {
    #[serde(rename = "@timestamp")]
    Timestamp,
    #[serde(rename = "timestamp")]
    EventTime,
    #[serde(rename = "rule.id")]
    RuleId,
    #[serde(rename = "rule.level")]
    RuleLevel,
    #[serde(rename = "rule.description")]
    RuleDescription,
    #[serde(rename = "agent.id")]
    AgentId,
    #[serde(rename = "agent.name")]
    AgentName,
    #[serde(rename = "full_log")]
    FullLog,
    #[serde(rename = "location")]
    Location,
    #[serde(rename = "mitre_techniques")]
    MitreTechniques,
    #[serde(rename = "mitre_tactics")]
    MitreTactics,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "day")]
    Day,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "iso_week")]
    IsoWeek,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::Timestamp,
        Column::EventTime,
        Column::RuleId,
        Column::RuleLevel,
        Column::RuleDescription,
        Column::AgentId,
        Column::AgentName,
        Column::FullLog,
        Column::Location,
        Column::MitreTechniques,
        Column::MitreTactics,
        Column::Date,
        Column::Day,
        Column::Month,
        Column::IsoWeek,
    ];

    /// Canonical column name
    pub fn name(&self) -> &'static str {
        match self {
            Column::Timestamp => "@timestamp",
            Column::EventTime => "timestamp",
            Column::RuleId => "rule.id",
            Column::RuleLevel => "rule.level",
            Column::RuleDescription => "rule.description",
            Column::AgentId => "agent.id",
            Column::AgentName => "agent.name",
            Column::FullLog => "full_log",
            Column::Location => "location",
            Column::MitreTechniques => "mitre_techniques",
            Column::MitreTactics => "mitre_tactics",
            Column::Date => "date",
            Column::Day => "day",
            Column::Month => "month",
            Column::IsoWeek => "iso_week",
        }
    }

    /// Columns whose values may be lists and need explosion first
    pub fn is_list(&self) -> bool {
        matches!(self, Column::MitreTechniques | Column::MitreTactics)
    }

    /// Columns appended by time enrichment
    pub fn is_derived(&self) -> bool {
        matches!(self, Column::Date | Column::Day | Column::Month | Column::IsoWeek)
    }

    /// Human axis label: underscores become spaces, words are title-cased
    pub fn axis_label(&self) -> String {
        let mut label = String::with_capacity(self.name().len());
        let mut previous_is_letter = false;
        for c in self.name().chars() {
            let c = if c == '_' { ' ' } else { c };
            if c.is_alphabetic() {
                if previous_is_letter {
                    label.extend(c.to_lowercase());
                } else {
                    label.extend(c.to_uppercase());
                }
                previous_is_letter = true;
            } else {
                label.push(c);
                previous_is_letter = false;
            }
        }
        label
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|column| column.name() == s)
            .ok_or_else(|| ReportError::UnknownColumn {
                column: s.to_string(),
            })
    }
}

/// One flattened Wazuh record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlatRow {
    /// Indexer timestamp (`@timestamp`), kept as raw text until enrichment
    #[serde(rename = "@timestamp")]
    pub timestamp: Option<String>,

    /// Manager timestamp (`timestamp`)
    #[serde(rename = "timestamp")]
    pub event_time: Option<String>,

    #[serde(rename = "rule.id")]
    pub rule_id: Option<String>,

    /// Rule severity level
    #[serde(rename = "rule.level")]
    pub rule_level: Option<i64>,

    /// Canonical "rule fired" label
    #[serde(rename = "rule.description")]
    pub rule_description: Option<String>,

    #[serde(rename = "agent.id")]
    pub agent_id: Option<String>,

    /// Reporting endpoint
    #[serde(rename = "agent.name")]
    pub agent_name: Option<String>,

    /// Original vendor log line
    pub full_log: Option<String>,

    /// Log source path or device address
    pub location: Option<String>,

    /// Coalesced raw MITRE technique value: scalar, list or absent
    pub mitre_techniques: Option<Value>,

    /// Coalesced raw MITRE tactic value: scalar, list or absent
    pub mitre_tactics: Option<Value>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalar text of a non-derived column, if any.
    ///
    /// List columns have no scalar text and always return `None`.
    pub fn text(&self, column: Column) -> Option<String> {
        match column {
            Column::Timestamp => self.timestamp.clone(),
            Column::EventTime => self.event_time.clone(),
            Column::RuleId => self.rule_id.clone(),
            Column::RuleLevel => self.rule_level.map(|level| level.to_string()),
            Column::RuleDescription => self.rule_description.clone(),
            Column::AgentId => self.agent_id.clone(),
            Column::AgentName => self.agent_name.clone(),
            Column::FullLog => self.full_log.clone(),
            Column::Location => self.location.clone(),
            Column::MitreTechniques
            | Column::MitreTactics
            | Column::Date
            | Column::Day
            | Column::Month
            | Column::IsoWeek => None,
        }
    }

    /// Raw value of a list-valued column
    pub fn raw_list(&self, column: Column) -> Option<&Value> {
        match column {
            Column::MitreTechniques => self.mitre_techniques.as_ref(),
            Column::MitreTactics => self.mitre_tactics.as_ref(),
            _ => None,
        }
    }

    /// Whether `location` marks a network device; a null location never does
    pub fn is_network_device(&self, prefix: &str) -> bool {
        self.location
            .as_deref()
            .map(|location| location.starts_with(prefix))
            .unwrap_or(false)
    }

    /// Whether the fired rule matches the marker phrase, ignoring case
    pub fn description_contains(&self, marker: &str) -> bool {
        let marker = marker.to_lowercase();
        self.rule_description
            .as_deref()
            .map(|description| description.to_lowercase().contains(&marker))
            .unwrap_or(false)
    }
}

/// Ordered rows plus the columns observed while flattening
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub rows: Vec<FlatRow>,
    pub columns: BTreeSet<Column>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any record carried the column key, null included
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Append another set after this one, preserving both orders
    pub fn append(&mut self, mut other: RowSet) {
        self.rows.append(&mut other.rows);
        self.columns.append(&mut other.columns);
    }
}

/// A flat row plus its calendar buckets
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnrichedRow {
    #[serde(flatten)]
    pub row: FlatRow,
    pub date: Option<NaiveDate>,
    /// `YYYY-MM-DD`
    pub day: Option<String>,
    /// `YYYY-MM`
    pub month: Option<String>,
    pub iso_week: Option<u32>,
}

impl EnrichedRow {
    /// Row without calendar buckets
    pub fn bare(row: FlatRow) -> Self {
        Self {
            row,
            ..Self::default()
        }
    }

    /// Scalar category text of any non-list column
    pub fn category(&self, column: Column) -> Option<String> {
        match column {
            Column::Date => self.date.map(|date| date.format("%Y-%m-%d").to_string()),
            Column::Day => self.day.clone(),
            Column::Month => self.month.clone(),
            Column::IsoWeek => self.iso_week.map(|week| week.to_string()),
            other => self.row.text(other),
        }
    }
}

/// Enriched rows plus schema and the timestamp column actually used
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichedRowSet {
    pub rows: Vec<EnrichedRow>,
    pub columns: BTreeSet<Column>,
    /// `None` when enrichment could not run
    pub time_column: Option<Column>,
}

impl EnrichedRowSet {
    /// Wrap rows without enrichment, leaving derived columns null
    pub fn unenriched(rows: RowSet) -> Self {
        Self {
            rows: rows.rows.into_iter().map(EnrichedRow::bare).collect(),
            columns: rows.columns,
            time_column: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn is_time_enriched(&self) -> bool {
        self.time_column.is_some()
    }
}
