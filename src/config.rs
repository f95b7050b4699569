//! Configuration module for the report pipeline
//! Handles CLI argument parsing, the optional YAML settings file and validation

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::aggregator::DEFAULT_TOP_N;
use crate::chart::Palette;
use crate::error_handling::{ReportError, ReportResult};
use crate::message_extractor::{DEFAULT_MARKER, DEFAULT_MIN_LENGTH};
use crate::row::Column;

/// Monthly exports read when no input is given
pub const DEFAULT_INPUTS: [&str; 3] = [
    "input/wazuh_august_full.ndjson",
    "input/wazuh_september_full.ndjson",
    "input/wazuh_october_full.ndjson",
];

#[derive(Parser, Clone, Debug)]
#[command(name = "wazuh_report", about = "Descriptive bar-chart reports over Wazuh NDJSON exports")]
#[command(version, author = "SIEM Team")]
pub struct PipelineArgs {
    /// NDJSON files, directories or glob patterns, read in the given order
    #[arg(value_name = "INPUT", default_values = DEFAULT_INPUTS)]
    pub inputs: Vec<String>,

    /// Directory receiving charts and listings
    #[arg(long, default_value = "results", help = "Output directory for charts")]
    pub output_dir: PathBuf,

    /// YAML settings file
    #[arg(long, value_name = "FILE", help = "Optional YAML report settings")]
    pub config: Option<PathBuf>,

    /// Timestamp column used for calendar buckets
    #[arg(
        long,
        value_name = "COLUMN",
        help = "Timestamp column (default @timestamp, falls back to timestamp)"
    )]
    pub timestamp_column: Option<String>,

    /// Write a JSON run summary
    #[arg(long, value_name = "FILE", help = "Write the run summary as JSON")]
    pub summary: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl PipelineArgs {
    /// Parsed `--timestamp-column`, if given
    pub fn timestamp_column(&self) -> ReportResult<Option<Column>> {
        self.timestamp_column
            .as_deref()
            .map(str::parse)
            .transpose()
    }
}

/// Report settings, all optional in the YAML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// `location` prefix marking network-device sources
    pub network_prefix: String,
    /// Phrase selecting catch-all rows for sub-message extraction
    pub generic_marker: String,
    /// Exact rule description dropped from the "without generic" report
    pub generic_rule: String,
    pub min_message_length: usize,
    pub top_n: usize,
    pub message_top_n: usize,
    /// Palette token (`Blues_r`, `royalblue`, `#rrggbb`, ...)
    pub palette: String,
    /// Report keys to skip
    pub disabled_reports: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            network_prefix: "200".to_string(),
            generic_marker: DEFAULT_MARKER.to_string(),
            generic_rule: "Generic event detected from network device.".to_string(),
            min_message_length: DEFAULT_MIN_LENGTH,
            top_n: DEFAULT_TOP_N,
            message_top_n: 10,
            palette: "Blues_r".to_string(),
            disabled_reports: Vec::new(),
        }
    }
}

impl ReportConfig {
    pub fn from_yaml_str(content: &str) -> ReportResult<Self> {
        let config: ReportConfig = serde_yaml::from_str(content).map_err(|e| {
            ReportError::configuration_with_source("Failed to parse config", e.into())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReportError::configuration_with_source(
                format!("Failed to read config file {}", path.display()),
                e.into(),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> ReportResult<()> {
        if self.top_n == 0 {
            return Err(ReportError::configuration("top_n must be greater than 0"));
        }
        if self.message_top_n == 0 {
            return Err(ReportError::configuration("message_top_n must be greater than 0"));
        }
        if self.network_prefix.is_empty() {
            return Err(ReportError::configuration("network_prefix must not be empty"));
        }
        if self.generic_marker.trim().is_empty() {
            return Err(ReportError::configuration("generic_marker must not be empty"));
        }
        self.palette()?;
        Ok(())
    }

    pub fn palette(&self) -> ReportResult<Palette> {
        self.palette.parse()
    }

    pub fn is_enabled(&self, report_key: &str) -> bool {
        !self.disabled_reports.iter().any(|key| key == report_key)
    }
}

impl fmt::Display for ReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReportConfig {{ network_prefix: {}, marker: {}, top_n: {}, \
             message_top_n: {}, palette: {} }}",
            self.network_prefix,
            self.generic_marker,
            self.top_n,
            self.message_top_n,
            self.palette
        )
    }
}
