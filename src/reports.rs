//! Report catalogue and per-report execution
//!
//! Every report is independent: it selects rows, builds one aggregate and
//! hands it to the renderer. A failing report is recorded in its
//! [`ReportOutcome`] and never stops the others.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(feature = "parallel-processing")]
use rayon::prelude::*;

use crate::aggregator::{aggregate, aggregate_column, value_counts, AggregateResult};
use crate::chart::Orientation::{Horizontal, Vertical};
use crate::chart::{write_listing, ChartRenderer, ChartRequest, ChartStyle, Orientation, Palette};
use crate::config::ReportConfig;
use crate::error_handling::{ErrorSummary, ReportError, ReportResult};
use crate::message_extractor::MessageExtractor;
use crate::row::{Column, EnrichedRow, EnrichedRowSet};
use crate::techniques::exploded_values;
use crate::time_enricher::{DEFAULT_TIMESTAMP_COLUMN, FALLBACK_TIMESTAMP_COLUMN};

/// Full frequency listing of extracted sub-messages
pub const MESSAGE_LISTING_FILE: &str = "generic_event_messages.txt";

const MESSAGE_COLUMN: &str = "message";

use ReportSource::{Exploded, GenericMessages};

/// Where a report takes its categories from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
    /// Scalar column
    Column(Column),
    /// List column, exploded first
    Exploded(Column),
    /// Sub-messages of rows carrying the generic marker
    GenericMessages,
}

/// Row selection applied before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    All,
    /// Drop rows whose description equals the generic rule exactly
    ExcludeGenericRule,
    /// `location` missing or not starting with the network prefix
    Endpoints,
    /// `location` starting with the network prefix
    NetworkDevices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSpec {
    pub key: &'static str,
    pub title: &'static str,
    pub file_name: &'static str,
    pub source: ReportSource,
    pub filter: RowFilter,
    pub orientation: Orientation,
    /// Overrides the configured top-N
    pub top_n: Option<usize>,
    /// Overrides the configured palette
    pub palette: Option<&'static str>,
    pub requires_time: bool,
}

impl ReportSpec {
    const fn new(
        key: &'static str,
        title: &'static str,
        source: ReportSource,
        orientation: Orientation,
    ) -> Self {
        Self {
            key,
            title,
            file_name: "",
            source,
            filter: RowFilter::All,
            orientation,
            top_n: None,
            palette: None,
            requires_time: false,
        }
    }

    const fn file(mut self, file_name: &'static str) -> Self {
        self.file_name = file_name;
        self
    }

    const fn filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }

    const fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    const fn palette(mut self, token: &'static str) -> Self {
        self.palette = Some(token);
        self
    }

    const fn timed(mut self) -> Self {
        self.requires_time = true;
        self
    }

    /// Label of the category axis
    pub fn category_label(&self) -> String {
        match self.source {
            ReportSource::Column(column) | ReportSource::Exploded(column) => column.axis_label(),
            ReportSource::GenericMessages => "Message".to_string(),
        }
    }
}

/// Built-in reports in execution order
pub const CATALOGUE: &[ReportSpec] = &[
    ReportSpec::new(
        "logs_by_level",
        "Log volume by rule level",
        ReportSource::Column(Column::RuleLevel),
        Vertical,
    )
    .file("logs_by_level.svg"),
    ReportSpec::new(
        "logs_by_month",
        "Log volume by month",
        ReportSource::Column(Column::Month),
        Vertical,
    )
    .file("logs_by_month.svg")
    .timed(),
    ReportSpec::new(
        "logs_by_agent",
        "Top agents by log volume",
        ReportSource::Column(Column::AgentName),
        Horizontal,
    )
    .file("logs_by_agent.svg"),
    ReportSpec::new(
        "logs_by_rule",
        "Most frequent rules",
        ReportSource::Column(Column::RuleDescription),
        Horizontal,
    )
    .file("logs_by_rule.svg"),
    ReportSpec::new(
        "logs_by_rule_without_generic",
        "Most frequent rules without generic network events",
        ReportSource::Column(Column::RuleDescription),
        Horizontal,
    )
    .file("logs_by_rule_without_generic.svg")
    .filter(RowFilter::ExcludeGenericRule),
    ReportSpec::new(
        "generic_event_messages",
        "Top 10 generic event messages",
        GenericMessages,
        Horizontal,
    )
    .file("top10_generic_event_messages.svg"),
    ReportSpec::new(
        "logs_by_rule_endpoints",
        "Most frequent rules on endpoints",
        ReportSource::Column(Column::RuleDescription),
        Horizontal,
    )
    .file("logs_by_rule_endpoints.svg")
    .filter(RowFilter::Endpoints),
    ReportSpec::new(
        "logs_by_rule_network_devices",
        "Most frequent rules on network devices",
        ReportSource::Column(Column::RuleDescription),
        Horizontal,
    )
    .file("logs_by_rule_network_devices.svg")
    .filter(RowFilter::NetworkDevices),
    ReportSpec::new(
        "mitre_techniques",
        "MITRE ATT&CK techniques",
        Exploded(Column::MitreTechniques),
        Horizontal,
    )
    .file("mitre_techniques.svg")
    .palette("royalblue"),
    ReportSpec::new(
        "mitre_tactics",
        "MITRE ATT&CK tactics",
        Exploded(Column::MitreTactics),
        Horizontal,
    )
    .file("mitre_tactics.svg")
    .palette("royalblue"),
    ReportSpec::new(
        "logs_by_week",
        "Log volume by ISO week",
        ReportSource::Column(Column::IsoWeek),
        Vertical,
    )
    .file("logs_by_week.svg")
    .top_n(53)
    .timed(),
];

/// Split rows into (network devices, endpoints) by `location` prefix.
///
/// Every row lands in exactly one side.
pub fn partition_by_location<'a>(
    rows: &'a [EnrichedRow],
    prefix: &str,
) -> (Vec<&'a EnrichedRow>, Vec<&'a EnrichedRow>) {
    rows.iter().partition(|row| row.row.is_network_device(prefix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Rendered,
    Skipped,
    Disabled,
    Failed,
}

/// Result of one report run
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub key: String,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_file: Option<PathBuf>,
    pub categories: usize,
    pub observations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSummary>,
    /// Full frequency listing, kept for console output
    #[serde(skip)]
    pub listing: Option<String>,
}

impl ReportOutcome {
    fn new(key: &str, status: ReportStatus) -> Self {
        Self {
            key: key.to_string(),
            status,
            chart: None,
            listing_file: None,
            categories: 0,
            observations: 0,
            error: None,
            listing: None,
        }
    }

    fn from_error(key: &str, error: &ReportError) -> Self {
        let status = if error.is_skip() {
            ReportStatus::Skipped
        } else {
            ReportStatus::Failed
        };
        Self {
            error: Some(error.to_summary()),
            ..Self::new(key, status)
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.status == ReportStatus::Rendered
    }
}

/// Aggregate of one report plus its optional full listing
struct Built {
    aggregate: AggregateResult,
    full: Option<AggregateResult>,
}

/// Runs catalogue reports against one enriched row set
pub struct ReportRunner<'a> {
    config: &'a ReportConfig,
    extractor: MessageExtractor,
    palette: Palette,
    renderer: &'a dyn ChartRenderer,
    output_dir: PathBuf,
}

impl<'a> ReportRunner<'a> {
    pub fn new(
        config: &'a ReportConfig,
        renderer: &'a dyn ChartRenderer,
        output_dir: &Path,
    ) -> ReportResult<Self> {
        Ok(Self {
            config,
            extractor: MessageExtractor::new(
                config.generic_marker.clone(),
                config.min_message_length,
            )?,
            palette: config.palette()?,
            renderer,
            output_dir: output_dir.to_path_buf(),
        })
    }

    fn top_n(&self, spec: &ReportSpec) -> usize {
        match (spec.top_n, spec.source) {
            (Some(n), _) => n,
            (None, GenericMessages) => self.config.message_top_n,
            (None, _) => self.config.top_n,
        }
    }

    fn select<'r>(&self, filter: RowFilter, rows: &'r EnrichedRowSet) -> Vec<&'r EnrichedRow> {
        let prefix = self.config.network_prefix.as_str();
        let generic_rule = self.config.generic_rule.as_str();
        rows.rows
            .iter()
            .filter(|row| match filter {
                RowFilter::All => true,
                RowFilter::ExcludeGenericRule => {
                    row.row.rule_description.as_deref() != Some(generic_rule)
                }
                RowFilter::Endpoints => !row.row.is_network_device(prefix),
                RowFilter::NetworkDevices => row.row.is_network_device(prefix),
            })
            .collect()
    }

    /// Ranked, truncated aggregate of one report
    pub fn aggregate(
        &self,
        spec: &ReportSpec,
        rows: &EnrichedRowSet,
    ) -> ReportResult<AggregateResult> {
        Ok(self.build(spec, rows)?.aggregate)
    }

    fn build(&self, spec: &ReportSpec, rows: &EnrichedRowSet) -> ReportResult<Built> {
        if spec.requires_time && !rows.is_time_enriched() {
            return Err(ReportError::schema_missing([
                DEFAULT_TIMESTAMP_COLUMN.name(),
                FALLBACK_TIMESTAMP_COLUMN.name(),
            ]));
        }
        let selected = self.select(spec.filter, rows);
        debug!(
            "Report {} selected {} of {} rows",
            spec.key,
            selected.len(),
            rows.len()
        );
        let top_n = self.top_n(spec);

        match spec.source {
            ReportSource::Column(column) => Ok(Built {
                aggregate: aggregate_column(selected, column, top_n)?,
                full: None,
            }),
            ReportSource::Exploded(column) => {
                let values = exploded_values(selected, column)?;
                Ok(Built {
                    aggregate: aggregate(column.name(), values.into_iter().map(Some), top_n)?,
                    full: None,
                })
            }
            ReportSource::GenericMessages => {
                let marker = self.extractor.marker();
                if self.extractor.marked_rows(selected.iter().copied()) == 0 {
                    return Err(ReportError::empty_aggregate(format!(
                        "{} (no rows match '{}')",
                        MESSAGE_COLUMN, marker
                    )));
                }
                let messages = self.extractor.messages(selected);
                if messages.is_empty() {
                    info!("No valid messages extracted from rows matching '{}'", marker);
                }
                let full = value_counts(MESSAGE_COLUMN, messages.into_iter().map(Some))?;
                Ok(Built {
                    aggregate: full.clone().top(top_n),
                    full: Some(full),
                })
            }
        }
    }

    fn style(&self, spec: &ReportSpec) -> ReportResult<ChartStyle> {
        let palette: Palette = match spec.palette {
            Some(token) => token.parse()?,
            None => self.palette.clone(),
        };
        Ok(match spec.orientation {
            Orientation::Vertical => ChartStyle::vertical(palette),
            Orientation::Horizontal => ChartStyle::horizontal(palette),
        })
    }

    fn render(&self, spec: &ReportSpec, rows: &EnrichedRowSet) -> ReportResult<ReportOutcome> {
        let built = self.build(spec, rows)?;
        let mut outcome = ReportOutcome::new(spec.key, ReportStatus::Rendered);

        if let Some(full) = &built.full {
            let listing_file = write_listing(&self.output_dir, MESSAGE_LISTING_FILE, full)?;
            outcome.listing_file = Some(listing_file);
            outcome.listing = Some(full.to_string());
        }

        debug!("Rendering {} with the {} renderer", spec.key, self.renderer.name());
        let request = ChartRequest {
            aggregate: &built.aggregate,
            category_label: spec.category_label(),
            title: spec.title.to_string(),
            file_name: spec.file_name.to_string(),
            style: self.style(spec)?,
        };
        outcome.chart = Some(self.renderer.render(&request, &self.output_dir)?);
        outcome.categories = built.aggregate.distinct_categories;
        outcome.observations = built.aggregate.total_observations;
        Ok(outcome)
    }

    /// Run one report, converting any failure into its outcome
    pub fn run(&self, spec: &ReportSpec, rows: &EnrichedRowSet) -> ReportOutcome {
        if !self.config.is_enabled(spec.key) {
            debug!("Report {} disabled", spec.key);
            return ReportOutcome::new(spec.key, ReportStatus::Disabled);
        }
        match self.render(spec, rows) {
            Ok(outcome) => {
                info!(
                    "Report {}: {} categories from {} observations",
                    spec.key, outcome.categories, outcome.observations
                );
                outcome
            }
            Err(e) => {
                e.log();
                ReportOutcome::from_error(spec.key, &e)
            }
        }
    }

    /// Run every report, outcomes in catalogue order
    pub fn run_all(&self, specs: &[ReportSpec], rows: &EnrichedRowSet) -> Vec<ReportOutcome> {
        #[cfg(feature = "parallel-processing")]
        let outcomes = specs.par_iter().map(|spec| self.run(spec, rows)).collect();

        #[cfg(not(feature = "parallel-processing"))]
        let outcomes = specs.iter().map(|spec| self.run(spec, rows)).collect();

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::SvgChartRenderer;
    use crate::row::FlatRow;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn row(description: &str, location: Option<&str>, full_log: Option<&str>) -> EnrichedRow {
        EnrichedRow::bare(FlatRow {
            rule_description: Some(description.to_string()),
            location: location.map(str::to_string),
            full_log: full_log.map(str::to_string),
            ..FlatRow::new()
        })
    }

    fn row_set(rows: Vec<EnrichedRow>) -> EnrichedRowSet {
        EnrichedRowSet {
            rows,
            ..EnrichedRowSet::default()
        }
    }

    fn spec(key: &str) -> &'static ReportSpec {
        CATALOGUE.iter().find(|s| s.key == key).unwrap()
    }

    #[test]
    fn test_catalogue_is_unique() {
        let keys: HashSet<&str> = CATALOGUE.iter().map(|s| s.key).collect();
        let files: HashSet<&str> = CATALOGUE.iter().map(|s| s.file_name).collect();
        assert_eq!(keys.len(), CATALOGUE.len());
        assert_eq!(files.len(), CATALOGUE.len());
        assert!(CATALOGUE.iter().all(|s| s.file_name.ends_with(".svg")));
        assert_eq!(spec("logs_by_week").top_n, Some(53));
    }

    #[test]
    fn test_partition_by_location() {
        let rows = vec![
            row("a", Some("200.1.1.1"), None),
            row("b", Some("/var/log/auth.log"), None),
            row("c", None, None),
            row("d", Some("2001:db8::1"), None),
            row("e", Some("10.200.0.1"), None),
        ];
        let (network, endpoints) = partition_by_location(&rows, "200");
        assert_eq!(network.len(), 2);
        assert_eq!(endpoints.len(), 3);
        assert_eq!(network.len() + endpoints.len(), rows.len());
    }

    #[test]
    fn test_exclude_generic_rule() {
        let config = ReportConfig::default();
        let renderer = SvgChartRenderer;
        let dir = tempdir().unwrap();
        let runner = ReportRunner::new(&config, &renderer, dir.path()).unwrap();
        let rows = row_set(vec![
            row("Generic event detected from network device.", None, None),
            row("Generic event detected from network device.", None, None),
            row("sshd: authentication failed", None, None),
        ]);
        let result = runner.aggregate(spec("logs_by_rule_without_generic"), &rows).unwrap();
        assert_eq!(result.total_observations, 1);
        assert_eq!(result.entries[0].category, "sshd: authentication failed");
    }

    #[test]
    fn test_time_report_skipped_without_enrichment() {
        let config = ReportConfig::default();
        let renderer = SvgChartRenderer;
        let dir = tempdir().unwrap();
        let runner = ReportRunner::new(&config, &renderer, dir.path()).unwrap();
        let rows = row_set(vec![row("a", None, None)]);

        let outcome = runner.run(spec("logs_by_month"), &rows);
        assert_eq!(outcome.status, ReportStatus::Skipped);
        assert_eq!(outcome.error.unwrap().code, "SCHEMA_MISSING");
        assert!(!dir.path().join("logs_by_month.svg").exists());
    }

    #[test]
    fn test_message_report_writes_listing() {
        let config = ReportConfig::default();
        let renderer = SvgChartRenderer;
        let dir = tempdir().unwrap();
        let runner = ReportRunner::new(&config, &renderer, dir.path()).unwrap();
        let generic = "Generic event detected from network device.";
        let rows = row_set(vec![
            row(generic, Some("200.0.0.1"), Some("h; Interface Gi0/1 down.")),
            row(generic, Some("200.0.0.1"), Some("h; Interface Gi0/1 down.")),
            row(generic, Some("200.0.0.2"), Some("h; Config saved.")),
            row(generic, Some("200.0.0.2"), Some("h; ok.")),
        ]);

        let outcome = runner.run(spec("generic_event_messages"), &rows);
        assert!(outcome.is_rendered());
        assert!(dir.path().join("top10_generic_event_messages.svg").exists());
        let listing = std::fs::read_to_string(dir.path().join(MESSAGE_LISTING_FILE)).unwrap();
        assert!(listing.starts_with("message"));
        assert!(listing.contains("Interface Gi0/1 down  2"));
        assert_eq!(outcome.listing.as_deref(), Some(listing.as_str()));
        assert_eq!(outcome.observations, 3);
    }

    #[test]
    fn test_message_report_distinguishes_missing_generic_rows() {
        let config = ReportConfig::default();
        let renderer = SvgChartRenderer;
        let dir = tempdir().unwrap();
        let runner = ReportRunner::new(&config, &renderer, dir.path()).unwrap();

        let no_generic = row_set(vec![row(
            "sshd: authentication failed",
            None,
            Some("host; session opened."),
        )]);
        let outcome = runner.run(spec("generic_event_messages"), &no_generic);
        assert_eq!(outcome.status, ReportStatus::Skipped);
        let error = outcome.error.unwrap();
        assert_eq!(error.code, "EMPTY_AGGREGATE");
        assert!(error.message.contains("no rows match"));

        let generic = "Generic event detected from network device.";
        let unextracted = row_set(vec![row(generic, None, Some("no delimiters here"))]);
        let outcome = runner.run(spec("generic_event_messages"), &unextracted);
        assert_eq!(outcome.status, ReportStatus::Skipped);
        let error = outcome.error.unwrap();
        assert_eq!(error.code, "EMPTY_AGGREGATE");
        assert!(!error.message.contains("no rows match"));
        assert!(!dir.path().join(MESSAGE_LISTING_FILE).exists());
    }

    #[test]
    fn test_failures_are_isolated() {
        let config = ReportConfig {
            disabled_reports: vec!["logs_by_agent".to_string()],
            ..ReportConfig::default()
        };
        let renderer = SvgChartRenderer;
        let dir = tempdir().unwrap();
        let runner = ReportRunner::new(&config, &renderer, dir.path()).unwrap();
        let rows = row_set(vec![row("sshd: authentication failed", Some("/var/log/secure"), None)]);

        let outcomes = runner.run_all(CATALOGUE, &rows);
        assert_eq!(outcomes.len(), CATALOGUE.len());
        let status = |key: &str| outcomes.iter().find(|o| o.key == key).unwrap().status;
        assert_eq!(status("logs_by_rule"), ReportStatus::Rendered);
        assert_eq!(status("logs_by_rule_endpoints"), ReportStatus::Rendered);
        assert_eq!(status("logs_by_rule_network_devices"), ReportStatus::Skipped);
        assert_eq!(status("logs_by_level"), ReportStatus::Skipped);
        assert_eq!(status("logs_by_agent"), ReportStatus::Disabled);
        assert_eq!(status("mitre_techniques"), ReportStatus::Skipped);
        let order: Vec<&str> = outcomes.iter().map(|o| o.key.as_str()).collect();
        let expected: Vec<&str> = CATALOGUE.iter().map(|s| s.key).collect();
        assert_eq!(order, expected);
    }
}
