//! End-to-end run: load, enrich, report

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::aggregator::counts_by_key;
use crate::chart::ChartRenderer;
use crate::config::ReportConfig;
use crate::error_handling::ReportResult;
use crate::flattener::{LoadStats, RecordFlattener};
use crate::reports::{partition_by_location, ReportOutcome, ReportRunner, ReportSpec};
use crate::row::{Column, EnrichedRowSet, RowSet};
use crate::time_enricher::{enrich, resolve_timestamp_column};

/// What a run produced, serializable for `--summary`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_records: usize,
    pub malformed_records: usize,
    pub sources: Vec<LoadStats>,
    /// Timestamp column used, `None` when time reports were skipped
    pub time_column: Option<Column>,
    /// (rule.level, count) ordered by level
    pub level_counts: Vec<(i64, u64)>,
    pub network_rows: usize,
    pub endpoint_rows: usize,
    pub reports: Vec<ReportOutcome>,
}

impl RunSummary {
    pub fn rendered(&self) -> usize {
        self.reports.iter().filter(|r| r.is_rendered()).count()
    }

    /// Full sub-message listing, when the message report ran
    pub fn message_listing(&self) -> Option<&str> {
        self.reports.iter().find_map(|r| r.listing.as_deref())
    }
}

/// Enrich rows, falling back to unenriched rows when no timestamp column exists
pub fn enrich_or_fallback(
    rows: RowSet,
    timestamp_column: Option<Column>,
) -> ReportResult<EnrichedRowSet> {
    match resolve_timestamp_column(&rows, timestamp_column) {
        Ok(column) => {
            info!("Using {} for calendar buckets", column);
            enrich(rows, timestamp_column)
        }
        Err(e) => {
            warn!("{}; time-based reports will be skipped", e);
            Ok(EnrichedRowSet::unenriched(rows))
        }
    }
}

/// Report pipeline bound to a configuration and a renderer
pub struct Pipeline<'a> {
    config: &'a ReportConfig,
    renderer: &'a dyn ChartRenderer,
    flattener: RecordFlattener,
    timestamp_column: Option<Column>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ReportConfig, renderer: &'a dyn ChartRenderer) -> Self {
        Self {
            config,
            renderer,
            flattener: RecordFlattener::default(),
            timestamp_column: None,
        }
    }

    pub fn with_timestamp_column(mut self, column: Option<Column>) -> Self {
        self.timestamp_column = column;
        self
    }

    /// Read every input into one enriched row set
    pub fn load(&self, inputs: &[PathBuf]) -> ReportResult<(EnrichedRowSet, Vec<LoadStats>)> {
        let report = self.flattener.load_files(inputs)?;
        info!(
            "Loaded {} records from {} files ({} malformed lines dropped)",
            report.total_records(),
            report.sources.len(),
            report.total_malformed()
        );
        let rows = enrich_or_fallback(report.rows, self.timestamp_column)?;
        Ok((rows, report.sources))
    }

    /// Run `specs` over rows that are already loaded
    pub fn report(
        &self,
        rows: &EnrichedRowSet,
        sources: Vec<LoadStats>,
        specs: &[ReportSpec],
        output_dir: &Path,
    ) -> ReportResult<RunSummary> {
        let runner = ReportRunner::new(self.config, self.renderer, output_dir)?;
        let (network, endpoints) = partition_by_location(&rows.rows, &self.config.network_prefix);
        let reports = runner.run_all(specs, rows);

        Ok(RunSummary {
            total_records: rows.len(),
            malformed_records: sources.iter().map(|s| s.malformed).sum(),
            sources,
            time_column: rows.time_column,
            level_counts: counts_by_key(rows.rows.iter().map(|r| r.row.rule_level)),
            network_rows: network.len(),
            endpoint_rows: endpoints.len(),
            reports,
        })
    }

    /// Load `inputs` and run `specs`, writing into `output_dir`
    pub fn run(
        &self,
        inputs: &[PathBuf],
        specs: &[ReportSpec],
        output_dir: &Path,
    ) -> ReportResult<RunSummary> {
        let (rows, sources) = self.load(inputs)?;
        self.report(&rows, sources, specs, output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::FlatRow;

    fn rows_with(columns: &[Column], timestamp: Option<&str>) -> RowSet {
        let mut set = RowSet::new();
        set.rows.push(FlatRow {
            timestamp: timestamp.map(str::to_string),
            ..FlatRow::new()
        });
        set.columns.extend(columns.iter().copied());
        set
    }

    #[test]
    fn test_fallback_without_timestamp() {
        let rows = rows_with(&[Column::RuleLevel], None);
        let enriched = enrich_or_fallback(rows, None).unwrap();
        assert!(!enriched.is_time_enriched());
        assert_eq!(enriched.len(), 1);
    }

    #[test]
    fn test_enrich_with_timestamp() {
        let rows = rows_with(&[Column::Timestamp], Some("2024-10-01T12:00:00.000Z"));
        let enriched = enrich_or_fallback(rows, None).unwrap();
        assert_eq!(enriched.time_column, Some(Column::Timestamp));
        assert_eq!(enriched.rows[0].month.as_deref(), Some("2024-10"));
    }

    #[test]
    fn test_invalid_requested_column_is_an_error() {
        let rows = rows_with(&[Column::Timestamp, Column::MitreTechniques], None);
        assert!(enrich_or_fallback(rows, Some(Column::MitreTechniques)).is_err());
    }
}
