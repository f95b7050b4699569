//! Wazuh Log Report Library
//!
//! Turns Wazuh alert exports (NDJSON) into ranked frequency tables and bar
//! charts.
//!
//! # Modules
//!
//! - `flattener`: nested alert documents to flat rows
//! - `time_enricher`: calendar buckets derived from the timestamp column
//! - `techniques`: MITRE list columns normalized and exploded
//! - `message_extractor`: sub-messages of generic network-device events
//! - `aggregator`: ranked value counts with top-N truncation
//! - `chart`: SVG bar chart rendering
//! - `reports` / `pipeline`: the report catalogue and the end-to-end run

pub mod aggregator;
pub mod chart;
pub mod config;
pub mod error_handling;
pub mod field_path;
pub mod flattener;
pub mod message_extractor;
pub mod pipeline;
pub mod reports;
pub mod row;
pub mod sources;
pub mod techniques;
pub mod time_enricher;

// Re-export the main types for convenience
pub use aggregator::{aggregate, aggregate_column, value_counts, AggregateResult, CategoryCount};
pub use chart::{ChartRenderer, ChartRequest, ChartStyle, Orientation, Palette, SvgChartRenderer};
pub use config::{PipelineArgs, ReportConfig};
pub use error_handling::{ReportError, ReportResult};
pub use flattener::RecordFlattener;
pub use message_extractor::MessageExtractor;
pub use pipeline::{Pipeline, RunSummary};
pub use reports::{ReportOutcome, ReportSpec, CATALOGUE};
pub use row::{Column, EnrichedRow, EnrichedRowSet, FlatRow, RowSet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
