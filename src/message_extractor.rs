//! Sub-message extraction from generic network-device events.
//!
//! Network devices forward free-text lines that Wazuh only matches with a
//! catch-all rule. The interesting part of such a line sits between the first
//! `;` and the following `.`.

use regex::Regex;
use tracing::debug;

use crate::error_handling::{ReportError, ReportResult};
use crate::row::EnrichedRow;

/// Marker phrase selecting catch-all rows
pub const DEFAULT_MARKER: &str = "Generic event";

/// Messages shorter than this many characters are discarded
pub const DEFAULT_MIN_LENGTH: usize = 6;

const SUB_MESSAGE_PATTERN: &str = r";(.*?)\.";

/// Extracts sub-messages from `full_log`
#[derive(Debug, Clone)]
pub struct MessageExtractor {
    marker: String,
    min_length: usize,
    pattern: Regex,
}

impl MessageExtractor {
    /// Extractor with the default marker and minimum length
    pub fn with_defaults() -> ReportResult<Self> {
        Self::new(DEFAULT_MARKER, DEFAULT_MIN_LENGTH)
    }

    pub fn new<S: Into<String>>(marker: S, min_length: usize) -> ReportResult<Self> {
        let pattern = Regex::new(SUB_MESSAGE_PATTERN).map_err(|e| {
            ReportError::configuration_with_source("Invalid sub-message pattern", e.into())
        })?;
        Ok(Self {
            marker: marker.into(),
            min_length,
            pattern,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Text between the first `;` and the next `.`, trimmed.
    ///
    /// Returns `None` when either delimiter is missing.
    pub fn extract<'a>(&self, full_log: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(full_log)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }

    /// Extract and apply the minimum-length filter
    pub fn extract_message(&self, full_log: &str) -> Option<String> {
        self.extract(full_log)
            .filter(|message| message.chars().count() >= self.min_length)
            .map(str::to_string)
    }

    /// Messages of every marked row, in row order
    pub fn messages<'a, I>(&self, rows: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a EnrichedRow>,
    {
        let mut marked = 0usize;
        let messages: Vec<String> = rows
            .into_iter()
            .filter(|row| row.row.description_contains(&self.marker))
            .inspect(|_| marked += 1)
            .filter_map(|row| row.row.full_log.as_deref())
            .filter_map(|full_log| self.extract_message(full_log))
            .collect();
        debug!(
            "Extracted {} sub-messages from {} rows marked '{}'",
            messages.len(),
            marked,
            self.marker
        );
        messages
    }

    /// Number of rows the marker selects
    pub fn marked_rows<'a, I>(&self, rows: I) -> usize
    where
        I: IntoIterator<Item = &'a EnrichedRow>,
    {
        rows.into_iter()
            .filter(|row| row.row.description_contains(&self.marker))
            .count()
    }
}
