//! Ingestion outcome types

use serde::{Deserialize, Serialize};

/// Default cap on the number of row errors kept in a result
pub const DEFAULT_ERROR_LIMIT: usize = 100;

/// A row that did not make it into storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based data row number (the header row is not counted)
    pub row: u64,
    pub error: String,
}

/// Final outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub processed: u64,
    pub failed: u64,
    /// Wall-clock duration in milliseconds
    pub duration: u64,
    pub errors: Vec<RowError>,
}

/// Running failure tally
///
/// Counts every failure but keeps at most `limit` entries, so memory stays
/// bounded however bad the input file is.
#[derive(Debug)]
pub struct ErrorLog {
    failed: u64,
    entries: Vec<RowError>,
    limit: usize,
}

impl ErrorLog {
    pub fn new(limit: usize) -> Self {
        Self {
            failed: 0,
            entries: Vec::with_capacity(limit.min(DEFAULT_ERROR_LIMIT)),
            limit,
        }
    }

    pub fn record(&mut self, row: u64, error: impl Into<String>) {
        self.failed += 1;
        if self.entries.len() < self.limit {
            self.entries.push(RowError {
                row,
                error: error.into(),
            });
        }
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn entries(&self) -> &[RowError] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<RowError> {
        self.entries
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LIMIT)
    }
}
