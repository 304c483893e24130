//! Per-ticker and per-run summaries.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a ticker task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickerOutcome {
    Completed,
    Failed { error: String },
    Cancelled,
}

/// A file that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Work done for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerReport {
    pub ticker: String,
    pub outcome: TickerOutcome,
    /// Files aggregated and written.
    pub files_processed: u64,
    /// Files skipped because of file-scoped errors.
    pub skipped_files: Vec<SkippedFile>,
    /// Rows folded into buckets.
    pub rows_folded: u64,
    /// Rows dropped as malformed.
    pub rows_skipped: u64,
    /// Tick lines appended across all output files.
    pub lines_written: u64,
}

impl TickerReport {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            outcome: TickerOutcome::Completed,
            files_processed: 0,
            skipped_files: Vec::new(),
            rows_folded: 0,
            rows_skipped: 0,
            lines_written: 0,
        }
    }

    /// Mark the ticker failed, keeping the counters gathered so far.
    pub fn fail(mut self, error: impl ToString) -> Self {
        self.outcome = TickerOutcome::Failed {
            error: error.to_string(),
        };
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.outcome = TickerOutcome::Cancelled;
        self
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, TickerOutcome::Failed { .. })
    }
}

/// Summary of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per ticker, sorted by ticker name.
    pub tickers: Vec<TickerReport>,
    /// Archive written at the end of the run, if any.
    pub archive: Option<PathBuf>,
    /// Archive failure, reported without failing the tickers.
    pub archive_error: Option<String>,
}

impl RunReport {
    pub fn failed_tickers(&self) -> impl Iterator<Item = &TickerReport> {
        self.tickers.iter().filter(|t| t.is_failed())
    }

    /// True when every ticker completed and archiving (if attempted) worked.
    pub fn is_success(&self) -> bool {
        self.archive_error.is_none()
            && self
                .tickers
                .iter()
                .all(|t| t.outcome == TickerOutcome::Completed)
    }

    pub fn total_lines(&self) -> u64 {
        self.tickers.iter().map(|t| t.lines_written).sum()
    }
}
