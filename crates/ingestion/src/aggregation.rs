//! Per-file aggregation of order-book events into (timestamp, price) buckets.
//!
//! Timestamp and price stay as the input text tokens; only the amount is
//! parsed. A table lives for exactly one input file.

use std::collections::BTreeMap;
use std::path::Path;

use csv::StringRecord;
use tickpack_core::config::SetActionPolicy;
use tickpack_core::{
    Action, BucketKey, ColumnMap, CumulativeAmounts, Error, Result, RowParseError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::decoder::RecordDecoder;

/// Detailed warnings logged per file before switching to a summary.
const MAX_ROW_WARNINGS: u64 = 5;

/// Rows between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Row counters for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Rows produced by the decoder, including malformed ones.
    pub rows_read: u64,
    /// Rows that passed parsing and were applied (or deliberately ignored).
    pub rows_folded: u64,
    /// Rows dropped as malformed.
    pub rows_skipped: u64,
}

/// Buckets accumulated from one input file, ordered by key.
#[derive(Debug, Clone, Default)]
pub struct AggregationTable {
    buckets: BTreeMap<BucketKey, CumulativeAmounts>,
    set_actions: SetActionPolicy,
}

impl AggregationTable {
    /// Create an empty table.
    pub fn new(set_actions: SetActionPolicy) -> Self {
        Self {
            buckets: BTreeMap::new(),
            set_actions,
        }
    }

    /// Fold one raw row into the table.
    ///
    /// The row's begin id overwrites the bucket's; the amount is added to the
    /// buy, sell or set total depending on the action. Unknown actions still
    /// create the bucket and update the begin id but add nothing.
    pub fn fold_record(
        &mut self,
        record: &StringRecord,
        columns: &ColumnMap,
    ) -> std::result::Result<(), RowParseError> {
        for (column, index) in columns.required() {
            if record.get(index).is_none() {
                return Err(RowParseError::MissingColumn {
                    column,
                    index,
                    len: record.len(),
                });
            }
        }
        let field = |index: usize| record.get(index).unwrap_or_default();

        let action = Action::parse(field(columns.action));
        let amount_text = field(columns.amount);
        let amount = amount_text
            .parse::<f64>()
            .ok()
            .filter(|amount| amount.is_finite())
            .ok_or_else(|| RowParseError::InvalidAmount(amount_text.to_string()))?;

        if action == Action::Set && self.set_actions == SetActionPolicy::Ignore {
            return Ok(());
        }

        let key = BucketKey::new(field(columns.timestamp), field(columns.price));
        self.buckets
            .entry(key)
            .or_default()
            .apply(action, amount, field(columns.begin_id));
        Ok(())
    }

    /// Fold every row from `rows`, skipping malformed ones.
    ///
    /// Stops with the first non-row error (a corrupt stream) or with
    /// [`Error::Cancelled`] once `cancel` fires. A partially built table is
    /// never returned.
    pub fn build<I>(
        rows: I,
        columns: &ColumnMap,
        set_actions: SetActionPolicy,
        cancel: &CancellationToken,
    ) -> Result<(Self, FoldStats)>
    where
        I: IntoIterator<Item = Result<StringRecord>>,
    {
        let mut table = Self::new(set_actions);
        let mut stats = FoldStats::default();

        for row in rows {
            stats.rows_read += 1;
            if stats.rows_read % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let outcome = match row {
                Ok(record) => table.fold_record(&record, columns),
                Err(Error::RowParse(err)) => Err(err),
                Err(err) => return Err(err),
            };

            match outcome {
                Ok(()) => stats.rows_folded += 1,
                Err(err) => {
                    stats.rows_skipped += 1;
                    if stats.rows_skipped <= MAX_ROW_WARNINGS {
                        warn!(row = stats.rows_read, error = %err, "Skipping malformed row");
                    }
                }
            }
        }

        if stats.rows_skipped > MAX_ROW_WARNINGS {
            warn!(
                skipped = stats.rows_skipped,
                read = stats.rows_read,
                "Skipped malformed rows"
            );
        }

        Ok((table, stats))
    }

    /// Decode and aggregate one compressed log.
    pub fn from_file(
        path: &Path,
        columns: &ColumnMap,
        set_actions: SetActionPolicy,
        cancel: &CancellationToken,
    ) -> Result<(Self, FoldStats)> {
        let decoder = RecordDecoder::open(path)?;
        let (table, stats) = Self::build(decoder, columns, set_actions, cancel)?;
        debug!(
            path = %path.display(),
            buckets = table.len(),
            rows = stats.rows_folded,
            "Aggregated file"
        );
        Ok((table, stats))
    }

    /// Look up a bucket by its text tokens.
    pub fn get(&self, timestamp: &str, price: &str) -> Option<&CumulativeAmounts> {
        self.buckets.get(&BucketKey::new(timestamp, price))
    }

    /// Buckets in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &CumulativeAmounts)> {
        self.buckets.iter()
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
