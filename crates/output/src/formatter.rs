//! Tick line rendering.
//!
//! Converts an [`AggregationTable`] into tick records: one record per bucket
//! side whose amount is not (numerically) zero, buy before sell, buckets in
//! key order.

use chrono::{DateTime, NaiveDate, Utc};
use tickpack_core::config::OutputConfig;
use tickpack_core::{Error, Result, Side, TickRecord};
use tickpack_ingestion::AggregationTable;

/// Renders aggregated buckets as tick records.
#[derive(Debug, Clone)]
pub struct TickFormatter {
    record_type: char,
    venue: String,
    zero_epsilon: f64,
}

impl TickFormatter {
    /// Create a formatter from the output configuration.
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            record_type: config.record_type,
            venue: config.venue.clone(),
            zero_epsilon: config.zero_epsilon,
        }
    }

    /// Whether an accumulated amount should produce a line.
    #[inline]
    pub fn is_nonzero(&self, amount: f64) -> bool {
        amount.abs() > self.zero_epsilon
    }

    /// Render every non-zero bucket side of `table`.
    ///
    /// Fails with [`Error::Format`] on the first timestamp that cannot be
    /// parsed; nothing is returned for the table in that case.
    pub fn render(&self, table: &AggregationTable) -> Result<Vec<TickRecord>> {
        let mut records = Vec::with_capacity(table.len());
        // Buckets are ordered by timestamp first, so consecutive keys
        // usually share the formatted time.
        let mut last_time: Option<(&str, String)> = None;

        for (key, amounts) in table.iter() {
            if last_time.as_ref().map_or(true, |(ts, _)| *ts != key.timestamp) {
                last_time = Some((key.timestamp.as_str(), format_source_time(&key.timestamp)?));
            }
            let Some((_, source_time)) = &last_time else {
                continue;
            };

            for (side, amount) in [(Side::Buy, amounts.buy_amount), (Side::Sell, amounts.sell_amount)] {
                if !self.is_nonzero(amount) {
                    continue;
                }
                records.push(TickRecord {
                    source_time: source_time.clone(),
                    begin_id: amounts.begin_id.clone(),
                    record_type: self.record_type,
                    venue: self.venue.clone(),
                    side,
                    price: key.price.clone(),
                    amount,
                });
            }
        }

        Ok(records)
    }
}

/// Convert fractional epoch seconds to `YYYY-MM-DD HH:MM:SS.ffffff` in UTC.
///
/// The fraction is rounded to the nearest microsecond; a fraction that rounds
/// up to a full second carries into the seconds field.
pub fn format_source_time(timestamp: &str) -> Result<String> {
    let seconds: f64 = timestamp
        .trim()
        .parse()
        .map_err(|_| Error::format(format!("invalid timestamp `{timestamp}`")))?;
    if !seconds.is_finite() {
        return Err(Error::format(format!("invalid timestamp `{timestamp}`")));
    }

    let mut whole = seconds.floor();
    let mut micros = ((seconds - whole) * 1e6).round();
    if micros >= 1e6 {
        whole += 1.0;
        micros -= 1e6;
    }

    let time = DateTime::<Utc>::from_timestamp(whole as i64, 0)
        .ok_or_else(|| Error::format(format!("timestamp `{timestamp}` out of range")))?;

    Ok(format!("{}.{:06}", time.format("%Y-%m-%d %H:%M:%S"), micros as u32))
}

/// Parse a `YYYY-MM-DD` date folder name.
pub fn parse_date_folder(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}
