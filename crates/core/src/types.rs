//! Core data types for the tickpack pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Characters stripped from ticker names when building output file names.
pub const TICKER_SEPARATORS: &[char] = &['_', '-', '/'];

/// Normalize a ticker for output file names: `BTC_USDT` -> `BTCUSDT`.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.chars().filter(|c| !TICKER_SEPARATORS.contains(c)).collect()
}

/// Order-book event tag from the raw log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Liquidity added; accumulated as buy volume.
    Make,
    /// Liquidity removed; accumulated as sell volume.
    Take,
    /// Absolute level reset.
    Set,
    /// Any tag we don't know about yet.
    Other,
}

impl Action {
    /// Parse the raw action token. Unknown tokens map to [`Action::Other`].
    pub fn parse(token: &str) -> Self {
        match token {
            "make" => Action::Make,
            "take" => Action::Take,
            "set" => Action::Set,
            _ => Action::Other,
        }
    }
}

/// Side code written to tick files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Bid side.
    Buy = 1,
    /// Ask side.
    Sell = 2,
}

impl Side {
    /// Numeric code used in the tick line.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Fixed positions of the raw CSV columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub timestamp: usize,
    pub side: usize,
    pub action: usize,
    pub price: usize,
    pub amount: usize,
    pub begin_id: usize,
    pub merged: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            timestamp: 0,
            side: 1,
            action: 2,
            price: 3,
            amount: 4,
            begin_id: 5,
            merged: 6,
        }
    }
}

impl ColumnMap {
    /// Columns the aggregation reads, by name.
    pub fn required(&self) -> [(&'static str, usize); 5] {
        [
            ("timestamp", self.timestamp),
            ("action", self.action),
            ("price", self.price),
            ("amount", self.amount),
            ("begin_id", self.begin_id),
        ]
    }
}

/// Aggregation key: exact timestamp text and exact price text.
///
/// Both stay as the input tokens so prices are written back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    pub timestamp: String,
    pub price: String,
}

impl BucketKey {
    pub fn new(timestamp: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            price: price.into(),
        }
    }
}

/// Running totals for one (timestamp, price) bucket within one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeAmounts {
    /// Sum of `make` amounts.
    pub buy_amount: f64,
    /// Sum of `take` amounts.
    pub sell_amount: f64,
    /// Sum of `set` amounts.
    pub set_amount: f64,
    /// Begin id of the last event folded into this bucket.
    pub begin_id: String,
}

impl CumulativeAmounts {
    /// Fold one event into the bucket.
    pub fn apply(&mut self, action: Action, amount: f64, begin_id: &str) {
        self.begin_id.clear();
        self.begin_id.push_str(begin_id);
        match action {
            Action::Make => self.buy_amount += amount,
            Action::Take => self.sell_amount += amount,
            Action::Set => self.set_amount += amount,
            Action::Other => {}
        }
    }
}

/// One output line of a tick file.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    /// UTC source time, `YYYY-MM-DD HH:MM:SS.ffffff`.
    pub source_time: String,
    pub begin_id: String,
    pub record_type: char,
    pub venue: String,
    pub side: Side,
    /// Price token exactly as it appeared in the input.
    pub price: String,
    pub amount: f64,
}

impl fmt::Display for TickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Source time appears twice; the trailing fields are placeholders
        // the downstream schema expects.
        write!(
            f,
            "{},{},{},{},{},{},{},{:.6},,,,0",
            self.source_time,
            self.source_time,
            self.begin_id,
            self.record_type,
            self.venue,
            self.side.code(),
            self.price,
            self.amount,
        )
    }
}
