//! Configuration structures for the tickpack pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ColumnMap;

/// Main configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input tree location and layout.
    pub input: InputConfig,
    /// Aggregation behavior.
    pub aggregation: AggregationConfig,
    /// Tick file output.
    pub output: OutputConfig,
    /// Ticker scheduling.
    pub scheduler: SchedulerConfig,
    /// Final archive.
    pub archive: ArchiveConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing sections take defaults.
    ///
    /// The result is not validated; call [`Config::validate`] once every
    /// override has been applied.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::input_access(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_concurrent_tickers == 0 {
            return Err(Error::config("max_concurrent_tickers must be at least 1"));
        }
        let timeout = self.scheduler.file_timeout_secs;
        if !(timeout > 0.0 && timeout.is_finite()) {
            return Err(Error::config("file_timeout_secs must be positive"));
        }
        if !(self.output.zero_epsilon >= 0.0) {
            return Err(Error::config("zero_epsilon must be non-negative"));
        }
        if self.input.file_suffix.is_empty() {
            return Err(Error::config("file_suffix must not be empty"));
        }
        if self.output.venue.contains(',') || self.output.record_type == ',' {
            return Err(Error::config("venue and record_type must not contain ','"));
        }
        Ok(())
    }
}

/// Where the downloaded logs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Root directory holding one subdirectory per ticker.
    pub root: PathBuf,
    /// Business type directory under each ticker (e.g. "spot").
    pub biz_type: String,
    /// Data type directory under the business type (e.g. "orderbooks").
    pub data_type: String,
    /// Only files with this suffix are processed.
    pub file_suffix: String,
    /// Raw CSV column positions.
    pub columns: ColumnMap,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            biz_type: "spot".to_string(),
            data_type: "orderbooks".to_string(),
            file_suffix: ".csv.gz".to_string(),
            columns: ColumnMap::default(),
        }
    }
}

impl InputConfig {
    /// Directory holding the date folders for a ticker.
    pub fn ticker_data_dir(&self, ticker: &str) -> PathBuf {
        self.root.join(ticker).join(&self.biz_type).join(&self.data_type)
    }
}

/// What to do with `set` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetActionPolicy {
    /// Accumulate into the bucket's set amount.
    #[default]
    Track,
    /// Drop `set` rows before they reach a bucket.
    Ignore,
}

/// Aggregation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub set_actions: SetActionPolicy,
}

/// Output directory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `<root>/tick_<TICKER>_<YYYYMMDD>.txt`
    #[default]
    Flat,
    /// `<root>/<TICKER>/tick_<TICKER>_<YYYYMMDD>.txt`
    PerTicker,
}

/// Tick file configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory.
    pub root: PathBuf,
    /// Flat or per-ticker subdirectories.
    pub layout: OutputLayout,
    /// Record type code written on every line.
    pub record_type: char,
    /// Venue tag written on every line.
    pub venue: String,
    /// Amounts with magnitude at or below this are treated as zero.
    pub zero_epsilon: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("parsed_data"),
            layout: OutputLayout::Flat,
            record_type: 'P',
            venue: "IEX".to_string(),
            zero_epsilon: 1e-8,
        }
    }
}

/// Ticker scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tickers processed at once.
    pub max_concurrent_tickers: usize,
    /// Budget for decoding and aggregating a single file, in seconds.
    /// Fractions are allowed.
    pub file_timeout_secs: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tickers: 8,
            file_timeout_secs: 300.0,
        }
    }
}

impl SchedulerConfig {
    pub fn file_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.file_timeout_secs).unwrap_or(Duration::MAX)
    }
}

/// Archive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Bundle the output directory once all tickers finish.
    pub enabled: bool,
    /// Destination of the `.tar.gz`.
    pub path: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("parsed_data.tar.gz"),
        }
    }
}
