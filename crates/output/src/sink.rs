//! Append-only tick file writer.
//!
//! Several input files (and, after ticker normalization, several tickers)
//! can map to the same output path. Every append to a path holds that
//! path's lock for the whole write so lines from different files never
//! interleave.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tickpack_core::config::{OutputConfig, OutputLayout};
use tickpack_core::{normalize_ticker, Error, Result, TickRecord};

/// Shared writer for all tick files of a run.
#[derive(Debug)]
pub struct OutputSink {
    root: PathBuf,
    layout: OutputLayout,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl OutputSink {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            root: config.root.clone(),
            layout: config.layout,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Output directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tick file for a ticker and trading date.
    pub fn tick_file_path(&self, ticker: &str, date: NaiveDate) -> PathBuf {
        let ticker = normalize_ticker(ticker);
        let file_name = format!("tick_{}_{}.txt", ticker, date.format("%Y%m%d"));
        match self.layout {
            OutputLayout::Flat => self.root.join(file_name),
            OutputLayout::PerTicker => self.root.join(&ticker).join(file_name),
        }
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Append records to `path`, creating the file and its directory if
    /// needed. Returns the number of lines written.
    ///
    /// The file is created even when `records` is empty.
    pub fn append(&self, path: &Path, records: &[TickRecord]) -> Result<u64> {
        let lock = self.lock_for(path);
        let _guard = lock.lock();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::output_write(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::output_write(path, e))?;

        let mut writer = BufWriter::new(file);
        for record in records {
            writeln!(writer, "{record}").map_err(|e| Error::output_write(path, e))?;
        }
        writer.flush().map_err(|e| Error::output_write(path, e))?;

        Ok(records.len() as u64)
    }
}
