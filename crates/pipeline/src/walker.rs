//! Per-ticker traversal of date folders and log files.
//!
//! A walker owns one ticker for the whole run. Date folders and the files
//! inside them are visited in lexicographic order and strictly one at a
//! time, which fixes the append order of every tick file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tickpack_core::{Error, Result, SkippedFile, TickerReport};
use tickpack_ingestion::AggregationTable;
use tickpack_output::parse_date_folder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::PipelineContext;

/// Which kind of directory entries to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Dirs,
    Files,
}

/// Sorted entry names of `dir`.
pub(crate) async fn list_sorted(dir: &Path, kind: EntryKind) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::input_access(dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::input_access(dir, e))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map_err(|e| Error::input_access(entry.path(), e))?
            .is_dir();
        if is_dir != (kind == EntryKind::Dirs) {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => warn!(dir = %dir.display(), name = ?name, "Skipping non UTF-8 entry"),
        }
    }

    names.sort();
    Ok(names)
}

/// Processes every log file of one ticker.
pub struct TickerWalker {
    ticker: String,
    ctx: Arc<PipelineContext>,
}

impl TickerWalker {
    pub fn new(ticker: impl Into<String>, ctx: Arc<PipelineContext>) -> Self {
        Self {
            ticker: ticker.into(),
            ctx,
        }
    }

    /// Walk the ticker to completion.
    ///
    /// Ticker-fatal errors end the walk and mark the report failed; the
    /// counters collected up to that point are kept.
    pub async fn run(self, cancel: CancellationToken) -> TickerReport {
        let mut report = TickerReport::new(&self.ticker);
        info!(ticker = %self.ticker, "Ticker started");

        match self.walk(&mut report, &cancel).await {
            Ok(()) => {
                info!(
                    ticker = %self.ticker,
                    files = report.files_processed,
                    skipped = report.skipped_files.len(),
                    lines = report.lines_written,
                    "Ticker finished"
                );
                report
            }
            Err(Error::Cancelled) => {
                warn!(ticker = %self.ticker, "Ticker cancelled");
                report.cancelled()
            }
            Err(err) => {
                error!(ticker = %self.ticker, error = %err, "Ticker failed");
                report.fail(err)
            }
        }
    }

    async fn walk(&self, report: &mut TickerReport, cancel: &CancellationToken) -> Result<()> {
        let data_dir = self.ctx.config.input.ticker_data_dir(&self.ticker);

        for folder in list_sorted(&data_dir, EntryKind::Dirs).await? {
            let Some(date) = parse_date_folder(&folder) else {
                warn!(ticker = %self.ticker, folder = %folder, "Skipping folder without YYYY-MM-DD name");
                continue;
            };
            self.walk_date(&data_dir.join(&folder), date, report, cancel).await?;
        }
        Ok(())
    }

    async fn walk_date(
        &self,
        folder: &Path,
        date: NaiveDate,
        report: &mut TickerReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let suffix = &self.ctx.config.input.file_suffix;
        let output = self.ctx.sink.tick_file_path(&self.ticker, date);

        let files = list_sorted(folder, EntryKind::Files).await?;
        for name in files.iter().filter(|name| name.ends_with(suffix.as_str())) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let path = folder.join(name);
            match self.process_file(path.clone(), output.clone(), report, cancel).await {
                Ok(()) => {}
                Err(err) if !err.is_ticker_fatal() => {
                    warn!(ticker = %self.ticker, path = %path.display(), error = %err, "Skipping file");
                    report.skipped_files.push(SkippedFile {
                        path,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Aggregate one file under the per-file timeout, then render and append.
    async fn process_file(
        &self,
        path: PathBuf,
        output: PathBuf,
        report: &mut TickerReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(ticker = %self.ticker, path = %path.display(), "Processing file");

        let file_cancel = cancel.child_token();
        let timeout = self.ctx.config.scheduler.file_timeout();
        let aggregate = {
            let ctx = self.ctx.clone();
            let path = path.clone();
            let file_cancel = file_cancel.clone();
            tokio::task::spawn_blocking(move || {
                AggregationTable::from_file(
                    &path,
                    &ctx.config.input.columns,
                    ctx.config.aggregation.set_actions,
                    &file_cancel,
                )
            })
        };

        let (table, stats) = match tokio::time::timeout(timeout, aggregate).await {
            Ok(joined) => joined.map_err(|e| Error::Io(std::io::Error::other(e)))??,
            Err(_) => {
                // Stop the abandoned blocking fold at its next check.
                file_cancel.cancel();
                return Err(Error::Timeout {
                    path,
                    after: timeout,
                });
            }
        };
        report.rows_folded += stats.rows_folded;
        report.rows_skipped += stats.rows_skipped;

        let ctx = self.ctx.clone();
        let written = tokio::task::spawn_blocking(move || {
            let records = ctx.formatter.render(&table)?;
            ctx.sink.append(&output, &records)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        debug!(ticker = %self.ticker, path = %path.display(), lines = written, "File written");
        report.files_processed += 1;
        report.lines_written += written;
        Ok(())
    }
}
