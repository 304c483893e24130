//! tickpack: aggregate downloaded order-book logs into tick files.
//!
//! Usage:
//!   tickpack --input data --output parsed_data
//!   tickpack --config tickpack.json --concurrency 5 --report run.json
//!   tickpack --layout per-ticker --ignore-set --no-archive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tickpack_core::config::{OutputLayout, SetActionPolicy};
use tickpack_core::{Config, RunReport, TickerOutcome};
use tickpack_pipeline::run_pipeline;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Aggregate gzip order-book logs into normalized tick files.
#[derive(Parser, Debug)]
#[command(name = "tickpack")]
#[command(about = "Aggregate order-book event logs into tick files and archive them")]
struct Cli {
    /// JSON configuration file; flags below override it
    #[arg(short, long, env = "TICKPACK_CONFIG")]
    config: Option<PathBuf>,

    /// Input root holding one directory per ticker
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory for tick files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Archive destination
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Skip the final archive
    #[arg(long)]
    no_archive: bool,

    /// Maximum tickers processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-file decode budget in seconds (fractions allowed)
    #[arg(long)]
    file_timeout: Option<f64>,

    /// Output directory layout
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Drop `set` events instead of tracking them
    #[arg(long)]
    ignore_set: bool,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Flat,
    PerTicker,
}

impl From<LayoutArg> for OutputLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Flat => OutputLayout::Flat,
            LayoutArg::PerTicker => OutputLayout::PerTicker,
        }
    }
}

impl Cli {
    fn into_config(self) -> Result<(Config, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(input) = self.input {
            config.input.root = input;
        }
        if let Some(output) = self.output {
            config.output.root = output;
        }
        if let Some(archive) = self.archive {
            config.archive.path = archive;
        }
        if self.no_archive {
            config.archive.enabled = false;
        }
        if let Some(concurrency) = self.concurrency {
            config.scheduler.max_concurrent_tickers = concurrency;
        }
        if let Some(secs) = self.file_timeout {
            config.scheduler.file_timeout_secs = secs;
        }
        if let Some(layout) = self.layout {
            config.output.layout = layout.into();
        }
        if self.ignore_set {
            config.aggregation.set_actions = SetActionPolicy::Ignore;
        }

        config.validate().context("invalid configuration")?;
        Ok((config, self.report))
    }
}

fn log_summary(report: &RunReport) {
    for ticker in &report.tickers {
        match &ticker.outcome {
            TickerOutcome::Completed => info!(
                ticker = %ticker.ticker,
                files = ticker.files_processed,
                skipped_files = ticker.skipped_files.len(),
                rows = ticker.rows_folded,
                skipped_rows = ticker.rows_skipped,
                lines = ticker.lines_written,
                "completed"
            ),
            TickerOutcome::Failed { error } => error!(ticker = %ticker.ticker, %error, "failed"),
            TickerOutcome::Cancelled => warn!(ticker = %ticker.ticker, "cancelled"),
        }
    }

    let elapsed = report.finished_at - report.started_at;
    info!(
        tickers = report.tickers.len(),
        failed = report.failed_tickers().count(),
        lines = report.total_lines(),
        elapsed_ms = elapsed.num_milliseconds(),
        "Run finished"
    );
    if let Some(archive) = &report.archive {
        info!(archive = %archive.display(), "Archive ready");
    }
    if let Some(err) = &report.archive_error {
        error!(error = %err, "Archive failed");
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (config, report_path) = Cli::parse().into_config()?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight files");
            on_signal.cancel();
        }
    });

    info!(
        input = %config.input.root.display(),
        output = %config.output.root.display(),
        concurrency = config.scheduler.max_concurrent_tickers,
        "Starting run"
    );
    let report = run_pipeline(config, cancel).await.context("pipeline run failed")?;
    log_summary(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
