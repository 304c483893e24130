//! Orchestration for the tickpack pipeline.
//!
//! This crate provides:
//! - Per-ticker traversal of date folders and log files
//! - Bounded concurrent scheduling of tickers
//! - The end-to-end run: all tickers, then the archive

pub mod context;
pub mod scheduler;
pub mod walker;

use std::sync::Arc;

use chrono::Utc;
use tickpack_core::{Config, Result, RunReport};
use tickpack_output::archive_directory;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use context::PipelineContext;
pub use scheduler::Scheduler;
pub use walker::TickerWalker;

/// Process every ticker under `config.input.root`, then archive the output.
///
/// Returns an error only if the configuration is invalid or the input root
/// cannot be listed; everything else is reported per ticker.
pub async fn run_pipeline(config: Config, cancel: CancellationToken) -> Result<RunReport> {
    let started_at = Utc::now();
    let ctx = Arc::new(PipelineContext::new(config)?);

    let tickers = Scheduler::new(ctx.clone()).run(cancel.clone()).await?;

    let mut archive = None;
    let mut archive_error = None;
    let archive_config = &ctx.config.archive;
    let output_root = ctx.sink.root().to_path_buf();
    if !archive_config.enabled {
        info!("Archiving disabled");
    } else if cancel.is_cancelled() {
        warn!("Run cancelled, skipping archive");
    } else if !output_root.is_dir() {
        warn!(output = %output_root.display(), "No output produced, skipping archive");
    } else {
        let dest = archive_config.path.clone();
        let task_dest = dest.clone();
        match tokio::task::spawn_blocking(move || archive_directory(&output_root, &task_dest)).await {
            Ok(Ok(_)) => archive = Some(dest),
            Ok(Err(err)) => archive_error = Some(err.to_string()),
            Err(err) => archive_error = Some(format!("archive task failed: {err}")),
        }
    }

    Ok(RunReport {
        started_at,
        finished_at: Utc::now(),
        tickers,
        archive,
        archive_error,
    })
}
