//! Bounded fan-out of ticker walkers.
//!
//! One task per ticker, at most `max_concurrent_tickers` alive at a time.
//! A permit is acquired before a task is spawned and released when the task
//! ends, so the cap holds for the whole run.
//!
//! Tickers whose names normalize to the same output name (`BTC_USDT`,
//! `BTC-USDT`) would append to the same tick files in scheduling order. Only
//! the first of them in sorted order is processed; the rest fail.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tickpack_core::{normalize_ticker, Error, Result, TickerReport};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::context::PipelineContext;
use crate::walker::{list_sorted, EntryKind, TickerWalker};

/// Runs every ticker under the input root.
pub struct Scheduler {
    ctx: Arc<PipelineContext>,
}

impl Scheduler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    /// Ticker directories under the input root, sorted.
    pub async fn discover_tickers(&self) -> Result<Vec<String>> {
        list_sorted(&self.ctx.config.input.root, EntryKind::Dirs).await
    }

    /// Process all tickers and wait for every task to finish.
    ///
    /// Individual ticker failures are captured in their reports. Only an
    /// unreadable input root fails the whole call. Once `cancel` fires no
    /// further tickers are started; those are reported as cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<Vec<TickerReport>> {
        let tickers = self.discover_tickers().await?;
        let limit = self.ctx.config.scheduler.max_concurrent_tickers;
        info!(tickers = tickers.len(), limit, "Scheduling tickers");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();
        let mut reports = Vec::with_capacity(tickers.len());
        let mut output_names: HashMap<String, String> = HashMap::new();
        let mut started = BTreeSet::new();

        for ticker in tickers {
            if let Some(owner) = claim_output_name(&mut output_names, &ticker) {
                error!(ticker = %ticker, owner = %owner, "Output name already taken");
                reports.push(TickerReport::new(&ticker).fail(format!(
                    "output name {} is already used by ticker {owner}",
                    normalize_ticker(&ticker)
                )));
                continue;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    reports.push(TickerReport::new(ticker).cancelled());
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| Error::Cancelled)?
                }
            };

            started.insert(ticker.clone());
            let walker = TickerWalker::new(ticker.clone(), self.ctx.clone());
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                // Inner task so a panic is reported against its ticker.
                match tokio::spawn(walker.run(cancel)).await {
                    Ok(report) => report,
                    Err(err) => {
                        error!(ticker = %ticker, error = %err, "Ticker task panicked");
                        TickerReport::new(ticker).fail(format!("ticker task panicked: {err}"))
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    started.remove(&report.ticker);
                    reports.push(report);
                }
                Err(err) => warn!(error = %err, "Ticker supervisor ended abnormally"),
            }
        }
        reports.extend(unreported(started));

        reports.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(reports)
    }
}

/// Record `ticker` as the owner of its normalized output name. Returns the
/// earlier owner if the name is already taken.
fn claim_output_name(owners: &mut HashMap<String, String>, ticker: &str) -> Option<String> {
    let name = normalize_ticker(ticker);
    match owners.get(&name) {
        Some(owner) => Some(owner.clone()),
        None => {
            owners.insert(name, ticker.to_string());
            None
        }
    }
}

/// Failed reports for started tickers whose task never returned one.
fn unreported(tickers: BTreeSet<String>) -> impl Iterator<Item = TickerReport> {
    tickers
        .into_iter()
        .map(|ticker| TickerReport::new(ticker).fail("ticker task ended without a report"))
}
