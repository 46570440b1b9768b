//! Segment fetch scheduler: ordered, strictly sequential batch fetching.
//!
//! Given an ordered list of [`DownloadTarget`]s the scheduler fetches each
//! into place one at a time, skipping targets whose destination already
//! exists (idempotent re-runs cost no network I/O) and reporting aggregate
//! throughput. Sequencing is a deliberate design choice: segment order and
//! the shared progress counters are never touched concurrently, and target
//! N+1 is never issued before target N resolves.

use std::cell::Cell;
use std::time::Instant;

use tracing::{debug, info, instrument};

use super::engine::TransferEngine;
use super::error::DownloadError;
use super::target::DownloadTarget;
use crate::progress::{ProgressLine, percent_of, throughput_kb_per_sec};

/// Outcome of a batch fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    /// Targets now present on disk (fetched plus skipped).
    pub completed: usize,
    /// Targets skipped because their destination already existed.
    pub skipped: usize,
    /// Bytes actually transferred during this run.
    pub bytes: u64,
}

/// Fetches ordered target lists through a [`TransferEngine`].
pub struct SegmentScheduler<'a> {
    engine: &'a TransferEngine,
}

impl<'a> SegmentScheduler<'a> {
    /// Creates a scheduler borrowing the shared engine.
    #[must_use]
    pub fn new(engine: &'a TransferEngine) -> Self {
        Self { engine }
    }

    /// Fetches every target, in order, one at a time.
    ///
    /// Progress percent is by count of completed targets; throughput is
    /// cumulative bytes over wall time since the batch started, refreshed on
    /// every chunk received.
    ///
    /// # Errors
    ///
    /// Returns the first permanent transfer error (or, under a bounded
    /// retry policy, the first exhaustion). Transient failures are absorbed
    /// by the engine and never surface here.
    #[instrument(skip(self, targets, progress), fields(targets = targets.len()))]
    pub async fn fetch_all(
        &self,
        targets: &[DownloadTarget],
        progress: &ProgressLine,
    ) -> Result<SchedulerStats, DownloadError> {
        let total = targets.len() as u64;
        let started = Instant::now();
        let cumulative = Cell::new(0u64);
        let mut stats = SchedulerStats::default();

        progress.set(0, 0);

        for target in targets {
            if tokio::fs::try_exists(&target.dest).await.unwrap_or(false) {
                debug!(path = %target.dest.display(), "already exists, nothing to do");
                stats.completed += 1;
                stats.skipped += 1;
                progress.set(
                    percent_of(stats.completed as u64, total),
                    throughput_kb_per_sec(cumulative.get(), started.elapsed()),
                );
                continue;
            }

            let done_before = stats.completed as u64;
            self.engine
                .transfer(target, |chunk| {
                    cumulative.set(cumulative.get() + chunk.chunk_bytes);
                    progress.set(
                        percent_of(done_before, total),
                        throughput_kb_per_sec(cumulative.get(), started.elapsed()),
                    );
                })
                .await?;

            stats.completed += 1;
            progress.set(
                percent_of(stats.completed as u64, total),
                throughput_kb_per_sec(cumulative.get(), started.elapsed()),
            );
        }

        stats.bytes = cumulative.get();
        progress.set(
            percent_of(stats.completed as u64, total),
            throughput_kb_per_sec(stats.bytes, started.elapsed()),
        );

        info!(
            completed = stats.completed,
            skipped = stats.skipped,
            bytes = stats.bytes,
            "batch fetch finished"
        );

        Ok(stats)
    }
}
