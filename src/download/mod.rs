//! Resumable HTTP download engine.
//!
//! This module provides the transfer machinery shared by single-file assets
//! (progressive video, PDFs, sample-code archives) and per-segment streamed
//! video:
//!
//! - Streaming downloads into `.part` temp files with byte-range resume
//! - Atomic materialization of destinations (absent or complete, never partial)
//! - Retry-forever policy with reachability waits on network loss
//! - Strictly sequential batch scheduling with aggregate throughput

mod client;
mod constants;
mod engine;
mod error;
mod reachability;
mod scheduler;
mod target;

pub use client::{ChunkProgress, HttpClient};
pub use engine::{RetryLimit, TransferEngine};
pub use error::DownloadError;
pub use reachability::{AssumeConnected, Reachability, TcpReachability};
pub use scheduler::{SchedulerStats, SegmentScheduler};
pub use target::DownloadTarget;

// Note: no module-local Result alias; function signatures spell out
// `Result<T, DownloadError>` explicitly.
