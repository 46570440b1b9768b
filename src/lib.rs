//! Conference Session Downloader Core Library
//!
//! This library bulk-downloads a conference video catalog: it enumerates
//! sessions from the index page, extracts each session's resource links,
//! and fetches videos (progressive files or segmented streams), slide PDFs
//! and sample-code archives to local disk, resuming interrupted transfers
//! and skipping work already done.
//!
//! # Architecture
//!
//! - [`catalog`] - session index and resource link extraction (regex over HTML)
//! - [`manifest`] - playlist parsing and quality-variant resolution
//! - [`download`] - resumable transfer engine and sequential segment scheduler
//! - [`assemble`] - external-tool segment concatenation with progress tracking
//! - [`pipeline`] - per-session orchestration with failure isolation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assemble;
pub mod catalog;
pub mod download;
pub mod manifest;
pub mod pipeline;
pub mod progress;

// Re-export commonly used types
pub use assemble::{AssembleError, Assembler, find_tool};
pub use catalog::{Catalog, SessionResources, output_filename, url_basename};
pub use download::{
    AssumeConnected, ChunkProgress, DownloadError, DownloadTarget, HttpClient, Reachability,
    RetryLimit, SchedulerStats, SegmentScheduler, TcpReachability, TransferEngine,
};
pub use manifest::{ManifestError, SegmentManifest};
pub use pipeline::{Pipeline, PipelineConfig, Quality, RunSummary};
pub use progress::ProgressLine;
