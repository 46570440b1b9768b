//! Error types for the download module.
//!
//! This module defines structured errors for all transfer operations,
//! providing context-rich error messages for diagnostics and user feedback.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during file transfers.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Connection dropped mid-body. The partial temp file is kept so the
    /// next attempt can resume from `bytes_received`.
    #[error("interrupted downloading {url} after {bytes_received} bytes: {source}")]
    Interrupted {
        /// The URL whose body stream failed.
        url: String,
        /// Bytes already written to the partial file (the resume token).
        bytes_received: u64,
        /// The underlying stream error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error during transfer (create file, write, rename, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Downloaded file size does not match expected server content length.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// Bounded retry policy exhausted without success.
    #[error("gave up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// The URL that never completed.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Display form of the last failure.
        last_error: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an interrupted-body error carrying resumable progress.
    pub fn interrupted(
        url: impl Into<String>,
        bytes_received: u64,
        source: reqwest::Error,
    ) -> Self {
        Self::Interrupted {
            url: url.into(),
            bytes_received,
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Whether the failure left resumable progress behind.
    ///
    /// Interrupted transfers keep their partial temp file; the engine resumes
    /// them with a byte-range request instead of restarting from zero.
    #[must_use]
    pub fn resume_bytes(&self) -> Option<u64> {
        match self {
            Self::Interrupted { bytes_received, .. } if *bytes_received > 0 => {
                Some(*bytes_received)
            }
            _ => None,
        }
    }

    /// Whether this failure is permanent with respect to retrying.
    ///
    /// Retrying a malformed URL or an HTTP 4xx cannot succeed; everything
    /// else is treated as transient (the engine's default policy retries
    /// transient failures indefinitely). Two 4xx exceptions: 429 clears on
    /// its own, and 416 means the byte-range request overshot the resource
    /// (a `.part` file that already holds the full body), which a fresh
    /// un-ranged attempt resolves.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::InvalidUrl { .. } | Self::RetriesExhausted { .. } => true,
            Self::HttpStatus { status, .. } => {
                (400..500).contains(status) && *status != 429 && *status != 416
            }
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Interrupted { .. }
            | Self::Io { .. }
            | Self::Integrity { .. } => false,
        }
    }
}

// Note on From trait implementations:
// We intentionally do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`
// because our error variants require context (url, path) that the source errors
// don't provide. The helper constructor methods (network(), io(), etc.) are the
// correct pattern here as they allow callers to provide necessary context.
