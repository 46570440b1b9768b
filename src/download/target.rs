//! Unit-of-work description for a single transfer.

use std::ffi::OsString;
use std::path::PathBuf;

use super::constants::PART_SUFFIX;

/// One unit of download work: a source URL and where its bytes should land.
///
/// Immutable once created. The destination path is only ever materialized
/// atomically on success; while a transfer is in flight the bytes live at
/// [`part_path`](Self::part_path).
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    /// Source URL to fetch.
    pub url: String,
    /// Final destination path. Never partially written.
    pub dest: PathBuf,
    /// Expected total size in bytes, when the caller knows it up front.
    pub expected_bytes: Option<u64>,
}

impl DownloadTarget {
    /// Creates a target for `url` landing at `dest`.
    #[must_use]
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            expected_bytes: None,
        }
    }

    /// Sets the expected total size for progress reporting.
    #[must_use]
    pub fn with_expected_bytes(mut self, bytes: u64) -> Self {
        self.expected_bytes = Some(bytes);
        self
    }

    /// The temp path bytes are streamed to while the transfer is in flight.
    ///
    /// `<dest>.part`, alongside the destination so the final rename stays on
    /// one filesystem.
    #[must_use]
    pub fn part_path(&self) -> PathBuf {
        let mut name = OsString::from(self.dest.as_os_str());
        name.push(".");
        name.push(PART_SUFFIX);
        PathBuf::from(name)
    }
}
