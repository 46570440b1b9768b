//! Constants for the download module (timeouts, polling intervals).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Interval between reachability probes while waiting out a network outage.
pub const REACHABILITY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Suffix appended to a destination path for the in-progress temp file.
pub const PART_SUFFIX: &str = "part";
