//! Single-line console progress rendering.
//!
//! One continuously-overwritten line showing percent complete and current
//! throughput. Purely informational; nothing parses it.

use indicatif::{ProgressBar, ProgressStyle};

/// In-place progress line: `[#####   ] 42% 1234KB/s`.
///
/// Positions are percentages in `[0, 100]`. All three pipeline stages render
/// through this type: file transfers (byte percent), segment batches (count
/// percent), and assembly (size-normalized percent).
pub struct ProgressLine {
    bar: ProgressBar,
}

impl ProgressLine {
    /// Creates a visible progress line at 0%.
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("[{bar:70}] {percent:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("## "),
        );
        Self { bar }
    }

    /// Creates a progress line that draws nothing (quiet mode, tests).
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Updates percent and throughput message.
    pub fn set(&self, percent: u8, kb_per_sec: u64) {
        self.bar.set_position(u64::from(percent.min(100)));
        self.bar.set_message(format!("{kb_per_sec}KB/s"));
    }

    /// Completes the line, leaving it on screen.
    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Abandons the line without forcing it to 100%.
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl Default for ProgressLine {
    fn default() -> Self {
        Self::new()
    }
}

/// Throughput in whole kilobytes per second, truncated.
///
/// `cumulative_bytes / 1024 / elapsed_seconds`, 0 while no time has passed.
#[must_use]
pub fn throughput_kb_per_sec(cumulative_bytes: u64, elapsed: std::time::Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (cumulative_bytes as f64 / 1024.0 / secs).floor() as u64
    }
}

/// Percentage of `done` over `total` as a value in `[0, 100]`.
#[must_use]
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation)]
    {
        (done.saturating_mul(100) / total).min(100) as u8
    }
}
