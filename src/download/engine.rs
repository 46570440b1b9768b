//! Resumable transfer engine: the retry/resume state machine shared by
//! single-file and per-segment downloads.
//!
//! A transfer moves through `Idle → InFlight → {Succeeded, FailedRetryable,
//! FailedTerminal}`. Retryable failures carry resumable progress (bytes
//! already in the `.part` temp file) and are reissued with a byte-range
//! request; terminal-but-transient failures restart from byte zero. Before
//! any retry the engine consults a [`Reachability`] probe and, when the
//! network is down, polls it at a fixed one-second interval until it comes
//! back.
//!
//! The default policy is the documented "retry forever": there is no overall
//! timeout or attempt ceiling, and a permanently-down network stalls the
//! transfer indefinitely. [`RetryLimit::Bounded`] is an explicit opt-in
//! deviation that gives up after N attempts, with jittered exponential
//! backoff between them.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use super::client::{ChunkProgress, HttpClient};
use super::constants::REACHABILITY_POLL_INTERVAL;
use super::error::DownloadError;
use super::reachability::Reachability;
use super::target::DownloadTarget;

/// Base delay for bounded-retry backoff (1 second).
const BACKOFF_BASE_DELAY: Duration = Duration::from_secs(1);

/// Delay cap for bounded-retry backoff (32 seconds).
const BACKOFF_MAX_DELAY: Duration = Duration::from_secs(32);

/// Maximum jitter added to backoff delays (500ms).
const BACKOFF_MAX_JITTER_MS: u64 = 500;

/// Retry ceiling policy for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLimit {
    /// Retry until the transfer succeeds or the process is killed.
    ///
    /// This is the default and the documented policy of the tool.
    Unlimited,
    /// Give up after this many attempts (including the first). Deviates from
    /// the retry-forever policy; never the default.
    Bounded(u32),
}

impl Default for RetryLimit {
    fn default() -> Self {
        Self::Unlimited
    }
}

/// Drives individual transfers to completion across failures.
///
/// An explicit instance owned by the caller; internal state is fresh per
/// transfer, nothing persists across unrelated calls. Transfers are issued
/// one at a time per engine reference, and the caller does not proceed
/// until the awaited transfer resolves.
pub struct TransferEngine {
    client: HttpClient,
    reachability: Arc<dyn Reachability>,
    retry_limit: RetryLimit,
}

impl TransferEngine {
    /// Creates an engine with the retry-forever default policy.
    #[must_use]
    pub fn new(client: HttpClient, reachability: Arc<dyn Reachability>) -> Self {
        Self {
            client,
            reachability,
            retry_limit: RetryLimit::Unlimited,
        }
    }

    /// Sets the retry ceiling policy.
    #[must_use]
    pub fn with_retry_limit(mut self, retry_limit: RetryLimit) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// The underlying HTTP client, for text fetches sharing the pool.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Transfers `target` to its destination, retrying until it lands.
    ///
    /// The destination path becomes visible only on success, via the
    /// client's atomic rename; every chunk received is reported through
    /// `on_chunk`. A diagnostic line is logged on every failure before the
    /// retry is issued.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` only for permanent failures (invalid URL,
    /// HTTP 4xx) or, under [`RetryLimit::Bounded`], when the attempt budget
    /// is exhausted. Under the default policy transient failures never
    /// surface: the call retries indefinitely.
    #[instrument(skip(self, on_chunk), fields(url = %target.url))]
    pub async fn transfer<F>(
        &self,
        target: &DownloadTarget,
        mut on_chunk: F,
    ) -> Result<u64, DownloadError>
    where
        F: FnMut(ChunkProgress),
    {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match self.client.download(target, &mut on_chunk).await {
                Ok(bytes) => return Ok(bytes),
                Err(error) => {
                    warn!(attempt = attempts, error = %error, "transfer failed");

                    if error.is_permanent() {
                        self.discard_partial(target).await;
                        return Err(error);
                    }

                    match error.resume_bytes() {
                        Some(bytes) => {
                            info!(bytes, "resuming file download");
                        }
                        None => {
                            // No resume token: restart from byte zero.
                            self.discard_partial(target).await;
                            info!("retrying file download");
                        }
                    }

                    if let RetryLimit::Bounded(max_attempts) = self.retry_limit {
                        if attempts >= max_attempts {
                            return Err(DownloadError::RetriesExhausted {
                                url: target.url.clone(),
                                attempts,
                                last_error: error.to_string(),
                            });
                        }
                        let delay = backoff_delay(attempts);
                        debug!(?delay, "backing off before retry");
                        tokio::time::sleep(delay).await;
                    }

                    self.wait_for_network().await;
                }
            }
        }
    }

    /// Removes the `.part` temp file so the next attempt starts from zero.
    async fn discard_partial(&self, target: &DownloadTarget) {
        let part_path = target.part_path();
        if tokio::fs::remove_file(&part_path).await.is_ok() {
            debug!(path = %part_path.display(), "discarded partial file");
        }
    }

    /// Blocks until the reachability probe reports the network up.
    ///
    /// Polls at a fixed one-second interval, unbounded.
    async fn wait_for_network(&self) {
        if self.reachability.is_connected().await {
            return;
        }
        info!("waiting for connection to be restored");
        loop {
            tokio::time::sleep(REACHABILITY_POLL_INTERVAL).await;
            if self.reachability.is_connected().await {
                info!("connection restored");
                return;
            }
        }
    }
}

/// Jittered exponential backoff for bounded retries.
///
/// `min(base * 2^(attempt-1), cap) + jitter`, so attempts wait roughly
/// 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = BACKOFF_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(BACKOFF_MAX_DELAY);
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_MAX_JITTER_MS);
    delay + Duration::from_millis(jitter)
}
