//! HTTP client wrapper for streaming transfers.
//!
//! This module provides the `HttpClient` struct which handles streaming
//! downloads into a `.part` temp file, byte-range resume of interrupted
//! transfers, and atomic materialization of the final destination path.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, ClientBuilder, StatusCode};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::target::DownloadTarget;

/// Progress information delivered once per received body chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkProgress {
    /// Size of the chunk just written.
    pub chunk_bytes: u64,
    /// Total bytes now present in the temp file (including resumed bytes).
    pub file_bytes: u64,
    /// Expected total size of the file, when known.
    pub expected_total: Option<u64>,
}

/// HTTP client for streaming downloads.
///
/// Designed to be created once and reused across transfers, taking advantage
/// of connection pooling. The transfer discipline is:
///
/// 1. bytes stream into `<dest>.part`;
/// 2. a pre-existing non-empty `.part` file triggers a `Range` request and
///    the server's 206 response is appended to it;
/// 3. on success the temp file is renamed onto `dest` in one step, so the
///    destination path is only ever absent or complete.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches a URL as text (playlists, catalog HTML, JSON side files).
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails, the
    /// server returns a non-success status, or the body is not readable.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| DownloadError::network(url, e))
    }

    /// Downloads `target.url` into `target.dest`, reporting each chunk.
    ///
    /// If `<dest>.part` already holds bytes from a previous attempt, the
    /// request carries a `Range` header and a 206 response is appended to
    /// the partial file; a 200 response truncates it and restarts from byte
    /// zero. On success the temp file is atomically renamed to `dest` and
    /// the total byte count is returned.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - The body stream breaks mid-transfer (`Interrupted`, carrying the
    ///   byte count already on disk as the resume token)
    /// - Writing, flushing, or renaming on disk fails
    /// - The final size disagrees with the server's content length
    #[must_use = "the byte count confirms how much data landed on disk"]
    #[instrument(skip(self, on_chunk), fields(url = %target.url))]
    pub async fn download<F>(
        &self,
        target: &DownloadTarget,
        mut on_chunk: F,
    ) -> Result<u64, DownloadError>
    where
        F: FnMut(ChunkProgress),
    {
        Url::parse(&target.url).map_err(|_| DownloadError::invalid_url(&target.url))?;

        let part_path = target.part_path();
        let existing_bytes = partial_len(&part_path).await;

        let mut request = self.client.get(&target.url);
        if existing_bytes > 0 {
            debug!(bytes = existing_bytes, "found partial file, requesting remainder");
            request = request.header(RANGE, format!("bytes={existing_bytes}-"));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(&target.url)
            } else {
                DownloadError::network(&target.url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(&target.url, status.as_u16()));
        }

        let resumed = status == StatusCode::PARTIAL_CONTENT && existing_bytes > 0;

        // The server's content length covers only the remainder on a 206.
        let expected_total = response.content_length().map(|len| {
            if resumed {
                existing_bytes.saturating_add(len)
            } else {
                len
            }
        });
        let reported_total = target.expected_bytes.or(expected_total);

        // Append for a true resume, create/truncate otherwise (a 200 answer
        // to a ranged request means the server ignored the range).
        let mut file = if resumed {
            OpenOptions::new()
                .append(true)
                .open(&part_path)
                .await
                .map_err(|e| DownloadError::io(part_path.clone(), e))?
        } else {
            File::create(&part_path)
                .await
                .map_err(|e| DownloadError::io(part_path.clone(), e))?
        };

        let mut file_bytes = if resumed { existing_bytes } else { 0 };
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Keep what we have; the on-disk byte count is the
                    // resume token for the next attempt.
                    let _ = file.flush().await;
                    return Err(DownloadError::interrupted(&target.url, file_bytes, e));
                }
            };

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(part_path.clone(), e))?;

            file_bytes += chunk.len() as u64;
            on_chunk(ChunkProgress {
                chunk_bytes: chunk.len() as u64,
                file_bytes,
                expected_total: reported_total,
            });
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::io(part_path.clone(), e))?;
        drop(file);

        if let Some(expected) = expected_total
            && expected != file_bytes
        {
            // A short body with a clean EOF is not resumable territory;
            // drop the temp file so the next attempt starts from zero.
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(DownloadError::integrity(&part_path, expected, file_bytes));
        }

        tokio::fs::rename(&part_path, &target.dest)
            .await
            .map_err(|e| DownloadError::io(target.dest.clone(), e))?;

        info!(
            path = %target.dest.display(),
            bytes = file_bytes,
            resumed,
            "download complete"
        );

        Ok(file_bytes)
    }
}

/// Length of an existing partial file, or 0 when absent/unreadable.
async fn partial_len(path: &Path) -> u64 {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => 0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_rejects_invalid_url() {
        let client = HttpClient::new();
        let target = DownloadTarget::new("not a url", "/tmp/nope.bin");
        let result = client.download(&target, |_| {}).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_fetch_text_rejects_invalid_url() {
        let client = HttpClient::new();
        let result = client.fetch_text("::::").await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_partial_len_absent_file_is_zero() {
        assert_eq!(partial_len(Path::new("/nonexistent/path.part")).await, 0);
    }
}
