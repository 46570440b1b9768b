//! Local assembly stage: concatenate fetched segments into one media file.
//!
//! Delegates concatenation to an external `ffmpeg` subprocess fed a concat
//! list file (segment paths in playlist order), tracks its `-progress -`
//! key=value output to drive the shared progress line. The tool writes
//! inside the temp directory; the final path is materialized by a rename
//! only after a clean exit, and only then is the temp directory removed. A
//! failed assembly leaves every temp file in place for diagnosis; re-running
//! is cheap because already-fetched segments are skipped upstream.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::progress::{ProgressLine, percent_of};

/// Name of the external concatenation tool.
pub const CONVERTER_TOOL: &str = "ffmpeg";

/// Name of the concat list file written into the temp directory.
const CONCAT_LIST_FILENAME: &str = "filelist.txt";

/// Errors from the assembly stage.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// The external tool is not on PATH. Reportable, non-fatal: fetched
    /// segments stay on disk and a later rerun can assemble them.
    #[error("no converter: {tool} not found on PATH")]
    ToolMissing {
        /// The tool that was looked for.
        tool: String,
    },

    /// Spawning or waiting on the subprocess failed.
    #[error("failed to run {tool}: {source}")]
    Subprocess {
        /// The tool being run.
        tool: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The subprocess exited non-zero. Temp files are left in place.
    #[error("{tool} exited with {status} assembling {output}")]
    ConversionFailed {
        /// The tool that failed.
        tool: String,
        /// Its exit status.
        status: std::process::ExitStatus,
        /// The output file that was being assembled.
        output: String,
    },

    /// File system error (sizing segments, writing the concat list, cleanup).
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Searches PATH for an executable with the given name.
#[must_use]
pub fn find_tool(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Assembles ordered segment lists via an external converter subprocess.
pub struct Assembler {
    tool: PathBuf,
}

impl Assembler {
    /// Locates the converter on PATH.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError::ToolMissing`] when the tool is absent;
    /// callers report this and keep the fetched segments.
    pub fn locate() -> Result<Self, AssembleError> {
        find_tool(CONVERTER_TOOL)
            .map(|tool| Self { tool })
            .ok_or_else(|| AssembleError::ToolMissing {
                tool: CONVERTER_TOOL.to_string(),
            })
    }

    /// Creates an assembler around an explicit tool path (tests).
    #[must_use]
    pub fn with_tool(tool: impl Into<PathBuf>) -> Self {
        Self { tool: tool.into() }
    }

    /// Concatenates `segment_files` (in the given order) into `output`.
    ///
    /// Writes the concat list into `temp_dir`, runs the converter with its
    /// progress stream piped, and renders percent normalized against the
    /// total on-disk size of the segments. The converter writes into
    /// `temp_dir`; `output` appears only via the final rename, so the
    /// destination path is never partially written. On success the temp
    /// directory is deleted; on failure it is preserved untouched.
    ///
    /// # Errors
    ///
    /// Returns `AssembleError` if sizing or listing the segments fails, the
    /// subprocess cannot be spawned, it exits non-zero, or the rename fails.
    #[instrument(skip(self, segment_files, progress), fields(output = %output.display(), segments = segment_files.len()))]
    pub async fn assemble(
        &self,
        segment_files: &[PathBuf],
        temp_dir: &Path,
        output: &Path,
        progress: &ProgressLine,
    ) -> Result<(), AssembleError> {
        let total_bytes = total_size(segment_files).await?;

        let list_path = temp_dir.join(CONCAT_LIST_FILENAME);
        let list_body: String = segment_files
            .iter()
            .map(|path| format!("file '{}'\n", path.display()))
            .collect();
        tokio::fs::write(&list_path, list_body)
            .await
            .map_err(|e| AssembleError::Io {
                path: list_path.clone(),
                source: e,
            })?;

        // The converter writes into the temp dir; a failed or killed run
        // must never leave bytes at the destination path.
        let staged = match output.file_name() {
            Some(name) => temp_dir.join(name),
            None => temp_dir.join("assembled.mp4"),
        };

        debug!(tool = %self.tool.display(), list = %list_path.display(), "starting conversion");

        let mut child = Command::new(&self.tool)
            .arg("-progress")
            .arg("-")
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&list_path)
            .arg("-c")
            .arg("copy")
            .arg(&staged)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AssembleError::Subprocess {
                tool: CONVERTER_TOOL.to_string(),
                source: e,
            })?;

        if let Some(stdout) = child.stdout.take() {
            watch_progress(stdout, total_bytes, progress).await;
        }

        let status = child.wait().await.map_err(|e| AssembleError::Subprocess {
            tool: CONVERTER_TOOL.to_string(),
            source: e,
        })?;

        if !status.success() {
            warn!(%status, "conversion failed, temp files preserved");
            return Err(AssembleError::ConversionFailed {
                tool: CONVERTER_TOOL.to_string(),
                status,
                output: output.display().to_string(),
            });
        }

        tokio::fs::rename(&staged, output)
            .await
            .map_err(|e| AssembleError::Io {
                path: output.to_path_buf(),
                source: e,
            })?;

        tokio::fs::remove_dir_all(temp_dir)
            .await
            .map_err(|e| AssembleError::Io {
                path: temp_dir.to_path_buf(),
                source: e,
            })?;

        info!(output = %output.display(), "assembly complete");
        Ok(())
    }
}

/// Follows the converter's `-progress -` stream, updating the progress line.
///
/// The stream is line-based `key=value`: a `bitrate=` marker, a cumulative
/// `total_size=` marker, and a `progress=continue|end` phase marker. Percent
/// is the reported cumulative size over the pre-computed segment total.
async fn watch_progress(
    stdout: tokio::process::ChildStdout,
    total_bytes: u64,
    progress: &ProgressLine,
) {
    #[allow(clippy::unwrap_used)]
    let bitrate_re = Regex::new(r"bitrate=\s*([\d.]+)\s*kbits").unwrap();
    #[allow(clippy::unwrap_used)]
    let size_re = Regex::new(r"total_size=(\d+)").unwrap();

    let mut lines = BufReader::new(stdout).lines();
    let mut speed_kbs: u64 = 0;
    let mut size: u64 = 0;

    progress.set(0, 0);
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(captures) = bitrate_re.captures(&line) {
            if let Ok(kbits) = captures[1].parse::<f64>() {
                // kbits/s to KB/s.
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    speed_kbs = (kbits * 0.125).round() as u64;
                }
            }
        } else if let Some(captures) = size_re.captures(&line) {
            size = captures[1].parse().unwrap_or(size);
        } else if let Some(phase) = line.strip_prefix("progress=") {
            let percent = if phase.trim() == "end" {
                100
            } else {
                percent_of(size, total_bytes)
            };
            progress.set(percent, speed_kbs);
        }
    }
}

/// Sums the on-disk sizes of the segment files.
async fn total_size(segment_files: &[PathBuf]) -> Result<u64, AssembleError> {
    let mut total = 0u64;
    for path in segment_files {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| AssembleError::Io {
                path: path.clone(),
                source: e,
            })?;
        total = total.saturating_add(meta.len());
    }
    Ok(total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tool_locates_shell() {
        // `sh` exists on every platform we run tests on.
        assert!(find_tool("sh").is_some());
    }

    #[test]
    fn test_find_tool_missing_is_none() {
        assert!(find_tool("definitely-not-a-real-converter-tool").is_none());
    }

    #[tokio::test]
    async fn test_total_size_sums_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ts");
        let b = dir.path().join("b.ts");
        std::fs::write(&a, vec![0u8; 10]).unwrap();
        std::fs::write(&b, vec![0u8; 32]).unwrap();
        assert_eq!(total_size(&[a, b]).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_total_size_missing_segment_is_io_error() {
        let missing = PathBuf::from("/nonexistent/seg.ts");
        let result = total_size(std::slice::from_ref(&missing)).await;
        assert!(matches!(result, Err(AssembleError::Io { .. })));
    }
}
