//! Batch orchestration: catalog → resolver → scheduler → assembly.
//!
//! Walks the session list, extracts each session's resources, and routes
//! them to the right download path: streamed video through the manifest
//! resolver, segment scheduler and assembly stage; progressive video, PDFs
//! and sample archives straight through the transfer engine. Per-asset
//! failures are isolated: one session's broken manifest or failed assembly
//! never aborts the rest of the batch.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, instrument, warn};
use url::Url;

use crate::assemble::{AssembleError, Assembler};
use crate::catalog::{Catalog, SessionResources, output_filename, url_basename};
use crate::download::{
    DownloadError, DownloadTarget, SegmentScheduler, TransferEngine,
};
use crate::manifest::{self, SegmentManifest};
use crate::progress::{ProgressLine, percent_of, throughput_kb_per_sec};

/// Requested video quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// 1080-line adaptive stream, fetched segment-by-segment and assembled.
    Hd1080,
    /// 720-line progressive file.
    Hd720,
    /// SD progressive file.
    Sd,
}

impl Quality {
    /// Whether this quality is delivered as a segmented stream.
    #[must_use]
    pub fn is_streamed(self) -> bool {
        matches!(self, Self::Hd1080)
    }

    /// Vertical resolution requested from the manifest resolver.
    #[must_use]
    pub fn height(self) -> u32 {
        match self {
            Self::Hd1080 => 1080,
            Self::Hd720 => 720,
            Self::Sd => 540,
        }
    }

    /// Quality marker progressive video filenames carry.
    #[must_use]
    pub fn video_tag(self) -> &'static str {
        match self {
            Self::Hd1080 | Self::Hd720 => "hd",
            Self::Sd => "sd",
        }
    }

    /// Label used in assembled output filenames.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Hd1080 => "1080p",
            Self::Hd720 => "720p",
            Self::Sd => "sd",
        }
    }
}

/// What a batch run should fetch.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Catalog site base URL.
    pub base_url: String,
    /// Edition slug, e.g. `wwdc2018`.
    pub edition: String,
    /// Directory assets land in.
    pub output_dir: PathBuf,
    /// Requested video quality.
    pub quality: Quality,
    /// Fetch session videos.
    pub want_video: bool,
    /// Fetch slide PDFs.
    pub want_pdf: bool,
    /// Fetch sample-code archives.
    pub want_sample: bool,
    /// Restrict the run to these session ids (empty = all).
    pub sessions: Vec<String>,
    /// Only list sessions and titles, download nothing.
    pub list_only: bool,
    /// Render progress lines.
    pub show_progress: bool,
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    /// Sessions visited.
    pub sessions: usize,
    /// Assets now present on disk (downloaded or already there).
    pub completed: usize,
    /// Resources the catalog has not published yet.
    pub not_available: usize,
    /// Assets that failed (malformed manifest, assembly failure, etc.)
    pub failed: usize,
}

/// The batch downloader.
pub struct Pipeline {
    engine: TransferEngine,
    catalog: Catalog,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline around an engine and run configuration.
    #[must_use]
    pub fn new(engine: TransferEngine, config: PipelineConfig) -> Self {
        let catalog = Catalog::for_edition(&config.base_url, &config.edition);
        Self {
            engine,
            catalog,
            config,
        }
    }

    /// Runs the whole batch.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` only when the session index itself cannot be
    /// fetched; everything downstream is reported per asset and absorbed.
    #[instrument(skip(self), fields(edition = %self.config.edition))]
    pub async fn run(&self) -> Result<RunSummary, DownloadError> {
        let mut sessions = self
            .catalog
            .fetch_session_list(self.engine.client())
            .await?;

        if !self.config.sessions.is_empty() {
            sessions.retain(|id| self.config.sessions.contains(id));
        }

        info!(sessions = sessions.len(), "session list resolved");

        let mut summary = RunSummary::default();
        for session in &sessions {
            summary.sessions += 1;
            self.process_session(session, &mut summary).await;
        }
        Ok(summary)
    }

    /// Processes one session; failures are logged and counted, never raised.
    async fn process_session(&self, session: &str, summary: &mut RunSummary) {
        let html = match self
            .catalog
            .fetch_session_page(self.engine.client(), session)
            .await
        {
            Ok(html) => html,
            Err(e) => {
                error!(session, error = %e, "could not fetch session page");
                summary.failed += 1;
                return;
            }
        };

        let resources = self
            .catalog
            .extract_resources(
                self.engine.client(),
                session,
                &html,
                self.config.quality.video_tag(),
            )
            .await;

        info!(session, title = %resources.title, "processing session");

        if self.config.list_only {
            return;
        }

        if self.config.want_video {
            self.process_video(session, &resources, summary).await;
        }

        if self.config.want_pdf {
            match &resources.pdf_url {
                Some(url) => self.download_asset(session, url, summary).await,
                None => {
                    info!(session, "PDF not yet available");
                    summary.not_available += 1;
                }
            }
        }

        if self.config.want_sample {
            if resources.sample_urls.is_empty() {
                info!(session, "sample code not yet available");
                summary.not_available += 1;
            } else {
                for url in &resources.sample_urls {
                    self.download_asset(session, url, summary).await;
                }
            }
        }
    }

    /// Routes the session's video to streamed or progressive download.
    async fn process_video(
        &self,
        session: &str,
        resources: &SessionResources,
        summary: &mut RunSummary,
    ) {
        if self.config.quality.is_streamed() {
            match &resources.playlist_url {
                Some(url) => {
                    self.download_streamed(session, &resources.title, url, summary)
                        .await;
                }
                None => {
                    info!(session, "video not yet available");
                    summary.not_available += 1;
                }
            }
        } else {
            match &resources.video_url {
                Some(url) => self.download_asset(session, url, summary).await,
                None => {
                    info!(session, "video not yet available");
                    summary.not_available += 1;
                }
            }
        }
    }

    /// Fetches a streamed video: resolve, fetch segments, assemble.
    async fn download_streamed(
        &self,
        session: &str,
        title: &str,
        playlist_url: &str,
        summary: &mut RunSummary,
    ) {
        let filename = output_filename(session, self.config.quality.label(), title, "mp4");
        let dest = self.config.output_dir.join(&filename);

        if dest.exists() {
            info!(session, file = %filename, "already exists, nothing to do");
            summary.completed += 1;
            return;
        }

        info!(session, file = %filename, "getting streamed video");

        let resolved = match manifest::resolve(
            self.engine.client(),
            playlist_url,
            self.config.quality.height(),
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(e) if e.is_not_available() => {
                info!(session, "video not yet available");
                summary.not_available += 1;
                return;
            }
            Err(e) => {
                error!(session, error = %e, "could not resolve stream playlist");
                summary.failed += 1;
                return;
            }
        };

        // Segments accumulate in <dest>.part/ until assembly succeeds.
        let temp_dir = temp_dir_for(&dest);
        let (targets, video_files) = match segment_targets(&resolved, &temp_dir) {
            Ok(pair) => pair,
            Err(e) => {
                error!(session, error = %e, "could not lay out segment targets");
                summary.failed += 1;
                return;
            }
        };

        if let Err(e) = ensure_dirs(&targets).await {
            error!(session, error = %e, "could not create temp directories");
            summary.failed += 1;
            return;
        }

        let progress = self.progress_line();
        let scheduler = SegmentScheduler::new(&self.engine);
        match scheduler.fetch_all(&targets, &progress).await {
            Ok(stats) => {
                progress.finish();
                info!(
                    session,
                    fetched = stats.completed - stats.skipped,
                    skipped = stats.skipped,
                    "segments on disk"
                );
            }
            Err(e) => {
                progress.abandon();
                error!(session, error = %e, "segment fetch failed");
                summary.failed += 1;
                return;
            }
        }

        let assembler = match Assembler::locate() {
            Ok(assembler) => assembler,
            Err(e @ AssembleError::ToolMissing { .. }) => {
                // Segments stay on disk; a later rerun with the tool
                // installed picks them up for free.
                warn!(session, "{e}; leaving segments in {}", temp_dir.display());
                summary.failed += 1;
                return;
            }
            Err(e) => {
                error!(session, error = %e, "assembler unavailable");
                summary.failed += 1;
                return;
            }
        };

        info!(session, file = %filename, "converting");
        let progress = self.progress_line();
        match assembler
            .assemble(&video_files, &temp_dir, &dest, &progress)
            .await
        {
            Ok(()) => {
                progress.finish();
                summary.completed += 1;
            }
            Err(e) => {
                progress.abandon();
                error!(session, error = %e, "assembly failed, temp files preserved");
                summary.failed += 1;
            }
        }
    }

    /// Fetches a single-file asset (progressive video, PDF, sample archive).
    async fn download_asset(&self, session: &str, url: &str, summary: &mut RunSummary) {
        let Some(basename) = url_basename(url) else {
            error!(session, url, "cannot derive filename from URL");
            summary.failed += 1;
            return;
        };
        let dest = self.config.output_dir.join(&basename);

        if dest.exists() {
            info!(session, file = %basename, "already exists, nothing to do");
            summary.completed += 1;
            return;
        }

        info!(session, file = %basename, url, "getting file");

        let target = DownloadTarget::new(url, dest);
        let progress = self.progress_line();
        let started = Instant::now();

        let result = self
            .engine
            .transfer(&target, |chunk| {
                let percent = chunk
                    .expected_total
                    .map_or(0, |total| percent_of(chunk.file_bytes, total));
                progress.set(
                    percent,
                    throughput_kb_per_sec(chunk.file_bytes, started.elapsed()),
                );
            })
            .await;

        match result {
            Ok(_) => {
                progress.finish();
                summary.completed += 1;
            }
            Err(e) => {
                progress.abandon();
                error!(session, error = %e, "download failed");
                summary.failed += 1;
            }
        }
    }

    fn progress_line(&self) -> ProgressLine {
        if self.config.show_progress {
            ProgressLine::new()
        } else {
            ProgressLine::hidden()
        }
    }
}

/// Temp directory for an in-progress streamed asset: `<dest>.part/`.
fn temp_dir_for(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Lays segment URLs out as download targets under the temp directory.
///
/// Video segments land in `video/`, audio segments in `audio/`; both lists
/// keep playlist order. Returns the targets plus the ordered local paths of
/// the video segments (the assembly input).
fn segment_targets(
    resolved: &SegmentManifest,
    temp_dir: &Path,
) -> Result<(Vec<DownloadTarget>, Vec<PathBuf>), DownloadError> {
    let mut targets = Vec::new();
    let mut video_files = Vec::new();

    let video_dir = temp_dir.join("video");
    for segment in &resolved.segments {
        let dest = video_dir.join(segment_filename(segment)?);
        video_files.push(dest.clone());
        targets.push(DownloadTarget::new(segment.as_str(), dest));
    }

    if let Some(audio_segments) = &resolved.audio_segments {
        let audio_dir = temp_dir.join("audio");
        for segment in audio_segments {
            let dest = audio_dir.join(segment_filename(segment)?);
            targets.push(DownloadTarget::new(segment.as_str(), dest));
        }
    }

    Ok((targets, video_files))
}

/// Local filename for a segment URL.
fn segment_filename(segment: &Url) -> Result<String, DownloadError> {
    url_basename(segment.as_str())
        .ok_or_else(|| DownloadError::invalid_url(segment.as_str()))
}

/// Creates every directory the targets write into.
async fn ensure_dirs(targets: &[DownloadTarget]) -> Result<(), DownloadError> {
    for target in targets {
        if let Some(parent) = target.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent.to_path_buf(), e))?;
        }
    }
    Ok(())
}
