//! Catalog and resource extraction (thin collaborator).
//!
//! Scrapes the conference video catalog: the index page for session
//! identifiers, and each session page for its resource links (streaming
//! playlist, progressive video, slides PDF, sample-code archives). All
//! extraction is regex over page text; the downloader core never parses
//! HTML structurally.

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::download::{DownloadError, HttpClient};

/// Resource links extracted from one session page.
#[derive(Debug, Clone, Default)]
pub struct SessionResources {
    /// Session title from the page heading.
    pub title: String,
    /// Top-level streaming playlist URL, when published.
    pub playlist_url: Option<String>,
    /// Progressive video URL for the requested quality tag, when published.
    pub video_url: Option<String>,
    /// Slides PDF URL, when published.
    pub pdf_url: Option<String>,
    /// Sample-code archive URLs, possibly empty.
    pub sample_urls: Vec<String>,
}

/// One conference edition's catalog endpoints and extraction patterns.
pub struct Catalog {
    base_url: String,
    index_url: String,
    session_page_base: String,
    session_link_re: Regex,
    title_re: Regex,
    playlist_re: Regex,
    pdf_re: Regex,
    sample_href_re: Regex,
}

/// `book.json` shape published alongside sample-code pages.
#[derive(Debug, Deserialize)]
struct SampleBook {
    #[serde(rename = "sampleCode")]
    sample_code: Option<String>,
}

impl Catalog {
    /// Creates the catalog for one edition slug (e.g. `wwdc2018`).
    ///
    /// # Panics
    ///
    /// Panics if the embedded extraction patterns fail to compile, which
    /// cannot happen for a slug of word characters.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn for_edition(base_url: &str, edition: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let session_link = format!(r#""/videos/play/{edition}/([0-9]+)/""#);
        Self {
            base_url: base.to_string(),
            index_url: format!("{base}/videos/{edition}/"),
            session_page_base: format!("{base}/videos/play/{edition}/"),
            session_link_re: Regex::new(&session_link)
                .expect("session link pattern must compile"),
            title_re: Regex::new(r"<h1>(.*)</h1>").expect("title pattern must compile"),
            playlist_re: Regex::new(r"\b(https://\S+\.m3u8)\b")
                .expect("playlist pattern must compile"),
            pdf_re: Regex::new(r"\b(https://\S+/(\d+)_[^/\s]+\.pdf)\b")
                .expect("pdf pattern must compile"),
            sample_href_re: Regex::new(r#"href="(\S*/content/samplecode/\S*?)""#)
                .expect("sample pattern must compile"),
        }
    }

    /// Fetches the index page and returns the session identifiers found,
    /// de-duplicated and numerically sorted.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` when the index page cannot be fetched.
    #[instrument(skip(self, client))]
    pub async fn fetch_session_list(
        &self,
        client: &HttpClient,
    ) -> Result<Vec<String>, DownloadError> {
        let html = client.fetch_text(&self.index_url).await?;
        let mut sessions: Vec<String> = self
            .session_link_re
            .captures_iter(&html)
            .map(|captures| captures[1].to_string())
            .collect();
        sessions.sort_by_key(|id| id.parse::<u32>().unwrap_or(u32::MAX));
        sessions.dedup();
        debug!(count = sessions.len(), "extracted session list");
        Ok(sessions)
    }

    /// Fetches one session page's HTML.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` when the page cannot be fetched.
    pub async fn fetch_session_page(
        &self,
        client: &HttpClient,
        session: &str,
    ) -> Result<String, DownloadError> {
        client
            .fetch_text(&format!("{}{session}/", self.session_page_base))
            .await
    }

    /// Extracts all resource links for a session from its page HTML.
    ///
    /// `video_tag` is the quality marker progressive video URLs carry in
    /// their filename (e.g. `hd`, `sd`). Sample-code archive URLs require a
    /// follow-up fetch per sample page (`book.json`), done here so callers
    /// see final archive URLs only.
    #[instrument(skip(self, client, html), fields(session = session))]
    pub async fn extract_resources(
        &self,
        client: &HttpClient,
        session: &str,
        html: &str,
        video_tag: &str,
    ) -> SessionResources {
        let title = self
            .title_re
            .captures(html)
            .map(|captures| captures[1].trim().to_string())
            .unwrap_or_default();

        let playlist_url = self
            .playlist_re
            .captures(html)
            .map(|captures| captures[1].to_string());

        let video_url = progressive_video_url(html, video_tag);

        let pdf_url = self
            .pdf_re
            .captures_iter(html)
            .find(|captures| &captures[2] == session)
            .map(|captures| captures[1].to_string());

        let mut sample_urls = Vec::new();
        for captures in self.sample_href_re.captures_iter(html) {
            let page_url = absolutize(&self.base_url, &captures[1]);
            match resolve_sample_archive(client, &page_url).await {
                Some(archive_url) => sample_urls.push(archive_url),
                None => warn!(page = %page_url, "sample page has no archive"),
            }
        }

        SessionResources {
            title,
            playlist_url,
            video_url,
            pdf_url,
            sample_urls,
        }
    }
}

/// Finds a progressive video URL carrying the quality tag in its name.
fn progressive_video_url(html: &str, video_tag: &str) -> Option<String> {
    let pattern = format!(r"\b(https://\S+_{}\S*\.mp4)\b", regex::escape(video_tag));
    let re = Regex::new(&pattern).ok()?;
    re.captures(html).map(|captures| captures[1].to_string())
}

/// Resolves a sample-code page to its downloadable archive via `book.json`.
async fn resolve_sample_archive(client: &HttpClient, page_url: &str) -> Option<String> {
    let base = page_url.trim_end_matches('/');
    let book_text = client.fetch_text(&format!("{base}/book.json")).await.ok()?;
    let book: SampleBook = serde_json::from_str(&book_text).ok()?;
    book.sample_code
        .map(|relative| format!("{base}/{}", relative.trim_start_matches('/')))
}

/// Makes a catalog-relative href absolute against the catalog base.
fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("https://") || href.starts_with("http://") {
        href.to_string()
    } else {
        format!("{base_url}{href}")
    }
}

/// Normalizes a session title into an output filename.
///
/// ASCII-folds the title, strips punctuation, lowercases, and joins words
/// with underscores: `101_1080p_platforms_state_of_the_union.mp4`.
#[must_use]
pub fn output_filename(session: &str, quality_label: &str, title: &str, ext: &str) -> String {
    let normalized: String = title
        .chars()
        .filter(char::is_ascii)
        .filter(|c| !"-':,.&".contains(*c))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect::<String>()
        .to_lowercase();
    format!("{session}_{quality_label}_{normalized}.{ext}")
}

/// The last path component of a URL, used as the local file base name.
#[must_use]
pub fn url_basename(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
}
