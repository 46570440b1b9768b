//! Manifest resolution: master playlist → ordered segment URLs.
//!
//! Given a top-level playlist URL and a requested quality, picks the
//! matching variant (exact height match, else the highest resolution
//! offered), fetches its media playlist, and returns the ordered segment
//! URLs plus the segments of an alternate-audio track when one is declared.

mod parser;

pub use parser::{MasterPlaylist, QualityVariant, parse_master, parse_segments};

use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::download::{DownloadError, HttpClient};

/// Ordered segment URLs for one selected variant of a streamed asset.
///
/// Segment order is the byte-concatenation order of the final media file;
/// it is never reordered between here and assembly.
#[derive(Debug, Clone)]
pub struct SegmentManifest {
    /// The variant the resolver selected.
    pub variant: QualityVariant,
    /// Video segment URLs in playlist order.
    pub segments: Vec<Url>,
    /// Audio segment URLs in playlist order, when the master playlist
    /// declares an alternate-audio track.
    pub audio_segments: Option<Vec<Url>>,
}

/// Errors from manifest resolution.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Fetching a playlist failed at the network/HTTP level.
    #[error(transparent)]
    Fetch(#[from] DownloadError),

    /// The master playlist offers no resolvable variant.
    ///
    /// Callers treat this as "asset not yet available", not a hard failure.
    #[error("no stream variant found in {url}")]
    NoVariant {
        /// The master playlist URL.
        url: String,
    },

    /// The media playlist contains no parseable segment lines.
    #[error("no segments found in {url}")]
    NoSegments {
        /// The media playlist URL.
        url: String,
    },

    /// A playlist reference could not be resolved to an absolute URL.
    #[error("cannot resolve playlist reference {uri} against {base}")]
    BadReference {
        /// The unresolvable reference.
        uri: String,
        /// The base it was resolved against.
        base: String,
    },
}

impl ManifestError {
    /// Whether this is the informational "asset not yet available" case.
    #[must_use]
    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::NoVariant { .. })
    }
}

/// Resolves a master playlist URL to the segment list of one variant.
///
/// Selection policy: exact match on the requested height when offered,
/// otherwise the highest-resolution variant available. The resolver never
/// fails solely because the exact quality is absent.
///
/// Relative references resolve against the playlist that declared them:
/// variant and audio references against the master playlist URL, segment
/// references against their media playlist URL.
///
/// # Errors
///
/// - [`ManifestError::NoVariant`] when the master playlist offers nothing
///   (callers report "not yet available" and move on)
/// - [`ManifestError::NoSegments`] when a media playlist is malformed
/// - [`ManifestError::Fetch`] when any playlist fetch fails
#[instrument(skip(client), fields(url = %manifest_url, height = desired_height))]
pub async fn resolve(
    client: &HttpClient,
    manifest_url: &str,
    desired_height: u32,
) -> Result<SegmentManifest, ManifestError> {
    let master_url = Url::parse(manifest_url)
        .map_err(|_| DownloadError::invalid_url(manifest_url))?;

    let master_text = client.fetch_text(manifest_url).await?;
    let master = parse_master(&master_text);

    let variant = select_variant(&master.variants, desired_height)
        .ok_or_else(|| ManifestError::NoVariant {
            url: manifest_url.to_string(),
        })?
        .clone();

    if variant.height != desired_height {
        info!(
            requested = desired_height,
            selected = %format!("{}x{}", variant.width, variant.height),
            "requested quality not offered, falling back to highest"
        );
    }

    let media_url = join(&master_url, &variant.uri)?;
    let segments = fetch_segment_urls(client, &media_url).await?;
    debug!(segments = segments.len(), "resolved video segments");

    let audio_segments = match &master.audio_uri {
        Some(audio_uri) => {
            let audio_url = join(&master_url, audio_uri)?;
            let audio = fetch_segment_urls(client, &audio_url).await?;
            debug!(segments = audio.len(), "resolved audio segments");
            Some(audio)
        }
        None => None,
    };

    Ok(SegmentManifest {
        variant,
        segments,
        audio_segments,
    })
}

/// Exact height match, else the true maximum resolution offered.
fn select_variant(variants: &[QualityVariant], desired_height: u32) -> Option<&QualityVariant> {
    variants
        .iter()
        .find(|v| v.height == desired_height)
        .or_else(|| variants.iter().max_by_key(|v| (v.width, v.height)))
}

/// Fetches a media playlist and returns its segment URLs in playlist order.
async fn fetch_segment_urls(
    client: &HttpClient,
    media_url: &Url,
) -> Result<Vec<Url>, ManifestError> {
    let text = client.fetch_text(media_url.as_str()).await?;
    let references = parse_segments(&text);
    if references.is_empty() {
        return Err(ManifestError::NoSegments {
            url: media_url.to_string(),
        });
    }
    references
        .iter()
        .map(|reference| join(media_url, reference))
        .collect()
}

/// Resolves a playlist reference against its base; absolute refs pass through.
fn join(base: &Url, reference: &str) -> Result<Url, ManifestError> {
    base.join(reference).map_err(|_| ManifestError::BadReference {
        uri: reference.to_string(),
        base: base.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn variant(width: u32, height: u32) -> QualityVariant {
        QualityVariant {
            width,
            height,
            uri: format!("hls_{height}/prog_index.m3u8"),
        }
    }

    #[test]
    fn test_select_variant_prefers_exact_height() {
        let variants = vec![variant(1920, 1080), variant(1280, 720)];
        let selected = select_variant(&variants, 720).unwrap();
        assert_eq!(selected.height, 720);
    }

    #[test]
    fn test_select_variant_falls_back_to_maximum() {
        let variants = vec![variant(1280, 720), variant(1920, 1080)];
        let selected = select_variant(&variants, 480).unwrap();
        assert_eq!((selected.width, selected.height), (1920, 1080));
    }

    #[test]
    fn test_select_variant_empty_is_none() {
        assert!(select_variant(&[], 1080).is_none());
    }

    #[test]
    fn test_join_relative_against_media_playlist() {
        let base = Url::parse("https://cdn.example.com/vod/hls_1080/prog_index.m3u8").unwrap();
        let joined = join(&base, "fileSequence7.ts").unwrap();
        assert_eq!(
            joined.as_str(),
            "https://cdn.example.com/vod/hls_1080/fileSequence7.ts"
        );
    }

    #[test]
    fn test_join_absolute_reference_passes_through() {
        let base = Url::parse("https://cdn.example.com/vod/master.m3u8").unwrap();
        let joined = join(&base, "https://other.example.com/hd/prog_index.m3u8").unwrap();
        assert_eq!(joined.host_str(), Some("other.example.com"));
    }

    #[test]
    fn test_no_variant_error_is_informational() {
        let error = ManifestError::NoVariant {
            url: "https://x/master.m3u8".into(),
        };
        assert!(error.is_not_available());

        let error = ManifestError::NoSegments {
            url: "https://x/prog_index.m3u8".into(),
        };
        assert!(!error.is_not_available());
    }
}
