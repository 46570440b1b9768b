//! Line-oriented playlist parsing.
//!
//! Recognizes exactly the three directive shapes the downloader needs:
//!
//! - `#EXT-X-STREAM-INF:` with a `RESOLUTION=WxH` attribute, referencing a
//!   variant sub-playlist on the following line;
//! - `#EXTINF:` referencing a media segment on the following line;
//! - `#EXT-X-MEDIA:TYPE=AUDIO,...,URI="..."` referencing an alternate-audio
//!   sub-playlist.
//!
//! Deliberately not a general playlist parser; unknown directives are
//! ignored.

/// A stream variant advertised by a master playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityVariant {
    /// Declared horizontal resolution.
    pub width: u32,
    /// Declared vertical resolution.
    pub height: u32,
    /// Sub-playlist reference, absolute or relative to the master playlist.
    pub uri: String,
}

/// Parsed master playlist: variants plus an optional alternate-audio ref.
#[derive(Debug, Clone, Default)]
pub struct MasterPlaylist {
    /// Variants in declaration order.
    pub variants: Vec<QualityVariant>,
    /// Alternate-audio playlist reference, when declared.
    pub audio_uri: Option<String>,
}

/// Parses a master playlist's variant and alternate-audio directives.
#[must_use]
pub fn parse_master(text: &str) -> MasterPlaylist {
    let mut playlist = MasterPlaylist::default();
    let mut lines = text.lines().map(str::trim);

    while let Some(line) = lines.next() {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let Some((width, height)) = parse_resolution(attrs) else {
                continue;
            };
            // The variant URI is the next non-blank, non-comment line.
            let uri = loop {
                match lines.next() {
                    Some(candidate) if candidate.is_empty() || candidate.starts_with('#') => {}
                    other => break other,
                }
            };
            if let Some(uri) = uri {
                playlist.variants.push(QualityVariant {
                    width,
                    height,
                    uri: uri.to_string(),
                });
            }
        } else if let Some(attrs) = line.strip_prefix("#EXT-X-MEDIA:") {
            if attrs.contains("TYPE=AUDIO") && playlist.audio_uri.is_none() {
                playlist.audio_uri = quoted_attribute(attrs, "URI=");
            }
        }
    }

    playlist
}

/// Parses a media playlist's segment references, in declaration order.
///
/// Segment order is the byte-concatenation order of the final file; callers
/// must never reorder the returned list.
#[must_use]
pub fn parse_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut expecting_uri = false;

    for line in text.lines().map(str::trim) {
        if line.starts_with("#EXTINF:") {
            expecting_uri = true;
        } else if expecting_uri && !line.is_empty() && !line.starts_with('#') {
            segments.push(line.to_string());
            expecting_uri = false;
        }
    }

    segments
}

/// Extracts `WxH` from a `RESOLUTION=` attribute.
fn parse_resolution(attrs: &str) -> Option<(u32, u32)> {
    let rest = &attrs[attrs.find("RESOLUTION=")? + "RESOLUTION=".len()..];
    let value: &str = rest.split([',', ' ']).next()?;
    let (width, height) = value.split_once(['x', 'X'])?;
    Some((width.parse().ok()?, height.parse().ok()?))
}

/// Extracts the quoted value following `key` (e.g. `URI="..."`).
fn quoted_attribute(attrs: &str, key: &str) -> Option<String> {
    let rest = &attrs[attrs.find(key)? + key.len()..];
    let rest = rest.strip_prefix('"')?;
    rest.split('"').next().map(ToString::to_string)
}
