use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Identifier of one encoded stream variant.
///
/// The host uses integers but yt-dlp reports its own string IDs
/// (e.g. `hls-1080p`), so both are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Itag {
    Number(u32),
    Text(String),
}

impl Display for Itag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Itag::Number(n) => write!(f, "{n}"),
            Itag::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Itag {
    fn from(s: &str) -> Self {
        s.parse().map_or_else(|_| Itag::Text(s.to_owned()), Itag::Number)
    }
}

/// Whether a stream carries video, audio, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Video-only adaptive stream, needs a companion audio stream
    Video,
    /// Audio-only adaptive stream
    Audio,
    /// Pre-muxed video and audio
    Combined,
}

impl StreamKind {
    pub fn has_video(self) -> bool {
        matches!(self, Self::Video | Self::Combined)
    }

    pub fn has_audio(self) -> bool {
        matches!(self, Self::Audio | Self::Combined)
    }
}

/// One downloadable stream variant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatSpec {
    pub itag: Itag,
    pub quality: String,
    pub quality_label: String,
    pub mime_type: String,
    pub container: String,
    pub has_video: bool,
    pub has_audio: bool,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bitrate: Option<f64>,
    pub audio_bitrate: Option<f64>,
    /// Absent for streams whose URL is signed or not known
    pub url: Option<String>,
}

/// Container name from a mime type, e.g. `video/webm; codecs="vp9"` -> `webm`
pub fn container_from_mime(mime: &str) -> Option<&str> {
    let subtype = mime.split_once('/')?.1;
    let container = subtype.split(';').next()?.trim();
    (!container.is_empty()).then_some(container)
}
