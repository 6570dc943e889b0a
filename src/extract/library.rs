use tracing::debug;

use super::{Extracted, InfoSource, Stage};
use crate::{
    outside::{browser, MediaExtractor, MetadataRequest, RawFormat, RawInfo},
    result::Result,
    types::{FormatSpec, Itag, VideoInfo, UNKNOWN_AUTHOR, UNKNOWN_TITLE},
};

/// Metadata query through the external extraction tool
pub struct LibrarySource<E> {
    extractor: E,
    socket_timeout_secs: u64,
}

impl<E: MediaExtractor> LibrarySource<E> {
    pub fn new(extractor: E, socket_timeout_secs: u64) -> Self {
        Self {
            extractor,
            socket_timeout_secs,
        }
    }
}

impl<E: MediaExtractor> InfoSource for LibrarySource<E> {
    fn stage(&self) -> Stage {
        Stage::Library
    }

    fn extract(&self, url: &str) -> Result<Extracted> {
        let request = MetadataRequest {
            user_agent: browser::random_user_agent().to_owned(),
            headers: browser::navigation_headers(),
            socket_timeout_secs: self.socket_timeout_secs,
        };
        debug!("Using user agent: {}", request.user_agent);

        let raw = self.extractor.fetch_metadata(url, &request)?;
        Ok(normalize(raw))
    }
}

/// Convert the tool's record to our own shapes.
///
/// Formats without a URL are dropped as they cannot be downloaded directly.
/// The metadata is considered missing when the record has neither ID nor title.
pub fn normalize(raw: RawInfo) -> Extracted {
    let formats = raw
        .formats
        .iter()
        .filter_map(normalize_format)
        .collect();

    if raw.id.is_none() && raw.title.is_none() {
        return Extracted {
            info: None,
            formats,
        };
    }

    let info = VideoInfo {
        title: raw.title.unwrap_or_else(|| UNKNOWN_TITLE.to_owned()),
        description: raw.description.unwrap_or_default(),
        thumbnail: raw.thumbnail.unwrap_or_default(),
        duration: raw.duration.map_or(0, |d| d.max(0.0).round() as u64),
        views: raw.view_count.unwrap_or(0).to_string(),
        upload_date: raw.upload_date.unwrap_or_default(),
        author: raw.uploader.unwrap_or_else(|| UNKNOWN_AUTHOR.to_owned()),
        video_id: raw.id.unwrap_or_default(),
    };

    Extracted {
        info: Some(info),
        formats,
    }
}

fn normalize_format(raw: &RawFormat) -> Option<FormatSpec> {
    let url = raw.url.as_ref().filter(|url| !url.is_empty())?;

    let quality = raw
        .quality
        .map_or_else(|| "unknown".to_owned(), |q| q.to_string());
    let ext = raw.ext.clone().unwrap_or_else(|| "mp4".to_owned());
    let has_codec = |codec: &Option<String>| codec.as_deref().is_some_and(|c| c != "none");

    Some(FormatSpec {
        itag: raw
            .format_id
            .as_deref()
            .map_or(Itag::Number(0), Itag::from),
        quality_label: raw.format_note.clone().unwrap_or_else(|| quality.clone()),
        quality,
        mime_type: ext.clone(),
        container: ext,
        has_video: has_codec(&raw.vcodec),
        has_audio: has_codec(&raw.acodec),
        width: raw.width,
        height: raw.height,
        bitrate: raw.tbr,
        audio_bitrate: raw.abr,
        url: Some(url.clone()),
    })
}
