use super::{Extracted, InfoSource, Stage};
use crate::{
    formats::{FallbackFormat, FormatTable},
    result::Result,
    types::{FormatSpec, Itag, StreamKind, VideoInfo},
    video_url::{parse_video_id, watch_url},
};

/// Placeholder metadata and the static format list.
///
/// Only needs a video ID that can be read from the URL.
pub struct StaticSource<'a> {
    table: &'a FormatTable,
}

impl<'a> StaticSource<'a> {
    pub fn new(table: &'a FormatTable) -> Self {
        Self { table }
    }
}

impl InfoSource for StaticSource<'_> {
    fn stage(&self) -> Stage {
        Stage::StaticFallback
    }

    fn extract(&self, url: &str) -> Result<Extracted> {
        let video_id = parse_video_id(url)?;

        Ok(Extracted {
            info: Some(VideoInfo::placeholder(&video_id)),
            formats: static_formats(self.table, &video_id),
        })
    }
}

/// The static format list of the table, pointing at the given video
pub fn static_formats(table: &FormatTable, video_id: &str) -> Vec<FormatSpec> {
    table
        .fallback_formats()
        .iter()
        .map(|format| to_format_spec(format, video_id))
        .collect()
}

fn to_format_spec(format: &FallbackFormat, video_id: &str) -> FormatSpec {
    let (mime_type, container) = match format.kind {
        StreamKind::Audio => ("audio/mp4", "m4a"),
        StreamKind::Video | StreamKind::Combined => ("video/mp4", "mp4"),
    };

    FormatSpec {
        itag: Itag::Number(format.itag),
        quality: format.quality.clone(),
        quality_label: format.label.clone(),
        mime_type: mime_type.to_owned(),
        container: container.to_owned(),
        has_video: format.kind.has_video(),
        has_audio: format.kind.has_audio(),
        width: format.width,
        height: format.height,
        bitrate: Some(f64::from(format.bitrate)),
        audio_bitrate: Some(f64::from(format.audio_bitrate)),
        url: Some(format!("{}&itag={}", watch_url(video_id), format.itag)),
    }
}
