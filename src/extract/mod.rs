//! Video information extraction.
//!
//! Several sources are tried in a fixed order, the first one yielding both
//! metadata and at least one format wins. A source is never retried.

mod fallback;
mod library;
mod scrape;

use std::fmt::Display;

use serde::Serialize;
use tracing::{info, warn};

pub use fallback::{static_formats, StaticSource};
pub use library::{normalize, LibrarySource};
pub use scrape::{parse_page, ScrapeSource};

use crate::{
    result::{Error, Result},
    types::{FormatSpec, VideoInfo},
};

/// The extraction methods, in the order they are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Metadata query through the external extraction tool
    Library,
    /// Direct fetch of the watch page and text-pattern extraction
    HtmlScrape,
    /// Placeholder metadata and the static format list
    StaticFallback,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Library => "yt-dlp extraction",
            Stage::HtmlScrape => "HTML page extraction",
            Stage::StaticFallback => "fallback format extraction",
        })
    }
}

/// What a source managed to extract
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// `None` when nothing about the video itself could be found
    pub info: Option<VideoInfo>,
    pub formats: Vec<FormatSpec>,
}

/// Successful extraction of the cascade
#[derive(Debug, Clone)]
pub struct Extraction {
    pub info: VideoInfo,
    pub formats: Vec<FormatSpec>,
    pub stage: Stage,
}

/// One way of getting the video information
pub trait InfoSource {
    fn stage(&self) -> Stage;

    fn extract(&self, url: &str) -> Result<Extracted>;
}

/// Ordered list of sources tried until one succeeds
#[derive(Default)]
pub struct InfoExtractor<'a> {
    sources: Vec<Box<dyn InfoSource + 'a>>,
}

impl<'a> InfoExtractor<'a> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn add_source(&mut self, source: Box<dyn InfoSource + 'a>) {
        self.sources.push(source);
    }

    /// Try every source in order and return the first complete result.
    ///
    /// A source is skipped when it fails, finds no metadata or finds no format.
    pub fn extract(&self, url: &str) -> Result<Extraction> {
        info!("Extracting video info for: {url}");

        for source in &self.sources {
            let stage = source.stage();
            info!("Trying {stage}...");

            match source.extract(url) {
                Ok(Extracted {
                    info: Some(info),
                    formats,
                }) if !formats.is_empty() => {
                    info!("✓ {stage} successful ({} formats)", formats.len());
                    return Ok(Extraction {
                        info,
                        formats,
                        stage,
                    });
                }
                Ok(Extracted { info: None, .. }) => warn!("{stage} found no video metadata"),
                Ok(_) => warn!("{stage} found no format"),
                Err(err) => warn!("{stage} failed: {err}"),
            }
        }

        Err(Error::Extraction(
            "Failed to extract video information".to_owned(),
        ))
    }
}
