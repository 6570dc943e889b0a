use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{debug, info};

use super::{static_formats, Extracted, InfoSource, Stage};
use crate::{
    formats::FormatTable,
    outside::{browser, PageFetcher},
    result::{Error, Result},
    types::{container_from_mime, thumbnail_url, FormatSpec, Itag, VideoInfo},
    video_url::{parse_video_id, watch_url},
};

const SITE_NAME: &str = "YouTube";

/// Direct fetch of the watch page and text-pattern extraction.
///
/// When the page has metadata but no parsable stream list, the static format
/// list is used in its place.
pub struct ScrapeSource<'a, F> {
    fetcher: F,
    table: &'a FormatTable,
}

impl<'a, F: PageFetcher> ScrapeSource<'a, F> {
    pub fn new(fetcher: F, table: &'a FormatTable) -> Self {
        Self { fetcher, table }
    }
}

impl<F: PageFetcher> InfoSource for ScrapeSource<'_, F> {
    fn stage(&self) -> Stage {
        Stage::HtmlScrape
    }

    fn extract(&self, url: &str) -> Result<Extracted> {
        let video_id = parse_video_id(url)?;

        let mut headers = vec![("User-Agent", browser::random_user_agent().to_owned())];
        headers.extend(browser::navigation_headers());

        let page = self.fetcher.get(&watch_url(&video_id), &headers)?;
        if !page.is_ok() {
            return Err(Error::Extraction(format!(
                "Watch page returned status {}",
                page.status
            )));
        }

        let mut extracted = parse_page(&page.body, &video_id);
        if extracted.info.is_some() && extracted.formats.is_empty() {
            info!("No stream list in the page, using the static format list");
            extracted.formats = static_formats(self.table, &video_id);
        }
        Ok(extracted)
    }
}

struct Patterns {
    /// A whole `<meta>` or `<link>` tag
    tag: Regex,
    /// One `key="value"` attribute inside a tag
    attribute: Regex,
    title: Regex,
    author: Regex,
    length_seconds: Regex,
    view_count: Regex,
    view_count_text: Regex,
    upload_date: Regex,
    unicode_escape: Regex,
    entity: Regex,
    markup: Regex,
}

/// Value of a JSON string, escapes included
macro_rules! json_string {
    () => {
        r#""((?:[^"\\]|\\.)*)""#
    };
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        tag: Regex::new(r"(?is)<(meta|link)\b([^>]*)>").unwrap(),
        attribute: Regex::new(r#"([\w:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap(),
        title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap(),
        author: Regex::new(concat!(r#""author"\s*:\s*"#, json_string!())).unwrap(),
        length_seconds: Regex::new(r#""lengthSeconds"\s*:\s*"(\d+)""#).unwrap(),
        view_count: Regex::new(r#""viewCount"\s*:\s*"(\d+)""#).unwrap(),
        view_count_text: Regex::new(
            r#""viewCountText"\s*:\s*\{\s*"(?:simpleText"\s*:\s*|runs"\s*:\s*\[\s*\{\s*"text"\s*:\s*)"([\d,.\s]+)"#,
        )
        .unwrap(),
        upload_date: Regex::new(concat!(r#""uploadDate"\s*:\s*"#, json_string!())).unwrap(),
        unicode_escape: Regex::new(r"\\u([0-9a-fA-F]{4})").unwrap(),
        entity: Regex::new(r"&(#[xX][0-9a-fA-F]+|#\d+|[a-zA-Z]+);").unwrap(),
        markup: Regex::new(r"<[^>]+>").unwrap(),
    })
}

/// Extract what can be found about a video in its watch page.
///
/// The returned info is `None` only when neither metadata nor any stream was
/// found. Missing fields keep their defaults.
pub fn parse_page(html: &str, video_id: &str) -> Extracted {
    let re = patterns();
    let mut found = false;
    let mut info = VideoInfo::placeholder(video_id);

    let mut found_field = |value: Option<String>, field: &mut String| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            *field = value;
            found = true;
        }
    };

    found_field(
        meta_content(html, "title")
            .and_then(video_title)
            .or_else(|| meta_content(html, "og:title").and_then(video_title))
            .or_else(|| video_title(clean_text(re.title.captures(html)?.get(1)?.as_str()))),
        &mut info.title,
    );
    found_field(
        meta_content(html, "description").or_else(|| meta_content(html, "og:description")),
        &mut info.description,
    );
    found_field(
        meta_content(html, "author").or_else(|| json_capture(&re.author, html)),
        &mut info.author,
    );
    found_field(
        json_capture(&re.upload_date, html)
            .or_else(|| meta_content(html, "uploadDate"))
            .or_else(|| meta_content(html, "datePublished")),
        &mut info.upload_date,
    );
    found_field(
        capture(&re.view_count_text, html)
            .map(|text| text.chars().filter(char::is_ascii_digit).collect())
            .or_else(|| capture(&re.view_count, html)),
        &mut info.views,
    );

    if let Some(duration) = capture(&re.length_seconds, html).and_then(|d| d.parse().ok()) {
        info.duration = duration;
        found = true;
    }

    info.thumbnail = meta_content(html, "og:image")
        .or_else(|| meta_content(html, "twitter:image"))
        .or_else(|| link_href(html, "image_src"))
        .unwrap_or_else(|| thumbnail_url(video_id));

    let formats = stream_formats(html);
    debug!("Scraped metadata: {found}, {} formats", formats.len());

    Extracted {
        info: (found || !formats.is_empty()).then_some(info),
        formats,
    }
}

/// Title of the video itself, not the generic one of the site
fn video_title(title: String) -> Option<String> {
    let title = title.trim();
    let title = title
        .strip_suffix(SITE_NAME)
        .and_then(|rest| rest.trim_end().strip_suffix('-'))
        .unwrap_or(title)
        .trim();
    (!title.is_empty() && !title.eq_ignore_ascii_case(SITE_NAME)).then(|| title.to_owned())
}

/// Content of the first `<meta>` tag whose name, property or itemprop matches
fn meta_content(html: &str, name: &str) -> Option<String> {
    tag_attribute(html, "meta", &["name", "property", "itemprop"], name, "content")
}

fn link_href(html: &str, rel: &str) -> Option<String> {
    tag_attribute(html, "link", &["rel"], rel, "href")
}

fn tag_attribute(
    html: &str,
    tag_name: &str,
    keys: &[&str],
    expected: &str,
    wanted: &str,
) -> Option<String> {
    let re = patterns();

    re.tag
        .captures_iter(html)
        .filter(|caps| caps[1].eq_ignore_ascii_case(tag_name))
        .find_map(|caps| {
            let attributes: Vec<(String, &str)> = re
                .attribute
                .captures_iter(caps.get(2)?.as_str())
                .filter_map(|attr| {
                    let value = attr.get(2).or_else(|| attr.get(3))?.as_str();
                    Some((attr[1].to_ascii_lowercase(), value))
                })
                .collect();

            let matches = attributes
                .iter()
                .any(|(key, value)| keys.contains(&key.as_str()) && *value == expected);
            if !matches {
                return None;
            }

            attributes
                .iter()
                .find(|(key, _)| key == wanted)
                .map(|(_, value)| clean_text(value))
        })
}

fn capture(re: &Regex, html: &str) -> Option<String> {
    Some(re.captures(html)?.get(1)?.as_str().to_owned())
}

/// Capture of a JSON string value, unescaped and cleaned
fn json_capture(re: &Regex, html: &str) -> Option<String> {
    let raw = re.captures(html)?.get(1)?.as_str();
    let value: String = serde_json::from_str(&format!("\"{raw}\"")).ok()?;
    Some(clean_text(&value))
}

/// Decode escapes and entities, strip markup and collapse whitespace
fn clean_text(raw: &str) -> String {
    let re = patterns();

    let unescaped = re.unicode_escape.replace_all(raw, |caps: &Captures| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    let decoded = re.entity.replace_all(&unescaped, |caps: &Captures| {
        decode_entity(&caps[1]).map_or_else(|| caps[0].to_owned(), String::from)
    });
    let stripped = re.markup.replace_all(&decoded, " ");

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(entity: &str) -> Option<char> {
    let code = match entity {
        "amp" => return Some('&'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "quot" => return Some('"'),
        "apos" => return Some('\''),
        "nbsp" => return Some(' '),
        _ => entity.strip_prefix('#')?,
    };

    let value = match code.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse().ok()?,
    };
    char::from_u32(value)
}

/// One stream of the page's `streamingData`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageFormat {
    itag: u32,
    url: Option<String>,
    mime_type: Option<String>,
    quality: Option<String>,
    quality_label: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bitrate: Option<f64>,
    audio_bitrate: Option<f64>,
    has_video: Option<bool>,
    has_audio: Option<bool>,
}

impl PageFormat {
    fn into_format_spec(self, combined: bool) -> FormatSpec {
        let mime_type = self.mime_type.unwrap_or_default();
        let quality = self.quality.unwrap_or_else(|| "unknown".to_owned());
        let (has_video, has_audio) = if combined {
            (true, true)
        } else {
            (
                self.has_video.unwrap_or_else(|| mime_type.starts_with("video/")),
                self.has_audio.unwrap_or_else(|| mime_type.starts_with("audio/")),
            )
        };

        FormatSpec {
            itag: Itag::Number(self.itag),
            quality_label: self.quality_label.unwrap_or_else(|| quality.clone()),
            quality,
            container: container_from_mime(&mime_type).unwrap_or("mp4").to_owned(),
            mime_type,
            has_video,
            has_audio,
            width: self.width,
            height: self.height,
            bitrate: self.bitrate,
            audio_bitrate: self.audio_bitrate,
            url: self.url,
        }
    }
}

/// Streams listed in the page's `streamingData` object.
///
/// `formats` holds the combined streams and `adaptiveFormats` the separate
/// video and audio ones. Entries that do not parse are skipped.
fn stream_formats(html: &str) -> Vec<FormatSpec> {
    let Some(streaming_data) = json_value_after_key(html, "streamingData") else {
        return Vec::new();
    };

    [("formats", true), ("adaptiveFormats", false)]
        .into_iter()
        .filter_map(|(key, combined)| {
            let array = json_value_after_key(streaming_data, key)?;
            let entries: Vec<serde_json::Value> = serde_json::from_str(array)
                .map_err(|err| debug!("Could not parse {key}: {err}"))
                .ok()?;
            Some(entries.into_iter().filter_map(move |entry| {
                serde_json::from_value::<PageFormat>(entry)
                    .ok()
                    .map(|format| format.into_format_spec(combined))
            }))
        })
        .flatten()
        .collect()
}

/// The JSON object or array following the first `"key":` in the text
fn json_value_after_key<'t>(text: &'t str, key: &str) -> Option<&'t str> {
    let quoted = format!("\"{key}\"");

    text.match_indices(&quoted).find_map(|(idx, _)| {
        let rest = text[idx + quoted.len()..].trim_start();
        let rest = rest.strip_prefix(':')?.trim_start();
        let start = text.len() - rest.len();
        balanced_json(text, start)
    })
}

/// The bracketed JSON value starting at `start`, nested brackets and strings
/// taken into account
fn balanced_json(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    if !matches!(bytes.get(start), Some(b'[' | b'{')) {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use indoc::indoc;

    use super::*;
    use crate::{outside::Page, result::Result};

    const WATCH_PAGE: &str = indoc! {r#"
        <html><head>
        <title>Fallback title - YouTube</title>
        <meta name="title" content="Rock &amp; Roll &quot;Live&quot;">
        <meta name="description" content="First line
            second   line &#39;quoted&#39;">
        <meta property="og:image" content="https://i.ytimg.com/vi/ABC123/hqdefault.jpg">
        <meta itemprop="datePublished" content="2024-01-01">
        </head><body>
        <script>var ytInitialPlayerResponse = {"videoDetails":{"videoId":"ABC123","lengthSeconds":"212","author":"Some & One","viewCount":"1234567"},
        "streamingData":{"expiresInSeconds":"21540",
          "formats":[{"itag":18,"url":"https://example.com/18?a=1\u0026b=2","mimeType":"video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"","quality":"medium","qualityLabel":"360p","width":640,"height":360,"bitrate":503351}],
          "adaptiveFormats":[
            {"itag":137,"url":"https://example.com/137","mimeType":"video/mp4; codecs=\"avc1.640028\"","quality":"hd1080","qualityLabel":"1080p","width":1920,"height":1080,"bitrate":4400000},
            {"itag":251,"signatureCipher":"s=abc]]}}","mimeType":"audio/webm; codecs=\"opus\"","quality":"tiny","bitrate":160000},
            {"broken":true}
          ]},
        "microformat":{"playerMicroformatRenderer":{"uploadDate":"2024-01-01T00:00:00-08:00"}}};</script>
        </body></html>
    "#};

    #[test]
    fn parses_metadata() {
        let info = parse_page(WATCH_PAGE, "ABC123").info.unwrap();
        assert_eq!(info.title, r#"Rock & Roll "Live""#);
        assert_eq!(info.description, "First line second line 'quoted'");
        assert_eq!(info.thumbnail, "https://i.ytimg.com/vi/ABC123/hqdefault.jpg");
        assert_eq!(info.duration, 212);
        assert_eq!(info.views, "1234567");
        assert_eq!(info.author, "Some & One");
        assert_eq!(info.upload_date, "2024-01-01T00:00:00-08:00");
        assert_eq!(info.video_id, "ABC123");
    }

    #[test]
    fn parses_streaming_data() {
        let formats = parse_page(WATCH_PAGE, "ABC123").formats;
        assert_eq!(formats.len(), 3);

        let combined = &formats[0];
        assert_eq!(combined.itag, Itag::Number(18));
        assert!(combined.has_video && combined.has_audio);
        assert_eq!(combined.container, "mp4");
        assert_eq!(combined.quality_label, "360p");
        assert_eq!(
            combined.url.as_deref(),
            Some("https://example.com/18?a=1&b=2")
        );

        let video = &formats[1];
        assert!(video.has_video && !video.has_audio);
        assert_eq!(video.height, Some(1080));

        let audio = &formats[2];
        assert_eq!(audio.itag, Itag::Number(251));
        assert!(!audio.has_video && audio.has_audio);
        assert_eq!(audio.container, "webm");
        assert_eq!(audio.quality_label, "tiny");
        assert_eq!(audio.url, None);
    }

    #[test]
    fn title_falls_back_to_title_tag() {
        let html = "<html><head><title>My video - YouTube</title></head></html>";
        let info = parse_page(html, "ABC123").info.unwrap();
        assert_eq!(info.title, "My video");
        assert_eq!(info.author, "Unknown Author");
        assert_eq!(
            info.thumbnail,
            "https://img.youtube.com/vi/ABC123/maxresdefault.jpg"
        );
    }

    #[test]
    fn site_title_is_not_a_video_title() {
        // Consent and error pages only carry the site name
        let html = "<html><head><title>YouTube</title></head></html>";
        assert!(parse_page(html, "ABC123").info.is_none());

        let html = "<title> - YouTube</title>";
        assert!(parse_page(html, "ABC123").info.is_none());

        let html = r#"<meta name="title" content="YouTube"><title>Clip - YouTube</title>"#;
        assert_eq!(parse_page(html, "ABC123").info.unwrap().title, "Clip");
    }

    #[test]
    fn view_count_text_fallback() {
        let html = r#"{"viewCountText":{"simpleText":"1,234 views"}}"#;
        let info = parse_page(html, "ABC123").info.unwrap();
        assert_eq!(info.views, "1234");
    }

    #[test]
    fn empty_page_has_nothing() {
        let extracted = parse_page("<html><body>Sign in</body></html>", "ABC123");
        assert!(extracted.info.is_none());
        assert!(extracted.formats.is_empty());
    }

    #[test]
    fn balanced_json_skips_brackets_in_strings() {
        let text = r#"x = {"a": "}]\"{", "b": [1, {"c": 2}]} trailing }"#;
        assert_eq!(
            balanced_json(text, 4),
            Some(r#"{"a": "}]\"{", "b": [1, {"c": 2}]}"#)
        );
        assert_eq!(balanced_json("[1, 2", 0), None);
        assert_eq!(balanced_json("abc", 0), None);
    }

    #[test]
    fn clean_text_decoding() {
        assert_eq!(clean_text("A &amp; B"), "A & B");
        assert_eq!(clean_text(r"caf\u00e9"), "café");
        assert_eq!(clean_text("<b>bold</b>&nbsp;&#x41;"), "bold A");
        assert_eq!(clean_text("&unknown; stays"), "&unknown; stays");
    }

    struct FakeFetcher<'a> {
        page: Page,
        calls: &'a Cell<u32>,
    }

    impl PageFetcher for FakeFetcher<'_> {
        fn get(&self, url: &str, headers: &[browser::Header]) -> Result<Page> {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(url, "https://www.youtube.com/watch?v=ABC123");
            assert!(headers.iter().any(|(name, _)| *name == "User-Agent"));
            Ok(self.page.clone())
        }
    }

    fn fetch(status: u16, body: &str) -> Result<Extracted> {
        let table = FormatTable::builtin().unwrap();
        let calls = Cell::new(0);
        let source = ScrapeSource::new(
            FakeFetcher {
                page: Page {
                    status,
                    body: body.to_owned(),
                },
                calls: &calls,
            },
            &table,
        );
        let res = source.extract("https://youtu.be/ABC123");
        assert_eq!(calls.get(), 1);
        res
    }

    #[test]
    fn non_ok_status_fails() {
        assert!(matches!(fetch(429, WATCH_PAGE), Err(Error::Extraction(_))));
    }

    #[test]
    fn metadata_without_streams_uses_static_formats() {
        let html = r#"<meta name="title" content="Only a title">"#;
        let extracted = fetch(200, html).unwrap();
        assert_eq!(extracted.info.unwrap().title, "Only a title");
        assert_eq!(extracted.formats.len(), 28);
    }

    #[test]
    fn streams_without_metadata_are_kept() {
        let html = indoc! {r#"
            "streamingData":{"formats":[{"itag":18,"mimeType":"video/mp4","quality":"medium"}]}
        "#};
        let extracted = fetch(200, html).unwrap();
        let info = extracted.info.unwrap();
        assert_eq!(info.title, "Unknown Title");
        assert_eq!(extracted.formats.len(), 1);
    }
}
