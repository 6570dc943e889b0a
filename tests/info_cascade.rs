use std::cell::Cell;

use serde_json::Value;
use ytfetch::{
    extract::{InfoExtractor, LibrarySource, ScrapeSource, Stage, StaticSource},
    formats::FormatTable,
    outside::{
        browser::Header, DownloadRequest, MediaExtractor, MetadataRequest, Page, PageFetcher,
        Progress, RawInfo,
    },
    report::InfoReport,
    result::{Error, Result},
};

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=ABC123";

/// Metadata queries answer with `info`, or fail when it is `None`
struct FakeYtdlp<'a> {
    info: Option<&'static str>,
    calls: &'a Cell<u32>,
}

impl MediaExtractor for FakeYtdlp<'_> {
    fn fetch_metadata(&self, _url: &str, request: &MetadataRequest) -> Result<RawInfo> {
        self.calls.set(self.calls.get() + 1);
        assert_eq!(request.socket_timeout_secs, 30);
        assert!(!request.user_agent.is_empty());

        match self.info {
            Some(json) => Ok(serde_json::from_str(json).unwrap()),
            None => Err(Error::Extraction("Sign in to confirm you're not a bot".to_owned())),
        }
    }

    fn download(
        &self,
        _url: &str,
        _request: &DownloadRequest,
        _on_progress: &mut dyn FnMut(Progress),
    ) -> Result<()> {
        unimplemented!()
    }
}

struct FakeFetcher<'a> {
    page: Page,
    calls: &'a Cell<u32>,
}

impl PageFetcher for FakeFetcher<'_> {
    fn get(&self, _url: &str, _headers: &[Header]) -> Result<Page> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.page.clone())
    }
}

struct Calls {
    library: Cell<u32>,
    scrape: Cell<u32>,
}

fn run_cascade(
    table: &FormatTable,
    calls: &Calls,
    info: Option<&'static str>,
    page: Page,
) -> Result<ytfetch::extract::Extraction> {
    let mut extractor = InfoExtractor::new();
    extractor.add_source(Box::new(LibrarySource::new(
        FakeYtdlp {
            info,
            calls: &calls.library,
        },
        30,
    )));
    extractor.add_source(Box::new(ScrapeSource::new(
        FakeFetcher {
            page,
            calls: &calls.scrape,
        },
        table,
    )));
    extractor.add_source(Box::new(StaticSource::new(table)));
    extractor.extract(VIDEO_URL)
}

fn calls() -> Calls {
    Calls {
        library: Cell::new(0),
        scrape: Cell::new(0),
    }
}

fn blocked_page() -> Page {
    Page {
        status: 429,
        body: String::new(),
    }
}

#[test]
fn library_success_stops_the_cascade() {
    let table = FormatTable::builtin().unwrap();
    let calls = calls();
    let info = r#"{
        "id": "ABC123",
        "title": "A video",
        "duration": 61.6,
        "view_count": 42,
        "formats": [
            {"format_id": "18", "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a", "url": "https://example.com/18"}
        ]
    }"#;

    let extraction = run_cascade(&table, &calls, Some(info), blocked_page()).unwrap();

    assert_eq!(extraction.stage, Stage::Library);
    assert_eq!(extraction.info.title, "A video");
    assert_eq!(extraction.info.duration, 62);
    assert_eq!(extraction.formats.len(), 1);
    assert_eq!(calls.library.get(), 1);
    assert_eq!(calls.scrape.get(), 0);
}

#[test]
fn library_without_formats_advances() {
    let table = FormatTable::builtin().unwrap();
    let calls = calls();
    let info = r#"{"id": "ABC123", "title": "A video", "formats": []}"#;

    let extraction = run_cascade(&table, &calls, Some(info), blocked_page()).unwrap();

    assert_eq!(extraction.stage, Stage::StaticFallback);
    assert_eq!(calls.library.get(), 1);
    assert_eq!(calls.scrape.get(), 1);
}

#[test]
fn everything_blocked_uses_static_formats() {
    let table = FormatTable::builtin().unwrap();
    let calls = calls();

    let extraction = run_cascade(&table, &calls, None, blocked_page()).unwrap();

    assert_eq!(extraction.stage, Stage::StaticFallback);
    assert_eq!(extraction.formats.len(), 28);
    assert_eq!(extraction.info.video_id, "ABC123");
    assert_eq!(
        extraction.info.thumbnail,
        "https://img.youtube.com/vi/ABC123/maxresdefault.jpg"
    );

    let video_only = extraction
        .formats
        .iter()
        .filter(|f| f.has_video && !f.has_audio)
        .count();
    let audio_only = extraction
        .formats
        .iter()
        .filter(|f| !f.has_video && f.has_audio)
        .count();
    assert_eq!((video_only, audio_only), (10, 6));
    assert!(extraction.formats.iter().all(|f| f
        .url
        .as_deref()
        .is_some_and(|url| url.starts_with("https://www.youtube.com/watch?v=ABC123&itag="))));

    let json: Value = serde_json::from_str(&InfoReport::success(&extraction).to_json()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["method"], "Python extraction");
    assert_eq!(json["stage"], "static_fallback");
    assert_eq!(json["formats"].as_array().unwrap().len(), 28);
}

#[test]
fn scraped_page_wins_over_static_formats() {
    let table = FormatTable::builtin().unwrap();
    let calls = calls();
    let page = Page {
        status: 200,
        body: indoc::indoc! {r#"
            <meta name="title" content="Scraped title">
            <script>{"lengthSeconds":"90","streamingData":{"adaptiveFormats":[
                {"itag":140,"url":"https://example.com/140","mimeType":"audio/mp4; codecs=\"mp4a.40.2\"","quality":"tiny"}
            ]}}</script>
        "#}
        .to_owned(),
    };

    let extraction = run_cascade(&table, &calls, None, page).unwrap();

    assert_eq!(extraction.stage, Stage::HtmlScrape);
    assert_eq!(extraction.info.title, "Scraped title");
    assert_eq!(extraction.info.duration, 90);
    assert_eq!(extraction.formats.len(), 1);
    assert!(extraction.formats[0].has_audio);
}

#[test]
fn failure_report_for_unknown_url() {
    let table = FormatTable::builtin().unwrap();
    let calls = calls();

    let mut extractor = InfoExtractor::new();
    extractor.add_source(Box::new(LibrarySource::new(
        FakeYtdlp {
            info: None,
            calls: &calls.library,
        },
        30,
    )));
    extractor.add_source(Box::new(StaticSource::new(&table)));

    let err = extractor.extract("https://example.com/not-a-video").unwrap_err();
    let Error::Extraction(reason) = err else {
        panic!("unexpected error: {err}");
    };

    let json: Value = serde_json::from_str(&InfoReport::failure(&reason).to_json()).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Failed to extract video information");
    assert_eq!(json["method"], "Python extraction");
}
