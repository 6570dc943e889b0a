use url::Url;

use crate::result::{Error, Result};

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Path prefixes that carry the video ID as their next segment
const ID_PATH_PREFIXES: [&str; 3] = ["shorts", "embed", "live"];

/// Extract the video ID from a watch URL.
///
/// Recognized forms:
/// - `https://www.youtube.com/watch?v=<id>` (any `youtube.com` subdomain)
/// - `https://www.youtube.com/shorts/<id>`, `/embed/<id>`, `/live/<id>`
/// - `https://youtu.be/<id>`
///
/// Returns `None` for any other host or when the ID is empty.
pub fn extract_video_id(url: &str) -> Option<String> {
    let url = Url::parse(url.trim()).ok()?;
    let host = url.host_str()?.to_lowercase();

    let id = if is_host(&host, "youtube.com") {
        url.query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .or_else(|| {
                let mut segments = url.path_segments()?;
                let prefix = segments.next()?;
                ID_PATH_PREFIXES
                    .contains(&prefix)
                    .then(|| segments.next())
                    .flatten()
                    .map(str::to_owned)
            })
    } else if is_host(&host, "youtu.be") {
        url.path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_owned)
    } else {
        None
    }?;

    (!id.is_empty()).then_some(id)
}

/// Same as [`extract_video_id`] but fails with [`Error::InvalidUrl`]
pub fn parse_video_id(url: &str) -> Result<String> {
    extract_video_id(url).ok_or_else(|| Error::InvalidUrl(url.to_owned()))
}

/// Canonical watch page of a video
pub fn watch_url(video_id: &str) -> String {
    format!("{WATCH_URL}{video_id}")
}

fn is_host(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|sub| sub.ends_with('.'))
}
