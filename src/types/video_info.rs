use serde::Serialize;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Metadata of one source video
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    /// Duration in seconds
    pub duration: u64,
    /// View count as a plain decimal string
    pub views: String,
    pub upload_date: String,
    pub author: String,
    pub video_id: String,
}

impl VideoInfo {
    /// Placeholder info for a video known only by its ID
    pub fn placeholder(video_id: &str) -> Self {
        Self {
            thumbnail: thumbnail_url(video_id),
            video_id: video_id.to_owned(),
            ..Self::default()
        }
    }
}

impl Default for VideoInfo {
    fn default() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_owned(),
            description: String::new(),
            thumbnail: String::new(),
            duration: 0,
            views: "0".to_owned(),
            upload_date: String::new(),
            author: UNKNOWN_AUTHOR.to_owned(),
            video_id: String::new(),
        }
    }
}

/// Highest resolution thumbnail the host publishes for a video
pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}
