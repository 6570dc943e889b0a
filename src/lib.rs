//! Fetch information about web videos and download them in a chosen format,
//! delegating the network transfer to `yt-dlp` and post-processing to `ffmpeg`.

pub mod cli;
pub mod config;
pub mod download;
pub mod extract;
pub mod formats;
pub mod io;
pub mod logging;
pub mod outside;
pub mod report;
pub mod result;
pub mod types;
pub mod video_url;
