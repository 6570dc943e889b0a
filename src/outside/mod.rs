pub mod browser;
mod command;
mod ffmpeg;
mod http;
mod ytdl;

pub use ffmpeg::Ffmpeg;
pub use http::{HttpClient, Page, PageFetcher};
pub use ytdl::{
    download_args, DownloadRequest, MediaExtractor, MetadataRequest, PostProcess, Progress,
    RawFormat, RawInfo, Ytdlp,
};
