use std::path::Path;

use time::OffsetDateTime;
use tracing::{debug, error, info};

use crate::{
    config::DownloadSettings,
    formats::FormatTable,
    io,
    outside::{browser, DownloadRequest, Ffmpeg, MediaExtractor, PostProcess, Progress},
    result::{Error, Result},
    types::FormatSelection,
    video_url::parse_video_id,
};

const MIB: f64 = 1024.0 * 1024.0;

/// Containers yt-dlp can merge separate video and audio streams into
const MERGE_CONTAINERS: [&str; 4] = ["mp4", "mkv", "webm", "mov"];

/// Downloads one video in a chosen format to a local file
pub struct Downloader<'a, E> {
    extractor: E,
    table: &'a FormatTable,
    settings: &'a DownloadSettings,
    ffmpeg: Ffmpeg,
}

impl<'a, E: MediaExtractor> Downloader<'a, E> {
    pub fn new(
        extractor: E,
        table: &'a FormatTable,
        settings: &'a DownloadSettings,
        ffmpeg: Ffmpeg,
    ) -> Self {
        Self {
            extractor,
            table,
            settings,
            ffmpeg,
        }
    }

    /// Download the video of `url` in the format `format_id` to `output`.
    ///
    /// The file is written next to `output` under a timestamped name, then moved
    /// into place once it is known to be non-empty. Nothing is left behind on failure.
    pub fn download(&self, url: &str, format_id: &str, output: &Path) -> Result<()> {
        let video_id = parse_video_id(url)?;
        info!("Downloading video {video_id} in format {format_id}");

        io::create_parent_dir(output)?;
        let tmp_output = io::timestamped_path(output, OffsetDateTime::now_utc().unix_timestamp());
        debug!("Temporary output: {}", tmp_output.display());

        let request = self.request(format_id, &tmp_output);
        info!("Format selection: {}", request.format);

        let res = self
            .extractor
            .download(url, &request, &mut progress_logger())
            .and_then(|()| check_output(&tmp_output))
            .and_then(|size| {
                io::move_file(&tmp_output, output)?;
                Ok(size)
            });

        match res {
            Ok(size) => {
                info!(
                    "Download completed: {} ({:.2} MB)",
                    output.display(),
                    size as f64 / MIB
                );
                Ok(())
            }
            Err(err) => {
                io::remove_partial_files(&tmp_output);
                Err(err)
            }
        }
    }

    /// Options handed to the extraction tool for one download
    pub fn request(&self, format_id: &str, output: &Path) -> DownloadRequest {
        let audio_only = self.table.is_audio_only(format_id);
        let selection: FormatSelection = self.table.resolve(format_id, audio_only);

        let (concurrent_fragments, throttled_rate) = match self.table.tuning(format_id) {
            Some(tuning) => (tuning.concurrent_fragments, tuning.throttled_rate),
            None => (
                self.settings.concurrent_fragments,
                self.settings.throttled_rate,
            ),
        };

        let post_process = match (self.ffmpeg.is_available(), audio_only) {
            (false, _) => PostProcess::None,
            (true, true) => PostProcess::ExtractAudio,
            (true, false) => PostProcess::ConvertVideo,
        };

        let merge_output_format = if audio_only {
            None
        } else {
            output
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .filter(|ext| MERGE_CONTAINERS.contains(&ext.as_str()))
        };

        DownloadRequest {
            format: selection.to_string(),
            output: output.to_path_buf(),
            retries: self.settings.retries,
            fragment_retries: self.settings.fragment_retries,
            concurrent_fragments,
            throttled_rate,
            socket_timeout_secs: self.settings.socket_timeout_secs,
            http_chunk_size: self.settings.http_chunk_size,
            sleep_requests_secs: self.settings.sleep_requests_secs,
            sleep_interval_secs: self.settings.sleep_interval_secs,
            max_sleep_interval_secs: self.settings.max_sleep_interval_secs,
            geo_bypass_country: self.settings.geo_bypass_country.clone(),
            user_agent: self.settings.user_agent.clone(),
            referer: self.settings.referer.clone(),
            headers: browser::download_headers(),
            post_process,
            merge_output_format,
        }
    }
}

/// Size of the downloaded file, which must exist and not be empty
fn check_output(path: &Path) -> Result<u64> {
    match io::file_size(path) {
        Some(size) if size > 0 => Ok(size),
        _ => Err(Error::Postcondition(path.to_path_buf())),
    }
}

/// Progress callback logging each whole percent once
fn progress_logger() -> impl FnMut(Progress) {
    let mut last_percent = None;

    move |progress| match progress {
        Progress::Downloading {
            downloaded_bytes,
            total_bytes,
        } => {
            let Some(percent) = progress.percent() else {
                debug!("Downloaded {:.1}MB", downloaded_bytes as f64 / MIB);
                return;
            };

            let whole = percent as u32;
            if last_percent == Some(whole) {
                return;
            }
            last_percent = Some(whole);

            info!(
                "Download progress: {percent:.1}% ({:.1}MB / {:.1}MB)",
                downloaded_bytes as f64 / MIB,
                total_bytes.unwrap_or_default() as f64 / MIB
            );
        }
        Progress::Finished => info!("Download finished, now processing..."),
        Progress::Error => error!("Download error occurred"),
    }
}
