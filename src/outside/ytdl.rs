use std::{
    ffi::OsString,
    io::{BufRead, BufReader, Read},
    path::PathBuf,
    process::{Command, Stdio},
    sync::OnceLock,
    thread,
};

use miette::{Context, IntoDiagnostic};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, trace};

use super::{
    browser::Header,
    command::{assert_success_command, run_command, spawn_error, Capture},
};
use crate::{
    result::{err_msg, Error, Result},
    types::ByteRate,
};

/// Marker of the progress lines printed through `--progress-template`
const PROGRESS_MARKER: &str = "[ytfetch-progress]";

/// Metadata record printed by `yt-dlp -J`.
///
/// Every field is optional as extractors fill them unevenly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub upload_date: Option<String>,
    pub uploader: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

/// One entry of the `formats` list printed by `yt-dlp -J`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    pub format_note: Option<String>,
    pub quality: Option<f64>,
    pub ext: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Total bitrate in kbps
    pub tbr: Option<f64>,
    /// Audio bitrate in kbps
    pub abr: Option<f64>,
    pub url: Option<String>,
}

/// Options of a metadata-only query
#[derive(Debug, Clone)]
pub struct MetadataRequest {
    pub user_agent: String,
    pub headers: Vec<Header>,
    pub socket_timeout_secs: u64,
}

/// What yt-dlp should do with the file once downloaded (through ffmpeg)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    /// Leave the downloaded streams untouched
    None,
    /// Extract the audio to the best quality m4a and embed metadata
    ExtractAudio,
    /// Convert the video to mp4 and embed metadata
    ConvertVideo,
}

/// Options of a full download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Format selection expression
    pub format: String,
    pub output: PathBuf,
    pub retries: u32,
    pub fragment_retries: u32,
    pub concurrent_fragments: u32,
    pub throttled_rate: ByteRate,
    pub socket_timeout_secs: u64,
    pub http_chunk_size: ByteRate,
    pub sleep_requests_secs: u32,
    pub sleep_interval_secs: u32,
    pub max_sleep_interval_secs: u32,
    pub geo_bypass_country: String,
    pub user_agent: String,
    pub referer: String,
    pub headers: Vec<Header>,
    pub post_process: PostProcess,
    /// Container of merged video and audio streams, when the output names one
    pub merge_output_format: Option<String>,
}

/// Download progress reported while yt-dlp runs
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Downloading {
        downloaded_bytes: u64,
        /// Exact or estimated size, when known
        total_bytes: Option<u64>,
    },
    Finished,
    Error,
}

impl Progress {
    /// Percentage downloaded, when the total size is known
    pub fn percent(&self) -> Option<f64> {
        match self {
            Progress::Downloading {
                downloaded_bytes,
                total_bytes: Some(total),
            } if *total > 0 => Some(*downloaded_bytes as f64 / *total as f64 * 100.0),
            _ => None,
        }
    }
}

/// Interface for the external media extraction tool
pub trait MediaExtractor {
    /// Query the video metadata and its available formats, without downloading
    fn fetch_metadata(&self, url: &str, request: &MetadataRequest) -> Result<RawInfo>;

    /// Download the selected streams to `request.output`,
    /// reporting progress to the callback as it goes.
    fn download(
        &self,
        url: &str,
        request: &DownloadRequest,
        on_progress: &mut dyn FnMut(Progress),
    ) -> Result<()>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
#[derive(Debug, Clone)]
pub struct Ytdlp {
    program: String,
}

impl Ytdlp {
    /// Verify that the `yt-dlp` binary is reachable
    pub fn new(program: &str) -> Result<Self> {
        match assert_success_command(program, |cmd| cmd.arg("--version")) {
            Ok(()) => Ok(Self {
                program: program.to_owned(),
            }),
            Err(err @ Error::MissingDependency(_)) => Err(err),
            Err(err) => Err(err.wrap_err_with(|| format!("{program} is not usable"))),
        }
    }
}

impl MediaExtractor for Ytdlp {
    fn fetch_metadata(&self, url: &str, request: &MetadataRequest) -> Result<RawInfo> {
        let res = run_command(
            &self.program,
            |cmd| cmd.args(metadata_args(url, request)),
            Capture::STDOUT | Capture::STDERR,
        )?;

        if !res.status.success() {
            let stderr = String::from_utf8_lossy(&res.stderr);
            return Err(Error::Extraction(last_error_line(&stderr)));
        }

        serde_json::from_slice(&res.stdout)
            .into_diagnostic()
            .wrap_err("Could not parse yt-dlp JSON output")
            .map_err(Error::from)
    }

    fn download(
        &self,
        url: &str,
        request: &DownloadRequest,
        on_progress: &mut dyn FnMut(Progress),
    ) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(download_args(url, request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Executing command: {cmd:?}");
        let mut child = cmd.spawn().map_err(|err| spawn_error(&self.program, err))?;

        // Drain stderr on the side so that a chatty yt-dlp never blocks on a full pipe
        let stderr = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(|line| line.ok()) {
                match parse_progress(&line) {
                    Some(progress) => on_progress(progress),
                    None if line.starts_with("[Merger]") || line.starts_with("[ExtractAudio]") => {
                        info!("{line}")
                    }
                    None => trace!("yt-dlp: {line}"),
                }
            }
        }

        let status = child.wait()?;
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        trace!("yt-dlp stderr: {stderr:?}");

        if status.success() {
            Ok(())
        } else {
            Err(err_msg(format!(
                "yt-dlp exited with {status}: {}",
                last_error_line(&stderr)
            )))
        }
    }
}

fn header_args(user_agent: &str, headers: &[Header]) -> Vec<OsString> {
    let mut args = vec![
        OsString::from("--add-header"),
        OsString::from(format!("User-Agent:{user_agent}")),
    ];
    for (name, value) in headers {
        args.push("--add-header".into());
        args.push(format!("{name}:{value}").into());
    }
    args
}

/// Arguments of a metadata-only query
pub fn metadata_args(url: &str, request: &MetadataRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-J", "--skip-download", "--no-warnings", "--no-playlist"]
        .into_iter()
        .map(OsString::from)
        .collect();

    args.push("--socket-timeout".into());
    args.push(request.socket_timeout_secs.to_string().into());
    args.extend(header_args(&request.user_agent, &request.headers));

    args.push("--".into());
    args.push(url.into());
    args
}

/// Arguments of a full download
pub fn download_args(url: &str, request: &DownloadRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    let mut push = |key: &str, value: String| {
        args.push(key.into());
        args.push(value.into());
    };

    push("-f", request.format.clone());
    push("--retries", request.retries.to_string());
    push("--fragment-retries", request.fragment_retries.to_string());
    push("--concurrent-fragments", request.concurrent_fragments.to_string());
    push("--throttled-rate", request.throttled_rate.to_string());
    push("--socket-timeout", request.socket_timeout_secs.to_string());
    push("--http-chunk-size", request.http_chunk_size.to_string());
    push("--sleep-requests", request.sleep_requests_secs.to_string());
    push("--sleep-interval", request.sleep_interval_secs.to_string());
    push("--max-sleep-interval", request.max_sleep_interval_secs.to_string());
    push("--geo-bypass-country", request.geo_bypass_country.clone());
    if let Some(container) = &request.merge_output_format {
        push("--merge-output-format", container.clone());
    }
    push(
        "--progress-template",
        format!(
            "download:{PROGRESS_MARKER} %(progress.status)s %(progress.downloaded_bytes)s \
             %(progress.total_bytes)s %(progress.total_bytes_estimate)s"
        ),
    );

    args.extend(
        [
            "--abort-on-unavailable-fragments",
            "--no-check-certificates",
            "--no-playlist",
            "--newline",
        ]
        .into_iter()
        .map(OsString::from),
    );

    let mut headers = request.headers.clone();
    headers.push(("Referer", request.referer.clone()));
    args.extend(header_args(&request.user_agent, &headers));

    match request.post_process {
        PostProcess::None => {}
        PostProcess::ExtractAudio => args.extend(
            [
                "-x",
                "--audio-format",
                "m4a",
                "--audio-quality",
                "0",
                "--embed-metadata",
            ]
            .into_iter()
            .map(OsString::from),
        ),
        PostProcess::ConvertVideo => args.extend(
            ["--recode-video", "mp4", "--embed-metadata"]
                .into_iter()
                .map(OsString::from),
        ),
    }

    args.push("-o".into());
    args.push(request.output.as_os_str().to_owned());
    args.push("--".into());
    args.push(url.into());
    args
}

/// Parse a line printed through our `--progress-template`
pub fn parse_progress(line: &str) -> Option<Progress> {
    static PROGRESS_RE: OnceLock<Regex> = OnceLock::new();
    let re = PROGRESS_RE.get_or_init(|| {
        Regex::new(r"^\[ytfetch-progress\] (?P<status>\w+) (?P<done>\S+) (?P<total>\S+) (?P<estimate>\S+)")
            .expect("progress regex is valid")
    });

    let caps = re.captures(line.trim())?;
    // yt-dlp prints "NA" for unknown values and may print floats for estimates
    let number = |name| {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|n| n as u64)
    };

    match &caps["status"] {
        "downloading" => Some(Progress::Downloading {
            downloaded_bytes: number("done").unwrap_or(0),
            total_bytes: number("total").or_else(|| number("estimate")),
        }),
        "finished" => Some(Progress::Finished),
        "error" => Some(Progress::Error),
        _ => None,
    }
}

/// Most relevant line of yt-dlp's stderr to report a failure
fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("no error output")
        .trim()
        .to_owned()
}
