use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, Environment, File, FileFormat};
use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;

use crate::types::ByteRate;

/// Built-in settings, overridden by the user file and the environment
const DEFAULT_SETTINGS: &str = include_str!("../config/default.toml");

/// Prefix of the environment variables overriding settings,
/// e.g. `YTFETCH__DOWNLOAD__RETRIES=3`
const ENV_PREFIX: &str = "YTFETCH";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub ytdlp: YtdlpSettings,
    pub ffmpeg: FfmpegSettings,
    pub download: DownloadSettings,
    pub info: InfoSettings,

    /// Replacement for the embedded format tables
    #[serde(default)]
    pub formats_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YtdlpSettings {
    pub program: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FfmpegSettings {
    pub program: String,
    pub detect_timeout_secs: u64,
}

impl FfmpegSettings {
    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout_secs)
    }
}

/// Tuning passed through to yt-dlp when downloading
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
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
    pub referer: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InfoSettings {
    /// Socket timeout given to yt-dlp for the metadata query
    pub socket_timeout_secs: u64,
    /// Connect and read timeout of the direct page fetch
    pub http_timeout_secs: u64,
}

impl InfoSettings {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Settings {
    /// Load the settings, layering the optional user file
    /// and the environment over the built-in defaults.
    pub fn load(user_file: Option<&Path>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_SETTINGS, FileFormat::Toml));

        if let Some(path) = user_file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .into_diagnostic()
            .wrap_err("Could not read settings")?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err("Invalid settings")
    }
}
