use std::time::Duration;

use tracing::{info, warn};

use super::command::run_command_with_timeout;

/// Interface for the [ffmpeg](https://ffmpeg.org) program.
///
/// yt-dlp drives it by itself for merging and converting streams,
/// so all we need is to know whether it is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ffmpeg {
    Available,
    Missing,
}

impl Ffmpeg {
    /// Run the binary with `-version`, giving up after the timeout
    pub fn detect(program: &str, timeout: Duration) -> Self {
        match run_command_with_timeout(program, |cmd| cmd.arg("-version"), timeout) {
            Ok(true) => {
                info!("FFmpeg found at: {program}");
                Self::Available
            }
            Ok(false) => {
                warn!(
                    "FFmpeg not available ({program} -version failed), \
                     skipping all post-processing"
                );
                Self::Missing
            }
            Err(err) => {
                warn!("FFmpeg not available ({err}), skipping all post-processing");
                Self::Missing
            }
        }
    }

    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}
