use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser};
use tracing::Level;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("YTFETCH_", $v)
    };
}

/// Options shared by both programs
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Settings file layered over the built-in defaults.
    /// Each setting can also be overridden through a
    /// `YTFETCH__<SECTION>__<KEY>` environment variable
    #[arg(long, env = arg_env!("CONFIG"))]
    pub config: Option<PathBuf>,

    /// Also log debug messages
    #[arg(short, long, env = arg_env!("VERBOSE"))]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

/// Download a video in the chosen format.
///
/// Prints `SUCCESS: Video downloaded to <output>` or `FAILED: Video download failed`
/// as its last line.
#[derive(Parser, Debug)]
#[command(name = "ytfetch-download", version)]
pub struct DownloadArgs {
    /// The watch URL of the video
    pub url: String,

    /// The format ID to download, e.g. `137` or `140`.
    /// Unknown IDs fall back to the best available streams
    pub format_id: String,

    /// The path of the file to create
    pub output: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Print the information and available formats of a video as JSON
#[derive(Parser, Debug)]
#[command(name = "ytfetch-info", version)]
pub struct InfoArgs {
    /// The watch URL of the video
    pub url: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Parse the command line arguments.
///
/// Help and version requests exit successfully. Other errors are reported
/// through `on_usage_error` and exit with a failure code.
pub fn parse_args<P: Parser>(on_usage_error: impl FnOnce(&clap::Error)) -> Result<P, ExitCode> {
    P::try_parse().map_err(|err| {
        if err.use_stderr() {
            on_usage_error(&err);
            ExitCode::FAILURE
        } else {
            let _ = err.print();
            ExitCode::SUCCESS
        }
    })
}
