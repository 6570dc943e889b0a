use std::process::ExitCode;

use tracing::error;
use ytfetch::{
    cli::{self, DownloadArgs},
    config::Settings,
    download::Downloader,
    formats::FormatTable,
    logging::{init_logging, LogTarget},
    outside::{Ffmpeg, Ytdlp},
    report,
    result::Result,
    video_url::parse_video_id,
};

fn main() -> ExitCode {
    let args = match cli::parse_args::<DownloadArgs>(|err| {
        let _ = err.print();
    }) {
        Ok(args) => args,
        Err(code) => return code,
    };

    if let Err(err) = init_logging(args.common.log_level(), LogTarget::Stdout) {
        eprintln!("{err:?}");
        return ExitCode::FAILURE;
    }

    let success = match run(&args) {
        Ok(()) => true,
        Err(err) => {
            error!("Download failed: {err}");
            false
        }
    };

    println!("{}", report::download_status(&args.output, success));
    report::exit_code(success)
}

fn run(args: &DownloadArgs) -> Result<()> {
    // Nothing to do for a URL that is not a video
    parse_video_id(&args.url)?;

    let settings = Settings::load(args.common.config.as_deref())?;
    let table = FormatTable::load(settings.formats_file.as_deref())?;

    let ytdlp = Ytdlp::new(&settings.ytdlp.program)?;
    let ffmpeg = Ffmpeg::detect(&settings.ffmpeg.program, settings.ffmpeg.detect_timeout());

    Downloader::new(ytdlp, &table, &settings.download, ffmpeg).download(
        &args.url,
        &args.format_id,
        &args.output,
    )
}
