use std::process::ExitCode;

use tracing::{error, warn};
use ytfetch::{
    cli::{self, InfoArgs},
    config::Settings,
    extract::{Extraction, InfoExtractor, LibrarySource, ScrapeSource, StaticSource},
    formats::FormatTable,
    logging::{init_logging, LogTarget},
    outside::{HttpClient, Ytdlp},
    report::InfoReport,
    result::{Error, Result},
};

fn main() -> ExitCode {
    let args = match cli::parse_args::<InfoArgs>(|err| {
        eprintln!("{err}");
        println!("{}", InfoReport::failure(err.kind()).to_json());
    }) {
        Ok(args) => args,
        Err(code) => return code,
    };

    if let Err(err) = init_logging(args.common.log_level(), LogTarget::Stderr) {
        eprintln!("{err:?}");
        println!("{}", InfoReport::failure(err).to_json());
        return ExitCode::FAILURE;
    }

    let (json, code) = match extract(&args) {
        Ok(extraction) => {
            let report = InfoReport::success(&extraction);
            (report.to_json(), report.exit_code())
        }
        Err(err) => {
            error!("{err}");
            let report = match err {
                Error::Extraction(reason) => InfoReport::failure(reason),
                err => InfoReport::failure(err),
            };
            (report.to_json(), report.exit_code())
        }
    };

    println!("{json}");
    code
}

fn extract(args: &InfoArgs) -> Result<Extraction> {
    let settings = Settings::load(args.common.config.as_deref())?;
    let table = FormatTable::load(settings.formats_file.as_deref())?;

    let mut extractor = InfoExtractor::new();
    match Ytdlp::new(&settings.ytdlp.program) {
        Ok(ytdlp) => extractor.add_source(Box::new(LibrarySource::new(
            ytdlp,
            settings.info.socket_timeout_secs,
        ))),
        Err(err) => warn!("Skipping yt-dlp extraction: {err}"),
    }
    extractor.add_source(Box::new(ScrapeSource::new(
        HttpClient::new(settings.info.http_timeout()),
        &table,
    )));
    extractor.add_source(Box::new(StaticSource::new(&table)));

    extractor.extract(&args.url)
}
