use std::{fmt::Display, path::PathBuf};

use miette::miette;

#[derive(Debug)]
pub enum Error {
    /// The URL does not belong to a recognized host or carries no video ID
    InvalidUrl(String),

    /// A required external program could not be found
    MissingDependency(String),

    /// One extraction method could not produce a result
    Extraction(String),

    /// The download reported no error but left no usable file behind
    Postcondition(PathBuf),

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Miette(miette!(err))
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::Miette(err) => err,
            err => miette!("{err}"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Miette(report) => write!(f, "{report}"),
            Error::InvalidUrl(url) => write!(f, "Invalid URL: {url}"),
            Error::MissingDependency(program) => {
                write!(f, "Required program '{program}' was not found")
            }
            Error::Extraction(reason) => write!(f, "Extraction failed: {reason}"),
            Error::Postcondition(path) => write!(
                f,
                "Download completed but file is missing or empty: {}",
                path.display()
            ),
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Build an untyped error from a message
pub fn err_msg<D: Display>(msg: D) -> Error {
    Error::Miette(miette!("{msg}"))
}

/// Return early with an untyped error
pub fn bail<T, D: Display>(msg: D) -> Result<T> {
    Err(err_msg(msg))
}
