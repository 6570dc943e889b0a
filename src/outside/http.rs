use std::time::Duration;

use miette::{Context, IntoDiagnostic};
use tracing::debug;

use super::browser::Header;
use crate::result::{Error, Result};

/// A fetched page, whatever its status code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Interface for fetching web pages
pub trait PageFetcher {
    /// GET the page with the given headers.
    ///
    /// Non-2xx statuses are returned as a [`Page`]; only transport failures
    /// (DNS, connection, timeout) are errors.
    fn get(&self, url: &str, headers: &[Header]) -> Result<Page>;
}

/// Blocking HTTP client
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
}

impl HttpClient {
    /// `timeout` bounds both connecting and each read
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .build(),
        }
    }
}

impl PageFetcher for HttpClient {
    fn get(&self, url: &str, headers: &[Header]) -> Result<Page> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        debug!("GET {url}");
        match request.call() {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .into_diagnostic()
                    .wrap_err("Could not read page body")?;
                debug!("{url}: status {status}, {} bytes", body.len());
                Ok(Page { status, body })
            }
            Err(ureq::Error::Status(status, _)) => {
                debug!("{url}: status {status}");
                Ok(Page {
                    status,
                    body: String::new(),
                })
            }
            Err(ureq::Error::Transport(err)) => {
                Err(Error::Extraction(format!("Request to {url} failed: {err}")))
            }
        }
    }
}
