//! Failure taxonomy shared by every scraper.
//!
//! The orchestrator only cares whether a source succeeded, but the logs keep
//! the distinction between "the network/browser failed" and "the page loaded
//! and held nothing we could use".

use thiserror::Error;

/// Why a scraper produced no snapshot.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Timeout, connection failure or non-2xx response on a plain HTTP fetch.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The headless browser could not be launched or driven.
    #[error("browser failure: {0}")]
    Browser(String),

    /// The fetch succeeded but extraction yielded nothing usable.
    #[error("no data: {0}")]
    NoData(String),

    /// The snapshot could not be serialized or persisted.
    #[error("write failure: {0}")]
    Write(String),
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Browser(e.to_string())
    }
}

impl ScrapeError {
    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Transport(_) => "transport",
            ScrapeError::Browser(_) => "browser",
            ScrapeError::NoData(_) => "no_data",
            ScrapeError::Write(_) => "write",
        }
    }
}
