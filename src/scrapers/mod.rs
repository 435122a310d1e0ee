//! Trending-content scrapers, one module per source.
//!
//! Every scraper follows the same three steps:
//!
//! 1. **Fetch**: an HTTP GET (BBC) or a headless browser render (the rest)
//! 2. **Extract**: pure functions over the fetched XML/HTML, testable offline
//! 3. **Write**: wrap the records in a [`Snapshot`](crate::models::Snapshot)
//!    and replace the source's file under the output directory
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Output |
//! |--------|--------|--------|--------|
//! | Google Trends TW | [`google`] | rendered table | `google-trends.json` |
//! | PTT hot posts | [`ptt`] | rendered list + scrolling | `ptt-trends.json` |
//! | Komica top threads | [`komica`] | rendered `<pre>` block | `komica-trends.json` |
//! | Reddit hot listings | [`reddit`] | JSON API through the browser | `reddit-*-hot.json` |
//! | BBC Chinese | [`bbc`] | RSS over HTTP | `bbc-trends.json` |
//!
//! Each module exports `run(&ScrapeContext) -> Result<usize, ScrapeError>`
//! returning the number of records written.

use crate::browser::BrowserSession;
use crate::config::Settings;
use crate::error::ScrapeError;
use rand::rng;
use std::path::PathBuf;

pub mod bbc;
pub mod google;
pub mod komica;
pub mod ptt;
pub mod reddit;

/// What every scraper needs from the outside world.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    pub settings: Settings,
    pub output_dir: PathBuf,
}

impl ScrapeContext {
    pub fn new(settings: Settings, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            output_dir: output_dir.into(),
        }
    }

    /// A user agent drawn from the configured pool.
    pub fn user_agent(&self) -> String {
        self.settings.user_agent(&mut rng())
    }

    /// Launch a browser with a fresh random identity.
    pub async fn launch_browser(&self) -> Result<BrowserSession, ScrapeError> {
        let user_agent = self.user_agent();
        BrowserSession::launch(&self.settings, &user_agent).await
    }
}
