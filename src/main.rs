//! # Trend Scraper
//!
//! Collects trending content from Taiwanese and Chinese-language sources and
//! writes one JSON snapshot per source into a data directory.
//!
//! ## Sources
//!
//! - Google Trends TW (past 4 hours), rendered in headless Chrome
//! - PTT 24-hour hot posts via pttweb.cc, rendered with scrolling
//! - Komica 00b top 50 threads of the day, rendered
//! - Reddit hot listings (r/all, r/Taiwanese, r/China_irl), JSON via the browser
//! - BBC News Chinese, RSS over HTTP
//!
//! ## Usage
//!
//! ```sh
//! trend_scraper            # all sources
//! trend_scraper reddit     # a single source
//! ```
//!
//! The process exits 0 when every selected source succeeded, 1 otherwise,
//! and 130 when interrupted.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod error;
mod extract;
mod models;
mod orchestrator;
mod outputs;
mod scrapers;
mod utils;

use cli::Cli;
use scrapers::ScrapeContext;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut settings = match config::load_settings(args.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!(path = ?args.config, error = %e, "Failed to load settings");
            return ExitCode::FAILURE;
        }
    };
    if let Some(chrome) = args.chrome.clone() {
        settings.chrome_executable = Some(chrome);
    }

    let sources = args.scraper.sources();
    info!(
        scraper = ?args.scraper,
        sources = sources.len(),
        output_dir = %args.output_dir.display(),
        "trend_scraper starting up"
    );
    let ctx = ScrapeContext::new(settings, args.output_dir);

    let summary = tokio::select! {
        summary = orchestrator::run_sources(&sources, &ctx) => summary,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; stopping");
            return ExitCode::from(130);
        }
    };

    summary.report();
    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");

    if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
