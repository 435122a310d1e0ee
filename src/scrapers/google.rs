//! Google Trends (Taiwan, past 4 hours) scraper.
//!
//! The trending page is rendered client-side into a table. Each data row has
//! the keyword in cell 1, the search volume in cell 2 and the start time in
//! cell 3; cell 1 also holds auxiliary lines (volume, "active", duration)
//! that must not be mistaken for the keyword.

use super::ScrapeContext;
use crate::browser::{BrowserSession, RenderedPage, wait_for_marker};
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::extract::{element_text, select_all, select_within};
use crate::models::{GoogleTrends, Snapshot, TrendEntry};
use crate::outputs::json::write_snapshot;
use crate::utils::random_delay;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, info, instrument};

pub const TRENDS_URL: &str = "https://trends.google.com.tw/trending?geo=TW&hours=4";
pub const OUTPUT_FILE: &str = "google-trends.json";

const SOURCE_LABEL: &str = "Google Trends TW (past 4 hours)";

/// Lines in the keyword cell containing any of these are not the keyword.
const NON_KEYWORD_MARKERS: &[&str] = &["次搜尋", "活躍", "持續時間", "·"];

static SEARCH_VOLUME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+[\d,]*\+").expect("search volume regex"));
static STARTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s*[小時分鐘]+前").expect("started regex"));

/// Extract every complete trend row from the rendered page.
pub fn extract_trends(html: &str) -> Vec<TrendEntry> {
    let doc = Html::parse_document(html);
    let rows = select_all(&doc, "tbody tr");
    let data_rows: Vec<_> = rows
        .into_iter()
        .map(|row| select_within(row, "td"))
        .filter(|cells| cells.len() > 3)
        .collect();
    info!(rows = data_rows.len(), "Found data rows");

    data_rows
        .iter()
        .filter_map(|cells| {
            let entry = parse_row(cells);
            if entry.is_none() {
                debug!("Skipping incomplete trend row");
            }
            entry
        })
        .collect()
}

fn parse_row(cells: &[ElementRef<'_>]) -> Option<TrendEntry> {
    let keyword = keyword_of(cells[1])?;
    let search_volume = SEARCH_VOLUME.find(&element_text(cells[2]))?.as_str().to_string();
    let started = STARTED.find(&element_text(cells[3]))?.as_str().to_string();
    Some(TrendEntry {
        keyword,
        search_volume,
        started,
    })
}

/// First `div` line in the cell that is not one of the auxiliary lines.
fn keyword_of(cell: ElementRef<'_>) -> Option<String> {
    select_within(cell, "div")
        .into_iter()
        .map(element_text)
        .find(|text| {
            !text.is_empty() && !NON_KEYWORD_MARKERS.iter().any(|m| text.contains(m))
        })
}

async fn capture<P: RenderedPage>(page: &P, settings: &Settings) -> Result<String, ScrapeError> {
    random_delay(settings.delays.google_after, "after Google Trends load").await;
    wait_for_marker(page, "td", settings.marker_timeout()).await;
    page.html().await
}

async fn render(session: &BrowserSession, settings: &Settings) -> Result<String, ScrapeError> {
    let page = session.open(TRENDS_URL).await?;
    capture(&page, settings).await
}

/// Render the trends page, extract rows and write `google-trends.json`.
#[instrument(level = "info", skip_all)]
pub async fn run(ctx: &ScrapeContext) -> Result<usize, ScrapeError> {
    random_delay(ctx.settings.delays.google_before, "before Google Trends").await;

    let session = ctx.launch_browser().await?;
    let captured = render(&session, &ctx.settings).await;
    session.close().await;
    let html = captured?;

    let trends = extract_trends(&html);
    if trends.is_empty() {
        return Err(ScrapeError::NoData("no complete trend rows".into()));
    }
    for entry in trends.iter().take(5) {
        info!(keyword = %entry.keyword, volume = %entry.search_volume, started = %entry.started, "Trend");
    }

    let count = trends.len();
    let snapshot = Snapshot::new(
        SOURCE_LABEL,
        GoogleTrends {
            total_trends: count,
            trends,
        },
    );
    write_snapshot(&snapshot, &ctx.output_dir, OUTPUT_FILE).await?;
    Ok(count)
}
