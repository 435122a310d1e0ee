//! PTT 24-hour hot posts scraper (via pttweb.cc).
//!
//! The hot list is a client-rendered feed of cards. Class names on the
//! mirror change from time to time, so every field is read through an
//! ordered list of fallback strategies (see [`crate::extract`]).
//!
//! The page lazily appends cards while scrolling; if fewer than the target
//! number of cards rendered initially, a short scroll-and-recheck loop runs
//! before the DOM is captured. Titles are de-duplicated within a run and at
//! most `ptt_max_posts` posts are kept.

use super::ScrapeContext;
use crate::browser::{BrowserSession, RenderedPage, scroll_until, wait_for_marker};
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::extract::{AnchorOf, AttrOf, ParentCapture, Strategy, TextOf, first_success, select_all};
use crate::models::{HotPost, PttTrends, Snapshot};
use crate::outputs::json::write_snapshot;
use crate::utils::{random_delay, truncate_for_log};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const HOT_URL: &str = "https://www.pttweb.cc/hot/all/today";
pub const OUTPUT_FILE: &str = "ptt-trends.json";

const SOURCE_LABEL: &str = "PTT 24h hot posts (pttweb.cc)";

/// Selector counted while deciding whether to scroll.
const SCROLL_PROBE: &str = ".e7-container, [class*='container']";

/// Card selectors, tried in order; the first that matches anything wins.
const CONTAINER_SELECTORS: &[&str] = &[
    ".e7-container",
    "[class*='container']",
    ".article-item",
    ".hot-article",
];

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits regex"));
static BOARD: Lazy<Regex> = Lazy::new(|| Regex::new(r"/bbs/([^/]+)/").expect("board regex"));
static HOT_BASE: Lazy<Url> = Lazy::new(|| Url::parse(HOT_URL).expect("hot list URL"));

/// Per-field strategy chains for one card.
pub struct PostStrategies {
    score: Vec<Box<dyn Strategy<String>>>,
    count: Vec<Box<dyn Strategy<String>>>,
    anchor: Vec<Box<dyn Strategy<(String, String)>>>,
    author: Vec<Box<dyn Strategy<String>>>,
    time: Vec<Box<dyn Strategy<String>>>,
    image: Vec<Box<dyn Strategy<String>>>,
}

impl PostStrategies {
    /// The chains used against pttweb.cc; links resolve against `base`.
    pub fn new(base: &Url) -> Self {
        let anchor = |css: &'static str| -> Box<dyn Strategy<(String, String)>> {
            Box::new(AnchorOf {
                css,
                base: base.clone(),
            })
        };
        let digits_near = |css: &'static str| -> Box<dyn Strategy<String>> {
            Box::new(ParentCapture {
                css,
                pattern: &DIGITS,
            })
        };
        Self {
            score: vec![
                Box::new(TextOf(".e7-recommendScore")),
                Box::new(TextOf("[class*='recommendScore']")),
                Box::new(TextOf(".recommend-score")),
            ],
            count: vec![
                digits_near("[e7description='推文:']"),
                digits_near("[class*='recommendCount']"),
                digits_near(".recommend-count"),
            ],
            anchor: vec![
                anchor("a[href*='/bbs/']"),
                anchor(".title a"),
                anchor(".article-title a"),
            ],
            author: vec![
                Box::new(TextOf(".author")),
                Box::new(TextOf("[class*='author']")),
                Box::new(TextOf(".article-author")),
            ],
            time: vec![
                Box::new(TextOf(".publish-time")),
                Box::new(TextOf("[class*='publishTime']")),
                Box::new(TextOf(".article-time")),
            ],
            image: vec![Box::new(AttrOf {
                css: "img[src]",
                attr: "src",
                base: base.clone(),
            })],
        }
    }

    /// Build a post from one card. Title and link are required; every other
    /// field falls back to an empty string.
    pub fn parse(&self, card: ElementRef<'_>) -> Option<HotPost> {
        let (title, link) = first_success(card, &self.anchor)?;
        let board = BOARD
            .captures(&link)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        Some(HotPost {
            recommend_score: first_success(card, &self.score).unwrap_or_default(),
            recommend_count: first_success(card, &self.count).unwrap_or_default(),
            author: first_success(card, &self.author).unwrap_or_default(),
            publish_time: first_success(card, &self.time).unwrap_or_default(),
            image_url: first_success(card, &self.image),
            title,
            link,
            board,
        })
    }
}

/// Extract up to `max_posts` distinct-title posts from the rendered page,
/// in page order.
///
/// The first container selector that matches anything decides the cards.
/// Cards without a title and link are dropped; a repeated title keeps only
/// its first card.
///
/// # Arguments
///
/// * `html` - Serialized DOM of the hot list
/// * `base` - URL relative links and images are resolved against
/// * `max_posts` - Cap on accepted posts
///
/// # Returns
///
/// The accepted posts; empty when no container selector matched.
pub fn extract_posts(html: &str, base: &Url, max_posts: usize) -> Vec<HotPost> {
    let doc = Html::parse_document(html);
    let Some((css, cards)) = CONTAINER_SELECTORS
        .iter()
        .map(|css| (*css, select_all(&doc, css)))
        .find(|(_, cards)| !cards.is_empty())
    else {
        warn!("No card container matched");
        return Vec::new();
    };
    info!(selector = css, cards = cards.len(), "Parsing cards");

    let strategies = PostStrategies::new(base);
    cards
        .into_iter()
        .filter_map(|card| strategies.parse(card))
        .unique_by(|post| post.title.clone())
        .take(max_posts)
        .inspect(|post| debug!(title = %truncate_for_log(&post.title, 60), "Accepted post"))
        .collect()
}

/// Wait for the page, let the feed settle, scroll for more cards, then read
/// the DOM. Neither a marker timeout nor a scroll failure is fatal.
async fn capture<P: RenderedPage>(page: &P, settings: &Settings) -> Result<String, ScrapeError> {
    wait_for_marker(page, "body", settings.marker_timeout()).await;
    random_delay(settings.delays.ptt_settle, "PTT dynamic content").await;
    if let Err(e) = scroll_until(page, SCROLL_PROBE, &settings.scroll).await {
        warn!(error = %e, "Scrolling failed; using what has rendered");
    }
    page.html().await
}

async fn render(session: &BrowserSession, settings: &Settings) -> Result<String, ScrapeError> {
    let page = session.open(HOT_URL).await?;
    capture(&page, settings).await
}

/// Render the hot list, extract posts and write `ptt-trends.json`.
#[instrument(level = "info", skip_all)]
pub async fn run(ctx: &ScrapeContext) -> Result<usize, ScrapeError> {
    let session = ctx.launch_browser().await?;
    let captured = render(&session, &ctx.settings).await;
    session.close().await;
    let html = captured?;

    let posts = extract_posts(&html, &HOT_BASE, ctx.settings.ptt_max_posts);
    if posts.is_empty() {
        return Err(ScrapeError::NoData("no hot posts with title and link".into()));
    }
    for (i, post) in posts.iter().take(5).enumerate() {
        info!(rank = i + 1, board = %post.board, title = %truncate_for_log(&post.title, 60), "Hot post");
    }

    let count = posts.len();
    let snapshot = Snapshot::new(
        SOURCE_LABEL,
        PttTrends {
            total_found: count,
            returned_count: count,
            articles: posts,
        },
    );
    write_snapshot(&snapshot, &ctx.output_dir, OUTPUT_FILE).await?;
    Ok(count)
}
