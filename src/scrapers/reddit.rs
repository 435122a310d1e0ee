//! Reddit hot listings scraper.
//!
//! Reddit's `hot.json` endpoints refuse plain HTTP clients far more often
//! than a real browser, so each listing is opened in headless Chrome and the
//! JSON is read back out of the rendered page. The payload is stored as-is;
//! only the post count is derived.
//!
//! Each sub-target gets its own browser session, with a random pause before
//! navigating and another between sub-targets.

use super::ScrapeContext;
use crate::browser::{BrowserSession, RenderedPage, wait_for_marker};
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::extract::select_all;
use crate::models::{RedditHot, Snapshot};
use crate::outputs::json::write_snapshot;
use crate::utils::{random_delay, truncate_for_log};
use scraper::Html;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tracing::{error, info, instrument, warn};

/// One listing to capture.
#[derive(Debug, Clone, Copy)]
pub struct RedditTarget {
    pub url: &'static str,
    pub file_name: &'static str,
    pub description: &'static str,
}

pub const TARGETS: [RedditTarget; 3] = [
    RedditTarget {
        url: "https://www.reddit.com/r/all/hot.json?limit=50",
        file_name: "reddit-all-hot.json",
        description: "Reddit r/all hot posts",
    },
    RedditTarget {
        url: "https://www.reddit.com/r/Taiwanese/hot.json?limit=50",
        file_name: "reddit-taiwanese-hot.json",
        description: "Reddit r/Taiwanese hot posts",
    },
    RedditTarget {
        url: "https://www.reddit.com/r/China_irl/hot.json?limit=50",
        file_name: "reddit-china-irl-hot.json",
        description: "Reddit r/China_irl hot posts",
    },
];

/// Where a sub-target failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Process,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Process => "process",
            Stage::Write => "write",
        })
    }
}

/// Pull the JSON document out of a rendered page.
///
/// Chrome shows raw JSON inside a `<pre>`; if there is none, the body text
/// is used when it looks like a JSON object.
pub fn extract_json_text(html: &str) -> Result<String, ScrapeError> {
    let doc = Html::parse_document(html);
    if let Some(pre) = select_all(&doc, "pre").first() {
        return Ok(pre.text().collect());
    }
    let body: String = select_all(&doc, "body")
        .first()
        .map(|b| b.text().collect())
        .unwrap_or_default();
    let trimmed = body.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        Ok(trimmed.to_string())
    } else {
        warn!(preview = %truncate_for_log(trimmed, 300), "Page content is not JSON");
        Err(ScrapeError::NoData("page content is not JSON".into()))
    }
}

/// Parse the listing. A valid listing has a top-level `data` object.
pub fn parse_listing(text: &str) -> Result<Value, ScrapeError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        warn!(error = %e, preview = %truncate_for_log(text, 300), "JSON parse failed");
        ScrapeError::NoData(format!("invalid JSON: {e}"))
    })?;
    if !value.get("data").is_some_and(Value::is_object) {
        return Err(ScrapeError::NoData("listing has no `data` object".into()));
    }
    Ok(value)
}

/// Length of `data.children`, or 0 when absent.
pub fn count_posts(listing: &Value) -> usize {
    listing
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Wait for the body, give the JSON viewer a moment, then read the DOM.
async fn capture<P: RenderedPage>(page: &P, settings: &Settings) -> Result<String, ScrapeError> {
    wait_for_marker(page, "body", settings.reddit_marker_timeout()).await;
    random_delay(settings.delays.reddit_settle, "Reddit content settle").await;
    page.html().await
}

async fn render(session: &BrowserSession, settings: &Settings, url: &str) -> Result<String, ScrapeError> {
    let page = session.open(url).await?;
    capture(&page, settings).await
}

async fn fetch_listing_html(ctx: &ScrapeContext, url: &str) -> Result<String, ScrapeError> {
    random_delay(ctx.settings.delays.reddit_before, "before Reddit request").await;
    let session = ctx.launch_browser().await?;
    let rendered = render(&session, &ctx.settings, url).await;
    session.close().await;
    rendered
}

/// Capture, process and write one sub-target. Returns the post count.
#[instrument(level = "info", skip_all, fields(listing = target.description))]
pub async fn scrape_target(
    ctx: &ScrapeContext,
    target: RedditTarget,
) -> Result<usize, (Stage, ScrapeError)> {
    let html = fetch_listing_html(ctx, target.url)
        .await
        .map_err(|e| (Stage::Fetch, e))?;
    let listing = extract_json_text(&html)
        .and_then(|text| parse_listing(&text))
        .map_err(|e| (Stage::Process, e))?;

    let total_posts = count_posts(&listing);
    let snapshot = Snapshot::new(
        target.description,
        RedditHot {
            total_posts,
            original_data: listing,
        },
    );
    write_snapshot(&snapshot, &ctx.output_dir, target.file_name)
        .await
        .map_err(|e| (Stage::Write, e))?;
    info!(total_posts, "Reddit listing saved");
    Ok(total_posts)
}

/// Run `step` over every sub-target in order, calling `pause` between
/// consecutive sub-targets (never after the last).
///
/// A failing sub-target is logged with its [`Stage`] and the loop moves on.
///
/// # Arguments
///
/// * `targets` - Listings to capture, in order
/// * `step` - Captures, processes and writes one listing
/// * `pause` - The randomized wait between listings
///
/// # Returns
///
/// The total number of posts when every sub-target succeeded.
///
/// # Errors
///
/// [`ScrapeError::NoData`] naming each failed listing and its stage.
pub async fn run_targets<S, SF, P, PF>(
    targets: &[RedditTarget],
    mut step: S,
    mut pause: P,
) -> Result<usize, ScrapeError>
where
    S: FnMut(RedditTarget) -> SF,
    SF: Future<Output = Result<usize, (Stage, ScrapeError)>>,
    P: FnMut() -> PF,
    PF: Future,
{
    let mut total_posts = 0;
    let mut failed = Vec::new();

    for (i, &target) in targets.iter().enumerate() {
        info!(listing = target.description, "Processing Reddit listing");
        match step(target).await {
            Ok(n) => {
                info!(listing = target.description, posts = n, "✅ Reddit listing done");
                total_posts += n;
            }
            Err((stage, e)) => {
                error!(listing = target.description, %stage, kind = e.kind(), error = %e, "❌ Reddit listing failed");
                failed.push(format!("{} ({stage})", target.description));
            }
        }
        if i + 1 < targets.len() {
            pause().await;
        }
    }

    info!(
        succeeded = targets.len() - failed.len(),
        total = targets.len(),
        total_posts,
        "Reddit summary"
    );
    if failed.is_empty() {
        Ok(total_posts)
    } else {
        Err(ScrapeError::NoData(format!(
            "failed listings: {}",
            failed.join(", ")
        )))
    }
}

/// Capture every sub-target in order. Succeeds only if all of them were
/// written; the returned count is the total number of posts.
#[instrument(level = "info", skip_all)]
pub async fn run(ctx: &ScrapeContext) -> Result<usize, ScrapeError> {
    run_targets(
        &TARGETS,
        |target| scrape_target(ctx, target),
        || random_delay(ctx.settings.delays.reddit_between, "between Reddit listings"),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakePage;
    use crate::config::DelayRange;
    use std::cell::{Cell, RefCell};

    const LISTING: &str =
        r#"{"kind":"Listing","data":{"after":"t3_x","children":[{"kind":"t3","data":{"title":"台灣"}},{"kind":"t3","data":{"title":"b"}}]}}"#;

    #[test]
    fn test_reads_json_from_pre() {
        let html = format!(
            "<html><head></head><body><pre style=\"word-wrap: break-word;\">{}</pre></body></html>",
            LISTING.replace('&', "&amp;").replace('<', "&lt;")
        );
        let text = extract_json_text(&html).unwrap();
        let listing = parse_listing(&text).unwrap();
        assert_eq!(count_posts(&listing), 2);
        assert_eq!(listing["data"]["children"][0]["data"]["title"], "台灣");
    }

    #[test]
    fn test_falls_back_to_json_body() {
        let html = format!("<html><body>\n  {LISTING}\n</body></html>");
        let text = extract_json_text(&html).unwrap();
        assert!(text.starts_with('{'));
        assert_eq!(count_posts(&parse_listing(&text).unwrap()), 2);
    }

    #[test]
    fn test_non_json_body_is_no_data() {
        let html = "<html><body><h1>Too Many Requests</h1></body></html>";
        assert_eq!(extract_json_text(html).unwrap_err().kind(), "no_data");
    }

    #[test]
    fn test_invalid_json_is_no_data() {
        assert_eq!(parse_listing("{not json}").unwrap_err().kind(), "no_data");
    }

    #[test]
    fn test_listing_without_data_is_rejected() {
        assert!(parse_listing(r#"{"message":"Forbidden","error":403}"#).is_err());
    }

    #[test]
    fn test_count_posts_missing_children() {
        let v: Value = serde_json::from_str(r#"{"data":{}}"#).unwrap();
        assert_eq!(count_posts(&v), 0);
    }

    #[test]
    fn test_targets_are_fixed() {
        let files: Vec<_> = TARGETS.iter().map(|t| t.file_name).collect();
        assert_eq!(
            files,
            [
                "reddit-all-hot.json",
                "reddit-taiwanese-hot.json",
                "reddit-china-irl-hot.json"
            ]
        );
    }

    #[tokio::test]
    async fn test_one_failed_listing_fails_the_source() {
        let visited = RefCell::new(Vec::new());
        let pauses = Cell::new(0);

        let result = run_targets(
            &TARGETS,
            |target| {
                visited.borrow_mut().push(target.file_name);
                async move {
                    if target.file_name == TARGETS[1].file_name {
                        Err((Stage::Process, ScrapeError::NoData("not JSON".into())))
                    } else {
                        Ok(10)
                    }
                }
            },
            || {
                pauses.set(pauses.get() + 1);
                async {}
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), "no_data");
        assert!(err.to_string().contains("Reddit r/Taiwanese hot posts (process)"));
        assert_eq!(visited.borrow().len(), 3);
        assert_eq!(pauses.get(), 2);
    }

    #[tokio::test]
    async fn test_all_listings_written_sums_posts() {
        let pauses = Cell::new(0);
        let total = run_targets(
            &TARGETS,
            |_| async { Ok(25) },
            || {
                pauses.set(pauses.get() + 1);
                async {}
            },
        )
        .await
        .unwrap();
        assert_eq!(total, 75);
        assert_eq!(pauses.get(), 2);
    }

    #[tokio::test]
    async fn test_single_listing_has_no_pause() {
        let pauses = Cell::new(0);
        run_targets(
            &TARGETS[..1],
            |_| async { Ok(1) },
            || {
                pauses.set(pauses.get() + 1);
                async {}
            },
        )
        .await
        .unwrap();
        assert_eq!(pauses.get(), 0);
    }

    #[tokio::test]
    async fn test_capture_tolerates_missing_body() {
        let mut settings = Settings {
            reddit_marker_timeout_secs: 0,
            ..Settings::default()
        };
        settings.delays.reddit_settle = DelayRange::fixed(0.0);
        let fake = FakePage::new(vec![0], LISTING);

        let html = capture(&fake, &settings).await.unwrap();

        assert_eq!(html, LISTING);
        assert_eq!(*fake.calls.borrow(), ["count", "html"]);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Process.to_string(), "process");
    }
}
