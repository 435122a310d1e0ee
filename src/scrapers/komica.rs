//! Komica (K島) top threads scraper.
//!
//! The catalog page prints its rankings as `<pre>` blocks. The one headed
//! `Top 50 Threads [Today]` holds one thread per line in the form
//!
//! ```text
//! replies|thread id|date|time|title|description
//! ```
//!
//! usually wrapped in a link to the thread. The link's `href` is used when
//! present; otherwise the thread URL is built from the id.

use super::ScrapeContext;
use crate::browser::{BrowserSession, RenderedPage, wait_for_marker};
use crate::config::Settings;
use crate::error::ScrapeError;
use crate::extract::{element_text, resolve_href, select_all};
use crate::models::{ForumThread, KomicaTrends, Snapshot};
use crate::outputs::json::write_snapshot;
use crate::utils::truncate_for_log;
use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const CATALOG_URL: &str = "https://gita.komica1.org/00b/catlist.php";
pub const THREAD_URL_PREFIX: &str = "https://gita.komica1.org/00b/pixmicat.php?res=";
pub const OUTPUT_FILE: &str = "komica-trends.json";

const SOURCE_LABEL: &str = "Komica 00b Top 50 Threads [Today]";
const MARKER_PHRASE: &str = "Top 50 Threads [Today]";
const NEW_TAB_SUFFIX: &str = "在新分頁開啟";

static HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="([^"]+)""#).expect("href regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static CATALOG_BASE: Lazy<Url> = Lazy::new(|| Url::parse(CATALOG_URL).expect("catalog URL"));

/// Parse one `replies|id|date|time|title|description` line.
///
/// Needs at least six fields. A non-numeric reply count becomes 0. `href`
/// wins over the URL synthesized from the thread id.
pub fn parse_thread_line(line: &str, href: Option<&str>) -> Option<ForumThread> {
    let line = line.replace(NEW_TAB_SUFFIX, "");
    let line = line.trim();
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() < 6 {
        return None;
    }

    let reply_count = parts[0].parse::<u32>().unwrap_or(0);
    let link = match href.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => h.to_string(),
        None => format!("{THREAD_URL_PREFIX}{}", parts[1]),
    };

    Some(ForumThread {
        reply_count,
        date: parts[2].to_string(),
        time: parts[3].to_string(),
        title: parts[4].to_string(),
        description: parts[5].to_string(),
        link,
        raw_text: line.to_string(),
    })
}

/// Parse the inner HTML (or plain text) of the marker block line by line.
///
/// Lines that do not split into a thread record are skipped.
pub fn parse_thread_block(block: &str, base: &Url) -> Vec<ForumThread> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let href = HREF
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| resolve_href(base, &decode_html_entities(m.as_str())));
            let stripped = TAG.replace_all(line, "");
            let text = decode_html_entities(&stripped).replace(MARKER_PHRASE, "");
            let text = text.trim();
            if !text.contains('|') {
                return None;
            }
            let thread = parse_thread_line(text, href.as_deref());
            if thread.is_none() {
                debug!(line = %truncate_for_log(text, 120), "Skipping malformed thread line");
            }
            thread
        })
        .collect()
}

/// Locate the `Top 50 Threads [Today]` block in the rendered catalog and
/// parse it. A missing block is [`ScrapeError::NoData`].
pub fn extract_threads(html: &str, base: &Url) -> Result<Vec<ForumThread>, ScrapeError> {
    let doc = Html::parse_document(html);
    let blocks = select_all(&doc, "pre");
    info!(pre_blocks = blocks.len(), "Found <pre> blocks");

    let Some(block) = blocks
        .iter()
        .find(|pre| element_text(**pre).contains(MARKER_PHRASE))
    else {
        for (i, pre) in blocks.iter().enumerate() {
            debug!(index = i + 1, preview = %truncate_for_log(&element_text(*pre), 100), "Unmatched <pre>");
        }
        return Err(ScrapeError::NoData(format!(
            "no <pre> block containing {MARKER_PHRASE:?}"
        )));
    };

    Ok(parse_thread_block(&block.inner_html(), base))
}

async fn capture<P: RenderedPage>(page: &P, settings: &Settings) -> Result<String, ScrapeError> {
    wait_for_marker(page, "pre", settings.marker_timeout()).await;
    page.html().await
}

async fn render(session: &BrowserSession, settings: &Settings) -> Result<String, ScrapeError> {
    let page = session.open(CATALOG_URL).await?;
    capture(&page, settings).await
}

/// Render the catalog, extract today's top threads and write
/// `komica-trends.json`.
#[instrument(level = "info", skip_all)]
pub async fn run(ctx: &ScrapeContext) -> Result<usize, ScrapeError> {
    let session = ctx.launch_browser().await?;
    let captured = render(&session, &ctx.settings).await;
    session.close().await;
    let html = captured?;

    let threads = extract_threads(&html, &CATALOG_BASE)?;
    if threads.is_empty() {
        warn!("Marker block found but no thread lines parsed");
        return Err(ScrapeError::NoData("no thread lines parsed".into()));
    }
    for thread in threads.iter().take(5) {
        info!(replies = thread.reply_count, title = %truncate_for_log(&thread.title, 80), "Thread");
    }

    let count = threads.len();
    let snapshot = Snapshot::new(
        SOURCE_LABEL,
        KomicaTrends {
            total_trends: count,
            trends: threads,
        },
    );
    write_snapshot(&snapshot, &ctx.output_dir, OUTPUT_FILE).await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakePage;

    fn base() -> Url {
        Url::parse(CATALOG_URL).unwrap()
    }

    #[test]
    fn test_plain_block_keeps_only_well_formed_lines() {
        let block = "15|1001|01/01|10:00|Title A|Desc A\nbad-data|no-pipes";
        let threads = parse_thread_block(block, &base());
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].reply_count, 15);
        assert_eq!(threads[0].title, "Title A");
        assert_eq!(threads[0].description, "Desc A");
        assert_eq!(threads[0].link, format!("{THREAD_URL_PREFIX}1001"));
    }

    #[test]
    fn test_non_numeric_reply_count_defaults_to_zero() {
        let thread = parse_thread_line("abc|123|01/02|11:00|T|D", None).unwrap();
        assert_eq!(thread.reply_count, 0);
        assert_eq!(thread.date, "01/02");
        assert_eq!(thread.time, "11:00");
    }

    #[test]
    fn test_requires_six_fields() {
        assert!(parse_thread_line("1|2|3|4|5", None).is_none());
        assert!(parse_thread_line("1|2|3|4|5|6", None).is_some());
    }

    #[test]
    fn test_explicit_href_preferred() {
        let block = r#"<a href="pixmicat.php?res=2002&amp;page=1" target="_blank">42|2002|05/06|12:34|標題|內文 在新分頁開啟</a>"#;
        let threads = parse_thread_block(block, &base());
        assert_eq!(threads.len(), 1);
        let t = &threads[0];
        assert_eq!(t.link, "https://gita.komica1.org/00b/pixmicat.php?res=2002&page=1");
        assert_eq!(t.reply_count, 42);
        assert_eq!(t.description, "內文");
        assert_eq!(t.raw_text, "42|2002|05/06|12:34|標題|內文");
    }

    #[test]
    fn test_extract_finds_marker_block() {
        let html = r#"<html><body>
<pre>Top 50 Threads [Week]
<a href="pixmicat.php?res=1">9|1|01/01|00:00|週|週</a></pre>
<pre>Top 50 Threads [Today]
<a href="pixmicat.php?res=3001">7|3001|05/06|08:00|今日一|說明一</a>
<a href="pixmicat.php?res=3002">x|3002|05/06|09:00|今日二|說明二</a>
broken line without pipes
</pre>
</body></html>"#;
        let threads = extract_threads(html, &base()).unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].title, "今日一");
        assert_eq!(threads[0].link, "https://gita.komica1.org/00b/pixmicat.php?res=3001");
        assert_eq!(threads[1].reply_count, 0);
    }

    #[tokio::test]
    async fn test_capture_waits_for_pre_then_reads() {
        let html = "<html><body><pre>Top 50 Threads [Today]\n1|2|01/01|00:00|t|d</pre></body></html>";
        let fake = FakePage::new(vec![0, 1], html);

        let captured = capture(&fake, &Settings::default()).await.unwrap();

        assert_eq!(*fake.calls.borrow(), ["count", "count", "html"]);
        assert_eq!(extract_threads(&captured, &base()).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_marker_block_is_no_data() {
        let html = "<html><body><pre>Top 50 Threads [Week]</pre></body></html>";
        let err = extract_threads(html, &base()).unwrap_err();
        assert_eq!(err.kind(), "no_data");
    }

    #[test]
    fn test_entities_in_text_are_decoded() {
        let block = "3|9|01/01|10:00|Tom &amp; Jerry|a &lt;b&gt;";
        let threads = parse_thread_block(block, &base());
        assert_eq!(threads[0].title, "Tom & Jerry");
        assert_eq!(threads[0].description, "a <b>");
    }
}
