//! BBC Chinese (traditional) RSS scraper.
//!
//! The only source fetched over plain HTTP. The feed is a regular RSS 2.0
//! document; each `<item>` becomes a [`FeedArticle`]. Items without a title
//! or a link are dropped.

use super::ScrapeContext;
use crate::config::FALLBACK_USER_AGENT;
use crate::error::ScrapeError;
use crate::extract::select_all;
use crate::models::{BbcTrends, FeedArticle, Snapshot};
use crate::outputs::json::write_snapshot;
use crate::utils::{random_delay, truncate_for_log};
use html_escape::{decode_html_entities, encode_text};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::{Captures, Regex};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use scraper::Html;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const FEED_URL: &str = "https://feeds.bbci.co.uk/zhongwen/trad/rss.xml";
pub const OUTPUT_FILE: &str = "bbc-trends.json";

const SOURCE_LABEL: &str = "BBC Chinese RSS";
const CHANNEL_TITLE: &str = "BBC Chinese";
const CHANNEL_DESCRIPTION: &str = "BBC Chinese - BBC News , 中文 - 主頁";
const CHANNEL_LINK: &str = "https://www.bbc.com/zhongwen/trad";

const XML_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];
const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("named entity regex"));

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Option<Channel>,
}

// Only `item` is read from the channel; the metadata is fixed.
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
    #[serde(default)]
    guid: Option<Guid>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

/// `User-Agent` header for `user_agent`, or for [`FALLBACK_USER_AGENT`] when
/// the configured value is not a legal header value.
fn user_agent_header(user_agent: &str) -> HeaderValue {
    HeaderValue::from_str(user_agent).unwrap_or_else(|_| {
        warn!(user_agent = %truncate_for_log(user_agent, 80), "Invalid user agent; using fallback");
        HeaderValue::from_static(FALLBACK_USER_AGENT)
    })
}

/// Build the HTTP client used for the feed: browser-like headers, a random
/// user agent, and a hard request timeout.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, ScrapeError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/rss+xml, application/xml, text/xml"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-TW,zh;q=0.9,en;q=0.8"),
    );
    headers.insert(USER_AGENT, user_agent_header(user_agent));
    Ok(Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()?)
}

/// GET the feed and decode the body as UTF-8. Non-2xx is a transport error.
#[instrument(level = "info", skip(client))]
pub async fn fetch_feed(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    info!(bytes = bytes.len(), "Fetched RSS feed");
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse an RSS document into articles, keeping source order.
///
/// HTML named entities outside CDATA sections are decoded first, so one
/// item using `&hellip;` or `&nbsp;` does not sink the whole feed. Items
/// without a title or a link are skipped.
///
/// # Arguments
///
/// * `xml` - The raw feed body, already decoded as UTF-8
///
/// # Returns
///
/// The surviving articles in feed order.
///
/// # Errors
///
/// [`ScrapeError::NoData`] when the document does not parse, has no
/// `<channel>`, or no item has both a title and a link.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedArticle>, ScrapeError> {
    let cleaned = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&cleaned).map_err(|e| {
        warn!(error = %e, preview = %truncate_for_log(xml, 200), "RSS XML did not parse");
        ScrapeError::NoData(format!("invalid RSS XML: {e}"))
    })?;
    let channel = rss
        .channel
        .ok_or_else(|| ScrapeError::NoData("RSS document has no <channel>".into()))?;

    info!(items = channel.items.len(), "Found RSS items");
    let articles: Vec<FeedArticle> = channel.items.into_iter().filter_map(to_article).collect();
    if articles.is_empty() {
        return Err(ScrapeError::NoData("no RSS item had both title and link".into()));
    }
    info!(count = articles.len(), "Parsed RSS articles");
    Ok(articles)
}

fn to_article(item: Item) -> Option<FeedArticle> {
    let trimmed = |s: Option<String>| s.map(|v| v.trim().to_string()).unwrap_or_default();
    let title = trimmed(item.title);
    let link = trimmed(item.link);
    if title.is_empty() || link.is_empty() {
        return None;
    }
    let description = trimmed(item.description);
    let thumbnail = thumbnail_from_markup(&description);
    Some(FeedArticle {
        title,
        link,
        thumbnail,
        description,
        pub_date: trimmed(item.pub_date),
        guid: item.guid.map(|g| g.value.trim().to_string()).unwrap_or_default(),
    })
}

/// `src` of the first `<img>` inside a description that carries markup.
fn thumbnail_from_markup(description: &str) -> Option<String> {
    if !description.contains('<') {
        return None;
    }
    let fragment = Html::parse_fragment(description);
    select_all(&fragment, "img[src]")
        .first()
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

// quick-xml only knows the five XML entities; HTML ones break the parse.
// Outside CDATA, every other named entity is decoded and re-escaped as XML
// text. Unknown names end up as literal text.
fn scrub_html_entities_for_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(CDATA_OPEN) {
        out.push_str(&decode_named_entities(&rest[..start]));
        let tail = &rest[start..];
        match tail.find(CDATA_CLOSE) {
            Some(end) => {
                let end = end + CDATA_CLOSE.len();
                out.push_str(&tail[..end]);
                rest = &tail[end..];
            }
            None => {
                out.push_str(tail);
                return out;
            }
        }
    }
    out.push_str(&decode_named_entities(rest));
    out
}

fn decode_named_entities(s: &str) -> String {
    NAMED_ENTITY
        .replace_all(s, |caps: &Captures<'_>| {
            if XML_ENTITIES.contains(&&caps[1]) {
                caps[0].to_string()
            } else {
                encode_text(&decode_html_entities(&caps[0])).into_owned()
            }
        })
        .into_owned()
}

/// Fetch the feed, extract articles and write `bbc-trends.json`.
#[instrument(level = "info", skip_all)]
pub async fn run(ctx: &ScrapeContext) -> Result<usize, ScrapeError> {
    let client = build_client(&ctx.user_agent(), ctx.settings.feed_timeout())?;
    random_delay(ctx.settings.delays.bbc_before, "before BBC feed request").await;

    let xml = fetch_feed(&client, FEED_URL).await?;
    let articles = parse_feed(&xml)?;

    for (i, article) in articles.iter().take(3).enumerate() {
        info!(rank = i + 1, title = %truncate_for_log(&article.title, 90), "BBC article");
    }

    let count = articles.len();
    let snapshot = Snapshot::new(
        SOURCE_LABEL,
        BbcTrends {
            title: CHANNEL_TITLE.to_string(),
            description: CHANNEL_DESCRIPTION.to_string(),
            link: CHANNEL_LINK.to_string(),
            total_articles: count,
            articles,
        },
    );
    write_snapshot(&snapshot, &ctx.output_dir, OUTPUT_FILE).await?;
    Ok(count)
}
