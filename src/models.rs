//! Record and snapshot types written to `data/`.
//!
//! Each source has its own record shape; nothing is shared between them
//! except the [`Snapshot`] envelope. Field names are camelCase on the wire to
//! stay compatible with the consumers of the existing JSON files.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One `<item>` of an RSS feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedArticle {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
    pub guid: String,
    pub thumbnail: Option<String>,
}

/// One row of the Google Trends table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrendEntry {
    #[serde(rename = "googleTrend")]
    pub keyword: String,
    /// Free-form magnitude such as `"10,000+"`.
    #[serde(rename = "searchVolume")]
    pub search_volume: String,
    /// Relative recency such as `"3 小時前"`.
    pub started: String,
}

/// One line of the Komica top-threads block.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumThread {
    pub reply_count: u32,
    pub date: String,
    pub time: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub raw_text: String,
}

/// One post from the PTT hot list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotPost {
    pub recommend_score: String,
    pub recommend_count: String,
    pub title: String,
    pub link: String,
    pub author: String,
    pub board: String,
    pub publish_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Envelope around one source's payload.
///
/// The payload is flattened so each source keeps its own top-level keys
/// (`trends`, `articles`, `original_data`, ...) next to `updated` and
/// `source`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Snapshot<P> {
    /// Capture time, RFC 3339 in UTC.
    pub updated: String,
    pub source: String,
    #[serde(flatten)]
    pub payload: P,
}

impl<P> Snapshot<P> {
    /// Wrap `payload` with the current timestamp.
    pub fn new(source: impl Into<String>, payload: P) -> Self {
        Self {
            updated: now_rfc3339(),
            source: source.into(),
            payload,
        }
    }
}

/// Current UTC time, e.g. `2025-05-06T08:00:00.123Z`.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GoogleTrends {
    pub total_trends: usize,
    pub trends: Vec<TrendEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct KomicaTrends {
    pub total_trends: usize,
    pub trends: Vec<ForumThread>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PttTrends {
    pub total_found: usize,
    pub returned_count: usize,
    pub articles: Vec<HotPost>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BbcTrends {
    pub title: String,
    pub description: String,
    pub link: String,
    pub total_articles: usize,
    pub articles: Vec<FeedArticle>,
}

/// The Reddit listing is kept as-is; only the post count is derived.
#[derive(Debug, Deserialize, Serialize)]
pub struct RedditHot {
    pub total_posts: usize,
    pub original_data: serde_json::Value,
}
