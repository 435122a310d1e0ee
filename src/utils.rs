//! Small helpers shared by the scrapers.
//!
//! - Randomized pauses between requests
//! - String truncation for log previews
//! - Whitespace normalization for text pulled out of rendered pages

use crate::config::DelayRange;
use rand::rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Sleep for a duration drawn from `range`, logging how long.
///
/// Zero-length draws return immediately without logging.
pub async fn random_delay(range: DelayRange, reason: &str) -> Duration {
    let delay = range.sample(&mut rng());
    if !delay.is_zero() {
        info!(secs = delay.as_secs_f64(), reason, "Random delay");
        sleep(delay).await;
    }
    delay
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (never inside a UTF-8
/// sequence) with an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        // each CJK char is 3 bytes; cutting at 4 must back off to 3
        let result = truncate_for_log("熱門趨勢", 4);
        assert_eq!(result, "熱…(+9 bytes)");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[tokio::test]
    async fn test_zero_delay_returns_immediately() {
        let d = random_delay(DelayRange::fixed(0.0), "test").await;
        assert_eq!(d, Duration::ZERO);
    }
}
