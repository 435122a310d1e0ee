//! Runtime settings for the scrapers.
//!
//! Every knob that involves randomness or waiting lives here instead of in
//! the scrapers themselves, so a run (or a test) can pin delays to zero and
//! the user-agent pool to a single entry. Settings are read from an optional
//! YAML file; any field left out keeps its default.
//!
//! ```yaml
//! user_agents:
//!   - "Mozilla/5.0 (X11; Linux x86_64) ..."
//! delays:
//!   google_before: { min: 0, max: 0 }
//! marker_timeout_secs: 5
//! ```

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

/// Used whenever the configured pool is empty.
pub const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Longest pause a [`DelayRange`] will ever produce.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Inclusive range, in seconds, for a randomized pause.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// A range that always yields the same duration.
    pub const fn fixed(secs: f64) -> Self {
        Self { min: secs, max: secs }
    }

    /// Draw a duration from the range. Bounds are clamped to
    /// `[0, MAX_DELAY_SECS]` (NaN counts as zero) and a reversed range is
    /// treated as `[max, min]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let clamp = |secs: f64| secs.max(0.0).min(MAX_DELAY_SECS);
        let lo = clamp(self.min.min(self.max));
        let hi = clamp(self.min.max(self.max));
        let secs = if hi > lo {
            rng.random_range(lo..=hi)
        } else {
            lo
        };
        Duration::from_secs_f64(secs)
    }
}

/// All randomized pauses used across the scrapers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Delays {
    pub google_before: DelayRange,
    pub google_after: DelayRange,
    pub bbc_before: DelayRange,
    pub reddit_before: DelayRange,
    pub reddit_between: DelayRange,
    pub reddit_settle: DelayRange,
    pub ptt_settle: DelayRange,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            google_before: DelayRange::new(3.0, 13.0),
            google_after: DelayRange::new(3.0, 8.0),
            bbc_before: DelayRange::new(1.0, 2.0),
            reddit_before: DelayRange::new(2.0, 5.0),
            reddit_between: DelayRange::new(3.0, 6.0),
            reddit_settle: DelayRange::fixed(2.0),
            ptt_settle: DelayRange::fixed(3.0),
        }
    }
}

/// Parameters of the scroll-and-recheck loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrollSettings {
    /// Stop scrolling once this many containers are present.
    pub target_count: usize,
    pub max_attempts: usize,
    pub step_px: i64,
    pub pause: DelayRange,
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            target_count: 20,
            max_attempts: 3,
            step_px: 800,
            pause: DelayRange::fixed(2.0),
        }
    }
}

/// Top-level settings shared by every scraper.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub user_agents: Vec<String>,
    pub delays: Delays,
    pub scroll: ScrollSettings,
    pub feed_timeout_secs: u64,
    pub marker_timeout_secs: u64,
    pub reddit_marker_timeout_secs: u64,
    /// Hard cap on accepted PTT posts per run.
    pub ptt_max_posts: usize,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            delays: Delays::default(),
            scroll: ScrollSettings::default(),
            feed_timeout_secs: 30,
            marker_timeout_secs: 10,
            reddit_marker_timeout_secs: 15,
            ptt_max_posts: 30,
            chrome_executable: None,
        }
    }
}

impl Settings {
    /// Pick a user agent from the pool.
    pub fn user_agent<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.user_agents
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn marker_timeout(&self) -> Duration {
        Duration::from_secs(self.marker_timeout_secs)
    }

    pub fn reddit_marker_timeout(&self) -> Duration {
        Duration::from_secs(self.reddit_marker_timeout_secs)
    }
}

/// Load settings from a YAML file, or return defaults when no path is given.
#[instrument(level = "info")]
pub fn load_settings(path: Option<&str>) -> Result<Settings, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let raw = std::fs::read_to_string(path)?;
    let settings: Settings = serde_yaml::from_str(&raw)?;
    info!(
        path,
        user_agents = settings.user_agents.len(),
        "Loaded settings file"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_fixed_delay_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = DelayRange::fixed(1.5);
        assert_eq!(d.sample(&mut rng), Duration::from_millis(1500));
        assert_eq!(DelayRange::fixed(0.0).sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_delay_sample_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let d = DelayRange::new(3.0, 6.0);
        for _ in 0..100 {
            let s = d.sample(&mut rng).as_secs_f64();
            assert!((3.0..=6.0).contains(&s), "sample {s} out of range");
        }
    }

    #[test]
    fn test_reversed_and_negative_ranges() {
        let mut rng = StdRng::seed_from_u64(1);
        let s = DelayRange::new(5.0, 2.0).sample(&mut rng).as_secs_f64();
        assert!((2.0..=5.0).contains(&s));
        assert_eq!(DelayRange::new(-3.0, -1.0).sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_non_finite_bounds_are_clamped() {
        let mut rng = StdRng::seed_from_u64(9);
        let cap = Duration::from_secs_f64(MAX_DELAY_SECS);
        assert_eq!(DelayRange::fixed(f64::INFINITY).sample(&mut rng), cap);
        assert!(DelayRange::new(0.0, f64::INFINITY).sample(&mut rng) <= cap);
        assert_eq!(DelayRange::fixed(f64::NAN).sample(&mut rng), Duration::ZERO);

        let yaml = "delays:\n  reddit_between: { min: 1, max: .inf }\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert!(settings.delays.reddit_between.sample(&mut rng) <= cap);
    }

    #[test]
    fn test_single_entry_pool_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(3);
        let settings = Settings {
            user_agents: vec!["test-agent/1.0".to_string()],
            ..Settings::default()
        };
        for _ in 0..5 {
            assert_eq!(settings.user_agent(&mut rng), "test-agent/1.0");
        }
    }

    #[test]
    fn test_empty_pool_falls_back() {
        let mut rng = StdRng::seed_from_u64(3);
        let settings = Settings {
            user_agents: vec![],
            ..Settings::default()
        };
        assert_eq!(settings.user_agent(&mut rng), FALLBACK_USER_AGENT);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
marker_timeout_secs: 4
delays:
  google_before: { min: 0, max: 0 }
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.marker_timeout(), Duration::from_secs(4));
        assert_eq!(settings.delays.google_before, DelayRange::fixed(0.0));
        assert_eq!(settings.delays.google_after, DelayRange::new(3.0, 8.0));
        assert_eq!(settings.feed_timeout_secs, 30);
        assert_eq!(settings.scroll.target_count, 20);
        assert_eq!(settings.ptt_max_posts, 30);
        assert!(!settings.user_agents.is_empty());
    }

    #[test]
    fn test_load_settings_without_path() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.reddit_marker_timeout(), Duration::from_secs(15));
    }
}
