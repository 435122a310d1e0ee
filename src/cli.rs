//! Command-line interface definitions for the trend scraper.
//!
//! Every option can also come from an environment variable.

use crate::orchestrator::Source;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which scraper(s) to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Google,
    Ptt,
    Komica,
    Reddit,
    Bbc,
    All,
}

impl Target {
    /// The sources this target selects, in run order.
    pub fn sources(self) -> Vec<Source> {
        match self {
            Target::Google => vec![Source::Google],
            Target::Ptt => vec![Source::Ptt],
            Target::Komica => vec![Source::Komica],
            Target::Reddit => vec![Source::Reddit],
            Target::Bbc => vec![Source::Bbc],
            Target::All => Source::ALL.to_vec(),
        }
    }
}

/// Command-line arguments for the trend scraper.
///
/// # Examples
///
/// ```sh
/// # Run every scraper, writing to ./data
/// trend_scraper
///
/// # Only PTT, into a custom directory
/// trend_scraper ptt -o /srv/trends
///
/// # Use a specific Chrome binary and settings file
/// trend_scraper all --chrome /usr/bin/chromium -c settings.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Scraper to run
    #[arg(value_enum, default_value_t = Target::All)]
    pub scraper: Target,

    /// Directory the JSON snapshots are written to
    #[arg(short, long, env = "TREND_OUTPUT_DIR", default_value = "data")]
    pub output_dir: PathBuf,

    /// Optional path to a YAML settings file
    #[arg(short, long, env = "TREND_SCRAPER_CONFIG")]
    pub config: Option<String>,

    /// Chrome/Chromium executable (overrides the settings file)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_all() {
        let cli = Cli::parse_from(["trend_scraper"]);
        assert_eq!(cli.scraper, Target::All);
        assert_eq!(cli.scraper.sources(), Source::ALL.to_vec());
    }

    #[test]
    fn test_cli_single_scraper_and_short_flags() {
        let cli = Cli::parse_from(["trend_scraper", "komica", "-o", "/tmp/out", "-c", "s.yaml"]);
        assert_eq!(cli.scraper, Target::Komica);
        assert_eq!(cli.scraper.sources(), vec![Source::Komica]);
        assert_eq!(cli.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cli.config.as_deref(), Some("s.yaml"));
    }

    #[test]
    fn test_cli_rejects_unknown_scraper() {
        assert!(Cli::try_parse_from(["trend_scraper", "twitter"]).is_err());
    }

    #[test]
    fn test_cli_chrome_flag() {
        let cli = Cli::parse_from(["trend_scraper", "bbc", "--chrome", "/usr/bin/chromium"]);
        assert_eq!(cli.scraper, Target::Bbc);
        assert_eq!(cli.chrome, Some(PathBuf::from("/usr/bin/chromium")));
    }
}
