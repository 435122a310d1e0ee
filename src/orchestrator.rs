//! Sequential driver for the scrapers.
//!
//! Sources run one after another in a fixed order. Whatever goes wrong
//! inside a source (an error *or* a panic) is contained to that source and
//! recorded as a failure; the next source still runs.

use crate::error::ScrapeError;
use crate::scrapers::{self, ScrapeContext};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{error, info};

/// One of the five scraped sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Google,
    Ptt,
    Komica,
    Reddit,
    Bbc,
}

impl Source {
    /// Every source, in run order.
    pub const ALL: [Source; 5] = [
        Source::Google,
        Source::Ptt,
        Source::Komica,
        Source::Reddit,
        Source::Bbc,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Source::Google => "Google Trends",
            Source::Ptt => "PTT hot posts",
            Source::Komica => "Komica hot threads",
            Source::Reddit => "Reddit hot posts",
            Source::Bbc => "BBC Chinese news",
        }
    }

    /// Run this source's scraper end to end.
    pub async fn run(self, ctx: &ScrapeContext) -> Result<usize, ScrapeError> {
        match self {
            Source::Google => scrapers::google::run(ctx).await,
            Source::Ptt => scrapers::ptt::run(ctx).await,
            Source::Komica => scrapers::komica::run(ctx).await,
            Source::Reddit => scrapers::reddit::run(ctx).await,
            Source::Bbc => scrapers::bbc::run(ctx).await,
        }
    }
}

/// Result of one source in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub source: Source,
    pub succeeded: bool,
    /// Records written; 0 on failure.
    pub records: usize,
}

/// Aggregate of a whole run.
#[derive(Debug, Default)]
pub struct Summary {
    pub outcomes: Vec<Outcome>,
}

impl Summary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.outcomes.len()
    }

    /// Log one line per source followed by the `N/M` total.
    pub fn report(&self) {
        info!("📊 Run summary");
        for o in &self.outcomes {
            if o.succeeded {
                info!(source = o.source.label(), records = o.records, "✅ succeeded");
            } else {
                info!(source = o.source.label(), "❌ failed");
            }
        }
        info!(
            "🎯 {}/{} scrapers succeeded",
            self.succeeded(),
            self.outcomes.len()
        );
    }
}

/// Run `sources` in order through `runner`, containing errors and panics.
///
/// Each source gets one call. An `Err` or a panic marks that source as
/// failed and the loop continues with the next one.
///
/// # Arguments
///
/// * `sources` - Sources to run, in order
/// * `runner` - Runs one source and returns the number of records written
///
/// # Returns
///
/// A [`Summary`] with one [`Outcome`] per source, in run order.
pub async fn run_with<F, Fut>(sources: &[Source], mut runner: F) -> Summary
where
    F: FnMut(Source) -> Fut,
    Fut: Future<Output = Result<usize, ScrapeError>>,
{
    let mut summary = Summary::default();
    for &source in sources {
        info!(source = source.label(), "🚀 Starting scraper");
        let t0 = Instant::now();
        let outcome = match AssertUnwindSafe(runner(source)).catch_unwind().await {
            Ok(Ok(records)) => {
                info!(source = source.label(), records, elapsed_ms = t0.elapsed().as_millis() as u64, "✅ Scraper finished");
                Outcome {
                    source,
                    succeeded: true,
                    records,
                }
            }
            Ok(Err(e)) => {
                error!(source = source.label(), kind = e.kind(), error = %e, "❌ Scraper failed");
                Outcome {
                    source,
                    succeeded: false,
                    records: 0,
                }
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(source = source.label(), panic = %msg, "❌ Scraper panicked");
                Outcome {
                    source,
                    succeeded: false,
                    records: 0,
                }
            }
        };
        summary.outcomes.push(outcome);
    }
    summary
}

/// Run `sources` against the real scrapers.
pub async fn run_sources(sources: &[Source], ctx: &ScrapeContext) -> Summary {
    run_with(sources, |source| source.run(ctx)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failures_are_contained_and_counted() {
        let summary = run_with(&Source::ALL, |source| async move {
            match source {
                Source::Ptt => Err(ScrapeError::NoData("empty".into())),
                Source::Komica => panic!("selector exploded"),
                _ => Ok(3),
            }
        })
        .await;

        assert_eq!(summary.outcomes.len(), 5);
        assert_eq!(summary.succeeded(), 3);
        assert!(!summary.all_succeeded());
        let order: Vec<_> = summary.outcomes.iter().map(|o| o.source).collect();
        assert_eq!(order, Source::ALL);
        assert!(!summary.outcomes[2].succeeded);
        assert_eq!(summary.outcomes[4].records, 3);
    }

    #[tokio::test]
    async fn test_single_source_success() {
        let summary = run_with(&[Source::Bbc], |_| async { Ok(12) }).await;
        assert!(summary.all_succeeded());
        assert_eq!(summary.outcomes[0].records, 12);
        summary.report();
    }

    #[test]
    fn test_run_order_is_fixed() {
        assert_eq!(
            Source::ALL,
            [
                Source::Google,
                Source::Ptt,
                Source::Komica,
                Source::Reddit,
                Source::Bbc
            ]
        );
    }
}
