//! Headless browser sessions for the JavaScript-rendered sources.
//!
//! Scrapers talk to a page through the [`RenderedPage`] trait so the
//! waiting and scrolling logic can be exercised against a fake page in
//! tests. [`BrowserSession`] is the real implementation on top of
//! `chromiumoxide`.
//!
//! # Lifecycle
//!
//! A session owns one Chrome process and the task pumping its CDP
//! handler. Callers must finish with [`BrowserSession::close`]; if the
//! session is dropped instead (panic, Ctrl-C) the `Browser` drop glue kills
//! the child process.

use crate::config::{ScrollSettings, Settings};
use crate::error::ScrapeError;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

const MARKER_POLL: Duration = Duration::from_millis(250);

/// The operations the scrapers need from a loaded page.
pub trait RenderedPage {
    /// Number of elements currently matching `css`.
    async fn count(&self, css: &str) -> Result<usize, ScrapeError>;
    /// Scroll the viewport down by `px` pixels.
    async fn scroll_by(&self, px: i64) -> Result<(), ScrapeError>;
    /// Serialized DOM of the page as it is right now.
    async fn html(&self) -> Result<String, ScrapeError>;
}

/// Poll until `css` matches at least one element or `timeout` elapses.
///
/// Returns whether the marker showed up. A timeout is not an error: the
/// caller goes on with whatever has rendered.
#[instrument(level = "info", skip(page))]
pub async fn wait_for_marker<P: RenderedPage>(page: &P, css: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match page.count(css).await {
            Ok(n) if n > 0 => {
                info!(marker = css, "Marker element present");
                return true;
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Marker probe failed"),
        }
        if Instant::now() >= deadline {
            warn!(marker = css, ?timeout, "Timed out waiting for marker; continuing");
            return false;
        }
        sleep(MARKER_POLL).await;
    }
}

/// Scroll in fixed steps until `css` matches `target_count` elements.
///
/// Does nothing if the target is already met. Otherwise scrolls at most
/// `max_attempts` times, pausing after each step, and stops early once the
/// target is reached or a step adds nothing.
///
/// # Arguments
///
/// * `page` - The loaded page to scroll
/// * `css` - Selector whose match count is tracked
/// * `scroll` - Target count, attempt limit, step size and pause
///
/// # Returns
///
/// The element count after the last step.
///
/// # Errors
///
/// Propagates any failure to count elements or to scroll.
#[instrument(level = "info", skip(page, scroll))]
pub async fn scroll_until<P: RenderedPage>(
    page: &P,
    css: &str,
    scroll: &ScrollSettings,
) -> Result<usize, ScrapeError> {
    let mut current = page.count(css).await?;
    info!(current, target = scroll.target_count, "Initial element count");
    if current >= scroll.target_count {
        return Ok(current);
    }

    for attempt in 1..=scroll.max_attempts {
        page.scroll_by(scroll.step_px).await?;
        crate::utils::random_delay(scroll.pause, "scroll").await;

        let next = page.count(css).await?;
        if next <= current {
            info!(attempt, count = next, "Scroll added nothing; stopping");
            return Ok(next.max(current));
        }
        info!(attempt, added = next - current, count = next, "Scroll loaded more elements");
        current = next;
        if current >= scroll.target_count {
            break;
        }
    }
    Ok(current)
}

/// A running headless Chrome instance.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch Chrome with automation fingerprints suppressed and the given
    /// user agent.
    #[instrument(level = "info", skip(settings))]
    pub async fn launch(settings: &Settings, user_agent: &str) -> Result<Self, ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-features=VizDisplayCompositor")
            .arg(format!("--user-agent={user_agent}"));
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(ScrapeError::Browser)?;

        let (browser, mut events) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });
        info!("Browser launched");
        Ok(Self { browser, handler })
    }

    /// Open a tab, hide `navigator.webdriver`, and navigate to `url`.
    #[instrument(level = "info", skip(self))]
    pub async fn open(&self, url: &str) -> Result<ChromePage, ScrapeError> {
        let page = self.browser.new_page("about:blank").await?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
            .await?;
        page.goto(url).await?;
        info!("Navigation finished");
        Ok(ChromePage { page })
    }

    /// Shut the browser down. Failures are logged, never returned.
    #[instrument(level = "info", skip_all)]
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Waiting for browser exit failed");
        }
        self.handler.abort();
        info!("Browser closed");
    }
}

/// A tab inside a [`BrowserSession`].
pub struct ChromePage {
    page: Page,
}

impl RenderedPage for ChromePage {
    async fn count(&self, css: &str) -> Result<usize, ScrapeError> {
        Ok(self.page.find_elements(css).await?.len())
    }

    async fn scroll_by(&self, px: i64) -> Result<(), ScrapeError> {
        self.page
            .evaluate(format!("window.scrollBy(0, {px});"))
            .await?;
        Ok(())
    }

    async fn html(&self) -> Result<String, ScrapeError> {
        Ok(self.page.content().await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Page whose element count follows a script, one entry per probe.
    /// Every call is recorded in `calls` so tests can check ordering.
    pub(crate) struct FakePage {
        counts: RefCell<Vec<usize>>,
        pub scrolls: Cell<usize>,
        pub calls: RefCell<Vec<&'static str>>,
        body: String,
    }

    impl FakePage {
        pub(crate) fn new(counts: Vec<usize>, body: &str) -> Self {
            Self {
                counts: RefCell::new(counts),
                scrolls: Cell::new(0),
                calls: RefCell::new(Vec::new()),
                body: body.to_string(),
            }
        }
    }

    impl RenderedPage for FakePage {
        async fn count(&self, _css: &str) -> Result<usize, ScrapeError> {
            self.calls.borrow_mut().push("count");
            let mut counts = self.counts.borrow_mut();
            // the last scripted value repeats forever
            if counts.len() > 1 {
                Ok(counts.remove(0))
            } else {
                Ok(counts.first().copied().unwrap_or(0))
            }
        }

        async fn scroll_by(&self, _px: i64) -> Result<(), ScrapeError> {
            self.calls.borrow_mut().push("scroll");
            self.scrolls.set(self.scrolls.get() + 1);
            Ok(())
        }

        async fn html(&self) -> Result<String, ScrapeError> {
            self.calls.borrow_mut().push("html");
            Ok(self.body.clone())
        }
    }
}
