//! Headless Chrome driver using the Chrome DevTools Protocol
//!
//! `headless_chrome` is a blocking API; every call runs on the blocking pool
//! so concurrent sessions do not stall the runtime.

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use scout_core::config::BrowserConfig;
use scout_core::{ActionError, Result, ScoutError};

use crate::driver::{BrowserDriver, ElementAction, LocateOutcome, Locator, SelectorStrategy};

const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(100);

// Keep the browser alive while the model is thinking
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const NETWORK_STATE_JS: &str =
    "document.readyState + '|' + performance.getEntriesByType('resource').length";

const CLEAR_FIELD_JS: &str = "function() { if ('value' in this) { this.value = ''; } }";

/// Active browser session with one tab
pub struct BrowserSession {
    // Owns the Chrome process; dropping it closes the browser
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    /// Launch a new browser instance
    ///
    /// # Example
    /// ```no_run
    /// use scout_browser::BrowserSession;
    /// use scout_core::config::BrowserConfig;
    ///
    /// let session = BrowserSession::launch(&BrowserConfig::default()).unwrap();
    /// ```
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            config.headless, config.window_width, config.window_height
        );

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| ScoutError::Browser(format!("Invalid launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| ScoutError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScoutError::Browser(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(config.navigation_timeout());

        info!("Browser launched successfully");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run a blocking tab operation off the async runtime
    async fn with_tab<T, F>(&self, op: &'static str, f: F) -> std::result::Result<T, ActionError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> std::result::Result<T, ActionError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| ActionError::driver(format!("{} task failed: {}", op, e)))?
    }
}

fn is_timeout_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("timeout") || lower.contains("timed out")
}

#[async_trait]
impl BrowserDriver for BrowserSession {
    #[instrument(skip(self))]
    async fn navigate(&self, url: &str, timeout: Duration) -> std::result::Result<String, ActionError> {
        let target = url.to_string();
        let nav = self.with_tab("navigate", move |tab| {
            tab.navigate_to(&target)
                .and_then(|t| t.wait_until_navigated())
                .map(|_| ())
                .map_err(|e| {
                    let message = format!("navigation to {} failed: {}", target, e);
                    if is_timeout_message(&message) {
                        ActionError::timeout(message)
                    } else {
                        ActionError::driver(message)
                    }
                })
        });

        match tokio::time::timeout(timeout, nav).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ActionError::timeout(format!(
                    "navigation to {} exceeded {:?}",
                    url, timeout
                )))
            }
        }

        debug!("Navigated to {}", url);
        Ok(format!("navigated to {}", url))
    }

    async fn wait_for_network_settled(
        &self,
        quiet: Duration,
        timeout: Duration,
    ) -> std::result::Result<bool, ActionError> {
        let start = Instant::now();
        let mut last_count: Option<u64> = None;
        let mut quiet_since = Instant::now();

        while start.elapsed() < timeout {
            let sample = self
                .with_tab("network check", |tab| {
                    tab.evaluate(NETWORK_STATE_JS, false)
                        .map(|r| r.value.and_then(|v| v.as_str().map(str::to_string)))
                        .map_err(|e| ActionError::driver(format!("network check failed: {}", e)))
                })
                .await?
                .unwrap_or_default();

            let (ready, count) = sample.split_once('|').unwrap_or(("loading", "0"));
            let count = count.parse::<u64>().unwrap_or(0);

            if last_count != Some(count) {
                last_count = Some(count);
                quiet_since = Instant::now();
            } else if ready == "complete" && quiet_since.elapsed() >= quiet {
                debug!("Network settled after {:?} ({} resources)", start.elapsed(), count);
                return Ok(true);
            }
            tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
        }

        warn!("Network did not settle within {:?}", timeout);
        Ok(false)
    }

    async fn screenshot(&self) -> std::result::Result<Vec<u8>, ActionError> {
        self.with_tab("screenshot", |tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| ActionError::driver(format!("screenshot failed: {}", e)))
        })
        .await
    }

    async fn dom_snapshot(&self) -> std::result::Result<String, ActionError> {
        self.with_tab("dom snapshot", |tab| {
            tab.get_content()
                .map_err(|e| ActionError::driver(format!("DOM snapshot failed: {}", e)))
        })
        .await
    }

    async fn current_url(&self) -> std::result::Result<String, ActionError> {
        self.with_tab("current url", |tab| Ok(tab.get_url())).await
    }

    #[instrument(skip(self, strategy, action), fields(selector = %strategy.selector_text, tier = %strategy.tier))]
    async fn locate_and_act(
        &self,
        strategy: &SelectorStrategy,
        action: &ElementAction,
        timeout: Duration,
    ) -> std::result::Result<LocateOutcome, ActionError> {
        let locator = strategy.locator.clone();
        let action = action.clone();

        self.with_tab("locate", move |tab| {
            let found = match &locator {
                Locator::Css(css) => tab.wait_for_element_with_custom_timeout(css, timeout),
                Locator::XPath(xpath) => tab.wait_for_xpath_with_custom_timeout(xpath, timeout),
            };
            let element = match found {
                Ok(element) => element,
                Err(_) => return Ok(LocateOutcome::NotFound),
            };

            match &action {
                ElementAction::Exists => {}
                ElementAction::Click => {
                    element
                        .click()
                        .map_err(|e| ActionError::driver(format!("click failed: {}", e)))?;
                }
                ElementAction::Type(text) => {
                    element
                        .call_js_fn(CLEAR_FIELD_JS, vec![], false)
                        .map_err(|e| ActionError::driver(format!("clear failed: {}", e)))?;
                    element
                        .type_into(text)
                        .map_err(|e| ActionError::driver(format!("typing failed: {}", e)))?;
                }
            }
            Ok(LocateOutcome::Acted)
        })
        .await
    }
}
