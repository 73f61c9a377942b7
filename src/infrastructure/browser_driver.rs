//! Headless Chrome page driver (cargo feature `browser`)
//!
//! For listings that render their product cards with JavaScript. One tab is
//! opened per navigation and closed afterwards; the browser process lives
//! until `shutdown`.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::config::DriverConfig;
use super::crawl_error::{CrawlError, NavigationError};
use super::page_driver::{Attempt, PageDriver, RenderedPage, RetryPolicy, open_with_retries};

pub struct BrowserPageDriver {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    navigation_timeout: Duration,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl BrowserPageDriver {
    pub async fn launch(config: &DriverConfig, cancel: CancellationToken) -> Result<Self, CrawlError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(config.request_timeout_secs))
            .window_size(1366, 900);

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &config.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        if !config.user_agents.is_empty() {
            let agent = &config.user_agents[fastrand::usize(..config.user_agents.len())];
            builder = builder.arg(format!("--user-agent={agent}"));
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        builder = builder
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");

        let browser_config = builder
            .build()
            .map_err(|e| CrawlError::driver_setup(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CrawlError::driver_setup(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("Browser handler event error: {}", e);
                }
            }
            debug!("Browser handler task completed");
        });

        info!("🌐 Browser launched (headless: {})", config.headless);

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            navigation_timeout: Duration::from_secs(config.request_timeout_secs),
            retry: RetryPolicy::new(config.max_attempts, config.retry_backoff_ms),
            cancel,
        })
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let page = {
            let guard = self.browser.lock().await;
            let Some(browser) = guard.as_ref() else {
                return Attempt::Fatal(NavigationError::cancelled(url));
            };
            match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => return Attempt::Retry(format!("failed to open tab: {e}")),
            }
        };

        let outcome = tokio::select! {
            outcome = timeout(self.navigation_timeout, Self::render(&page, url)) => match outcome {
                Ok(attempt) => attempt,
                Err(_) => Attempt::Retry(format!("navigation timed out after {:?}", self.navigation_timeout)),
            },
            () = self.cancel.cancelled() => Attempt::Fatal(NavigationError::cancelled(url)),
        };

        if let Err(e) = page.close().await {
            debug!("Failed to close tab for {}: {}", url, e);
        }
        outcome
    }

    async fn render(page: &Page, url: &str) -> Attempt {
        if let Err(e) = page.goto(url).await {
            return Attempt::Retry(format!("navigation failed: {e}"));
        }

        let status = match page.wait_for_navigation_response().await {
            Ok(Some(request)) => request
                .response
                .as_ref()
                .and_then(|r| u16::try_from(r.status).ok())
                .unwrap_or(200),
            Ok(None) => 200,
            Err(e) => return Attempt::Retry(format!("page load failed: {e}")),
        };

        match status {
            404 | 410 => return Attempt::Fatal(NavigationError::not_found(url, status)),
            429 | 500..=599 => return Attempt::Retry(format!("HTTP {status}")),
            200..=299 => {}
            _ => return Attempt::Fatal(NavigationError::rejected(url, status)),
        }

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        match page.content().await {
            Ok(html) => Attempt::Done(RenderedPage::new(final_url, html, status)),
            Err(e) => Attempt::Retry(format!("failed to read page content: {e}")),
        }
    }
}

#[async_trait]
impl PageDriver for BrowserPageDriver {
    async fn open(&self, url: &str) -> Result<RenderedPage, NavigationError> {
        url::Url::parse(url).map_err(|e| NavigationError::invalid_url(url, e.to_string()))?;
        open_with_retries(url, self.retry, &self.cancel, || self.attempt(url)).await
    }

    fn name(&self) -> &'static str {
        "browser"
    }

    async fn shutdown(&self) {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Browser process wait failed: {}", e);
            }
        }
        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
        info!("🌐 Browser closed");
    }
}
