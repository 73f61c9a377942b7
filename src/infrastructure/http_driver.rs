//! Plain HTTP page driver with rate limiting and bounded retries

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{Client, StatusCode, header::USER_AGENT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::DriverConfig;
use super::crawl_error::{CrawlError, NavigationError};
use super::page_driver::{Attempt, PageDriver, RenderedPage, RetryPolicy, open_with_retries};

pub struct HttpPageDriver {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    user_agents: Vec<String>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl HttpPageDriver {
    pub fn new(config: &DriverConfig, cancel: CancellationToken) -> Result<Self, CrawlError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .gzip(true)
            .brotli(true)
            .cookie_store(true);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| CrawlError::driver_setup(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| CrawlError::driver_setup(format!("failed to create HTTP client: {e}")))?;

        let rate = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| CrawlError::driver_setup("rate limit must be greater than 0"))?;

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
            user_agents: config.user_agents.clone(),
            retry: RetryPolicy::new(config.max_attempts, config.retry_backoff_ms),
            cancel,
        })
    }

    fn pick_user_agent(&self) -> Option<&str> {
        if self.user_agents.is_empty() {
            return None;
        }
        Some(self.user_agents[fastrand::usize(..self.user_agents.len())].as_str())
    }

    async fn attempt(&self, url: &str) -> Attempt {
        tokio::select! {
            () = self.rate_limiter.until_ready() => {},
            () = self.cancel.cancelled() => return Attempt::Fatal(NavigationError::cancelled(url)),
        }

        let mut request = self.client.get(url);
        if let Some(agent) = self.pick_user_agent() {
            request = request.header(USER_AGENT, agent);
        }

        let response = tokio::select! {
            result = request.send() => match result {
                Ok(response) => response,
                Err(e) => return Attempt::Retry(format!("request failed: {e}")),
            },
            () = self.cancel.cancelled() => {
                warn!("🛑 HTTP request cancelled for URL: {}", url);
                return Attempt::Fatal(NavigationError::cancelled(url));
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Attempt::Fatal(NavigationError::not_found(url, status.as_u16()));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Retry(format!("HTTP {status}"));
        }
        if !status.is_success() {
            return Attempt::Fatal(NavigationError::rejected(url, status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = tokio::select! {
            result = response.text() => result,
            () = self.cancel.cancelled() => return Attempt::Fatal(NavigationError::cancelled(url)),
        };

        match body {
            Ok(html) => Attempt::Done(RenderedPage::new(final_url, html, status.as_u16())),
            Err(e) => Attempt::Retry(format!("failed to read body: {e}")),
        }
    }
}

#[async_trait]
impl PageDriver for HttpPageDriver {
    async fn open(&self, url: &str) -> Result<RenderedPage, NavigationError> {
        reqwest::Url::parse(url).map_err(|e| NavigationError::invalid_url(url, e.to_string()))?;

        let page = open_with_retries(url, self.retry, &self.cancel, || self.attempt(url)).await?;
        debug!("Fetched {} ({} bytes)", page.url, page.html.len());
        Ok(page)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(server_attempts: u32, cancel: CancellationToken) -> HttpPageDriver {
        let config = DriverConfig {
            max_attempts: server_attempts,
            retry_backoff_ms: 1,
            requests_per_second: 1000,
            request_timeout_secs: 5,
            ..DriverConfig::default()
        };
        HttpPageDriver::new(&config, cancel).unwrap()
    }

    #[tokio::test]
    async fn fetches_page_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/catalogue/page-1.html")
            .with_status(200)
            .with_body("<html><body>ok</body></html>")
            .create_async()
            .await;

        let url = format!("{}/catalogue/page-1.html", server.url());
        let page = driver(3, CancellationToken::new()).open(&url).await.unwrap();

        assert_eq!(page.status, 200);
        assert!(page.html.contains("ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page-9.html")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/page-9.html", server.url());
        let err = driver(3, CancellationToken::new()).open(&url).await.unwrap_err();

        assert!(err.is_end_of_catalog());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_exhaust_retry_budget() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let url = format!("{}/flaky", server.url());
        let err = driver(3, CancellationToken::new()).open(&url).await.unwrap_err();

        assert!(matches!(err, NavigationError::RetriesExhausted { attempts: 3, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_is_rejected_immediately() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/blocked")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/blocked", server.url());
        let err = driver(3, CancellationToken::new()).open(&url).await.unwrap_err();

        assert!(matches!(err, NavigationError::Rejected { status: 403, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancelled_driver_does_not_request() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = driver(3, cancel)
            .open("http://127.0.0.1:9/never")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn invalid_url_is_reported() {
        let err = driver(1, CancellationToken::new())
            .open("not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, NavigationError::InvalidUrl { .. }));
    }
}
