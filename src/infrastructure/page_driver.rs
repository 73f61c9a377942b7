//! Page driver abstraction
//!
//! The pagination loop only ever asks a driver for "the rendered HTML at
//! this URL". Plain HTTP and headless Chrome are the two implementations.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::crawl_error::NavigationError;

/// A fetched (and, for browser drivers, rendered) page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Final URL after redirects
    pub url: String,
    pub html: String,
    pub status: u16,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            status,
        }
    }
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to `url` and return the page content. Retries, rate limiting
    /// and cancellation are the driver's job.
    async fn open(&self, url: &str) -> Result<RenderedPage, NavigationError>;

    fn name(&self) -> &'static str;

    /// Release external resources (browser process, connections)
    async fn shutdown(&self) {}
}

/// Outcome of a single navigation attempt
pub(crate) enum Attempt {
    Done(RenderedPage),
    Fatal(NavigationError),
    Retry(String),
}

/// Attempt budget with linear backoff (`attempt * backoff`)
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

/// Drive `attempt` until it succeeds, fails fatally, runs out of budget or
/// the token is cancelled.
pub(crate) async fn open_with_retries<F, Fut>(
    url: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Result<RenderedPage, NavigationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt>,
{
    let mut last_error = String::new();
    for n in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(NavigationError::cancelled(url));
        }

        debug!("Opening {} (attempt {}/{})", url, n, policy.max_attempts);
        match attempt().await {
            Attempt::Done(page) => return Ok(page),
            Attempt::Fatal(e) => return Err(e),
            Attempt::Retry(reason) => {
                warn!("Attempt {}/{} for {} failed: {}", n, policy.max_attempts, url, reason);
                last_error = reason;
            }
        }

        if n < policy.max_attempts {
            let delay = policy.backoff * n;
            info!("Retrying {} in {:?}", url, delay);
            tokio::select! {
                () = sleep(delay) => {},
                () = cancel.cancelled() => return Err(NavigationError::cancelled(url)),
            }
        }
    }

    Err(NavigationError::retries_exhausted(url, policy.max_attempts, last_error))
}
