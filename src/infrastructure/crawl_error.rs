//! Error types for navigation and run-level failures
//!
//! `NavigationError` is what a page driver reports for one page open.
//! `CrawlError` is what ends a run; every variant carries enough context
//! (page number, path) to be logged as the `Failed` reason.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::infrastructure::config::ConfigError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// 404/410 or equivalent: the page does not exist
    #[error("page not found: {url} (HTTP {status})")]
    NotFound { url: String, status: u16 },

    #[error("gave up on {url} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// Non-retryable response status other than not-found
    #[error("request to {url} rejected with HTTP {status}")]
    Rejected { url: String, status: u16 },

    #[error("navigation to {url} cancelled")]
    Cancelled { url: String },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl NavigationError {
    pub fn not_found(url: &str, status: u16) -> Self {
        Self::NotFound {
            url: url.to_string(),
            status,
        }
    }

    pub fn retries_exhausted(url: &str, attempts: u32, last_error: impl Into<String>) -> Self {
        Self::RetriesExhausted {
            url: url.to_string(),
            attempts,
            last_error: last_error.into(),
        }
    }

    pub fn rejected(url: &str, status: u16) -> Self {
        Self::Rejected {
            url: url.to_string(),
            status,
        }
    }

    pub fn cancelled(url: &str) -> Self {
        Self::Cancelled {
            url: url.to_string(),
        }
    }

    pub fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Not-found ends the catalog normally instead of failing the run
    pub fn is_end_of_catalog(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Failures a later rerun can be expected to get past
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("navigation failed on page {page}: {source}")]
    Navigation {
        page: u32,
        #[source]
        source: NavigationError,
    },

    #[error("failed to persist records of page {page} to {}: {source}", .path.display())]
    Persistence {
        page: u32,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write checkpoint after page {page} to {}: {source}", .path.display())]
    Checkpoint {
        page: u32,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid CSS selector '{selector}' for {field}: {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("page driver setup failed: {message}")]
    DriverSetup { message: String },

    #[error("output setup failed for {}: {source}", .path.display())]
    OutputSetup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CrawlError {
    pub fn navigation(page: u32, source: NavigationError) -> Self {
        Self::Navigation { page, source }
    }

    pub fn persistence(page: u32, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            page,
            path: path.into(),
            source,
        }
    }

    pub fn checkpoint(page: u32, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Checkpoint {
            page,
            path: path.into(),
            source,
        }
    }

    pub fn invalid_selector(field: &str, selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub fn driver_setup(message: impl Into<String>) -> Self {
        Self::DriverSetup {
            message: message.into(),
        }
    }

    /// Page the error happened on, when it happened inside the loop
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Navigation { page, .. }
            | Self::Persistence { page, .. }
            | Self::Checkpoint { page, .. } => Some(*page),
            _ => None,
        }
    }

    /// Errors raised before the first page is requested
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSelector { .. }
                | Self::DriverSetup { .. }
                | Self::OutputSetup { .. }
                | Self::Config(_)
        )
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Navigation { source, .. } if source.is_cancelled())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Navigation { source, .. } if source.is_transient())
    }
}
