//! Catalog Harvester - resumable scraper for paginated product listings
//!
//! Walks a listing page by page, validates every product card, appends the
//! valid rows to a CSV or JSON Lines file and checkpoints progress after each page so an
//! interrupted run picks up where it stopped.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CrawlContext, CrawlReport, execute};
pub use domain::{CrawlState, ValidatedProduct};
pub use infrastructure::{AppConfig, CrawlError};
