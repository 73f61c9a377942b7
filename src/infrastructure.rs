//! Infrastructure layer: page drivers, HTML parsing, storage and configuration
//!
//! Everything that touches the network, the filesystem or the process
//! environment lives here.

pub mod checkpoint_store;
pub mod config;
pub mod crawl_error;
pub mod csv_sink;
pub mod http_driver;
pub mod jsonl_sink;
pub mod logging;
pub mod page_driver;
pub mod parsing;
pub mod record_sink;

#[cfg(feature = "browser")]
pub mod browser_driver;

pub use checkpoint_store::JsonCheckpointStore;
pub use config::{AppConfig, ConfigError, DriverKind, OutputFormat};
pub use crawl_error::{CrawlError, NavigationError};
pub use csv_sink::CsvSink;
pub use http_driver::HttpPageDriver;
pub use jsonl_sink::JsonLinesSink;
pub use page_driver::{PageDriver, RenderedPage};
pub use parsing::{PageExtraction, ProductListExtractor, SelectorConfig};
pub use record_sink::{RecordSink, open_sink};

#[cfg(feature = "browser")]
pub use browser_driver::BrowserPageDriver;
