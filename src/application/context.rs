//! Execution context for one crawl run
//!
//! Holds every collaborator the pagination loop needs. Nothing here is
//! global; tests build a context around in-memory drivers and sinks.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::domain::validation::ValidationRules;
use crate::infrastructure::checkpoint_store::JsonCheckpointStore;
use crate::infrastructure::config::{AppConfig, DriverKind};
use crate::infrastructure::crawl_error::CrawlError;
use crate::infrastructure::http_driver::HttpPageDriver;
use crate::infrastructure::page_driver::PageDriver;
use crate::infrastructure::parsing::ProductListExtractor;
use crate::infrastructure::record_sink::{RecordSink, open_sink};

pub struct CrawlContext {
    pub config: Arc<AppConfig>,
    pub driver: Box<dyn PageDriver>,
    pub extractor: ProductListExtractor,
    pub sink: Box<dyn RecordSink>,
    pub checkpoints: JsonCheckpointStore,
    pub rules: ValidationRules,
    pub cancel: CancellationToken,
    pub run_id: Uuid,
}

impl CrawlContext {
    /// Assemble a context from already constructed collaborators
    pub fn new(
        config: AppConfig,
        driver: Box<dyn PageDriver>,
        sink: Box<dyn RecordSink>,
        cancel: CancellationToken,
    ) -> Result<Self, CrawlError> {
        let extractor = ProductListExtractor::new(&config.selectors)?;
        let checkpoints = JsonCheckpointStore::new(&config.output.checkpoint_path);
        let rules = config.crawl.validation_rules();

        Ok(Self {
            config: Arc::new(config),
            driver,
            extractor,
            sink,
            checkpoints,
            rules,
            cancel,
            run_id: Uuid::new_v4(),
        })
    }

    /// Build the production driver and record sink described by `config`
    pub async fn from_config(config: AppConfig, cancel: CancellationToken) -> Result<Self, CrawlError> {
        let driver = build_driver(&config, cancel.clone()).await?;
        let sink = open_sink(&config.output)
            .await
            .map_err(|source| CrawlError::OutputSetup {
                path: config.output.records_path().to_path_buf(),
                source,
            })?;

        info!(
            "🔧 Driver: {}, output ({:?}): {}, checkpoint: {}",
            driver.name(),
            config.output.format,
            config.output.records_path().display(),
            config.output.checkpoint_path.display()
        );

        Self::new(config, driver, sink, cancel)
    }
}

async fn build_driver(
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<Box<dyn PageDriver>, CrawlError> {
    match config.driver.kind {
        DriverKind::Http => Ok(Box::new(HttpPageDriver::new(&config.driver, cancel)?)),
        #[cfg(feature = "browser")]
        DriverKind::Browser => Ok(Box::new(
            crate::infrastructure::browser_driver::BrowserPageDriver::launch(&config.driver, cancel)
                .await?,
        )),
        #[cfg(not(feature = "browser"))]
        DriverKind::Browser => Err(CrawlError::driver_setup(
            "browser driver requested but this build lacks the `browser` feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::OutputFormat;
    use tempfile::tempdir;

    #[tokio::test]
    async fn from_config_creates_output_file() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.output.csv_path = dir.path().join("nested/products.csv");
        config.output.checkpoint_path = dir.path().join("nested/checkpoint.json");

        let ctx = CrawlContext::from_config(config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ctx.driver.name(), "http");
        assert!(dir.path().join("nested/products.csv").exists());
        assert!(ctx.sink.is_empty());
    }

    #[tokio::test]
    async fn jsonl_format_opens_jsonl_output() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.output.format = OutputFormat::Jsonl;
        config.output.jsonl_path = dir.path().join("products.jsonl");
        config.output.checkpoint_path = dir.path().join("checkpoint.json");

        let ctx = CrawlContext::from_config(config, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ctx.sink.path(), dir.path().join("products.jsonl"));
        assert!(!dir.path().join("products.csv").exists());
    }

    #[tokio::test]
    async fn invalid_selector_fails_setup() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.output.csv_path = dir.path().join("products.csv");
        config.selectors.product_container = vec!["article[".to_string()];

        let err = CrawlContext::from_config(config, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.is_setup_error());
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn browser_kind_requires_feature() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.output.csv_path = dir.path().join("products.csv");
        config.driver.kind = DriverKind::Browser;

        let err = CrawlContext::from_config(config, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CrawlError::DriverSetup { .. }));
    }
}
