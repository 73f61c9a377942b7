//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! config file, then `HARVESTER_<SECTION>__<KEY>` environment variables.
//! Command line flags are applied on top by the binary, after which
//! `AppConfig::validate` must be called again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::domain::filters::ProductFilter;
use crate::domain::validation::ValidationRules;
use crate::infrastructure::parsing::config::SelectorConfig;

pub const ENV_PREFIX: &str = "HARVESTER";
const APP_DIR_NAME: &str = "catalog-harvester";
const LOCAL_CONFIG_NAME: &str = "harvester";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub crawl: CrawlConfig,
    pub selectors: SelectorConfig,
    pub driver: DriverConfig,
    pub output: OutputConfig,
    pub filters: ProductFilter,
    pub logging: LoggingConfig,
}

/// What to crawl and when to stop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// First listing page
    pub start_url: String,
    /// Fallback URL pattern with a `{page}` placeholder, used to resume
    /// when a checkpoint carries no next-page link
    pub page_url_template: Option<String>,
    /// Pages to process in this run
    pub max_pages: Option<u32>,
    /// Records to write in this run
    pub max_items: Option<u64>,
    pub page_delay_min_ms: u64,
    pub page_delay_max_ms: u64,
    pub in_stock_phrases: Vec<String>,
    pub out_of_stock_phrases: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        let rules = ValidationRules::default();
        Self {
            start_url: "https://books.toscrape.com/catalogue/page-1.html".to_string(),
            page_url_template: Some(
                "https://books.toscrape.com/catalogue/page-{page}.html".to_string(),
            ),
            max_pages: None,
            max_items: None,
            page_delay_min_ms: 500,
            page_delay_max_ms: 1500,
            in_stock_phrases: rules.in_stock_phrases,
            out_of_stock_phrases: rules.out_of_stock_phrases,
        }
    }
}

impl CrawlConfig {
    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules {
            in_stock_phrases: self.in_stock_phrases.clone(),
            out_of_stock_phrases: self.out_of_stock_phrases.clone(),
        }
    }

    /// Listing URL for page `n` from the template, if one is configured
    pub fn page_url(&self, page: u32) -> Option<String> {
        self.page_url_template
            .as_ref()
            .map(|t| t.replace("{page}", &page.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Http,
    Browser,
}

/// Page driver settings shared by the HTTP and browser drivers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub kind: DriverKind,
    pub request_timeout_secs: u64,
    /// Attempts per page, including the first one
    pub max_attempts: u32,
    /// Linear backoff step: attempt n waits `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,
    pub requests_per_second: u32,
    pub max_redirects: usize,
    /// One is picked at random per request
    pub user_agents: Vec<String>,
    pub proxy: Option<String>,
    /// Browser driver only
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::Http,
            request_timeout_secs: 30,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            requests_per_second: 2,
            max_redirects: 5,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
            ],
            proxy: None,
            headless: true,
            chrome_executable: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    /// One JSON object per line
    Jsonl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub csv_path: PathBuf,
    pub jsonl_path: PathBuf,
    pub checkpoint_path: PathBuf,
}

impl OutputConfig {
    /// Record file of the active format
    pub fn records_path(&self) -> &Path {
        match self.format {
            OutputFormat::Csv => &self.csv_path,
            OutputFormat::Jsonl => &self.jsonl_path,
        }
    }

    pub fn set_records_path(&mut self, path: PathBuf) {
        match self.format {
            OutputFormat::Csv => self.csv_path = path,
            OutputFormat::Jsonl => self.jsonl_path = path,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            csv_path: PathBuf::from("output/products.csv"),
            jsonl_path: PathBuf::from("output/products.jsonl"),
            checkpoint_path: PathBuf::from("output/checkpoint.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    pub log_dir: PathBuf,
    /// "daily", "hourly" or "never"
    pub rotation: String,
    /// Extra per-target levels, e.g. `reqwest = "debug"`
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: PathBuf::from("logs"),
            rotation: "daily".to_string(),
            module_filters: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load from `explicit` (required when given) or the default locations,
    /// then apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        match explicit {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(dir) = dirs::config_dir() {
                    let user_config = dir.join(APP_DIR_NAME).join("config");
                    builder = builder
                        .add_source(File::with_name(&user_config.to_string_lossy()).required(false));
                }
                builder = builder.add_source(File::with_name(LOCAL_CONFIG_NAME).required(false));
            }
        }

        Self::finish(builder, Self::environment())
    }

    /// Load from an in-memory TOML document plus the given environment source
    pub fn from_toml_str(toml: &str, env: Environment) -> Result<Self, ConfigError> {
        let builder = config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::finish(builder, env)
    }

    /// `HARVESTER_CRAWL__MAX_PAGES=5` style overrides
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn finish(
        builder: ConfigBuilder<DefaultState>,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let crawl = &self.crawl;

        let start = Url::parse(&crawl.start_url).map_err(|e| {
            ConfigError::validation(format!("crawl.start_url '{}' is not a URL: {e}", crawl.start_url))
        })?;
        if !matches!(start.scheme(), "http" | "https") {
            return Err(ConfigError::validation(format!(
                "crawl.start_url must be http(s), got '{}'",
                start.scheme()
            )));
        }

        if let Some(template) = &crawl.page_url_template {
            if !template.contains("{page}") {
                return Err(ConfigError::validation(
                    "crawl.page_url_template must contain a {page} placeholder",
                ));
            }
        }

        if crawl.page_delay_min_ms > crawl.page_delay_max_ms {
            return Err(ConfigError::validation(format!(
                "crawl.page_delay_min_ms ({}) cannot be greater than page_delay_max_ms ({})",
                crawl.page_delay_min_ms, crawl.page_delay_max_ms
            )));
        }

        if crawl.in_stock_phrases.is_empty() {
            return Err(ConfigError::validation(
                "crawl.in_stock_phrases must contain at least one phrase",
            ));
        }
        for (key, phrases) in [
            ("in_stock_phrases", &crawl.in_stock_phrases),
            ("out_of_stock_phrases", &crawl.out_of_stock_phrases),
        ] {
            if phrases.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::validation(format!(
                    "crawl.{key} must not contain blank phrases"
                )));
            }
        }

        if self.driver.max_attempts == 0 {
            return Err(ConfigError::validation("driver.max_attempts must be greater than 0"));
        }
        if self.driver.requests_per_second == 0 {
            return Err(ConfigError::validation(
                "driver.requests_per_second must be greater than 0",
            ));
        }
        if self.driver.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "driver.request_timeout_secs must be greater than 0",
            ));
        }

        if let Some(group) = self.selectors.first_empty_group() {
            return Err(ConfigError::validation(format!(
                "selectors.{group} must list at least one selector"
            )));
        }

        self.filters
            .validate()
            .map_err(|message| ConfigError::validation(format!("filters: {message}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> Environment {
        AppConfig::environment().source(Some(config::Map::new()))
    }

    #[test]
    fn defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [crawl]
            start_url = "https://shop.test/list?page=1"
            max_pages = 3

            [output]
            csv_path = "data/shop.csv"
            "#,
            no_env(),
        )
        .unwrap();

        assert_eq!(cfg.crawl.start_url, "https://shop.test/list?page=1");
        assert_eq!(cfg.crawl.max_pages, Some(3));
        assert_eq!(cfg.output.csv_path, PathBuf::from("data/shop.csv"));
        assert_eq!(cfg.output.checkpoint_path, PathBuf::from("output/checkpoint.json"));
        assert_eq!(cfg.driver.max_attempts, 3);
    }

    #[test]
    fn environment_overrides_file() {
        let mut vars = config::Map::new();
        vars.insert("HARVESTER_CRAWL__MAX_PAGES".to_string(), "7".to_string());
        vars.insert("HARVESTER_DRIVER__KIND".to_string(), "browser".to_string());
        let env = AppConfig::environment().source(Some(vars));

        let cfg = AppConfig::from_toml_str("[crawl]\nmax_pages = 2\n", env).unwrap();
        assert_eq!(cfg.crawl.max_pages, Some(7));
        assert_eq!(cfg.driver.kind, DriverKind::Browser);
    }

    #[test]
    fn output_format_selects_records_path() {
        let cfg = AppConfig::from_toml_str(
            "[output]\nformat = \"jsonl\"\njsonl_path = \"data/shop.jsonl\"\n",
            no_env(),
        )
        .unwrap();
        assert_eq!(cfg.output.format, OutputFormat::Jsonl);
        assert_eq!(cfg.output.records_path(), Path::new("data/shop.jsonl"));

        let mut output = OutputConfig::default();
        assert_eq!(output.records_path(), Path::new("output/products.csv"));
        output.format = OutputFormat::Jsonl;
        output.set_records_path(PathBuf::from("x.jsonl"));
        assert_eq!(output.jsonl_path, PathBuf::from("x.jsonl"));
        assert_eq!(output.csv_path, PathBuf::from("output/products.csv"));
    }

    #[test]
    fn rejects_unknown_output_format() {
        let err = AppConfig::from_toml_str("[output]\nformat = \"xlsx\"\n", no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::FileLoad { .. }));
    }

    #[test]
    fn rejects_inverted_delay_range() {
        let err = AppConfig::from_toml_str(
            "[crawl]\npage_delay_min_ms = 900\npage_delay_max_ms = 100\n",
            no_env(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let mut cfg = AppConfig::default();
        cfg.crawl.page_url_template = Some("https://shop.test/page.html".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_http_start_url() {
        let mut cfg = AppConfig::default();
        cfg.crawl.start_url = "file:///tmp/listing.html".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut cfg = AppConfig::default();
        cfg.driver.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_blank_stock_phrases() {
        let mut cfg = AppConfig::default();
        cfg.crawl.out_of_stock_phrases.push("  ".to_string());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("out_of_stock_phrases"), "{err}");

        let mut cfg = AppConfig::default();
        cfg.crawl.in_stock_phrases = vec!["in stock".to_string(), String::new()];
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.crawl.in_stock_phrases.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn template_page_url() {
        let cfg = CrawlConfig::default();
        assert_eq!(
            cfg.page_url(4).as_deref(),
            Some("https://books.toscrape.com/catalogue/page-4.html")
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            AppConfig::load(Some(missing.as_path())),
            Err(ConfigError::FileLoad { .. })
        ));
    }
}
