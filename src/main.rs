//! `catalog-harvester` command line entry point
//!
//! Exit codes: 0 done, 1 failed, 2 configuration or setup error,
//! 130 interrupted by Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use catalog_harvester::application::{CrawlContext, execute};
use catalog_harvester::infrastructure::config::{AppConfig, DriverKind, OutputFormat};
use catalog_harvester::infrastructure::logging;

const EXIT_SETUP: u8 = 2;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DriverArg {
    Http,
    Browser,
}

impl From<DriverArg> for DriverKind {
    fn from(arg: DriverArg) -> Self {
        match arg {
            DriverArg::Http => DriverKind::Http,
            DriverArg::Browser => DriverKind::Browser,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Csv,
    Jsonl,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}

/// Resumable scraper for paginated product listings
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester", version, about)]
struct Cli {
    /// Config file (TOML, JSON or YAML)
    #[arg(long, short, env = "HARVESTER_CONFIG")]
    config: Option<PathBuf>,

    /// First listing page
    #[arg(long)]
    start_url: Option<String>,

    /// Record file for the selected format
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Record file format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Checkpoint file
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Discard checkpoint and output, start at page 1
    #[arg(long)]
    fresh: bool,

    /// Pages to process in this run
    #[arg(long)]
    max_pages: Option<u32>,

    /// Stop after this many records were written in this run
    #[arg(long)]
    max_items: Option<u64>,

    #[arg(long, value_enum)]
    driver: Option<DriverArg>,

    /// Show the browser window (browser driver only)
    #[arg(long)]
    headed: bool,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    json_logs: bool,

    #[arg(long)]
    min_price: Option<f64>,

    #[arg(long)]
    max_price: Option<f64>,

    /// Minimum star rating (1-5)
    #[arg(long)]
    min_rating: Option<u8>,

    #[arg(long)]
    in_stock_only: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(url) = &self.start_url {
            config.crawl.start_url.clone_from(url);
        }
        if let Some(format) = self.format {
            config.output.format = format.into();
        }
        if let Some(path) = &self.output {
            config.output.set_records_path(path.clone());
        }
        if let Some(path) = &self.checkpoint {
            config.output.checkpoint_path.clone_from(path);
        }
        if self.max_pages.is_some() {
            config.crawl.max_pages = self.max_pages;
        }
        if self.max_items.is_some() {
            config.crawl.max_items = self.max_items;
        }
        if let Some(driver) = self.driver {
            config.driver.kind = driver.into();
        }
        if self.headed {
            config.driver.headless = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
        if self.min_price.is_some() {
            config.filters.min_price = self.min_price;
        }
        if self.max_price.is_some() {
            config.filters.max_price = self.max_price;
        }
        if self.min_rating.is_some() {
            config.filters.min_rating = self.min_rating;
        }
        if self.in_stock_only {
            config.filters.in_stock_only = true;
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_to(&mut config);
    config
        .validate()
        .context("Invalid configuration after command line overrides")?;
    Ok(config)
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C received; stopping before the next page");
            cancel.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return ExitCode::from(EXIT_SETUP);
        }
    };

    if cli.print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Failed to render configuration: {e}");
                ExitCode::from(EXIT_SETUP)
            }
        };
    }

    let _log_guard = match logging::init_logging_with_config(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ Failed to initialize logging: {e:#}");
            return ExitCode::from(EXIT_SETUP);
        }
    };

    info!("📦 catalog-harvester v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut ctx = match CrawlContext::from_config(config, cancel).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("❌ Setup failed: {}", e);
            return ExitCode::from(EXIT_SETUP);
        }
    };

    match execute(&mut ctx, cli.fresh).await {
        Ok(report) => ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1)),
        Err(e) => {
            error!("❌ {}", e);
            if e.is_setup_error() {
                ExitCode::from(EXIT_SETUP)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_flag_redirects_output_path() {
        let cli = Cli::try_parse_from(["catalog-harvester", "--format", "jsonl", "-o", "data/shop.jsonl"])
            .unwrap();
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.output.format, OutputFormat::Jsonl);
        assert_eq!(config.output.jsonl_path, PathBuf::from("data/shop.jsonl"));
        assert_eq!(config.output.csv_path, PathBuf::from("output/products.csv"));
    }

    #[test]
    fn output_flag_defaults_to_csv() {
        let cli = Cli::try_parse_from(["catalog-harvester", "-o", "books.csv"]).unwrap();
        let mut config = AppConfig::default();
        cli.apply_to(&mut config);

        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.output.csv_path, PathBuf::from("books.csv"));
    }
}
