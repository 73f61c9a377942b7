//! Shared fixtures: an in-memory catalog driver, HTML builders and a
//! temp-dir backed harness.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use catalog_harvester::application::CrawlContext;
use catalog_harvester::domain::{Checkpoint, ValidatedProduct};
use catalog_harvester::infrastructure::config::AppConfig;
use catalog_harvester::infrastructure::csv_sink::CsvSink;
use catalog_harvester::infrastructure::{
    NavigationError, PageDriver, RecordSink, RenderedPage, open_sink,
};

pub const BASE: &str = "https://books.test/catalogue";

pub fn page_url(n: u32) -> String {
    format!("{BASE}/page-{n}.html")
}

pub struct Card {
    pub title: &'static str,
    pub price: &'static str,
    pub rating: &'static str,
    pub availability: &'static str,
    pub href: &'static str,
}

pub fn card(title: &'static str, price: &'static str, rating: &'static str, href: &'static str) -> Card {
    Card {
        title,
        price,
        rating,
        availability: "In stock",
        href,
    }
}

/// Listing page in the books.toscrape layout the default selectors expect
pub fn listing_html(cards: &[Card], next: Option<&str>) -> String {
    let mut html = String::from("<html><body><section><ol class=\"row\">");
    for c in cards {
        html.push_str(&format!(
            "<li><article class=\"product_pod\">\
               <h3><a href=\"{href}\" title=\"{title}\">{title}</a></h3>\
               <p class=\"star-rating {rating}\"></p>\
               <div class=\"product_price\">\
                 <p class=\"price_color\">{price}</p>\
                 <p class=\"instock availability\"><i class=\"icon-ok\"></i> {availability}</p>\
               </div>\
             </article></li>",
            href = c.href,
            title = c.title,
            rating = c.rating,
            price = c.price,
            availability = c.availability,
        ));
    }
    html.push_str("</ol>");
    if let Some(next) = next {
        html.push_str(&format!(
            "<ul class=\"pager\"><li class=\"next\"><a href=\"{next}\">next</a></li></ul>"
        ));
    }
    html.push_str("</section></body></html>");
    html
}

/// Two pages, two books each, £10/£20/£30/£40 rated One..Four
pub fn two_page_catalog() -> FakeCatalogDriver {
    FakeCatalogDriver::new()
        .with_page(
            page_url(1),
            listing_html(
                &[
                    card("Alpha", "£10.00", "One", "alpha_1/index.html"),
                    card("Bravo", "£20.00", "Two", "bravo_2/index.html"),
                ],
                Some("page-2.html"),
            ),
        )
        .with_page(
            page_url(2),
            listing_html(
                &[
                    card("Charlie", "£30.00", "Three", "charlie_3/index.html"),
                    card("Delta", "£40.00", "Four", "delta_4/index.html"),
                ],
                None,
            ),
        )
}

pub const TWO_PAGE_ROWS: [&str; 4] = [
    "Alpha,10.00,1,true,https://books.test/catalogue/alpha_1/index.html",
    "Bravo,20.00,2,true,https://books.test/catalogue/bravo_2/index.html",
    "Charlie,30.00,3,true,https://books.test/catalogue/charlie_3/index.html",
    "Delta,40.00,4,true,https://books.test/catalogue/delta_4/index.html",
];

/// Serves canned HTML by URL; unknown URLs are 404s
#[derive(Clone, Default)]
pub struct FakeCatalogDriver {
    pages: Arc<HashMap<String, String>>,
    failing: Arc<Vec<String>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl FakeCatalogDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.into(), html.into());
        self
    }

    /// Requests for `url` fail as if the retry budget ran out
    pub fn failing_at(mut self, url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.failing).push(url.into());
        self
    }

    /// Same catalog, no failures, fresh request log
    pub fn healed(&self) -> Self {
        Self {
            pages: Arc::clone(&self.pages),
            failing: Arc::new(Vec::new()),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageDriver for FakeCatalogDriver {
    async fn open(&self, url: &str) -> Result<RenderedPage, NavigationError> {
        self.opened.lock().unwrap().push(url.to_string());

        if self.failing.iter().any(|u| u == url) {
            return Err(NavigationError::retries_exhausted(url, 3, "HTTP 503 Service Unavailable"));
        }
        match self.pages.get(url) {
            Some(html) => Ok(RenderedPage::new(url, html.clone(), 200)),
            None => Err(NavigationError::not_found(url, 404)),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// CSV sink whose n-th append (1-based) fails with a disk error
pub struct FailingSink {
    inner: CsvSink,
    fail_on: usize,
    calls: usize,
}

impl FailingSink {
    pub async fn open(path: &Path, fail_on: usize) -> Self {
        Self {
            inner: CsvSink::open(path).await.unwrap(),
            fail_on,
            calls: 0,
        }
    }
}

#[async_trait]
impl RecordSink for FailingSink {
    async fn append(&mut self, records: &[ValidatedProduct]) -> io::Result<u64> {
        self.calls += 1;
        if self.calls == self.fail_on {
            return Err(io::Error::other("simulated disk failure"));
        }
        self.inner.append(records).await
    }

    fn len(&self) -> u64 {
        self.inner.len()
    }

    async fn truncate_to(&mut self, len: u64) -> io::Result<bool> {
        self.inner.truncate_to(len).await
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Temp directory with output and checkpoint paths wired into a config
pub struct Harness {
    pub dir: TempDir,
    pub config: AppConfig,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.crawl.start_url = page_url(1);
        config.crawl.page_url_template = None;
        config.crawl.page_delay_min_ms = 0;
        config.crawl.page_delay_max_ms = 0;
        config.output.csv_path = dir.path().join("out/products.csv");
        config.output.jsonl_path = dir.path().join("out/products.jsonl");
        config.output.checkpoint_path = dir.path().join("out/checkpoint.json");
        Self { dir, config }
    }

    pub fn csv_path(&self) -> PathBuf {
        self.config.output.csv_path.clone()
    }

    /// Context writing to the sink of the configured output format
    pub async fn context(&self, driver: FakeCatalogDriver) -> CrawlContext {
        let sink = open_sink(&self.config.output).await.unwrap();
        CrawlContext::new(self.config.clone(), Box::new(driver), sink, CancellationToken::new())
            .unwrap()
    }

    pub async fn context_with_sink(
        &self,
        driver: FakeCatalogDriver,
        sink: Box<dyn RecordSink>,
    ) -> CrawlContext {
        CrawlContext::new(self.config.clone(), Box::new(driver), sink, CancellationToken::new())
            .unwrap()
    }

    /// CSV content split into lines, header included
    pub fn csv_lines(&self) -> Vec<String> {
        match std::fs::read_to_string(self.csv_path()) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn data_rows(&self) -> Vec<String> {
        self.csv_lines().into_iter().skip(1).collect()
    }

    /// `title` of every JSON Lines record
    pub fn jsonl_titles(&self) -> Vec<String> {
        let Ok(content) = std::fs::read_to_string(&self.config.output.jsonl_path) else {
            return Vec::new();
        };
        content
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["title"].as_str().unwrap().to_string()
            })
            .collect()
    }

    pub fn checkpoint(&self) -> Option<Checkpoint> {
        let bytes = std::fs::read(&self.config.output.checkpoint_path).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}
