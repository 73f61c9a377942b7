//! Run state machine and end-of-run report

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::product::{Currency, Price};

/// States of a single crawl run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlState {
    /// Nothing started yet
    Idle,
    /// Asking the driver for page n
    NavigatingToPage(u32),
    /// Running the field extractor and validation over page n
    ExtractingRecords(u32),
    /// Appending the valid rows of page n to the output
    PersistingRecords(u32),
    /// Writing the checkpoint for page n
    CheckpointingAfter(u32),
    /// Catalog exhausted or a configured limit reached
    Done,
    /// Unrecoverable error; the string says why
    Failed(String),
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            Self::NavigatingToPage(n)
            | Self::ExtractingRecords(n)
            | Self::PersistingRecords(n)
            | Self::CheckpointingAfter(n) => Some(*n),
            _ => None,
        }
    }

    /// Allowed edges. Any non-terminal state may fail.
    pub fn can_transition_to(&self, next: &CrawlState) -> bool {
        use CrawlState::{
            CheckpointingAfter, Done, ExtractingRecords, Failed, Idle, NavigatingToPage,
            PersistingRecords,
        };
        match (self, next) {
            (Done | Failed(_), _) => false,
            (_, Failed(_)) => true,
            (Idle, NavigatingToPage(_) | Done) => true,
            (NavigatingToPage(n), ExtractingRecords(m)) => n == m,
            (NavigatingToPage(_), Done) => true,
            (ExtractingRecords(n), PersistingRecords(m)) => n == m,
            (ExtractingRecords(_), Done) => true,
            (PersistingRecords(n), CheckpointingAfter(m)) => n == m,
            (CheckpointingAfter(n), NavigatingToPage(m)) => *m == n + 1,
            (CheckpointingAfter(_), Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlState::Idle => write!(f, "Idle"),
            CrawlState::NavigatingToPage(n) => write!(f, "NavigatingToPage({n})"),
            CrawlState::ExtractingRecords(n) => write!(f, "ExtractingRecords({n})"),
            CrawlState::PersistingRecords(n) => write!(f, "PersistingRecords({n})"),
            CrawlState::CheckpointingAfter(n) => write!(f, "CheckpointingAfter({n})"),
            CrawlState::Done => write!(f, "Done"),
            CrawlState::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// Why a run ended in `Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EmptyPage,
    NoNextPage,
    PageNotFound,
    MaxPagesReached,
    MaxItemsReached,
    NextPageLoop,
    NothingToResume,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::EmptyPage => "page contained no products",
            StopReason::NoNextPage => "no next-page link",
            StopReason::PageNotFound => "page not found",
            StopReason::MaxPagesReached => "max pages reached",
            StopReason::MaxItemsReached => "max items reached",
            StopReason::NextPageLoop => "next-page link points back to the current page",
            StopReason::NothingToResume => "previous run already reached the last page",
        };
        f.write_str(text)
    }
}

/// Min, max and mean of the prices written in one run, in minor units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceStats {
    pub count: u64,
    pub min_minor: Option<u64>,
    pub max_minor: Option<u64>,
    sum_minor: u128,
    #[serde(skip)]
    currency: Option<Currency>,
}

impl PriceStats {
    pub fn record(&mut self, price: Price) {
        let minor = price.minor_units();
        self.count += 1;
        self.sum_minor += u128::from(minor);
        self.min_minor = Some(self.min_minor.map_or(minor, |m| m.min(minor)));
        self.max_minor = Some(self.max_minor.map_or(minor, |m| m.max(minor)));
        self.currency.get_or_insert(price.currency());
    }

    pub fn min(&self) -> Option<Price> {
        self.min_minor.map(|m| self.price(m))
    }

    pub fn max(&self) -> Option<Price> {
        self.max_minor.map(|m| self.price(m))
    }

    /// Rounded half up to the nearest minor unit
    pub fn mean(&self) -> Option<Price> {
        if self.count == 0 {
            return None;
        }
        let count = u128::from(self.count);
        let mean = (self.sum_minor + count / 2) / count;
        u64::try_from(mean).ok().map(|m| self.price(m))
    }

    fn price(&self, minor: u64) -> Price {
        Price::from_minor_units(minor, self.currency.unwrap_or(Currency::Unspecified))
    }
}

/// Counters for one run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub run_id: Uuid,
    pub first_page: u32,
    pub last_completed_page: Option<u32>,
    pub pages_completed: u32,
    pub records_extracted: u64,
    pub records_written: u64,
    pub records_invalid: u64,
    pub records_filtered: u64,
    pub prices: PriceStats,
    pub stop_reason: Option<StopReason>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl CrawlSummary {
    pub fn new(run_id: Uuid, first_page: u32) -> Self {
        Self {
            run_id,
            first_page,
            last_completed_page: None,
            pages_completed: 0,
            records_extracted: 0,
            records_written: 0,
            records_invalid: 0,
            records_filtered: 0,
            prices: PriceStats::default(),
            stop_reason: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Written records per second
    #[allow(clippy::cast_precision_loss)]
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.records_written as f64 / secs
        } else {
            0.0
        }
    }

    pub fn log(&self, state: &CrawlState) {
        info!("📊 ===== Crawl run report =====");
        info!("🆔 Run: {}", self.run_id);
        info!("🏁 Final state: {}", state);
        if let Some(reason) = self.stop_reason {
            info!("🛑 Stopped because: {}", reason);
        }
        match self.last_completed_page {
            Some(last) => info!("📄 Pages: {}..={} ({} this run)", self.first_page, last, self.pages_completed),
            None => info!("📄 Pages: none completed (started at {})", self.first_page),
        }
        info!(
            "📦 Records: {} extracted, {} written, {} invalid, {} filtered",
            self.records_extracted, self.records_written, self.records_invalid, self.records_filtered
        );
        if let (Some(min), Some(mean), Some(max)) =
            (self.prices.min(), self.prices.mean(), self.prices.max())
        {
            let code = min.currency().code();
            info!("💰 Prices ({}): min {}, mean {}, max {}", code, min, mean, max);
        }
        info!("⏱️ Elapsed: {:.2?} ({:.1} records/s)", self.elapsed, self.rate());
        info!("📊 ============================");
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
