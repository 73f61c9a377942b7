//! Sequential pagination loop
//!
//! One page at a time: navigate, extract, validate, persist, checkpoint.
//! A page's checkpoint is only written after its rows are flushed, and the
//! next page is only requested after the checkpoint landed.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::context::CrawlContext;
use super::resume::{ResumePlan, prepare};
use crate::domain::checkpoint::Checkpoint;
use crate::domain::crawl_state::{CrawlState, CrawlSummary, StopReason};
use crate::domain::product::ValidatedProduct;
use crate::infrastructure::crawl_error::{CrawlError, NavigationError};
use crate::infrastructure::page_driver::RenderedPage;

pub const INTERRUPTED: &str = "interrupted";

/// Final state of a run plus its counters
#[derive(Debug)]
pub struct CrawlReport {
    pub state: CrawlState,
    pub summary: CrawlSummary,
    pub error: Option<CrawlError>,
}

impl CrawlReport {
    pub fn is_done(&self) -> bool {
        self.state == CrawlState::Done
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(&self.state, CrawlState::Failed(reason) if reason == INTERRUPTED)
    }

    /// 0 Done, 130 interrupted, 1 any other failure
    pub fn exit_code(&self) -> i32 {
        if self.is_done() {
            0
        } else if self.is_interrupted() {
            130
        } else {
            1
        }
    }
}

/// Valid, filtered records of one page
struct PageOutcome {
    records: Vec<ValidatedProduct>,
    next_page_url: Option<String>,
}

enum Step {
    Continue { page: u32, url: String },
    Stop(StopReason),
}

pub struct PaginationLoop<'a> {
    ctx: &'a mut CrawlContext,
    state: CrawlState,
    summary: CrawlSummary,
    /// Cumulative rows in the output; unknown after resuming from a
    /// checkpoint without counters
    records_total: Option<u64>,
}

impl<'a> PaginationLoop<'a> {
    pub fn new(ctx: &'a mut CrawlContext, plan: &ResumePlan) -> Self {
        let summary = CrawlSummary::new(ctx.run_id, plan.first_page());
        Self {
            ctx,
            state: CrawlState::Idle,
            summary,
            records_total: plan.prior_records,
        }
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    fn transition(&mut self, next: CrawlState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Run until `Done` or `Failed`
    pub async fn run(mut self, plan: ResumePlan) -> CrawlReport {
        let started = Instant::now();

        let error = match plan.next {
            None => {
                self.finish(StopReason::NothingToResume);
                None
            }
            Some((page, url)) => match self.crawl_from(page, url).await {
                Ok(reason) => {
                    self.finish(reason);
                    None
                }
                Err(e) => {
                    let reason = if e.is_interrupted() || self.ctx.cancel.is_cancelled() {
                        warn!("🛑 Crawl interrupted; last checkpoint kept");
                        INTERRUPTED.to_string()
                    } else {
                        error!("❌ Crawl failed: {}", e);
                        if e.is_transient() {
                            warn!("Site looks temporarily unavailable; rerun to resume from the last checkpoint");
                        }
                        e.to_string()
                    };
                    self.transition(CrawlState::Failed(reason));
                    Some(e)
                }
            },
        };

        self.summary.elapsed = started.elapsed();
        self.summary.log(&self.state);

        CrawlReport {
            state: self.state,
            summary: self.summary,
            error,
        }
    }

    fn finish(&mut self, reason: StopReason) {
        info!("🏁 Crawl finished: {}", reason);
        self.summary.stop_reason = Some(reason);
        self.transition(CrawlState::Done);
    }

    async fn crawl_from(&mut self, mut page: u32, mut url: String) -> Result<StopReason, CrawlError> {
        loop {
            match self.process_page(page, &url).await? {
                Step::Stop(reason) => return Ok(reason),
                Step::Continue {
                    page: next_page,
                    url: next_url,
                } => {
                    self.politeness_delay().await;
                    page = next_page;
                    url = next_url;
                }
            }
        }
    }

    async fn process_page(&mut self, page: u32, url: &str) -> Result<Step, CrawlError> {
        if self.ctx.cancel.is_cancelled() {
            return Err(CrawlError::navigation(page, NavigationError::cancelled(url)));
        }

        self.transition(CrawlState::NavigatingToPage(page));
        let rendered = match self.ctx.driver.open(url).await {
            Ok(rendered) => rendered,
            Err(e) if e.is_end_of_catalog() => {
                info!("📭 Page {} not found ({}); catalog ended", page, url);
                return Ok(Step::Stop(StopReason::PageNotFound));
            }
            Err(e) => return Err(CrawlError::navigation(page, e)),
        };

        self.transition(CrawlState::ExtractingRecords(page));
        let Some(outcome) = self.extract_and_validate(page, &rendered) else {
            info!("📭 Page {} has no products; catalog ended", page);
            return Ok(Step::Stop(StopReason::EmptyPage));
        };

        self.transition(CrawlState::PersistingRecords(page));
        let written = outcome.records.len() as u64;
        self.ctx
            .sink
            .append(&outcome.records)
            .await
            .map_err(|e| CrawlError::persistence(page, self.ctx.sink.path(), e))?;

        self.transition(CrawlState::CheckpointingAfter(page));
        let records_total = self.records_total.map(|total| total + written);
        let checkpoint = Checkpoint::new(
            page,
            self.ctx.config.crawl.start_url.clone(),
            outcome.next_page_url.clone(),
            records_total,
            self.ctx.sink.len(),
        );
        self.ctx
            .checkpoints
            .save(&checkpoint)
            .await
            .map_err(|e| CrawlError::checkpoint(page, self.ctx.checkpoints.path(), e))?;

        self.records_total = records_total;
        self.summary.records_written += written;
        for record in &outcome.records {
            self.summary.prices.record(record.price());
        }
        self.summary.pages_completed += 1;
        self.summary.last_completed_page = Some(page);
        match self.records_total {
            Some(total) => info!("✅ Page {} done: {} rows written ({} total)", page, written, total),
            None => info!("✅ Page {} done: {} rows written", page, written),
        }

        Ok(self.next_step(page, url, &rendered.url, outcome.next_page_url))
    }

    /// `None` when the page has no product cards at all
    fn extract_and_validate(
        &mut self,
        page: u32,
        rendered: &RenderedPage,
    ) -> Option<PageOutcome> {
        let extraction = self.ctx.extractor.extract(rendered);
        if extraction.products.is_empty() {
            return None;
        }
        self.summary.records_extracted += extraction.products.len() as u64;

        let filter = &self.ctx.config.filters;
        let mut records = Vec::with_capacity(extraction.products.len());
        for raw in &extraction.products {
            match ValidatedProduct::from_raw(raw, &self.ctx.rules) {
                Ok(product) if filter.accepts(&product) => records.push(product),
                Ok(product) => {
                    debug!(page, index = raw.index_in_page, "Filtered out: {}", product);
                    self.summary.records_filtered += 1;
                }
                Err(e) => {
                    for field_error in &e.errors {
                        warn!(
                            page,
                            index = e.index,
                            field = %field_error.field,
                            "Skipping product: {}",
                            field_error
                        );
                    }
                    self.summary.records_invalid += 1;
                }
            }
        }

        debug!(
            "Page {}: {} extracted, {} valid",
            page,
            extraction.products.len(),
            records.len()
        );
        Some(PageOutcome {
            records,
            next_page_url: extraction.next_page_url,
        })
    }

    fn next_step(
        &self,
        page: u32,
        requested_url: &str,
        final_url: &str,
        next_page_url: Option<String>,
    ) -> Step {
        let crawl = &self.ctx.config.crawl;

        if crawl
            .max_items
            .is_some_and(|max| self.summary.records_written >= max)
        {
            return Step::Stop(StopReason::MaxItemsReached);
        }
        if crawl
            .max_pages
            .is_some_and(|max| self.summary.pages_completed >= max)
        {
            return Step::Stop(StopReason::MaxPagesReached);
        }

        match next_page_url {
            None => Step::Stop(StopReason::NoNextPage),
            Some(next) if next == requested_url || next == final_url => {
                warn!("Next-page link on page {} points back to {}", page, next);
                Step::Stop(StopReason::NextPageLoop)
            }
            Some(next) => Step::Continue {
                page: page + 1,
                url: next,
            },
        }
    }

    async fn politeness_delay(&self) {
        let crawl = &self.ctx.config.crawl;
        if crawl.page_delay_max_ms == 0 {
            return;
        }
        let delay = Duration::from_millis(fastrand::u64(
            crawl.page_delay_min_ms..=crawl.page_delay_max_ms,
        ));
        debug!("Waiting {:?} before next page", delay);
        tokio::select! {
            () = sleep(delay) => {},
            () = self.ctx.cancel.cancelled() => {},
        }
    }
}

/// Prepare resume state, run the loop and release the driver
pub async fn execute(ctx: &mut CrawlContext, fresh: bool) -> Result<CrawlReport, CrawlError> {
    let span = info_span!("crawl", run_id = %ctx.run_id);

    async move {
        let plan = prepare(ctx, fresh).await?;
        info!(
            "🚀 Crawl started from page {} (driver: {})",
            plan.first_page(),
            ctx.driver.name()
        );
        if ctx.config.filters.is_active() {
            info!("🔎 Filters active: {:?}", ctx.config.filters);
        }
        let report = PaginationLoop::new(ctx, &plan).run(plan).await;
        ctx.driver.shutdown().await;
        Ok(report)
    }
    .instrument(span)
    .await
}
