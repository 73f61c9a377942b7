//! Where a run starts, given the stored checkpoint

use tracing::{info, warn};

use super::context::CrawlContext;
use crate::domain::checkpoint::Checkpoint;
use crate::infrastructure::config::CrawlConfig;
use crate::infrastructure::crawl_error::CrawlError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    /// First page to open (number and URL); `None` when the catalog was
    /// already exhausted by a previous run
    pub next: Option<(u32, String)>,
    /// 0 when starting from scratch
    pub last_completed_page: u32,
    /// Records already in the output from earlier runs, when known
    pub prior_records: Option<u64>,
    /// Output length the checkpoint vouches for
    pub committed_bytes: Option<u64>,
}

impl ResumePlan {
    pub fn fresh(start_url: &str) -> Self {
        Self {
            next: Some((1, start_url.to_string())),
            last_completed_page: 0,
            prior_records: Some(0),
            committed_bytes: None,
        }
    }

    pub fn first_page(&self) -> u32 {
        self.next
            .as_ref()
            .map_or(self.last_completed_page, |(page, _)| *page)
    }
}

/// Pure decision from checkpoint and crawl settings
pub fn plan_resume(checkpoint: Option<&Checkpoint>, crawl: &CrawlConfig) -> ResumePlan {
    let Some(checkpoint) = checkpoint else {
        return ResumePlan::fresh(&crawl.start_url);
    };

    if !checkpoint.belongs_to(&crawl.start_url) {
        warn!(
            "Checkpoint was written for {} but start URL is {}; ignoring it",
            checkpoint.start_url, crawl.start_url
        );
        return ResumePlan::fresh(&crawl.start_url);
    }

    let page = checkpoint.next_page();
    let next = checkpoint
        .next_page_url
        .clone()
        .or_else(|| crawl.page_url(page))
        .map(|url| (page, url));

    ResumePlan {
        next,
        last_completed_page: checkpoint.last_completed_page,
        prior_records: checkpoint.records_written,
        committed_bytes: checkpoint.output_bytes,
    }
}

/// Load the checkpoint, decide where to start and bring the output file in
/// line with it. `fresh` discards previous progress and output.
pub async fn prepare(ctx: &mut CrawlContext, fresh: bool) -> Result<ResumePlan, CrawlError> {
    if fresh {
        info!("🧹 Fresh run requested: clearing checkpoint and output");
        ctx.checkpoints
            .clear()
            .await
            .map_err(|e| CrawlError::checkpoint(0, ctx.checkpoints.path(), e))?;
        ctx.sink
            .truncate_to(0)
            .await
            .map_err(|e| CrawlError::persistence(0, ctx.sink.path(), e))?;
        return Ok(ResumePlan::fresh(&ctx.config.crawl.start_url));
    }

    let checkpoint = ctx.checkpoints.load().await;
    let plan = plan_resume(checkpoint.as_ref(), &ctx.config.crawl);

    if plan.last_completed_page > 0 && plan.committed_bytes.is_none() {
        info!(
            "Checkpoint carries no output length; appending to {} as-is",
            ctx.sink.path().display()
        );
    }
    if let Some(committed) = plan.committed_bytes {
        let current = ctx.sink.len();
        if current < committed {
            warn!(
                "Output {} is shorter ({} bytes) than the checkpoint records ({} bytes)",
                ctx.sink.path().display(),
                current,
                committed
            );
        }
        ctx.sink
            .truncate_to(committed)
            .await
            .map_err(|e| CrawlError::persistence(plan.last_completed_page, ctx.sink.path(), e))?;
    }

    match &plan.next {
        Some((page, url)) if plan.last_completed_page > 0 => {
            info!("▶️ Resuming after page {} at page {} ({})", plan.last_completed_page, page, url);
        }
        Some((_, url)) => info!("▶️ Starting at page 1 ({})", url),
        None => info!(
            "⏹️ Previous run finished at page {} with no further pages",
            plan.last_completed_page
        ),
    }

    Ok(plan)
}
