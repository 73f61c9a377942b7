//! Application layer: the crawl run itself
//!
//! `context` wires collaborators together, `resume` decides where to
//! start and `pagination_loop` drives the state machine.

pub mod context;
pub mod pagination_loop;
pub mod resume;

pub use context::CrawlContext;
pub use pagination_loop::{CrawlReport, INTERRUPTED, PaginationLoop, execute};
pub use resume::{ResumePlan, plan_resume, prepare};
