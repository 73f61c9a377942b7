//! Domain module - listing records, validation rules and run state
//!
//! Pure types only: nothing here touches the network or the filesystem.

pub mod checkpoint;
pub mod crawl_state;
pub mod filters;
pub mod product;
pub mod validation;

pub use checkpoint::Checkpoint;
pub use crawl_state::{CrawlState, CrawlSummary, PriceStats, StopReason};
pub use filters::ProductFilter;
pub use product::{
    Availability, CSV_HEADER, Currency, Price, ProductField, Rating, RawProduct, ValidatedProduct,
};
pub use validation::{FieldError, ValidationError, ValidationRules};
