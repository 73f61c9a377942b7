//! HTML parsing for product listing pages
//!
//! Selector configuration lives in `config`; the field extractor in
//! `product_list_parser`.

pub mod config;
pub mod product_list_parser;

pub use config::{FieldSelector, SelectorConfig};
pub use product_list_parser::{PageExtraction, ProductListExtractor};
