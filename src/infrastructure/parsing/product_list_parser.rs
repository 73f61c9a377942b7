//! Product list extraction with fallback selectors
//!
//! Turns a rendered listing page into raw product cards plus the
//! next-page link. No coercion happens here; see `domain::validation`.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::{FieldSelector, SelectorConfig};
use crate::domain::product::{ProductField, RawProduct};
use crate::infrastructure::crawl_error::CrawlError;
use crate::infrastructure::page_driver::RenderedPage;

/// Everything pulled out of one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub products: Vec<RawProduct>,
    /// Absolute URL of the following page, when the page links one
    pub next_page_url: Option<String>,
}

struct CompiledField {
    selectors: Vec<Selector>,
    attribute: Option<String>,
}

impl CompiledField {
    fn compile(name: &str, config: &FieldSelector) -> Result<Self, CrawlError> {
        Ok(Self {
            selectors: compile_selectors(name, &config.selectors)?,
            attribute: config.attribute.clone(),
        })
    }

    /// First fallback yielding a non-empty value wins
    fn extract(&self, scope: ElementRef<'_>) -> Option<String> {
        self.selectors.iter().find_map(|selector| {
            scope.select(selector).find_map(|el| {
                let value = match &self.attribute {
                    Some(attr) => el.value().attr(attr).map(str::to_string),
                    None => Some(el.text().collect::<String>()),
                }?;
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            })
        })
    }
}

/// Field extractor for product listing pages
pub struct ProductListExtractor {
    containers: Vec<Selector>,
    fields: Vec<(ProductField, CompiledField)>,
    next_page: CompiledField,
}

impl ProductListExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self, CrawlError> {
        let fields = ProductField::ALL
            .iter()
            .map(|f| Ok((*f, CompiledField::compile(f.as_str(), config.field(*f))?)))
            .collect::<Result<Vec<_>, CrawlError>>()?;

        Ok(Self {
            containers: compile_selectors("product_container", &config.product_container)?,
            fields,
            next_page: CompiledField::compile("next_page", &config.next_page)?,
        })
    }

    /// Parse synchronously; `Html` is not `Send` and must not live across an await.
    pub fn extract(&self, page: &RenderedPage) -> PageExtraction {
        let document = Html::parse_document(&page.html);
        let root = document.root_element();

        let cards: Vec<ElementRef<'_>> = self
            .containers
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        debug!("Found {} product containers on {}", cards.len(), page.url);

        let products = cards
            .into_iter()
            .enumerate()
            .map(|(index, card)| self.extract_card(card, index, &page.url))
            .collect();

        let next_page_url = self
            .next_page
            .extract(root)
            .and_then(|href| resolve_link(&href, &page.url));

        PageExtraction {
            products,
            next_page_url,
        }
    }

    fn extract_card(&self, card: ElementRef<'_>, index: usize, page_url: &str) -> RawProduct {
        let mut raw = RawProduct::new(index, page_url);
        for (field, compiled) in &self.fields {
            raw.set_field(*field, compiled.extract(card));
        }
        raw
    }
}

/// Strict: every configured selector must compile
fn compile_selectors(field: &str, selectors: &[String]) -> Result<Vec<Selector>, CrawlError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s)
                .map_err(|e| CrawlError::invalid_selector(field, s, format!("{e:?}")))
        })
        .collect()
}

fn resolve_link(href: &str, page_url: &str) -> Option<String> {
    let resolved = match Url::parse(page_url) {
        Ok(base) => base.join(href),
        Err(_) => Url::parse(href),
    };
    match resolved {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            warn!("Ignoring unresolvable next-page link '{}' on {}: {}", href, page_url, e);
            None
        }
    }
}
