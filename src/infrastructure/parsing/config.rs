//! CSS selector configuration for listing pages
//!
//! Every field carries an ordered list of fallback selectors. Defaults
//! target a books.toscrape-style catalogue.

use serde::{Deserialize, Serialize};

use crate::domain::product::ProductField;

/// Selectors for one field. When `attribute` is set the attribute value
/// is read instead of the element text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub selectors: Vec<String>,
    #[serde(default)]
    pub attribute: Option<String>,
}

impl FieldSelector {
    pub fn text(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(ToString::to_string).collect(),
            attribute: None,
        }
    }

    pub fn attr(selectors: &[&str], attribute: &str) -> Self {
        Self {
            selectors: selectors.iter().map(ToString::to_string).collect(),
            attribute: Some(attribute.to_string()),
        }
    }
}

/// Selectors for product list pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Product card containers, tried in order until one matches
    pub product_container: Vec<String>,
    pub title: FieldSelector,
    pub price: FieldSelector,
    pub rating: FieldSelector,
    pub availability: FieldSelector,
    pub url: FieldSelector,
    /// Link to the following listing page, searched in the whole document
    pub next_page: FieldSelector,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            product_container: vec![
                "article.product_pod".to_string(),
                "li.product".to_string(),
                ".product-card".to_string(),
            ],
            title: FieldSelector::attr(&["h3 a[title]", "a[title]"], "title"),
            price: FieldSelector::text(&["p.price_color", ".price"]),
            rating: FieldSelector::attr(&["p.star-rating", "[class*='star-rating']"], "class"),
            availability: FieldSelector::text(&["p.instock.availability", ".availability"]),
            url: FieldSelector::attr(&["h3 a", "a[href]"], "href"),
            next_page: FieldSelector::attr(&["li.next a", "a[rel='next']"], "href"),
        }
    }
}

impl SelectorConfig {
    pub fn field(&self, field: ProductField) -> &FieldSelector {
        match field {
            ProductField::Title => &self.title,
            ProductField::Price => &self.price,
            ProductField::Rating => &self.rating,
            ProductField::Availability => &self.availability,
            ProductField::Url => &self.url,
        }
    }

    /// Name of the first selector group that has no selectors
    pub fn first_empty_group(&self) -> Option<&'static str> {
        if self.product_container.is_empty() {
            return Some("product_container");
        }
        ProductField::ALL
            .iter()
            .find(|f| self.field(**f).selectors.is_empty())
            .map(|f| f.as_str())
            .or_else(|| self.next_page.selectors.is_empty().then_some("next_page"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_empty_groups() {
        assert_eq!(SelectorConfig::default().first_empty_group(), None);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: SelectorConfig = serde_json::from_str(
            r#"{"price": {"selectors": ["span.cost"]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.price.selectors, vec!["span.cost".to_string()]);
        assert_eq!(cfg.price.attribute, None);
        assert_eq!(cfg.title, SelectorConfig::default().title);
    }

    #[test]
    fn empty_field_group_is_reported() {
        let cfg = SelectorConfig {
            rating: FieldSelector::text(&[]),
            ..SelectorConfig::default()
        };
        assert_eq!(cfg.first_empty_group(), Some("rating"));
    }
}
