use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic fields of a listing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductField {
    Title,
    Price,
    Rating,
    Availability,
    Url,
}

impl ProductField {
    pub const ALL: [ProductField; 5] = [
        ProductField::Title,
        ProductField::Price,
        ProductField::Rating,
        ProductField::Availability,
        ProductField::Url,
    ];

    /// Column / config key name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Price => "price",
            Self::Rating => "rating",
            Self::Availability => "availability",
            Self::Url => "url",
        }
    }
}

impl fmt::Display for ProductField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw text pulled out of one product card, before any coercion.
///
/// A `None` field means none of the configured selectors matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProduct {
    /// Position of the card on its page (0-based)
    pub index_in_page: usize,
    /// URL of the listing page the card was found on
    pub page_url: String,
    pub title: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub availability: Option<String>,
    pub url: Option<String>,
}

impl RawProduct {
    pub fn new(index_in_page: usize, page_url: impl Into<String>) -> Self {
        Self {
            index_in_page,
            page_url: page_url.into(),
            ..Self::default()
        }
    }

    pub fn field(&self, field: ProductField) -> Option<&str> {
        match field {
            ProductField::Title => self.title.as_deref(),
            ProductField::Price => self.price.as_deref(),
            ProductField::Rating => self.rating.as_deref(),
            ProductField::Availability => self.availability.as_deref(),
            ProductField::Url => self.url.as_deref(),
        }
    }

    pub fn set_field(&mut self, field: ProductField, value: Option<String>) {
        let slot = match field {
            ProductField::Title => &mut self.title,
            ProductField::Price => &mut self.price,
            ProductField::Rating => &mut self.rating,
            ProductField::Availability => &mut self.availability,
            ProductField::Url => &mut self.url,
        };
        *slot = value;
    }
}

/// Currency recognised from a price label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Gbp,
    Usd,
    Eur,
    Uah,
    Unspecified,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Self::Gbp => "GBP",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Uah => "UAH",
            Self::Unspecified => "",
        }
    }
}

/// Exact monetary amount with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price {
    minor_units: u64,
    currency: Currency,
}

impl Price {
    pub const SCALE: u64 = 100;

    pub fn from_minor_units(minor_units: u64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    pub fn minor_units(&self) -> u64 {
        self.minor_units
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Lossy view for threshold comparisons
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        self.minor_units as f64 / Self::SCALE as f64
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.minor_units / Self::SCALE,
            self.minor_units % Self::SCALE
        )
    }
}

/// Star rating, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(stars: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&stars).then_some(Self(stars))
    }

    pub fn stars(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    InStock,
    OutOfStock,
}

impl Availability {
    pub fn is_in_stock(self) -> bool {
        matches!(self, Self::InStock)
    }
}

/// A product that passed every field rule. Built through
/// `ValidatedProduct::from_raw` only, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedProduct {
    title: String,
    price: Price,
    rating: Rating,
    availability: Availability,
    url: String,
}

impl ValidatedProduct {
    pub(crate) fn new(
        title: String,
        price: Price,
        rating: Rating,
        availability: Availability,
        url: String,
    ) -> Self {
        Self {
            title,
            price,
            rating,
            availability,
            url,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Row shape written to the CSV output
    pub fn to_row(&self) -> ProductRow<'_> {
        ProductRow {
            title: &self.title,
            price: self.price.to_string(),
            rating: self.rating.stars(),
            availability: self.availability.is_in_stock(),
            url: &self.url,
        }
    }
}

impl fmt::Display for ValidatedProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title: String = self.title.chars().take(50).collect();
        write!(f, "{} | {} | {}★", title, self.price, self.rating)
    }
}

/// Serialized CSV row; field order defines the column order.
#[derive(Debug, Serialize)]
pub struct ProductRow<'a> {
    pub title: &'a str,
    pub price: String,
    pub rating: u8,
    pub availability: bool,
    pub url: &'a str,
}

pub const CSV_HEADER: [&str; 5] = ["title", "price", "rating", "availability", "url"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_display_keeps_two_decimals() {
        assert_eq!(Price::from_minor_units(5177, Currency::Gbp).to_string(), "51.77");
        assert_eq!(Price::from_minor_units(1000, Currency::Gbp).to_string(), "10.00");
        assert_eq!(Price::from_minor_units(5, Currency::Usd).to_string(), "0.05");
    }

    #[test]
    fn prices_order_by_amount_and_hash() {
        let mut prices = vec![
            Price::from_minor_units(2000, Currency::Gbp),
            Price::from_minor_units(150, Currency::Gbp),
            Price::from_minor_units(2000, Currency::Gbp),
        ];
        prices.sort();
        assert_eq!(prices[0].minor_units(), 150);
        assert!(Currency::Gbp < Currency::Unspecified);

        let unique: std::collections::HashSet<Price> = prices.into_iter().collect();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn rating_rejects_out_of_range() {
        assert!(Rating::new(0).is_none());
        assert!(Rating::new(6).is_none());
        assert_eq!(Rating::new(3).map(Rating::stars), Some(3));
    }

    #[test]
    fn header_matches_field_order() {
        let names: Vec<&str> = ProductField::ALL.iter().map(|f| f.as_str()).collect();
        assert_eq!(names, CSV_HEADER);
    }

    #[test]
    fn raw_product_field_accessors() {
        let mut raw = RawProduct::new(0, "https://shop.test/page-1.html");
        raw.set_field(ProductField::Price, Some("£1.00".into()));
        assert_eq!(raw.field(ProductField::Price), Some("£1.00"));
        assert_eq!(raw.field(ProductField::Title), None);
    }
}
