//! Optional post-validation filters. A record that fails a filter is
//! dropped silently (counted, never logged as a validation failure).

use serde::{Deserialize, Serialize};

use super::product::ValidatedProduct;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<u8>,
    pub in_stock_only: bool,
}

impl ProductFilter {
    pub fn is_active(&self) -> bool {
        self.min_price.is_some()
            || self.max_price.is_some()
            || self.min_rating.is_some()
            || self.in_stock_only
    }

    pub fn accepts(&self, product: &ValidatedProduct) -> bool {
        let price = product.price().as_f64();
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        if self
            .min_rating
            .is_some_and(|min| product.rating().stars() < min)
        {
            return false;
        }
        !self.in_stock_only || product.availability().is_in_stock()
    }

    /// Consistency check used by config validation
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(format!("min_price ({min}) is greater than max_price ({max})"));
            }
        }
        if let Some(r) = self.min_rating {
            if !(1..=5).contains(&r) {
                return Err(format!("min_rating must be within 1..=5, got {r}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Availability, Currency, Price, Rating};

    fn product(minor: u64, stars: u8, availability: Availability) -> ValidatedProduct {
        ValidatedProduct::new(
            "Book".into(),
            Price::from_minor_units(minor, Currency::Gbp),
            Rating::new(stars).unwrap(),
            availability,
            "https://shop.test/book".into(),
        )
    }

    #[test]
    fn inactive_filter_accepts_everything() {
        let filter = ProductFilter::default();
        assert!(!filter.is_active());
        assert!(filter.accepts(&product(1, 1, Availability::OutOfStock)));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let filter = ProductFilter {
            min_price: Some(10.0),
            max_price: Some(20.0),
            ..ProductFilter::default()
        };
        assert!(filter.accepts(&product(1000, 3, Availability::InStock)));
        assert!(filter.accepts(&product(2000, 3, Availability::InStock)));
        assert!(!filter.accepts(&product(999, 3, Availability::InStock)));
        assert!(!filter.accepts(&product(2001, 3, Availability::InStock)));
    }

    #[test]
    fn rating_and_stock_filters() {
        let filter = ProductFilter {
            min_rating: Some(4),
            in_stock_only: true,
            ..ProductFilter::default()
        };
        assert!(filter.accepts(&product(500, 4, Availability::InStock)));
        assert!(!filter.accepts(&product(500, 3, Availability::InStock)));
        assert!(!filter.accepts(&product(500, 5, Availability::OutOfStock)));
    }

    #[test]
    fn inverted_price_range_is_rejected() {
        let filter = ProductFilter {
            min_price: Some(30.0),
            max_price: Some(5.0),
            ..ProductFilter::default()
        };
        assert!(filter.validate().is_err());
    }
}
