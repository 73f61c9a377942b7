//! Field-level coercion rules for scraped listing entries
//!
//! Each field has its own parse function returning a tagged result, and
//! `ValidatedProduct::from_raw` runs all of them so that a rejected record
//! reports every failing field at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::product::{
    Availability, Currency, Price, ProductField, Rating, RawProduct, ValidatedProduct,
};

/// One numeric run inside a price label, separators allowed between digits
static NUMERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d(?:[\d.,'\s]*\d)?").expect("numeric token pattern is valid"));

const CURRENCY_SYMBOLS: [char; 4] = ['£', '€', '$', '₴'];

const RATING_WORDS: [(&str, u8); 5] = [
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} field {reason}")]
pub struct FieldError {
    pub field: ProductField,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: ProductField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    fn missing(field: ProductField) -> Self {
        Self::new(field, "is missing (no selector matched)")
    }
}

/// Whole-record rejection; lists every field that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("product #{index} on {page_url} rejected: {}", join_reasons(.errors))]
pub struct ValidationError {
    pub index: usize,
    pub page_url: String,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn failed_fields(&self) -> Vec<ProductField> {
        self.errors.iter().map(|e| e.field).collect()
    }
}

fn join_reasons(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Phrases used to classify free-text stock labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    /// Any of these (case-insensitive) marks the item as in stock
    pub in_stock_phrases: Vec<String>,
    /// Checked first; any of these forces out of stock ("Not in stock" contains "in stock")
    pub out_of_stock_phrases: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            in_stock_phrases: vec!["In stock".to_string()],
            out_of_stock_phrases: vec![
                "out of stock".to_string(),
                "not in stock".to_string(),
                "unavailable".to_string(),
            ],
        }
    }
}

impl ValidatedProduct {
    /// Validate every field of a raw card. All-or-nothing.
    pub fn from_raw(raw: &RawProduct, rules: &ValidationRules) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();

        let title = required(raw, ProductField::Title)
            .and_then(parse_title)
            .map_err(|e| errors.push(e))
            .ok();
        let price = required(raw, ProductField::Price)
            .and_then(parse_price)
            .map_err(|e| errors.push(e))
            .ok();
        let rating = required(raw, ProductField::Rating)
            .and_then(parse_rating)
            .map_err(|e| errors.push(e))
            .ok();
        let url = required(raw, ProductField::Url)
            .and_then(|href| resolve_product_url(href, &raw.page_url))
            .map_err(|e| errors.push(e))
            .ok();
        let availability = classify_availability(raw.availability.as_deref(), rules);

        match (title, price, rating, url) {
            (Some(title), Some(price), Some(rating), Some(url)) if errors.is_empty() => {
                Ok(ValidatedProduct::new(title, price, rating, availability, url))
            }
            _ => Err(ValidationError {
                index: raw.index_in_page,
                page_url: raw.page_url.clone(),
                errors,
            }),
        }
    }
}

fn required(raw: &RawProduct, field: ProductField) -> Result<&str, FieldError> {
    raw.field(field).ok_or_else(|| FieldError::missing(field))
}

/// Collapse whitespace runs; empty titles are rejected.
pub fn parse_title(text: &str) -> Result<String, FieldError> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return Err(FieldError::new(ProductField::Title, "is empty"));
    }
    Ok(collapsed)
}

/// Parse a localized price label such as `£51.77`, `12 999 ₴` or `1.234,56 €`.
pub fn parse_price(text: &str) -> Result<Price, FieldError> {
    let fail = |reason: String| FieldError::new(ProductField::Price, reason);

    let currency = detect_currency(text);
    let tokens: Vec<regex::Match<'_>> = NUMERIC_TOKEN.find_iter(text).collect();
    let token = match tokens.as_slice() {
        [] => {
            return Err(fail(format!(
                "did not match expected currency pattern: no digits in '{}'",
                text.trim()
            )));
        }
        [single] => *single,
        _ => {
            return Err(fail(format!(
                "did not match expected currency pattern: several amounts in '{}'",
                text.trim()
            )));
        }
    };

    let mut prefix = &text[..token.start()];
    let fraction_only = prefix.ends_with(['.', ',']);
    if fraction_only {
        prefix = &prefix[..prefix.len() - 1];
    }
    // A sign may sit before or after the currency symbol: `-£5`, `£-5`, `£ -5`
    let sign_area = prefix
        .trim_end_matches(char::is_whitespace)
        .trim_end_matches(CURRENCY_SYMBOLS);
    if sign_area.ends_with(['-', '\u{2212}']) {
        return Err(fail(format!(
            "did not match expected currency pattern: negative amount in '{}'",
            text.trim()
        )));
    }

    let amount = if fraction_only {
        parse_fraction(token.as_str())
    } else {
        parse_amount(token.as_str())
    };
    let minor_units = amount.map_err(|reason| {
        fail(format!(
            "did not match expected currency pattern: {reason} in '{}'",
            text.trim()
        ))
    })?;

    Ok(Price::from_minor_units(minor_units, currency))
}

fn detect_currency(text: &str) -> Currency {
    let upper = text.to_uppercase();
    if text.contains('£') || upper.contains("GBP") {
        Currency::Gbp
    } else if text.contains('€') || upper.contains("EUR") {
        Currency::Eur
    } else if text.contains('₴') || upper.contains("ГРН") || upper.contains("UAH") {
        Currency::Uah
    } else if text.contains('$') || upper.contains("USD") {
        Currency::Usd
    } else {
        Currency::Unspecified
    }
}

/// Amount written without an integer part, as in `.50`
fn parse_fraction(digits: &str) -> Result<u64, String> {
    if !digits.chars().all(|c| c.is_ascii_digit()) || !(1..=2).contains(&digits.len()) {
        return Err("malformed decimal fraction".to_string());
    }
    let cents: u64 = digits.parse().map_err(|_| "malformed decimal fraction".to_string())?;
    Ok(if digits.len() == 1 { cents * 10 } else { cents })
}

/// Split a numeric token into digit groups and the separators between them,
/// decide which separator (if any) is the decimal point, and return minor units.
fn parse_amount(token: &str) -> Result<u64, String> {
    let mut groups: Vec<String> = vec![String::new()];
    let mut separators: Vec<char> = Vec::new();

    for c in token.chars() {
        if c.is_ascii_digit() {
            if let Some(last) = groups.last_mut() {
                last.push(c);
            }
            continue;
        }
        let sep = if c.is_whitespace() || c == '\'' { ' ' } else { c };
        if groups.last().is_some_and(String::is_empty) {
            return Err("consecutive separators".to_string());
        }
        separators.push(sep);
        groups.push(String::new());
    }

    let (integer_groups, integer_seps, fraction) = match (separators.last(), groups.last()) {
        (Some(&sep), Some(last))
            if (sep == '.' || sep == ',')
                && (1..=2).contains(&last.len())
                && separators.iter().filter(|&&s| s == sep).count() == 1 =>
        {
            let n = groups.len() - 1;
            (&groups[..n], &separators[..n - 1], Some(last.as_str()))
        }
        _ => (&groups[..], &separators[..], None),
    };

    if let Some(&first_sep) = integer_seps.first() {
        if integer_seps.iter().any(|&s| s != first_sep) {
            return Err("mixed thousands separators".to_string());
        }
        let leading_ok = (1..=3).contains(&integer_groups[0].len());
        let rest_ok = integer_groups[1..].iter().all(|g| g.len() == 3);
        if !leading_ok || !rest_ok {
            return Err("malformed digit grouping".to_string());
        }
    }

    let integer: String = integer_groups.concat();
    let whole: u64 = integer
        .parse()
        .map_err(|_| "amount out of range".to_string())?;
    let cents: u64 = match fraction {
        None => 0,
        Some(f) if f.len() == 1 => f.parse::<u64>().map_err(|e| e.to_string())? * 10,
        Some(f) => f.parse::<u64>().map_err(|e| e.to_string())?,
    };

    whole
        .checked_mul(Price::SCALE)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(|| "amount out of range".to_string())
}

/// Map a rating label (`Three`, `star-rating Four`, `2`) onto 1..=5.
pub fn parse_rating(text: &str) -> Result<Rating, FieldError> {
    let mut found: Option<u8> = None;

    for token in text.split_whitespace() {
        let lower = token.to_lowercase();
        let value = RATING_WORDS
            .iter()
            .find(|(word, _)| *word == lower)
            .map(|(_, stars)| *stars)
            .or_else(|| lower.parse::<u8>().ok().filter(|s| Rating::new(*s).is_some()));

        match (found, value) {
            (Some(prev), Some(v)) if prev != v => {
                return Err(FieldError::new(
                    ProductField::Rating,
                    format!("is ambiguous: '{}'", text.trim()),
                ));
            }
            (None, Some(v)) => found = Some(v),
            _ => {}
        }
    }

    found.and_then(Rating::new).ok_or_else(|| {
        FieldError::new(
            ProductField::Rating,
            format!("has unrecognized rating text '{}'", text.trim()),
        )
    })
}

/// Stock label classification. Never fails: anything without an in-stock
/// phrase counts as out of stock.
pub fn classify_availability(text: Option<&str>, rules: &ValidationRules) -> Availability {
    let Some(text) = text else {
        return Availability::OutOfStock;
    };
    let lower = text.to_lowercase();

    if rules
        .out_of_stock_phrases
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
    {
        return Availability::OutOfStock;
    }
    if rules
        .in_stock_phrases
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
    {
        Availability::InStock
    } else {
        Availability::OutOfStock
    }
}

/// Resolve a product link against the listing page it was found on.
pub fn resolve_product_url(href: &str, page_url: &str) -> Result<String, FieldError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(FieldError::new(ProductField::Url, "is empty"));
    }

    let resolved = match Url::parse(page_url) {
        Ok(base) => base.join(href),
        Err(_) => Url::parse(href),
    }
    .map_err(|e| FieldError::new(ProductField::Url, format!("'{href}' is not a valid URL: {e}")))?;

    match resolved.scheme() {
        "http" | "https" => Ok(resolved.to_string()),
        other => Err(FieldError::new(
            ProductField::Url,
            format!("'{href}' has unsupported scheme '{other}'"),
        )),
    }
}
