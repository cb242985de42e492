use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Affiliate metadata for one product, as returned to callers of a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAffiliateResult {
    /// EAN or GTIN the product was looked up by.
    pub identifier: String,
    /// Display name of the affiliate partner the feed belongs to.
    pub partner_name: String,
    pub name: String,
    pub description: String,
    /// `None` when the feed has no image for the product (never an empty string).
    pub image_url: Option<String>,
    pub deep_link: String,
    /// Feed `search_price`, present only when strictly positive.
    pub best_offer: Option<Decimal>,
    /// ISO 4217 currency code of `best_offer`, when the feed names one.
    pub currency: Option<String>,
}

/// Result of a single identifier lookup against a feed.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(ProductAffiliateResult),
    NotFound,
    /// The product is in the feed but marked out of stock, so it is withheld.
    OutOfStock,
    /// The feed could not be refreshed or read; carries the underlying reason.
    FetchFailed(String),
}

impl LookupOutcome {
    /// Returns the product when the lookup succeeded.
    #[must_use]
    pub fn found(&self) -> Option<&ProductAffiliateResult> {
        match self {
            LookupOutcome::Found(result) => Some(result),
            _ => None,
        }
    }
}

impl std::fmt::Display for LookupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupOutcome::Found(result) => write!(f, "found: {}", result.name),
            LookupOutcome::NotFound => write!(f, "not found"),
            LookupOutcome::OutOfStock => write!(f, "out of stock"),
            LookupOutcome::FetchFailed(reason) => write!(f, "feed unavailable: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn make_result() -> ProductAffiliateResult {
        ProductAffiliateResult {
            identifier: "4006381333931".to_string(),
            partner_name: "AWIN".to_string(),
            name: "Widget".to_string(),
            description: "A nice widget".to_string(),
            image_url: None,
            deep_link: "http://x/merchant".to_string(),
            best_offer: Some(Decimal::from_str("14.99").unwrap()),
            currency: Some("EUR".to_string()),
        }
    }

    #[test]
    fn found_returns_result_only_for_found() {
        let found = LookupOutcome::Found(make_result());
        assert_eq!(found.found().map(|r| r.name.as_str()), Some("Widget"));
        assert!(LookupOutcome::NotFound.found().is_none());
        assert!(LookupOutcome::OutOfStock.found().is_none());
        assert!(LookupOutcome::FetchFailed("boom".into()).found().is_none());
    }

    #[test]
    fn display_includes_failure_reason() {
        let outcome = LookupOutcome::FetchFailed("HTTP 503".to_string());
        assert_eq!(outcome.to_string(), "feed unavailable: HTTP 503");
    }

    #[test]
    fn serde_serializes_price_as_string() {
        let json = serde_json::to_value(make_result()).expect("serialization failed");
        assert_eq!(json["best_offer"], "14.99");
        assert!(json["image_url"].is_null());
    }
}
