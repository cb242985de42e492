//! Parsing of the flat CSV feed into records keyed by product identifier.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;

/// Columns requested from the feed endpoint, in download order.
pub const FEED_COLUMNS: [&str; 16] = [
    "ean",
    "product_GTIN",
    "product_name",
    "description",
    "aw_image_url",
    "store_price",
    "aw_deep_link",
    "aw_product_id",
    "search_price",
    "merchant_name",
    "merchant_id",
    "currency",
    "merchant_deep_link",
    "last_updated",
    "display_price",
    "stock_status",
];

/// Stock availability as reported by the feed's `stock_status` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockStatus {
    InStock,
    OutOfStock,
    Other(String),
}

impl StockStatus {
    #[must_use]
    pub fn from_feed(raw: &str) -> Self {
        match raw {
            "in stock" => StockStatus::InStock,
            "out of stock" => StockStatus::OutOfStock,
            other => StockStatus::Other(other.to_owned()),
        }
    }
}

/// One product row of the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRecord {
    /// `ean`, or `product_GTIN` when the EAN column is empty. Never empty.
    pub identifier: String,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Merchant landing page (`merchant_deep_link`).
    pub deep_link: String,
    /// Tracked affiliate link (`aw_deep_link`).
    pub affiliate_link: Option<String>,
    /// `search_price`, kept only when it parses as strictly positive.
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub merchant_name: Option<String>,
    pub stock_status: StockStatus,
}

impl FeedRecord {
    /// Projects a header-zipped row into a record.
    ///
    /// Returns `None` when the row carries neither an EAN nor a GTIN.
    fn from_row(row: &HashMap<&str, String>) -> Option<Self> {
        let identifier = [field(row, "ean"), field(row, "product_GTIN")]
            .into_iter()
            .find(|v| !v.is_empty())?
            .to_owned();

        Some(Self {
            identifier,
            name: field(row, "product_name").to_owned(),
            description: field(row, "description").to_owned(),
            image_url: optional_field(row, "aw_image_url"),
            deep_link: field(row, "merchant_deep_link").to_owned(),
            affiliate_link: optional_field(row, "aw_deep_link"),
            price: parse_price(field(row, "search_price")),
            currency: optional_field(row, "currency"),
            merchant_name: optional_field(row, "merchant_name"),
            stock_status: StockStatus::from_feed(field(row, "stock_status")),
        })
    }

    #[must_use]
    pub fn is_out_of_stock(&self) -> bool {
        self.stock_status == StockStatus::OutOfStock
    }
}

/// Parses a feed price, keeping it only when strictly greater than zero.
#[must_use]
pub fn parse_price(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|p| *p > Decimal::ZERO)
}

/// Parsed feed: records by identifier plus row accounting.
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub records: HashMap<String, FeedRecord>,
    /// Rows dropped for lacking both EAN and GTIN.
    pub without_identifier: usize,
    /// Rows dropped as malformed (CSV errors or wrong field count).
    pub malformed: usize,
}

/// Parses raw feed bytes into records keyed by identifier.
///
/// The first line is the header; every later row is zipped positionally
/// against it. Malformed rows and rows without an identifier are skipped.
/// When two rows share an identifier the later one wins.
#[must_use]
pub fn parse_feed(raw: &[u8]) -> ParsedFeed {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw);

    let mut parsed = ParsedFeed::default();
    let mut rows = reader.byte_records();

    let header: Vec<String> = match rows.next() {
        Some(Ok(record)) => record
            .iter()
            .map(|h| decode(h).trim_start_matches('\u{feff}').trim().to_owned())
            .collect(),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "feed header is unreadable; treating feed as empty");
            return parsed;
        }
        None => return parsed,
    };

    for (line, row) in rows.enumerate() {
        let record = match row {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(row = line + 1, error = %e, "skipping malformed feed row");
                parsed.malformed += 1;
                continue;
            }
        };

        if record.len() != header.len() {
            tracing::debug!(
                row = line + 1,
                fields = record.len(),
                expected = header.len(),
                "skipping feed row with wrong field count"
            );
            parsed.malformed += 1;
            continue;
        }

        let zipped: HashMap<&str, String> = header
            .iter()
            .map(String::as_str)
            .zip(record.iter().map(decode))
            .collect();

        match FeedRecord::from_row(&zipped) {
            Some(item) => {
                parsed.records.insert(item.identifier.clone(), item);
            }
            None => parsed.without_identifier += 1,
        }
    }

    parsed
}

/// Trimmed value of a column, `""` when the feed lacks the column.
fn field<'a>(row: &'a HashMap<&str, String>, name: &str) -> &'a str {
    row.get(name).map_or("", |v| v.trim())
}

fn optional_field(row: &HashMap<&str, String>, name: &str) -> Option<String> {
    Some(field(row, name))
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn decode(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;
