//! Feed acquisition and lookup for AWIN affiliate product feeds.
//!
//! [`FeedStore`] owns the cached CSV and decides staleness, [`FeedFetcher`]
//! downloads and unpacks a fresh archive, and [`FeedIndex`] parses the feed
//! and answers identifier lookups.

pub mod archive;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod record;
pub mod store;

pub use archive::{extract_single_entry, MAX_ENTRY_BYTES};
pub use error::{ExtractError, FetchError, StoreError};
pub use fetcher::{FeedFetcher, FetchSettings};
pub use index::FeedIndex;
pub use record::{parse_feed, FeedRecord, ParsedFeed, StockStatus, FEED_COLUMNS};
pub use store::{FeedStatus, FeedStore, FileVersion, DEFAULT_MAX_AGE};
