//! Identifier lookups against the cached feed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use affdb_core::{FeedSource, LookupOutcome, ProductAffiliateResult};

use crate::error::{FetchError, StoreError};
use crate::fetcher::FeedFetcher;
use crate::record::{parse_feed, FeedRecord};
use crate::store::{FeedStore, FileVersion};

type Records = Arc<HashMap<String, FeedRecord>>;

/// Parse of the cache file, valid while the file's mtime and length are
/// unchanged.
struct CachedParse {
    version: FileVersion,
    records: Records,
}

/// Answers product lookups for one feed source, refreshing the cached feed
/// when it is stale.
///
/// Safe to share between tasks: the cache file is replaced atomically and
/// the parse cache is only locked for pointer swaps.
pub struct FeedIndex {
    source: FeedSource,
    store: FeedStore,
    fetcher: FeedFetcher,
    parsed: Mutex<Option<CachedParse>>,
}

impl FeedIndex {
    #[must_use]
    pub fn new(source: FeedSource, store: FeedStore, fetcher: FeedFetcher) -> Self {
        Self {
            source,
            store,
            fetcher,
            parsed: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    #[must_use]
    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    /// Looks up a product by EAN or GTIN.
    ///
    /// Refetches the feed first when the cache is missing or stale. Every
    /// failure is reported as [`LookupOutcome::FetchFailed`]; a failed refresh
    /// never disturbs the cached feed or its parse.
    pub async fn lookup(&self, identifier: &str) -> LookupOutcome {
        let identifier = identifier.trim();
        let feed_id = self.source.feed_id();

        match self.store.is_stale().await {
            Ok(false) => {}
            Ok(true) => {
                if let Err(e) = self.fetcher.fetch_and_install(&self.store).await {
                    tracing::warn!(feed_id, error = %e, "feed refresh failed");
                    return LookupOutcome::FetchFailed(e.to_string());
                }
            }
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "could not check feed freshness");
                return LookupOutcome::FetchFailed(e.to_string());
            }
        }

        let records = match self.records().await {
            Ok(Some(records)) => records,
            Ok(None) => return LookupOutcome::FetchFailed("no content available".to_string()),
            Err(e) => {
                tracing::warn!(feed_id, error = %e, "could not read cached feed");
                return LookupOutcome::FetchFailed(e.to_string());
            }
        };

        let Some(record) = records.get(identifier) else {
            tracing::debug!(feed_id, identifier, "product not in feed");
            return LookupOutcome::NotFound;
        };

        if record.is_out_of_stock() {
            tracing::debug!(feed_id, identifier, "product out of stock");
            return LookupOutcome::OutOfStock;
        }

        LookupOutcome::Found(self.to_result(record))
    }

    /// Downloads and installs the feed regardless of the cache's age.
    ///
    /// # Errors
    ///
    /// Propagates any [`FetchError`] from [`FeedFetcher::fetch_and_install`].
    pub async fn refresh(&self) -> Result<(), FetchError> {
        self.fetcher.fetch_and_install(&self.store).await
    }

    /// Parsed records of the current cache file, reusing the previous parse
    /// when the file has not changed. `None` when there is no cache file.
    ///
    /// The version is read before the content, so a concurrent install can at
    /// worst cause one redundant re-parse on the next call.
    async fn records(&self) -> Result<Option<Records>, StoreError> {
        let Some(version) = self.store.version().await? else {
            return Ok(None);
        };

        if let Some(records) = self.cached_records(version) {
            return Ok(Some(records));
        }

        let Some(raw) = self.store.read_raw().await? else {
            return Ok(None);
        };

        let parsed = parse_feed(&raw);
        tracing::info!(
            feed_id = self.source.feed_id(),
            rows = parsed.records.len(),
            skipped_malformed = parsed.malformed,
            skipped_without_identifier = parsed.without_identifier,
            "parsed product feed"
        );

        let records = Arc::new(parsed.records);
        *self.parsed.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedParse {
            version,
            records: Arc::clone(&records),
        });
        Ok(Some(records))
    }

    fn cached_records(&self, version: FileVersion) -> Option<Records> {
        self.parsed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|cached| cached.version == version)
            .map(|cached| Arc::clone(&cached.records))
    }

    fn to_result(&self, record: &FeedRecord) -> ProductAffiliateResult {
        ProductAffiliateResult {
            identifier: record.identifier.clone(),
            partner_name: self.source.partner_name().to_owned(),
            name: record.name.clone(),
            description: record.description.clone(),
            image_url: record.image_url.clone(),
            deep_link: record.deep_link.clone(),
            best_offer: record.price,
            currency: record.currency.clone(),
        }
    }
}
