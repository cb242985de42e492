//! Downloads a feed archive from the AWIN product-data endpoint and installs
//! its single CSV into a [`FeedStore`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use affdb_core::FeedSource;
use reqwest::Client;

use crate::archive::extract_single_entry;
use crate::error::{FetchError, StoreError};
use crate::record::FEED_COLUMNS;
use crate::store::FeedStore;

const DEFAULT_BASE_URL: &str = "https://productdata.awin.com";

/// HTTP settings for [`FeedFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: "affdb/0.1 (product-feed)".to_string(),
        }
    }
}

/// Fetches fresh feed content for one [`FeedSource`].
///
/// One download attempt per call; retries are left to the next staleness check.
pub struct FeedFetcher {
    client: Client,
    base_url: String,
    source: FeedSource,
}

impl FeedFetcher {
    /// Creates a fetcher pointed at the production feed endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(source: &FeedSource, settings: &FetchSettings) -> Result<Self, FetchError> {
        Self::with_base_url(source, settings, DEFAULT_BASE_URL)
    }

    /// Creates a fetcher with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_base_url(
        source: &FeedSource,
        settings: &FetchSettings,
        base_url: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            source: source.clone(),
        })
    }

    #[must_use]
    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    /// Full download URL: API key, language, feed id, column list, and the
    /// csv / comma / zip output options, all as path segments.
    #[must_use]
    pub fn download_url(&self) -> String {
        self.url_with_key(self.source.api_key())
    }

    /// Downloads the feed, unpacks it, and installs it into `store`.
    ///
    /// The cache file is only touched once the archive has been extracted,
    /// so every failure leaves the previous feed in place. The scratch
    /// archive is removed on every path.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Transport`] on network failure or timeout.
    /// - [`FetchError::Remote`] on a non-2xx response.
    /// - [`FetchError::Storage`] if the scratch archive or cache file cannot be written.
    /// - [`FetchError::Extract`] if the archive is corrupt or does not hold exactly one file.
    pub async fn fetch_and_install(&self, store: &FeedStore) -> Result<(), FetchError> {
        let feed_id = self.source.feed_id();
        tracing::info!(feed_id, url = %self.redacted_url(), "downloading product feed");

        let response = self.client.get(self.download_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_owned();
            tracing::warn!(feed_id, status = status.as_u16(), %reason, "feed download rejected");
            return Err(FetchError::Remote {
                status: status.as_u16(),
                reason,
            });
        }
        let body = response.bytes().await?;
        tracing::debug!(feed_id, bytes = body.len(), "feed archive downloaded");

        let archive_path = self.scratch_archive_path();
        let result = self.unpack_and_install(&archive_path, &body, store).await;

        if let Err(e) = tokio::fs::remove_file(&archive_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %archive_path.display(),
                    error = %e,
                    "failed to remove scratch archive"
                );
            }
        }

        if result.is_ok() {
            tracing::info!(feed_id, path = %store.path().display(), "product feed installed");
        }
        result
    }

    async fn unpack_and_install(
        &self,
        archive_path: &Path,
        body: &[u8],
        store: &FeedStore,
    ) -> Result<(), FetchError> {
        let dir = self.source.cache_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoreError::io(dir, e))?;
        tokio::fs::write(archive_path, body)
            .await
            .map_err(|e| StoreError::io(archive_path, e))?;

        let path = archive_path.to_path_buf();
        let content = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, FetchError> {
            let file = std::fs::File::open(&path).map_err(|e| StoreError::io(&path, e))?;
            Ok(extract_single_entry(std::io::BufReader::new(file))?)
        })
        .await
        .map_err(|e| FetchError::Task(e.to_string()))??;

        store.install(&content).await?;
        Ok(())
    }

    /// Scratch archive next to the cache file; unique per download so
    /// concurrent fetches of the same feed never share one.
    fn scratch_archive_path(&self) -> PathBuf {
        self.source.cache_dir().join(format!(
            "{}.{}.zip",
            self.source.file_stem(),
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Download URL with the API key masked, for logs.
    fn redacted_url(&self) -> String {
        self.url_with_key("***")
    }

    fn url_with_key(&self, api_key: &str) -> String {
        format!(
            "{base}/datafeed/download/apikey/{api_key}/language/{language}/fid/{feed_id}/columns/{columns}/format/csv/delimiter/%2C/compression/zip/",
            base = self.base_url,
            language = self.source.language(),
            feed_id = self.source.feed_id(),
            columns = FEED_COLUMNS.join(","),
        )
    }
}
