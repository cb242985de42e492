use std::path::{Path, PathBuf};

const DEFAULT_LANGUAGE: &str = "de";

/// One remote affiliate feed: credentials, feed identity, and where its
/// cached copy lives on disk.
///
/// Immutable once built. The store, fetcher, and index for a feed each take
/// the same `FeedSource`.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedSource {
    api_key: String,
    feed_id: String,
    partner_name: String,
    language: String,
    cache_dir: PathBuf,
}

impl FeedSource {
    #[must_use]
    pub fn new(api_key: &str, feed_id: &str, partner_name: &str, cache_dir: &Path) -> Self {
        Self {
            api_key: api_key.to_owned(),
            feed_id: feed_id.to_owned(),
            partner_name: partner_name.to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Overrides the language segment sent with the download request.
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        language.clone_into(&mut self.language);
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    #[must_use]
    pub fn partner_name(&self) -> &str {
        &self.partner_name
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// File stem shared by the cached CSV and scratch archives, e.g. `"awin-12345"`.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("awin-{}", self.feed_id)
    }

    /// Path of the flat CSV cache file, e.g. `<cache_dir>/awin-12345.csv`.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.csv", self.file_stem()))
    }
}

impl std::fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSource")
            .field("api_key", &"[redacted]")
            .field("feed_id", &self.feed_id)
            .field("partner_name", &self.partner_name)
            .field("language", &self.language)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}
