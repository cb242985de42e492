use std::path::PathBuf;

use crate::FeedSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub awin_api_key: String,
    pub awin_feed_id: String,
    pub partner_name: String,
    pub feed_language: String,
    pub cache_dir: PathBuf,
    pub feed_max_age_secs: u64,
    pub http_timeout_secs: u64,
    pub user_agent: String,
}

impl AppConfig {
    /// Builds the [`FeedSource`] described by this configuration.
    #[must_use]
    pub fn feed_source(&self) -> FeedSource {
        FeedSource::new(
            &self.awin_api_key,
            &self.awin_feed_id,
            &self.partner_name,
            &self.cache_dir,
        )
        .with_language(&self.feed_language)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("awin_api_key", &"[redacted]")
            .field("awin_feed_id", &self.awin_feed_id)
            .field("partner_name", &self.partner_name)
            .field("feed_language", &self.feed_language)
            .field("cache_dir", &self.cache_dir)
            .field("feed_max_age_secs", &self.feed_max_age_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
