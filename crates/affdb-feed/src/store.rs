//! On-disk cache for one feed source.
//!
//! [`FeedStore`] answers "is the cached copy fresh?" and replaces the cache
//! file atomically: new content is written to a temp file in the same
//! directory and renamed over the old one, so concurrent readers see either
//! the previous feed or the new one in full.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use affdb_core::FeedSource;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

/// Cached feeds older than this are refetched.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Owns the flat CSV cache file of one feed source.
#[derive(Debug, Clone)]
pub struct FeedStore {
    path: PathBuf,
    max_age: Duration,
}

/// Identifies one installed version of the cache file.
///
/// Two installs within one timestamp tick that also produce the same length
/// are indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersion {
    pub modified: SystemTime,
    pub len: u64,
}

/// Snapshot of the cache file's state, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedStatus {
    pub path: PathBuf,
    pub last_modified: Option<DateTime<Utc>>,
    pub age: Option<Duration>,
    pub is_stale: bool,
}

impl FeedStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    /// Store for the cache path derived from `source`.
    #[must_use]
    pub fn for_source(source: &FeedSource, max_age: Duration) -> Self {
        Self::new(source.cache_path(), max_age)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Modification time of the cache file, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for failures other than the file being absent.
    pub async fn modified(&self) -> Result<Option<SystemTime>, StoreError> {
        Ok(self.version().await?.map(|v| v.modified))
    }

    /// Modification time and length of the cache file, or `None` if it does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for failures other than the file being absent.
    pub async fn version(&self) -> Result<Option<FileVersion>, StoreError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => {
                let modified = meta.modified().map_err(|e| StoreError::io(&self.path, e))?;
                Ok(Some(FileVersion {
                    modified,
                    len: meta.len(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Whether the cache needs refetching right now. See [`Self::is_stale_at`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file's metadata cannot be read.
    pub async fn is_stale(&self) -> Result<bool, StoreError> {
        self.is_stale_at(SystemTime::now()).await
    }

    /// Whether the cache is missing, or at least `max_age` old at `now`.
    ///
    /// Age is elapsed time since the last modification, so a file is stale at
    /// exactly `max_age`. A modification time later than `now` counts as age zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file's metadata cannot be read.
    pub async fn is_stale_at(&self, now: SystemTime) -> Result<bool, StoreError> {
        Ok(match self.modified().await? {
            None => true,
            Some(modified) => age_at(modified, now) >= self.max_age,
        })
    }

    /// Full contents of the cache file, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] for failures other than the file being absent.
    pub async fn read_raw(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Atomically replaces the cache file with `content`.
    ///
    /// Creates the cache directory if needed. The file's modification time
    /// becomes "now".
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory, temp file, or rename fails.
    /// The previous cache file is left untouched in every failure case.
    pub async fn install(&self, content: &[u8]) -> Result<(), StoreError> {
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let tmp_path = self.temp_path();
        if let Err(e) = write_synced(&tmp_path, content).await {
            remove_quietly(&tmp_path).await;
            return Err(StoreError::io(&tmp_path, e));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            remove_quietly(&tmp_path).await;
            return Err(StoreError::io(&self.path, e));
        }

        tracing::debug!(
            path = %self.path.display(),
            bytes = content.len(),
            "installed feed cache file"
        );
        Ok(())
    }

    /// Reports the cache file's modification time, age, and staleness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file's metadata cannot be read.
    pub async fn status(&self) -> Result<FeedStatus, StoreError> {
        let now = SystemTime::now();
        let modified = self.modified().await?;
        let age = modified.map(|m| age_at(m, now));
        Ok(FeedStatus {
            path: self.path.clone(),
            last_modified: modified.map(DateTime::<Utc>::from),
            age,
            is_stale: age.is_none_or(|a| a >= self.max_age),
        })
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "feed".into(), |n| n.to_string_lossy());
        self.dir()
            .join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()))
    }
}

fn age_at(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temp file");
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
