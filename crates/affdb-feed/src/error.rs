use std::path::PathBuf;

use thiserror::Error;

/// Filesystem failures while reading or replacing the cached feed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// The downloaded archive does not honour the one-file feed contract.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("feed archive contains no files")]
    NoEntries,

    #[error("feed archive contains {0} files, expected exactly one")]
    MultipleEntries(usize),

    #[error("feed archive entry exceeds {limit} bytes")]
    EntryTooLarge { limit: u64 },

    #[error("corrupt feed archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error reading feed archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned while downloading and installing a fresh feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network, DNS, TLS, or timeout failure from the HTTP client.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The feed endpoint answered with a non-success status.
    #[error("feed endpoint returned HTTP {status}: {reason}")]
    Remote { status: u16, reason: String },

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Task(String),
}
