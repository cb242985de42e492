//! Unpacks the zip archive the feed endpoint returns.

use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::ExtractError;

/// Upper bound on the decompressed size of a feed entry.
pub const MAX_ENTRY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Returns the contents of the single file inside a feed archive.
///
/// The feed endpoint ships one CSV per archive; anything else is a broken
/// contract and is rejected rather than guessing which entry to use.
/// Directory entries are not counted.
///
/// # Errors
///
/// - [`ExtractError::NoEntries`] / [`ExtractError::MultipleEntries`] when the
///   archive does not hold exactly one file.
/// - [`ExtractError::EntryTooLarge`] when the entry decompresses past
///   [`MAX_ENTRY_BYTES`].
/// - [`ExtractError::Zip`] for a corrupt archive.
/// - [`ExtractError::Io`] if reading the entry fails.
pub fn extract_single_entry<R: Read + Seek>(reader: R) -> Result<Vec<u8>, ExtractError> {
    extract_with_limit(reader, MAX_ENTRY_BYTES)
}

fn extract_with_limit<R: Read + Seek>(reader: R, limit: u64) -> Result<Vec<u8>, ExtractError> {
    let mut archive = ZipArchive::new(reader)?;

    let mut file_indices = Vec::new();
    for index in 0..archive.len() {
        if !archive.by_index(index)?.is_dir() {
            file_indices.push(index);
        }
    }

    let index = match file_indices.as_slice() {
        [] => return Err(ExtractError::NoEntries),
        [only] => *only,
        many => return Err(ExtractError::MultipleEntries(many.len())),
    };

    // The declared size comes from the archive itself; only bytes actually
    // decompressed count against the limit.
    let mut entry = archive.by_index(index)?;
    tracing::debug!(entry = entry.name(), declared_size = entry.size(), "extracting feed entry");
    let mut content = Vec::new();
    entry.by_ref().take(limit + 1).read_to_end(&mut content)?;
    if content.len() as u64 > limit {
        return Err(ExtractError::EntryTooLarge { limit });
    }
    Ok(content)
}
