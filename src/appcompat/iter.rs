//! Lazy iteration over AppCompatCache entries.

use super::entry::{decode_entry, AppCompatCacheEntry};
use super::header::CacheHeader;
use super::signature::{detect_with_layout, FormatKind, SharedSignatureLayout};
use crate::error::{ArtifactError, Result};
use tracing::{debug, warn};

/// Iterator over the cached entries of one AppCompatCache value.
///
/// Yields `Ok` entries until the declared entry count or the end of the
/// value is reached. The first decode failure is yielded as `Err` and ends
/// the iteration; entries already yielded remain valid. The cursor starts at
/// the header size and only ever moves forward by a non-zero entry size, so
/// iteration always terminates.
#[derive(Debug, Clone)]
pub struct CachedEntries<'a> {
    blob: &'a [u8],
    format: FormatKind,
    entry_count: u32,
    cursor: usize,
    emitted: usize,
    finished: bool,
}

impl<'a> CachedEntries<'a> {
    /// Creates an iterator positioned at the first entry after `header`.
    pub fn new(header: &CacheHeader, blob: &'a [u8]) -> Self {
        CachedEntries {
            blob,
            format: header.format,
            entry_count: header.entry_count,
            cursor: header.header_size,
            emitted: 0,
            finished: false,
        }
    }

    /// Current offset into the value.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn count_reached(&self) -> bool {
        // Zero means the header does not record a count
        self.entry_count != 0 && self.emitted >= self.entry_count as usize
    }
}

impl<'a> Iterator for CachedEntries<'a> {
    type Item = Result<AppCompatCacheEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.cursor >= self.blob.len() || self.count_reached() {
            self.finished = true;
            return None;
        }

        match decode_entry(self.format, self.blob, self.cursor) {
            Ok(mut entry) if entry.entry_size > 0 => {
                entry.index = self.emitted;
                self.cursor += entry.entry_size;
                self.emitted += 1;
                Some(Ok(entry))
            }
            Ok(_) => {
                self.finished = true;
                Some(Err(ArtifactError::ZeroLengthEntry { offset: self.cursor }))
            }
            Err(e) => {
                debug!(offset = self.cursor, error = %e, "Stopping at malformed cached entry");
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<'a> std::iter::FusedIterator for CachedEntries<'a> {}

/// Returns an iterator over the entries of `blob` described by `header`.
pub fn iterate<'a>(header: &CacheHeader, blob: &'a [u8]) -> CachedEntries<'a> {
    CachedEntries::new(header, blob)
}

/// Result of decoding a whole AppCompatCache value.
#[derive(Debug)]
pub struct AppCompatCache {
    /// Parsed header.
    pub header: CacheHeader,

    /// Entries decoded before the end of the value or the first error.
    pub entries: Vec<AppCompatCacheEntry>,

    /// The error that stopped decoding early, if any.
    pub error: Option<ArtifactError>,
}

impl AppCompatCache {
    /// Layout generation of the value.
    pub fn format(&self) -> FormatKind {
        self.header.format
    }

    /// Returns true if every entry in the value was decoded.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Decodes a complete AppCompatCache value.
///
/// Detection and header errors are returned as `Err`; entry errors are
/// recorded in [`AppCompatCache::error`] alongside the entries decoded
/// before them.
pub fn parse_app_compat_cache(blob: &[u8], layout: SharedSignatureLayout) -> Result<AppCompatCache> {
    let format = detect_with_layout(blob, layout)?;
    let header = CacheHeader::parse(format, blob)?;

    let mut entries = Vec::new();
    let mut error = None;
    for result in iterate(&header, blob) {
        match result {
            Ok(entry) => entries.push(entry),
            Err(e) => error = Some(e),
        }
    }

    if header.entry_count != 0 && error.is_none() && entries.len() < header.entry_count as usize {
        warn!(
            declared = header.entry_count,
            decoded = entries.len(),
            "AppCompatCache value ended before the declared entry count"
        );
    }

    Ok(AppCompatCache {
        header,
        entries,
        error,
    })
}
