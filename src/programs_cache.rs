//! Explorer Start menu `ProgramsCache` values.
//!
//! `Explorer\StartPage\ProgramsCache` and `Explorer\StartPage2\ProgramsCache`
//! cache the shell item lists of Start menu shortcuts. The value opens with
//! a u32 format version:
//!
//! ```text
//! Version  Header
//! 0x01     8 bytes
//! 0x09     6 bytes
//! 0x0C     20 bytes (known folder GUID at 4)
//! 0x13     20 bytes (known folder GUID at 4)
//! ```
//!
//! Entries are framed as `size (u32) | data | sentinel (u8)`. Except for
//! version 0x09 a sentinel also precedes the first entry. Sentinels 0x00
//! and 0x01 continue the current run; 0x02 ends it, after which a
//! NUL-terminated block plus 7 bytes may precede a new sentinel.

use crate::error::{ArtifactError, Result};
use crate::registry::{RegistryKey, RegistryValue};
use crate::utils::{read_bytes, read_guid, read_u32_le, read_u8};
use tracing::{debug, trace};
use uuid::Uuid;

/// Key paths holding a `ProgramsCache` value.
pub const KEY_PATHS: [&str; 2] = [
    "HKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\StartPage",
    "HKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\StartPage2",
];

/// Value name.
pub const VALUE_NAME: &str = "ProgramsCache";

/// Sentinel ending an entry run.
const SENTINEL_END: u8 = 0x02;

/// Bytes skipped after the NUL that follows an end sentinel.
const FOOTER_SKIP: usize = 7;

/// One cached entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProgramsCacheEntry {
    /// Position of the entry in the value.
    pub index: usize,
    /// Offset of the entry data.
    pub offset: usize,
    /// Raw entry data (a shell item list).
    pub data: Vec<u8>,
}

/// Decoded `ProgramsCache` value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProgramsCache {
    /// Format version.
    pub format_version: u32,
    /// Known folder identifier (versions 0x0C and 0x13).
    pub known_folder: Option<Uuid>,
    /// Entries in value order.
    pub entries: Vec<ProgramsCacheEntry>,
}

/// Returns the header size of a format version.
fn data_offset(format_version: u32) -> Result<usize> {
    match format_version {
        0x01 => Ok(8),
        0x09 => Ok(6),
        0x0C | 0x13 => Ok(20),
        other => Err(ArtifactError::format_error(format!(
            "Unsupported ProgramsCache format version {:#x}",
            other
        ))),
    }
}

/// Parses a `ProgramsCache` value.
///
/// # Errors
///
/// Returns an error for unknown format versions and truncated entries.
pub fn parse_programs_cache(data: &[u8]) -> Result<ProgramsCache> {
    let format_version = read_u32_le(data, 0)?;
    let mut offset = data_offset(format_version)?;
    let known_folder = match format_version {
        0x0C | 0x13 => Some(read_guid(data, 4)?),
        _ => None,
    };
    debug!(format_version, known_folder = ?known_folder, "Parsing ProgramsCache");

    let mut sentinel = 0;
    if format_version != 0x09 {
        sentinel = read_u8(data, offset)?;
        offset += 1;
    }

    let mut entries = Vec::new();
    loop {
        while sentinel <= 0x01 && offset < data.len() {
            let size = read_u32_le(data, offset)? as usize;
            offset += 4;
            let entry = read_bytes(data, offset, size)?;
            trace!(index = entries.len(), offset, size, "ProgramsCache entry");
            entries.push(ProgramsCacheEntry {
                index: entries.len(),
                offset,
                data: entry.to_vec(),
            });
            offset += size;
            sentinel = read_u8(data, offset)?;
            offset += 1;
        }

        if sentinel != SENTINEL_END || offset >= data.len() {
            break;
        }

        // Unknown block: NUL-terminated, followed by a fixed-size footer
        let nul = data[offset..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ArtifactError::truncated(offset, 1, 0))?;
        offset += nul + FOOTER_SKIP;
        sentinel = read_u8(data, offset)?;
        offset += 1;
    }

    Ok(ProgramsCache {
        format_version,
        known_folder,
        entries,
    })
}

/// Reads and parses the `ProgramsCache` value of a `StartPage` key.
///
/// Returns `Ok(None)` when the key has no `ProgramsCache` value.
pub fn decode_start_page<K: RegistryKey>(key: &K) -> Result<Option<ProgramsCache>> {
    match key.get_value_by_name(VALUE_NAME) {
        Some(value) => parse_programs_cache(&value.data()).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryKey, MemoryValue};

    fn framed(entries: &[&[u8]], sentinel: u8) -> Vec<u8> {
        let mut data = Vec::new();
        for entry in entries {
            data.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            data.extend_from_slice(entry);
            data.push(0x01);
        }
        if let Some(last) = data.last_mut() {
            *last = sentinel;
        }
        data
    }

    fn version_13(entries: &[&[u8]]) -> Vec<u8> {
        let mut data = 0x13u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0x11; 16]);
        data.push(0x00);
        data.extend_from_slice(&framed(entries, SENTINEL_END));
        data
    }

    #[test]
    fn test_version_13() {
        let data = version_13(&[b"first", b"second!"]);
        let cache = parse_programs_cache(&data).unwrap();
        assert_eq!(cache.format_version, 0x13);
        assert!(cache.known_folder.is_some());
        assert_eq!(cache.entries.len(), 2);
        assert_eq!(cache.entries[0].data, b"first");
        assert_eq!(cache.entries[0].offset, 25);
        assert_eq!(cache.entries[1].data, b"second!");
        assert_eq!(cache.entries[1].index, 1);
    }

    #[test]
    fn test_version_9_has_no_leading_sentinel() {
        let mut data = 0x09u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&framed(&[b"abc"], SENTINEL_END));
        let cache = parse_programs_cache(&data).unwrap();
        assert_eq!(cache.known_folder, None);
        assert_eq!(cache.entries.len(), 1);
        assert_eq!(cache.entries[0].data, b"abc");
    }

    #[test]
    fn test_end_sentinel_with_trailing_block() {
        let mut data = 0x01u32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 4]);
        data.push(0x00);
        data.extend_from_slice(&framed(&[b"one"], SENTINEL_END));
        // Unknown block, 7-byte footer skip, new run
        data.extend_from_slice(&[0xAA, 0xBB, 0x00, 1, 2, 3, 4, 5, 6]);
        data.push(0x00);
        data.extend_from_slice(&framed(&[b"two"], SENTINEL_END));

        let cache = parse_programs_cache(&data).unwrap();
        let names: Vec<&[u8]> = cache.entries.iter().map(|e| e.data.as_slice()).collect();
        assert_eq!(names, vec![&b"one"[..], &b"two"[..]]);
    }

    #[test]
    fn test_errors() {
        assert!(parse_programs_cache(&0x05u32.to_le_bytes()).is_err());

        let mut data = version_13(&[b"entry"]);
        data.truncate(data.len() - 3);
        assert!(matches!(
            parse_programs_cache(&data),
            Err(ArtifactError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_decode_start_page() {
        let key = MemoryKey::new("StartPage2")
            .with_value(MemoryValue::binary(VALUE_NAME, version_13(&[b"x"])));
        let cache = decode_start_page(&&key).unwrap().unwrap();
        assert_eq!(cache.entries.len(), 1);

        let empty = MemoryKey::new("StartPage");
        assert!(decode_start_page(&&empty).unwrap().is_none());
    }
}
