//! AppCompatCache header parsing.
//!
//! Header layouts per generation:
//!
//! ```text
//! XP (400 bytes)                 2003 / Vista (8 bytes)
//! 0x00  4    Signature           0x00  4  Signature
//! 0x04  4    Number of entries   0x04  4  Number of entries
//! 0x08  4    Number of LRU entries
//! 0x0C  4    Unknown
//! 0x10  384  LRU index (96 x u32)
//!
//! 7 (128 bytes)                  8 (128 bytes)
//! 0x00  4    Signature           0x00  4    Signature (0x80)
//! 0x04  4    Number of entries   0x04  124  Unknown
//! 0x08  120  Unknown
//!
//! 10 (declared size, at least 48 bytes)
//! 0x00  4    Signature / header size (0x30 or 0x34)
//! 0x04  4    Unknown
//! 0x08  28   Unknown
//! 0x24  4    Number of entries
//! 0x28  8    Unknown
//! ```
//!
//! Windows 8 does not record an entry count; the iterator relies on the
//! value length alone.

use super::signature::FormatKind;
use crate::error::Result;
use crate::utils::{read_bytes, read_u32_le};
use tracing::debug;

/// Size of the Windows XP header.
pub const HEADER_SIZE_XP: usize = 400;

/// Size of the Windows 2003 and Vista header.
pub const HEADER_SIZE_2003: usize = 8;

/// Size of the Windows 7 header.
pub const HEADER_SIZE_7: usize = 128;

/// Size of the Windows 8 header.
pub const HEADER_SIZE_8: usize = 128;

/// Statically defined size of the Windows 10 header. The declared size in
/// the signature field may be larger.
pub const HEADER_SIZE_10: usize = 48;

/// Number of LRU index slots in the Windows XP header.
pub const XP_LRU_SLOTS: usize = 96;

/// Parsed AppCompatCache header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CacheHeader {
    /// Layout generation the header was parsed as.
    pub format: FormatKind,

    /// Declared number of cached entries. Zero means "not recorded".
    pub entry_count: u32,

    /// Offset of the first cached entry.
    pub header_size: usize,

    /// Windows XP LRU index, most recently used first. Empty for other
    /// generations.
    pub lru_entries: Vec<u32>,
}

impl CacheHeader {
    /// Parses the header of an AppCompatCache value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ArtifactError::TruncatedData`] if the value is shorter
    /// than the header for `format`, including a Windows 10 header whose
    /// declared size exceeds the value length.
    pub fn parse(format: FormatKind, blob: &[u8]) -> Result<Self> {
        let header = match format {
            FormatKind::WinXp => {
                let entry_count = read_u32_le(blob, 0x04)?;
                let number_of_lru_entries = read_u32_le(blob, 0x08)? as usize;
                let lru_table = read_bytes(blob, 0x10, XP_LRU_SLOTS * 4)?;
                let lru_entries = lru_table
                    .chunks_exact(4)
                    .take(number_of_lru_entries.min(XP_LRU_SLOTS))
                    .map(|slot| u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]))
                    .collect();

                CacheHeader {
                    format,
                    entry_count,
                    header_size: HEADER_SIZE_XP,
                    lru_entries,
                }
            }
            FormatKind::Win2003 | FormatKind::WinVista => CacheHeader {
                format,
                entry_count: read_u32_le(blob, 0x04)?,
                header_size: HEADER_SIZE_2003,
                lru_entries: Vec::new(),
            },
            FormatKind::Win7 => CacheHeader {
                format,
                entry_count: read_u32_le(blob, 0x04)?,
                header_size: HEADER_SIZE_7,
                lru_entries: Vec::new(),
            },
            FormatKind::Win8 => CacheHeader {
                format,
                entry_count: 0,
                header_size: HEADER_SIZE_8,
                lru_entries: Vec::new(),
            },
            FormatKind::Win10 => {
                let declared = read_u32_le(blob, 0x00)? as usize;
                CacheHeader {
                    format,
                    entry_count: read_u32_le(blob, 0x24)?,
                    header_size: declared.max(HEADER_SIZE_10),
                    lru_entries: Vec::new(),
                }
            }
        };

        // Fixed header must be fully present
        let raw = read_bytes(blob, 0, header.header_size)?;

        debug!(
            format = %format,
            entry_count = header.entry_count,
            header_size = header.header_size,
            raw = %hex::encode(raw),
            "Parsed AppCompatCache header"
        );

        Ok(header)
    }

    /// Returns true if the value holds no bytes beyond the header.
    pub fn is_empty_cache(&self, blob_len: usize) -> bool {
        blob_len <= self.header_size
    }
}

/// Parses the header of an AppCompatCache value.
///
/// Shorthand for [`CacheHeader::parse`].
pub fn parse_header(format: FormatKind, blob: &[u8]) -> Result<CacheHeader> {
    CacheHeader::parse(format, blob)
}

/// Returns the fixed header size for `format`.
///
/// For Windows 10 this is the statically defined minimum; the declared
/// size is only known once the value is read.
pub fn fixed_header_size(format: FormatKind) -> usize {
    match format {
        FormatKind::WinXp => HEADER_SIZE_XP,
        FormatKind::Win2003 | FormatKind::WinVista => HEADER_SIZE_2003,
        FormatKind::Win7 => HEADER_SIZE_7,
        FormatKind::Win8 => HEADER_SIZE_8,
        FormatKind::Win10 => HEADER_SIZE_10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArtifactError;
    use crate::appcompat::signature::{SIGNATURE_10_CREATORS, SIGNATURE_2003, SIGNATURE_XP};

    #[test]
    fn test_xp_header() {
        let mut blob = vec![0u8; HEADER_SIZE_XP];
        blob[0..4].copy_from_slice(&SIGNATURE_XP.to_le_bytes());
        blob[4..8].copy_from_slice(&2u32.to_le_bytes());
        blob[8..12].copy_from_slice(&2u32.to_le_bytes());
        blob[0x10..0x14].copy_from_slice(&1u32.to_le_bytes());
        blob[0x14..0x18].copy_from_slice(&0u32.to_le_bytes());

        let header = parse_header(FormatKind::WinXp, &blob).unwrap();
        assert_eq!(header.entry_count, 2);
        assert_eq!(header.header_size, 400);
        assert_eq!(header.lru_entries, vec![1, 0]);
    }

    #[test]
    fn test_xp_header_truncated() {
        let mut blob = vec![0u8; HEADER_SIZE_XP - 1];
        blob[0..4].copy_from_slice(&SIGNATURE_XP.to_le_bytes());
        assert!(matches!(
            parse_header(FormatKind::WinXp, &blob),
            Err(ArtifactError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_vista_header_only() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&SIGNATURE_2003.to_le_bytes());
        blob.extend_from_slice(&0u32.to_le_bytes());

        let header = parse_header(FormatKind::WinVista, &blob).unwrap();
        assert_eq!(header.entry_count, 0);
        assert_eq!(header.header_size, 8);
        assert!(header.is_empty_cache(blob.len()));
    }

    #[test]
    fn test_win10_declared_size_wins() {
        let mut blob = vec![0u8; 0x34 + 4];
        blob[0..4].copy_from_slice(&SIGNATURE_10_CREATORS.to_le_bytes());
        blob[0x24..0x28].copy_from_slice(&7u32.to_le_bytes());

        let header = parse_header(FormatKind::Win10, &blob).unwrap();
        assert_eq!(header.header_size, 0x34);
        assert_eq!(header.entry_count, 7);
    }

    #[test]
    fn test_win10_declared_size_exceeds_value() {
        let mut blob = vec![0u8; 0x30];
        blob[0..4].copy_from_slice(&0x40u32.to_le_bytes());
        assert!(matches!(
            parse_header(FormatKind::Win10, &blob),
            Err(ArtifactError::TruncatedData { .. })
        ));
    }

    #[test]
    fn test_every_format_has_a_header_size() {
        for format in FormatKind::ALL {
            let blob = vec![0u8; 512];
            let header = parse_header(format, &blob).unwrap();
            assert!(header.header_size >= fixed_header_size(format));
        }
    }
}
