//! AppCompatCache cached entry decoding.
//!
//! Fixed-size entries (XP, 2003, Vista, 7) reference their path, and on
//! Windows 7 an auxiliary data blob, by offset from the start of the value.
//! Variable-size entries (8, 10) carry the path and data inline.
//!
//! Fixed-size entry layouts (2003/Vista/7 share the first 16 bytes):
//!
//! ```text
//! 32-bit                              64-bit
//! 0x00  2  Path size                  0x00  2  Path size
//! 0x02  2  Maximum path size          0x02  2  Maximum path size
//! 0x04  4  Path offset                0x04  4  Unknown (zero)
//! 0x08  8  Last modification time     0x08  8  Path offset
//! 0x10  .. generation specific        0x10  8  Last modification time
//!                                     0x18  .. generation specific
//!
//! Generation specific tail:
//!   2003    8  File size
//!   Vista   4  Insertion flags, 4 Shim flags
//!   7       4  Insertion flags, 4 Shim flags,
//!           data size and data offset (4 + 4 on 32-bit, 8 + 8 on 64-bit)
//! ```
//!
//! Variable-size entry layout:
//!
//! ```text
//! 0x00  4  Marker ("00ts" / "10ts")
//! 0x04  4  Unknown
//! 0x08  4  Cached entry data size
//! 0x0C  2  Path size
//! 0x0E  .. Path
//!          Windows 8:  4 Insertion flags, 4 Shim flags, [2 Unknown if "10ts"]
//!       8  Last modification time
//!       4  Data size
//!       .. Data
//! ```

use super::signature::{FormatKind, CACHED_ENTRY_SIGNATURE_8_1};
use crate::error::{ArtifactError, Result};
use crate::filetime::Timestamp;
use crate::utils::{
    read_bytes, read_u16_le, read_u32_le, read_u64_le, read_utf16_string, utf16_string_len,
};

/// Size of a Windows XP cached entry.
pub const ENTRY_SIZE_XP: usize = 552;

/// Maximum size of the inline Windows XP path, including its terminator.
pub const XP_PATH_SIZE: usize = 528;

/// Size of the header preceding Windows 8/10 cached entry data.
pub const VARIABLE_ENTRY_HEADER_SIZE: usize = 12;

/// Bytes shared by every 2003/Vista/7 entry, used to pick the bitness.
const COMMON_ENTRY_SIZE: usize = 16;

/// Insertion flag set when the shim engine observed the program execute.
pub const INSERTION_FLAG_EXECUTED: u32 = 0x0000_0002;

/// Pointer width of the system that wrote a fixed-size entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Bitness {
    /// 32-bit offsets.
    Bits32,
    /// 64-bit offsets.
    Bits64,
}

/// Chooses the pointer width of a 2003/Vista/7 cached entry.
///
/// On 32-bit systems the path offset sits at 0x04 and the timestamp at
/// 0x08. On 64-bit systems 0x04 is zero padding and the path offset is a
/// u64 at 0x08. An entry is therefore 64-bit exactly when the 32-bit path
/// offset is zero and the 64-bit path offset is not; everything else,
/// including an all-zero entry, is treated as 32-bit.
///
/// `entry_header` must hold at least the first 16 bytes of the entry.
pub fn choose_bitness(entry_header: &[u8]) -> Result<Bitness> {
    let path_offset_32bit = read_u32_le(entry_header, 0x04)?;
    let path_offset_64bit = read_u64_le(entry_header, 0x08)?;

    if path_offset_32bit == 0 && path_offset_64bit != 0 {
        Ok(Bitness::Bits64)
    } else {
        Ok(Bitness::Bits32)
    }
}

/// A decoded AppCompatCache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AppCompatCacheEntry {
    /// Position of the entry in the cache, starting at 0.
    pub index: usize,

    /// Offset of the entry within the value.
    pub offset: usize,

    /// Path of the cached executable.
    pub path: String,

    /// Last modification time of the file (FILETIME).
    pub last_modification_time: u64,

    /// Last update time of the entry (FILETIME, XP only).
    pub last_update_time: Option<u64>,

    /// Size of the file (XP and 2003 only).
    pub file_size: Option<u64>,

    /// Insertion flags (Vista, 7, 8).
    pub insertion_flags: Option<u32>,

    /// Shim flags (Vista, 7, 8).
    pub shim_flags: Option<u32>,

    /// Auxiliary data (7, 8, 10).
    pub data: Option<Vec<u8>>,

    /// Number of bytes the entry occupies in the value. Never zero.
    pub entry_size: usize,
}

impl AppCompatCacheEntry {
    /// Returns the decoded last modification time.
    pub fn last_modification(&self) -> Timestamp {
        Timestamp::from_filetime(self.last_modification_time)
    }

    /// Returns the decoded last update time, if recorded.
    pub fn last_update(&self) -> Option<Timestamp> {
        self.last_update_time.map(Timestamp::from_filetime)
    }

    /// Returns whether the insertion flags mark the program as executed.
    pub fn executed(&self) -> Option<bool> {
        self.insertion_flags
            .map(|flags| flags & INSERTION_FLAG_EXECUTED != 0)
    }

    fn new(offset: usize, entry_size: usize) -> Self {
        AppCompatCacheEntry {
            index: 0,
            offset,
            path: String::new(),
            last_modification_time: 0,
            last_update_time: None,
            file_size: None,
            insertion_flags: None,
            shim_flags: None,
            data: None,
            entry_size,
        }
    }
}

/// Decodes the cached entry at `entry_offset`.
///
/// The returned entry's `entry_size` tells the caller how far to advance.
///
/// # Errors
///
/// - [`ArtifactError::TruncatedData`] if the entry, its path or its data
///   lie outside the value.
/// - [`ArtifactError::InvalidPathSize`] if the 2003/Vista/7 path sizes are
///   inconsistent.
/// - [`ArtifactError::UnknownSignature`] if a Windows 8/10 entry lacks a
///   known marker.
pub fn decode_entry(format: FormatKind, blob: &[u8], entry_offset: usize) -> Result<AppCompatCacheEntry> {
    let entry = match format {
        FormatKind::WinXp => decode_xp_entry(blob, entry_offset)?,
        FormatKind::Win2003 | FormatKind::WinVista | FormatKind::Win7 => {
            decode_fixed_entry(format, blob, entry_offset)?
        }
        FormatKind::Win8 | FormatKind::Win10 => decode_variable_entry(format, blob, entry_offset)?,
    };

    if entry.entry_size == 0 {
        return Err(ArtifactError::ZeroLengthEntry { offset: entry_offset });
    }
    Ok(entry)
}

/// Windows XP: inline 528-byte path followed by three u64 fields.
fn decode_xp_entry(blob: &[u8], offset: usize) -> Result<AppCompatCacheEntry> {
    let raw = read_bytes(blob, offset, ENTRY_SIZE_XP)?;
    let path_region = &raw[..XP_PATH_SIZE];
    let path_len = utf16_string_len(path_region, XP_PATH_SIZE);

    let mut entry = AppCompatCacheEntry::new(offset, ENTRY_SIZE_XP);
    entry.path = read_utf16_string(&path_region[..path_len], offset)?;
    entry.last_modification_time = read_u64_le(raw, XP_PATH_SIZE)?;
    entry.file_size = Some(read_u64_le(raw, XP_PATH_SIZE + 8)?);
    entry.last_update_time = Some(read_u64_le(raw, XP_PATH_SIZE + 16)?);
    Ok(entry)
}

/// Returns the size of a fixed 2003/Vista/7 entry.
pub fn fixed_entry_size(format: FormatKind, bitness: Bitness) -> Result<usize> {
    match (format, bitness) {
        (FormatKind::Win2003 | FormatKind::WinVista, Bitness::Bits32) => Ok(24),
        (FormatKind::Win2003 | FormatKind::WinVista, Bitness::Bits64) => Ok(32),
        (FormatKind::Win7, Bitness::Bits32) => Ok(32),
        (FormatKind::Win7, Bitness::Bits64) => Ok(48),
        (FormatKind::WinXp, _) => Ok(ENTRY_SIZE_XP),
        (FormatKind::Win8 | FormatKind::Win10, _) => Err(ArtifactError::UnsupportedFormatType(format)),
    }
}

fn decode_fixed_entry(format: FormatKind, blob: &[u8], offset: usize) -> Result<AppCompatCacheEntry> {
    let common = read_bytes(blob, offset, COMMON_ENTRY_SIZE)?;
    let path_size = read_u16_le(common, 0x00)?;
    let maximum_path_size = read_u16_le(common, 0x02)?;

    // One UTF-16 terminator between the path and its buffer size
    if maximum_path_size < path_size || maximum_path_size - path_size != 2 {
        return Err(ArtifactError::InvalidPathSize {
            offset,
            path_size,
            maximum_path_size,
        });
    }

    let bitness = choose_bitness(common)?;
    let entry_size = fixed_entry_size(format, bitness)?;
    let raw = read_bytes(blob, offset, entry_size)?;

    let (path_offset, tail) = match bitness {
        Bitness::Bits32 => (u64::from(read_u32_le(raw, 0x04)?), 0x08),
        Bitness::Bits64 => (read_u64_le(raw, 0x08)?, 0x10),
    };

    let mut entry = AppCompatCacheEntry::new(offset, entry_size);
    entry.last_modification_time = read_u64_le(raw, tail)?;

    match format {
        FormatKind::Win2003 => {
            entry.file_size = Some(read_u64_le(raw, tail + 8)?);
        }
        FormatKind::WinVista | FormatKind::Win7 => {
            entry.insertion_flags = Some(read_u32_le(raw, tail + 8)?);
            entry.shim_flags = Some(read_u32_le(raw, tail + 12)?);
        }
        _ => return Err(ArtifactError::UnsupportedFormatType(format)),
    }

    if format == FormatKind::Win7 {
        let (data_size, data_offset) = match bitness {
            Bitness::Bits32 => (
                u64::from(read_u32_le(raw, tail + 16)?),
                u64::from(read_u32_le(raw, tail + 20)?),
            ),
            Bitness::Bits64 => (read_u64_le(raw, tail + 16)?, read_u64_le(raw, tail + 24)?),
        };
        if data_size > 0 {
            let data = read_bytes(blob, to_offset(data_offset, blob)?, to_offset(data_size, blob)?)?;
            entry.data = Some(data.to_vec());
        }
    }

    if path_size > 0 {
        let path = read_bytes(blob, to_offset(path_offset, blob)?, path_size.into())?;
        entry.path = read_utf16_string(path, offset)?;
    }

    Ok(entry)
}

fn decode_variable_entry(format: FormatKind, blob: &[u8], offset: usize) -> Result<AppCompatCacheEntry> {
    let header = read_bytes(blob, offset, VARIABLE_ENTRY_HEADER_SIZE)?;
    let marker = &header[0..4];
    if !super::signature::is_entry_marker(marker) {
        return Err(ArtifactError::UnknownSignature {
            signature: read_u32_le(marker, 0)?,
        });
    }
    let cached_entry_data_size = read_u32_le(header, 0x08)? as usize;
    let entry_size = VARIABLE_ENTRY_HEADER_SIZE
        .checked_add(cached_entry_data_size)
        .ok_or(ArtifactError::UnsupportedCacheEntrySize {
            offset,
            size: cached_entry_data_size,
        })?;

    // Whole entry must be inside the value before any field is read
    let raw = read_bytes(blob, offset, entry_size)?;
    let body = &raw[VARIABLE_ENTRY_HEADER_SIZE..];

    let mut entry = AppCompatCacheEntry::new(offset, entry_size);

    let path_size = usize::from(read_u16_le(body, 0)?);
    let mut cursor = 2;
    entry.path = read_utf16_string(read_bytes(body, cursor, path_size)?, offset)?;
    cursor += path_size;

    if format == FormatKind::Win8 {
        entry.insertion_flags = Some(read_u32_le(body, cursor)?);
        entry.shim_flags = Some(read_u32_le(body, cursor + 4)?);
        cursor += 8;
        if marker == CACHED_ENTRY_SIGNATURE_8_1 {
            // Unknown u16 only present on 8.1
            cursor += 2;
        }
    }

    entry.last_modification_time = read_u64_le(body, cursor)?;
    cursor += 8;

    let data_size = read_u32_le(body, cursor)? as usize;
    cursor += 4;
    entry.data = Some(read_bytes(body, cursor, data_size)?.to_vec());

    Ok(entry)
}

/// Converts an on-disk 64-bit offset or size into a `usize`.
fn to_offset(value: u64, blob: &[u8]) -> Result<usize> {
    usize::try_from(value).map_err(|_| ArtifactError::truncated(usize::MAX, 0, blob.len()))
}
