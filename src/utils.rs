//! Utility functions for binary parsing and string conversion.
//!
//! All multi-byte integers in registry artifacts are little-endian. Every
//! reader here is bounds-checked and returns
//! [`ArtifactError::TruncatedData`] instead of panicking, so decoders can
//! index untrusted blobs freely.

use crate::error::{ArtifactError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use std::io::Cursor;
use uuid::Uuid;

/// Returns `len` bytes of `data` starting at `offset`.
pub fn read_bytes(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| ArtifactError::truncated(offset, len, data.len()))?;
    data.get(offset..end)
        .ok_or_else(|| ArtifactError::truncated(offset, len, data.len()))
}

/// Reads an unsigned little-endian integer of 1, 2, 4 or 8 bytes.
pub fn read_uint_le(data: &[u8], offset: usize, width: usize) -> Result<u64> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(ArtifactError::format_error(format!(
            "Unsupported integer width: {}",
            width
        )));
    }
    let bytes = read_bytes(data, offset, width)?;
    let mut cursor = Cursor::new(bytes);
    Ok(cursor.read_uint::<LittleEndian>(width)?)
}

/// Reads a u8 from a byte slice at the given offset.
pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset)
        .copied()
        .ok_or_else(|| ArtifactError::truncated(offset, 1, data.len()))
}

/// Reads a u16 from a byte slice at the given offset.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    let mut cursor = Cursor::new(read_bytes(data, offset, 2)?);
    Ok(cursor.read_u16::<LittleEndian>()?)
}

/// Reads a u32 from a byte slice at the given offset.
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    let mut cursor = Cursor::new(read_bytes(data, offset, 4)?);
    Ok(cursor.read_u32::<LittleEndian>()?)
}

/// Reads an i32 from a byte slice at the given offset.
pub fn read_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    let mut cursor = Cursor::new(read_bytes(data, offset, 4)?);
    Ok(cursor.read_i32::<LittleEndian>()?)
}

/// Reads a u64 from a byte slice at the given offset.
pub fn read_u64_le(data: &[u8], offset: usize) -> Result<u64> {
    let mut cursor = Cursor::new(read_bytes(data, offset, 8)?);
    Ok(cursor.read_u64::<LittleEndian>()?)
}

/// Reads a UTF-16LE string from a byte slice, stopping at the first null
/// character.
///
/// Unpaired surrogates are replaced rather than rejected: evidence is
/// reported as found.
///
/// # Errors
///
/// Returns an error if the data length is not even (UTF-16 requires 2-byte
/// units).
pub fn read_utf16_string(data: &[u8], offset: usize) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    if data.len() % 2 != 0 {
        return Err(ArtifactError::InvalidUtf16 { offset });
    }

    let (decoded, _had_errors) = UTF_16LE.decode_without_bom_handling(data);

    Ok(match decoded.find('\0') {
        Some(end) => decoded[..end].to_string(),
        None => decoded.into_owned(),
    })
}

/// Returns the length in bytes of a UTF-16LE string up to (not including)
/// its null terminator, scanning at most `max_len` bytes.
///
/// The terminator is found by looking for two consecutive zero bytes on a
/// 2-byte boundary.
pub fn utf16_string_len(data: &[u8], max_len: usize) -> usize {
    let limit = max_len.min(data.len()) & !1;
    data[..limit]
        .chunks_exact(2)
        .position(|unit| unit == [0, 0])
        .map_or(limit, |units| units * 2)
}

/// Reads a 16-byte little-endian GUID at `offset`.
pub fn read_guid(data: &[u8], offset: usize) -> Result<Uuid> {
    let bytes = read_bytes(data, offset, 16)?;
    let mut guid = [0u8; 16];
    guid.copy_from_slice(bytes);
    Ok(Uuid::from_bytes_le(guid))
}

/// Decodes a ROT13-encoded string. Only ASCII letters are rotated.
pub fn rot13(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'a'..='m' | 'A'..='M' => (c as u8 + 13) as char,
            'n'..='z' | 'N'..='Z' => (c as u8 - 13) as char,
            _ => c,
        })
        .collect()
}
