//! AppCompatCache format detection.
//!
//! The first four bytes of the value identify the layout generation. For
//! Windows 8 and 10 the signature doubles as the header size, so the
//! first cached entry starts at that offset and carries its own 4-byte
//! marker which is checked as well.

use crate::error::{ArtifactError, Result};
use crate::utils::{read_bytes, read_u32_le};
use std::fmt;

/// Windows 2000/XP (32-bit) header signature.
pub const SIGNATURE_XP: u32 = 0xdead_beef;

/// Windows 2003 and Vista header signature.
pub const SIGNATURE_2003: u32 = 0xbadc_0ffe;

/// Windows 7 and 2008 R2 header signature.
pub const SIGNATURE_7: u32 = 0xbadc_0fee;

/// Windows 8 and 8.1 header signature (also the header size).
pub const SIGNATURE_8: u32 = 0x0000_0080;

/// Windows 10 header signature (also the header size).
pub const SIGNATURE_10: u32 = 0x0000_0030;

/// Windows 10 Creators Update and later header signature.
pub const SIGNATURE_10_CREATORS: u32 = 0x0000_0034;

/// Cached entry marker used by Windows 8.0.
pub const CACHED_ENTRY_SIGNATURE_8_0: &[u8; 4] = b"00ts";

/// Cached entry marker used by Windows 8.1 and 10.
pub const CACHED_ENTRY_SIGNATURE_8_1: &[u8; 4] = b"10ts";

/// AppCompatCache layout generation.
///
/// Determined once per value by [`detect`] and fixed for the rest of the
/// decode pass. Windows 2000 and XP share the `WinXp` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum FormatKind {
    /// Windows 2000 / XP 32-bit.
    WinXp,
    /// Windows 2003 and XP 64-bit.
    Win2003,
    /// Windows Vista and 2008.
    WinVista,
    /// Windows 7 and 2008 R2.
    Win7,
    /// Windows 8, 8.1 and 2012.
    Win8,
    /// Windows 10, 11 and 2016+.
    Win10,
}

impl FormatKind {
    /// All layout generations, oldest first.
    pub const ALL: [FormatKind; 6] = [
        FormatKind::WinXp,
        FormatKind::Win2003,
        FormatKind::WinVista,
        FormatKind::Win7,
        FormatKind::Win8,
        FormatKind::Win10,
    ];

    /// Returns a short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::WinXp => "Windows XP",
            FormatKind::Win2003 => "Windows 2003",
            FormatKind::WinVista => "Windows Vista",
            FormatKind::Win7 => "Windows 7",
            FormatKind::Win8 => "Windows 8",
            FormatKind::Win10 => "Windows 10",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Layout to assume for the signature shared by Windows 2003 and Vista.
///
/// Both generations write `0xbadc0ffe` and both use 24-byte (32-bit) or
/// 32-byte (64-bit) entries, so entry-size probing cannot tell them apart.
/// The only difference is the 8 bytes after the timestamp: a file size on
/// 2003, insertion and shim flags on Vista. The 2003 layout is the
/// default; callers that know the source system can request Vista.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SharedSignatureLayout {
    /// Decode the trailing 8 bytes as a file size.
    #[default]
    Win2003,
    /// Decode the trailing 8 bytes as insertion and shim flags.
    WinVista,
}

/// Classifies an AppCompatCache value, assuming the 2003 layout for the
/// shared 2003/Vista signature.
///
/// # Errors
///
/// Returns [`ArtifactError::UnknownSignature`] for unrecognised signatures
/// and for Windows 8/10 signatures whose first entry lacks a known marker.
pub fn detect(blob: &[u8]) -> Result<FormatKind> {
    detect_with_layout(blob, SharedSignatureLayout::default())
}

/// Classifies an AppCompatCache value using `layout` to resolve the
/// signature shared by Windows 2003 and Vista.
pub fn detect_with_layout(blob: &[u8], layout: SharedSignatureLayout) -> Result<FormatKind> {
    let signature = read_u32_le(blob, 0)?;

    match signature {
        SIGNATURE_XP => Ok(FormatKind::WinXp),
        SIGNATURE_2003 => Ok(match layout {
            SharedSignatureLayout::Win2003 => FormatKind::Win2003,
            SharedSignatureLayout::WinVista => FormatKind::WinVista,
        }),
        SIGNATURE_7 => Ok(FormatKind::Win7),
        SIGNATURE_8 if has_entry_marker(blob, signature) => Ok(FormatKind::Win8),
        SIGNATURE_10 | SIGNATURE_10_CREATORS if has_entry_marker(blob, signature) => {
            Ok(FormatKind::Win10)
        }
        _ => Err(ArtifactError::UnknownSignature { signature }),
    }
}

/// Returns true if a known cached entry marker sits at `offset`.
fn has_entry_marker(blob: &[u8], offset: u32) -> bool {
    matches!(
        read_bytes(blob, offset as usize, 4),
        Ok(marker) if is_entry_marker(marker)
    )
}

/// Returns true if `marker` is one of the Windows 8/10 cached entry markers.
pub fn is_entry_marker(marker: &[u8]) -> bool {
    marker == CACHED_ENTRY_SIGNATURE_8_0 || marker == CACHED_ENTRY_SIGNATURE_8_1
}
