//! Error types for artifact decoding operations.
//!
//! Every decoder in this crate reports failures through [`ArtifactError`].
//! None of these errors are fatal to a collection run: the collector catches
//! them at the value boundary, logs a warning naming the key path, and moves
//! on to the next value, key-path variant or control set. Only I/O errors
//! raised while loading a value dump from disk escape that boundary.

use crate::appcompat::FormatKind;
use std::io;
use thiserror::Error;

/// Result type alias for artifact decoding operations.
pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Errors that can occur while decoding registry artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// I/O error occurred while reading a value dump.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Buffer shorter than a required fixed-size read.
    #[error("Truncated data at offset {offset:#x}: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        /// Offset of the read that failed.
        offset: usize,
        /// Number of bytes the read required.
        expected: usize,
        /// Number of bytes that were available.
        actual: usize,
    },

    /// Leading bytes of a value do not match any known layout.
    #[error("Unknown signature: {signature:#010x}")]
    UnknownSignature {
        /// The 4-byte little-endian signature that was found.
        signature: u32,
    },

    /// Path size fields of a cached entry are inconsistent.
    #[error("Invalid path size at offset {offset:#x}: path size {path_size}, maximum path size {maximum_path_size}")]
    InvalidPathSize {
        /// Offset of the cached entry.
        offset: usize,
        /// Declared path size in bytes.
        path_size: u16,
        /// Declared maximum path size in bytes.
        maximum_path_size: u16,
    },

    /// Entry or record size not supported by any known layout.
    #[error("Unsupported entry size {size} at offset {offset:#x}")]
    UnsupportedCacheEntrySize {
        /// Offset of the entry or record.
        offset: usize,
        /// The unsupported size.
        size: usize,
    },

    /// An entry reported a size of zero bytes.
    #[error("Zero length entry at offset {offset:#x}")]
    ZeroLengthEntry {
        /// Offset of the entry.
        offset: usize,
    },

    /// A format kind reached a code path with no defined layout.
    #[error("Unsupported format type: {0}")]
    UnsupportedFormatType(FormatKind),

    /// Invalid UTF-16 string data.
    #[error("Invalid UTF-16 string at offset {offset:#x}")]
    InvalidUtf16 {
        /// Offset of the string.
        offset: usize,
    },

    /// Structurally invalid data that has no more specific variant.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Key or value not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ArtifactError {
    /// Creates a truncated data error for a read of `expected` bytes at
    /// `offset` from a buffer of `len` bytes.
    pub fn truncated(offset: usize, expected: usize, len: usize) -> Self {
        Self::TruncatedData {
            offset,
            expected,
            actual: len.saturating_sub(offset),
        }
    }

    /// Creates a format error with detailed context.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_artifacts::error::ArtifactError;
    /// let version = 7;
    /// let err = ArtifactError::format_error(
    ///     format!("Unsupported ProgramsCache format version: {}", version)
    /// );
    /// ```
    pub fn format_error(message: String) -> Self {
        Self::InvalidFormat(message)
    }

    /// Creates a not found error with context about what was being searched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_artifacts::error::ArtifactError;
    /// let err = ArtifactError::not_found("value", "AppCompatCache");
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Returns true if collection can continue with the next value or key.
    ///
    /// Only failures to acquire data from disk are unrecoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
