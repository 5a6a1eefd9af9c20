//! Application Compatibility Cache (Shim Cache) decoding.
//!
//! The `AppCompatCache` value under
//! `ControlSetXXX\Control\Session Manager\AppCompatCache` (or
//! `...\AppCompatibility` on XP) records executables the shim engine has
//! looked at. Its layout changed with almost every Windows release.
//!
//! Decoding runs in four stages:
//!
//! 1. [`detect`] classifies the value into a [`FormatKind`].
//! 2. [`CacheHeader::parse`] extracts the entry count and header size.
//! 3. [`decode_entry`] decodes one entry and reports its size.
//! 4. [`CachedEntries`] drives stage 3 until the entry count or the value
//!    is exhausted, stopping at the first malformed entry.
//!
//! ```
//! use reg_artifacts::appcompat::{parse_app_compat_cache, SharedSignatureLayout};
//!
//! // Header-only Windows 7 value
//! let mut blob = vec![0u8; 128];
//! blob[0..4].copy_from_slice(&0xbadc0feeu32.to_le_bytes());
//! let cache = parse_app_compat_cache(&blob, SharedSignatureLayout::default()).unwrap();
//! assert!(cache.entries.is_empty());
//! ```

pub mod entry;
pub mod header;
pub mod iter;
pub mod signature;

pub use entry::{choose_bitness, decode_entry, AppCompatCacheEntry, Bitness};
pub use header::{parse_header, CacheHeader};
pub use iter::{iterate, parse_app_compat_cache, AppCompatCache, CachedEntries};
pub use signature::{detect, detect_with_layout, FormatKind, SharedSignatureLayout};

/// Value name holding the cache.
pub const VALUE_NAME: &str = "AppCompatCache";

/// Key paths relative to a control set, oldest layout first.
pub const KEY_PATH_VARIANTS: [&str; 2] = [
    "Control\\Session Manager\\AppCompatibility",
    "Control\\Session Manager\\AppCompatCache",
];
