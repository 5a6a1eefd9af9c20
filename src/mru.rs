//! Most Recently Used lists.
//!
//! Explorer keeps MRU lists as a set of numbered or lettered values plus
//! one ordering value:
//!
//! - `MRUList`: REG_SZ of value-name letters, most recent first (`RunMRU`).
//! - `MRUListEx`: array of u32 value-name numbers terminated by
//!   `0xFFFFFFFF`, most recent first (`RecentDocs`).
//!
//! Entry data starts with a NUL-terminated UTF-16LE string. Whatever
//! follows (for `RecentDocs` a shell item list) is kept as raw bytes.

use crate::error::Result;
use crate::registry::{RegistryKey, RegistryValue};
use crate::utils::{read_u32_le, read_utf16_string, utf16_string_len};
use tracing::{debug, warn};

/// Key path of the recent documents list.
pub const RECENT_DOCS_KEY_PATH: &str =
    "HKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\RecentDocs";

/// Key path of the Run dialog history.
pub const RUN_MRU_KEY_PATH: &str =
    "HKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\RunMRU";

/// Terminator of an `MRUListEx` value.
pub const MRU_LIST_EX_END: u32 = 0xFFFF_FFFF;

/// One MRU list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MruEntry {
    /// Position in the list, 0 being the most recent.
    pub position: usize,
    /// Name of the value holding the entry.
    pub value_name: String,
    /// Leading string of the entry data.
    pub text: String,
    /// Bytes following the string terminator.
    pub trailing_data: Vec<u8>,
}

/// Parses an `MRUListEx` value into value numbers.
///
/// A missing terminator is tolerated; trailing bytes that do not form a
/// full u32 are ignored.
pub fn parse_mru_list_ex(data: &[u8]) -> Vec<u32> {
    let mut order = Vec::new();
    let mut offset = 0;
    while let Ok(index) = read_u32_le(data, offset) {
        if index == MRU_LIST_EX_END {
            break;
        }
        order.push(index);
        offset += 4;
    }
    order
}

/// Parses an `MRUList` value into value names.
pub fn parse_mru_list(data: &[u8]) -> Result<Vec<String>> {
    Ok(read_utf16_string(data, 0)?
        .chars()
        .map(String::from)
        .collect())
}

/// Splits entry data into its leading string and the remaining bytes.
pub fn split_entry(data: &[u8]) -> Result<(String, &[u8])> {
    let len = utf16_string_len(data, data.len());
    let text = read_utf16_string(&data[..len], 0)?;
    let rest = data.get(len + 2..).unwrap_or_default();
    Ok((text, rest))
}

/// Returns the value names of an MRU key in list order.
///
/// `MRUListEx` is preferred over `MRUList` when both exist.
pub fn list_order<K: RegistryKey>(key: &K) -> Option<Vec<String>> {
    if let Some(value) = key.get_value_by_name("MRUListEx") {
        let order = parse_mru_list_ex(&value.data());
        return Some(order.iter().map(u32::to_string).collect());
    }
    let value = key.get_value_by_name("MRUList")?;
    match parse_mru_list(&value.data()) {
        Ok(order) => Some(order),
        Err(e) => {
            warn!(key = key.name(), error = %e, "Malformed MRUList value");
            None
        }
    }
}

/// Decodes the entries of one MRU key in list order.
///
/// Returns an empty list for keys without an ordering value. Entries
/// named in the ordering but missing from the key are skipped.
pub fn decode_mru_key<K: RegistryKey>(key: &K) -> Vec<MruEntry> {
    let Some(order) = list_order(key) else {
        debug!(key = key.name(), "No MRU ordering value");
        return Vec::new();
    };

    let mut entries = Vec::new();
    for (position, value_name) in order.into_iter().enumerate() {
        let Some(value) = key.get_value_by_name(&value_name) else {
            debug!(key = key.name(), value = %value_name, "MRU entry missing");
            continue;
        };
        match split_entry(&value.data()) {
            Ok((text, rest)) => entries.push(MruEntry {
                position,
                value_name,
                text,
                trailing_data: rest.to_vec(),
            }),
            Err(e) => warn!(key = key.name(), value = %value_name, error = %e, "Skipping malformed MRU entry"),
        }
    }
    entries
}

/// Strips the `\1` suffix Explorer appends to Run dialog commands.
pub fn run_command(text: &str) -> &str {
    text.strip_suffix("\\1").unwrap_or(text)
}
