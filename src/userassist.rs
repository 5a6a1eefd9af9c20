//! UserAssist execution counters.
//!
//! Explorer keeps per-user launch statistics below
//! `HKCU\Software\Microsoft\Windows\CurrentVersion\Explorer\UserAssist\{GUID}\Count`.
//! Value names are ROT13-encoded program paths or shell identifiers. The
//! `Version` value of the `{GUID}` key selects the data layout.
//!
//! Version 3 (XP, 16 bytes):
//!
//! ```text
//! Offset  Size  Description
//! 0x00    4     Session identifier
//! 0x04    4     Run count (stored +5 once it reaches 5)
//! 0x08    8     Last run time (FILETIME)
//! ```
//!
//! Version 5 (Windows 7 and later, 72 bytes):
//!
//! ```text
//! Offset  Size  Description
//! 0x00    4     Session identifier
//! 0x04    4     Run count
//! 0x08    4     Focus count
//! 0x0C    4     Focus time (milliseconds)
//! 0x3C    8     Last run time (FILETIME)
//! ```

use crate::error::{ArtifactError, Result};
use crate::filetime::Timestamp;
use crate::registry::{RegistryKey, RegistryValue};
use crate::utils::{read_u32_le, read_u64_le, rot13};
use tracing::{debug, warn};

/// Key path of the UserAssist key.
pub const USER_ASSIST_KEY_PATH: &str =
    "HKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\UserAssist";

/// Size of a version 3 entry.
pub const ENTRY_SIZE_V3: usize = 16;

/// Size of a version 5 entry.
pub const ENTRY_SIZE_V5: usize = 72;

/// Bias added to version 3 run counts.
const V3_COUNT_BIAS: u32 = 5;

/// A decoded UserAssist value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UserAssistEntry {
    /// GUID of the parent key, selecting the entry category.
    pub category: String,
    /// Decoded (ROT13) value name.
    pub name: String,
    /// Layout version.
    pub version: u32,
    /// Session identifier.
    pub session: u32,
    /// Number of runs.
    pub run_count: u32,
    /// Number of times focused (version 5).
    pub focus_count: Option<u32>,
    /// Focus time in milliseconds (version 5).
    pub focus_time_ms: Option<u32>,
    /// Last run time (FILETIME).
    pub last_run_time: u64,
}

impl UserAssistEntry {
    /// Decodes one `Count` value.
    ///
    /// `version` is the `Version` value of the `{GUID}` key. When it is
    /// absent the layout is inferred from the data size.
    pub fn parse(category: &str, encoded_name: &str, version: Option<u32>, data: &[u8]) -> Result<Self> {
        let version = match version {
            Some(version) => version,
            None => match data.len() {
                ENTRY_SIZE_V3 => 3,
                ENTRY_SIZE_V5 => 5,
                size => return Err(ArtifactError::UnsupportedCacheEntrySize { offset: 0, size }),
            },
        };

        let expected = match version {
            3 => ENTRY_SIZE_V3,
            5 => ENTRY_SIZE_V5,
            other => {
                return Err(ArtifactError::format_error(format!(
                    "Unsupported UserAssist version {}",
                    other
                )))
            }
        };
        if data.len() != expected {
            return Err(ArtifactError::UnsupportedCacheEntrySize {
                offset: 0,
                size: data.len(),
            });
        }

        let session = read_u32_le(data, 0x00)?;
        let raw_count = read_u32_le(data, 0x04)?;
        let (run_count, focus_count, focus_time_ms, last_run_time) = if version == 3 {
            let run_count = if raw_count >= V3_COUNT_BIAS {
                raw_count - V3_COUNT_BIAS
            } else {
                raw_count
            };
            (run_count, None, None, read_u64_le(data, 0x08)?)
        } else {
            (
                raw_count,
                Some(read_u32_le(data, 0x08)?),
                Some(read_u32_le(data, 0x0C)?),
                read_u64_le(data, 0x3C)?,
            )
        };

        Ok(UserAssistEntry {
            category: category.to_string(),
            name: rot13(encoded_name),
            version,
            session,
            run_count,
            focus_count,
            focus_time_ms,
            last_run_time,
        })
    }

    /// Returns the decoded last run time.
    pub fn last_run(&self) -> Timestamp {
        Timestamp::from_filetime(self.last_run_time)
    }
}

/// Decodes one `UserAssist\{GUID}` key.
pub fn decode_category<K: RegistryKey>(guid_key: &K) -> Vec<UserAssistEntry> {
    let Some(count) = guid_key.get_subkey_by_name("Count") else {
        debug!(category = guid_key.name(), "UserAssist category has no Count key");
        return Vec::new();
    };
    let version = guid_key
        .get_value_by_name("Version")
        .and_then(|v| v.data_as_u32());

    let mut entries = Vec::new();
    for value in count.values() {
        match UserAssistEntry::parse(guid_key.name(), value.name(), version, &value.data()) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(
                category = guid_key.name(),
                value = value.name(),
                error = %e,
                "Skipping malformed UserAssist value"
            ),
        }
    }
    entries
}

/// Decodes every category below a `UserAssist` key.
pub fn decode_user_assist<K: RegistryKey>(user_assist: &K) -> Vec<UserAssistEntry> {
    user_assist
        .subkeys()
        .iter()
        .flat_map(decode_category)
        .collect()
}
