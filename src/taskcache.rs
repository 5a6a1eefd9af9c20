//! Task Scheduler Task Cache decoding.
//!
//! The Task Cache lives under
//! `HKLM\Software\Microsoft\Windows NT\CurrentVersion\Schedule\TaskCache`.
//! Its `Tree` subkey mirrors the task folder hierarchy; every task key
//! there carries an `Id` value holding the task GUID. The `Tasks` subkey
//! has one key per GUID whose `DynamicInfo` value records run-time
//! statistics.
//!
//! `DynamicInfo` layout:
//!
//! ```text
//! Offset  Size  Description
//! 0x00    4     Unknown (version)
//! 0x04    8     Last registered time (FILETIME)
//! 0x0C    8     Launch time (FILETIME)
//! 0x14    4     Unknown
//! 0x18    4     Unknown
//! 0x1C    8     Last error time (FILETIME, 36-byte layout only)
//! ```

use crate::error::{ArtifactError, Result};
use crate::filetime::Timestamp;
use crate::registry::{RegistryKey, RegistryValue};
use crate::utils::read_u64_le;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Key path of the Task Cache.
pub const TASK_CACHE_KEY_PATH: &str =
    "HKEY_LOCAL_MACHINE\\Software\\Microsoft\\Windows NT\\CurrentVersion\\Schedule\\TaskCache";

/// Size of the original `DynamicInfo` layout.
pub const DYNAMIC_INFO_SIZE: usize = 28;

/// Size of the `DynamicInfo` layout with a trailing last error time.
pub const DYNAMIC_INFO2_SIZE: usize = 36;

/// Mapping from task GUID (as written in the `Id` value) to task name.
pub type GuidIndex = HashMap<String, String>;

/// Decoded `DynamicInfo` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DynamicInfo {
    /// Last registered time (FILETIME).
    pub last_registered_time: u64,
    /// Launch time (FILETIME).
    pub launch_time: u64,
    /// Last error time (FILETIME), 36-byte layout only.
    pub last_error_time: Option<u64>,
}

impl DynamicInfo {
    /// Parses a `DynamicInfo` value.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::UnsupportedCacheEntrySize`] for sizes other
    /// than 28 or 36 bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        match data.len() {
            DYNAMIC_INFO_SIZE | DYNAMIC_INFO2_SIZE => Ok(DynamicInfo {
                last_registered_time: read_u64_le(data, 0x04)?,
                launch_time: read_u64_le(data, 0x0C)?,
                last_error_time: if data.len() == DYNAMIC_INFO2_SIZE {
                    Some(read_u64_le(data, 0x1C)?)
                } else {
                    None
                },
            }),
            size => Err(ArtifactError::UnsupportedCacheEntrySize { offset: 0, size }),
        }
    }
}

/// A scheduled task recorded in the Task Cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CachedTask {
    /// Task GUID (name of the `Tasks` subkey).
    pub identifier: String,

    /// Task name from the `Tree` hierarchy, or the GUID if unmapped.
    pub name: String,

    /// Task path from the `Path` value, if present.
    pub path: Option<String>,

    /// Last registered time (FILETIME).
    pub last_registered_time: u64,

    /// Launch time (FILETIME).
    pub launch_time: u64,

    /// Last error time (FILETIME), if recorded.
    pub last_error_time: Option<u64>,
}

impl CachedTask {
    /// Returns the decoded last registered time.
    pub fn last_registered(&self) -> Timestamp {
        Timestamp::from_filetime(self.last_registered_time)
    }

    /// Returns the decoded launch time.
    pub fn launched(&self) -> Timestamp {
        Timestamp::from_filetime(self.launch_time)
    }
}

/// Builds the GUID to task name index by walking the `Tree` hierarchy.
///
/// Every key at any depth that carries an `Id` value contributes one
/// mapping from that value to the key's own name. Folders without an `Id`
/// are descended into but not recorded.
pub fn build_guid_index<K: RegistryKey>(tree_root: &K) -> GuidIndex {
    let mut index = GuidIndex::new();
    let mut pending: Vec<K> = tree_root.subkeys();

    while let Some(key) = pending.pop() {
        if let Some(id) = key.get_value_by_name("Id").and_then(|v| v.data_as_string()) {
            index.insert(id, key.name().to_string());
        }
        pending.extend(key.subkeys());
    }

    debug!(tasks = index.len(), "Built task GUID index");
    index
}

/// Decodes one `Tasks\{GUID}` key.
///
/// Returns `Ok(None)` when the key has no `DynamicInfo` value.
pub fn decode_task<K: RegistryKey>(task_key: &K, index: &GuidIndex) -> Result<Option<CachedTask>> {
    let Some(value) = task_key.get_value_by_name("DynamicInfo") else {
        return Ok(None);
    };
    let info = DynamicInfo::parse(&value.data())?;

    let identifier = task_key.name().to_string();
    let name = index
        .get(&identifier)
        .cloned()
        .unwrap_or_else(|| identifier.clone());
    let path = task_key
        .get_value_by_name("Path")
        .and_then(|v| v.data_as_string());

    Ok(Some(CachedTask {
        identifier,
        name,
        path,
        last_registered_time: info.last_registered_time,
        launch_time: info.launch_time,
        last_error_time: info.last_error_time,
    }))
}

/// Decodes every task below a `TaskCache` key.
///
/// Returns `None` unless both the `Tasks` and `Tree` subkeys exist. Tasks
/// with malformed `DynamicInfo` values are skipped with a warning.
pub fn decode_task_cache<K: RegistryKey>(task_cache: &K) -> Option<Vec<CachedTask>> {
    let tasks = task_cache.get_subkey_by_name("Tasks")?;
    let tree = task_cache.get_subkey_by_name("Tree")?;

    // Built once per call and only read while decoding tasks
    let index = build_guid_index(&tree);

    let mut decoded = Vec::new();
    for task_key in tasks.subkeys() {
        match decode_task(&task_key, &index) {
            Ok(Some(task)) => decoded.push(task),
            Ok(None) => debug!(task = task_key.name(), "Task has no DynamicInfo value"),
            Err(e) => warn!(task = task_key.name(), error = %e, "Skipping task with unsupported DynamicInfo"),
        }
    }
    Some(decoded)
}
