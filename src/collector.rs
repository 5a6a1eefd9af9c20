//! Collection of every artifact from a [`Registry`].
//!
//! A [`Collector`] resolves the key paths of each artifact, reads the
//! relevant values and pushes decoded records into a [`Sink`]. Every
//! `collect_*` method returns whether the artifact was found. A missing
//! key is reported at `info` level and yields `false`; a malformed value
//! is logged as a warning naming its key path and decoding moves on to the
//! next value, key path variant or control set. No decoder error ever
//! escapes a `collect_*` call.

use crate::appcompat::{
    detect_with_layout, iterate, AppCompatCacheEntry, CacheHeader, SharedSignatureLayout,
    KEY_PATH_VARIANTS, VALUE_NAME,
};
use crate::error::Result;
use crate::mounted_devices::{decode_mounted_devices, MountedDevice, MOUNTED_DEVICES_KEY_PATH};
use crate::mru::{decode_mru_key, MruEntry, RECENT_DOCS_KEY_PATH, RUN_MRU_KEY_PATH};
use crate::programs_cache::{self, decode_start_page, ProgramsCache};
use crate::registry::{current_control_set_name, Registry, RegistryKey, RegistryValue, CURRENT_CONTROL_SET};
use crate::sam::{decode_users, UserAccount, USERS_KEY_PATH};
use crate::sink::{Collected, Sink};
use crate::taskcache::{decode_task_cache, CachedTask, TASK_CACHE_KEY_PATH};
use crate::timezone::{self, TimeZoneInformation};
use crate::userassist::{decode_user_assist, UserAssistEntry, USER_ASSIST_KEY_PATH};
use tracing::{debug, info, instrument, warn};

/// Key path of the System hive root.
pub const SYSTEM_KEY_PATH: &str = "HKEY_LOCAL_MACHINE\\System";

/// Name prefix of control set keys.
pub const CONTROL_SET_PREFIX: &str = "ControlSet";

/// Collection options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CollectorOptions {
    /// Visit every `ControlSetNNN` key instead of only the current one.
    pub all_control_sets: bool,

    /// Layout assumed for the AppCompatCache signature shared by Windows
    /// 2003 and Vista.
    pub shared_signature_layout: SharedSignatureLayout,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        CollectorOptions {
            all_control_sets: true,
            shared_signature_layout: SharedSignatureLayout::default(),
        }
    }
}

/// Collects artifacts from a registry.
///
/// # Example
///
/// ```
/// use reg_artifacts::collector::{Collector, CollectorOptions};
/// use reg_artifacts::registry::{MemoryKey, MemoryRegistry, MemoryValue};
/// use reg_artifacts::{AppCompatCacheEntry, Collected};
///
/// let mut blob = vec![0u8; 128];
/// blob[0..4].copy_from_slice(&0xbadc0feeu32.to_le_bytes());
///
/// let mut system = MemoryKey::new("SYSTEM");
/// system
///     .create_key("ControlSet001\\Control\\Session Manager\\AppCompatCache")
///     .add_value(MemoryValue::binary("AppCompatCache", blob));
///
/// let mut registry = MemoryRegistry::new();
/// registry.mount("HKLM\\System", system);
///
/// let collector = Collector::new(&registry, CollectorOptions::default());
/// let mut entries: Vec<Collected<AppCompatCacheEntry>> = Vec::new();
/// assert!(collector.collect_app_compat_cache(&mut entries));
/// assert!(entries.is_empty());
/// ```
#[derive(Debug)]
pub struct Collector<'r, R: Registry> {
    registry: &'r R,
    options: CollectorOptions,
}

impl<'r, R: Registry> Collector<'r, R> {
    /// Creates a collector over `registry`.
    pub fn new(registry: &'r R, options: CollectorOptions) -> Self {
        Collector { registry, options }
    }

    /// Returns the collection options.
    pub fn options(&self) -> &CollectorOptions {
        &self.options
    }

    /// Returns the full key paths of the control sets to visit.
    ///
    /// With `all_control_sets` every subkey of the System root whose name
    /// starts with `ControlSet` is returned in hive order. Otherwise only
    /// the current control set is returned, resolved through
    /// `Select\Current` when possible.
    pub fn control_set_paths(&self) -> Vec<String> {
        let Some(system) = self.registry.get_key_by_path(SYSTEM_KEY_PATH) else {
            debug!(key_path = SYSTEM_KEY_PATH, "System hive not available");
            return Vec::new();
        };

        if self.options.all_control_sets {
            return system
                .subkeys()
                .iter()
                .filter(|key| {
                    key.name()
                        .get(..CONTROL_SET_PREFIX.len())
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(CONTROL_SET_PREFIX))
                })
                .map(|key| format!("{}\\{}", SYSTEM_KEY_PATH, key.name()))
                .collect();
        }

        let current = current_control_set_name(&system)
            .unwrap_or_else(|| CURRENT_CONTROL_SET.to_string());
        vec![format!("{}\\{}", SYSTEM_KEY_PATH, current)]
    }

    /// Collects AppCompatCache entries.
    ///
    /// Every key path variant of every control set is probed, oldest
    /// layout first. Returns true if at least one value was recognised.
    #[instrument(skip_all, fields(all_control_sets = self.options.all_control_sets))]
    pub fn collect_app_compat_cache<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<AppCompatCacheEntry> + ?Sized,
    {
        let mut found = false;

        for control_set in self.control_set_paths() {
            for variant in KEY_PATH_VARIANTS {
                let key_path = format!("{}\\{}", control_set, variant);
                let Some(key) = self.registry.get_key_by_path(&key_path) else {
                    debug!(key_path = %key_path, "Key path variant not present");
                    continue;
                };
                let Some(value) = key.get_value_by_name(VALUE_NAME) else {
                    debug!(key_path = %key_path, "Key has no AppCompatCache value");
                    continue;
                };

                match self.decode_app_compat_value(&key_path, &value.data(), sink) {
                    Ok(count) => {
                        debug!(key_path = %key_path, entries = count, "Decoded AppCompatCache value");
                        found = true;
                    }
                    Err(e) => warn!(key_path = %key_path, error = %e, "Skipping malformed AppCompatCache value"),
                }
            }
        }

        if !found {
            info!("AppCompatCache not found");
        }
        found
    }

    /// Streams the entries of one value into `sink`, returning how many
    /// were pushed. Entry errors end the value without failing it.
    fn decode_app_compat_value<S>(&self, key_path: &str, blob: &[u8], sink: &mut S) -> Result<usize>
    where
        S: Sink<AppCompatCacheEntry> + ?Sized,
    {
        let format = detect_with_layout(blob, self.options.shared_signature_layout)?;
        let header = CacheHeader::parse(format, blob)?;
        debug!(
            key_path,
            format = %format,
            entry_count = header.entry_count,
            header_size = header.header_size,
            "Parsed AppCompatCache header"
        );

        let mut count = 0;
        for result in iterate(&header, blob) {
            match result {
                Ok(entry) => {
                    sink.push(Collected {
                        key_path: key_path.to_string(),
                        item: entry,
                    });
                    count += 1;
                }
                Err(e) => {
                    warn!(key_path, emitted = count, error = %e, "Stopped at malformed cached entry");
                    break;
                }
            }
        }
        Ok(count)
    }

    /// Collects Task Scheduler Task Cache entries.
    #[instrument(skip_all)]
    pub fn collect_task_cache<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<CachedTask> + ?Sized,
    {
        let Some(task_cache) = self.registry.get_key_by_path(TASK_CACHE_KEY_PATH) else {
            info!(key_path = TASK_CACHE_KEY_PATH, "Task Cache not found");
            return false;
        };
        let Some(tasks) = decode_task_cache(&task_cache) else {
            info!(key_path = TASK_CACHE_KEY_PATH, "Task Cache lacks Tasks or Tree key");
            return false;
        };

        for task in tasks {
            let key_path = format!("{}\\Tasks\\{}", TASK_CACHE_KEY_PATH, task.identifier);
            sink.push(Collected { key_path, item: task });
        }
        true
    }

    /// Collects SAM user accounts.
    #[instrument(skip_all)]
    pub fn collect_user_accounts<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<UserAccount> + ?Sized,
    {
        let Some(users) = self.registry.get_key_by_path(USERS_KEY_PATH) else {
            info!(key_path = USERS_KEY_PATH, "SAM users not found");
            return false;
        };

        for account in decode_users(&users) {
            let key_path = format!("{}\\{}", USERS_KEY_PATH, account.key_name);
            sink.push(Collected { key_path, item: account });
        }
        true
    }

    /// Collects mounted device descriptors.
    #[instrument(skip_all)]
    pub fn collect_mounted_devices<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<MountedDevice> + ?Sized,
    {
        let Some(key) = self.registry.get_key_by_path(MOUNTED_DEVICES_KEY_PATH) else {
            info!(key_path = MOUNTED_DEVICES_KEY_PATH, "Mounted devices not found");
            return false;
        };

        for device in decode_mounted_devices(&key) {
            sink.push(Collected {
                key_path: MOUNTED_DEVICES_KEY_PATH.to_string(),
                item: device,
            });
        }
        true
    }

    /// Collects time zone information from each control set.
    #[instrument(skip_all, fields(all_control_sets = self.options.all_control_sets))]
    pub fn collect_time_zone<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<TimeZoneInformation> + ?Sized,
    {
        let mut found = false;
        for control_set in self.control_set_paths() {
            let key_path = format!("{}\\{}", control_set, timezone::KEY_PATH);
            let Some(key) = self.registry.get_key_by_path(&key_path) else {
                debug!(key_path = %key_path, "Key not present");
                continue;
            };
            sink.push(Collected {
                key_path,
                item: TimeZoneInformation::from_key(&key),
            });
            found = true;
        }

        if !found {
            info!("Time zone information not found");
        }
        found
    }

    /// Collects UserAssist counters.
    #[instrument(skip_all)]
    pub fn collect_user_assist<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<UserAssistEntry> + ?Sized,
    {
        let Some(user_assist) = self.registry.get_key_by_path(USER_ASSIST_KEY_PATH) else {
            info!(key_path = USER_ASSIST_KEY_PATH, "UserAssist not found");
            return false;
        };

        for entry in decode_user_assist(&user_assist) {
            let key_path = format!("{}\\{}\\Count", USER_ASSIST_KEY_PATH, entry.category);
            sink.push(Collected { key_path, item: entry });
        }
        true
    }

    /// Collects the `RecentDocs` (including per-extension lists) and
    /// `RunMRU` lists.
    #[instrument(skip_all)]
    pub fn collect_mru<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<MruEntry> + ?Sized,
    {
        let mut found = false;

        if let Some(recent_docs) = self.registry.get_key_by_path(RECENT_DOCS_KEY_PATH) {
            push_mru(RECENT_DOCS_KEY_PATH.to_string(), &recent_docs, sink);
            for extension in recent_docs.subkeys() {
                let key_path = format!("{}\\{}", RECENT_DOCS_KEY_PATH, extension.name());
                push_mru(key_path, &extension, sink);
            }
            found = true;
        }

        if let Some(run_mru) = self.registry.get_key_by_path(RUN_MRU_KEY_PATH) {
            push_mru(RUN_MRU_KEY_PATH.to_string(), &run_mru, sink);
            found = true;
        }

        if !found {
            info!("MRU lists not found");
        }
        found
    }

    /// Collects Start menu `ProgramsCache` values.
    #[instrument(skip_all)]
    pub fn collect_programs_cache<S>(&self, sink: &mut S) -> bool
    where
        S: Sink<ProgramsCache> + ?Sized,
    {
        let mut found = false;
        for key_path in programs_cache::KEY_PATHS {
            let Some(key) = self.registry.get_key_by_path(key_path) else {
                continue;
            };
            match decode_start_page(&key) {
                Ok(Some(cache)) => {
                    sink.push(Collected {
                        key_path: key_path.to_string(),
                        item: cache,
                    });
                    found = true;
                }
                Ok(None) => debug!(key_path, "Key has no ProgramsCache value"),
                Err(e) => warn!(key_path, error = %e, "Skipping malformed ProgramsCache value"),
            }
        }

        if !found {
            info!("ProgramsCache not found");
        }
        found
    }
}

fn push_mru<K, S>(key_path: String, key: &K, sink: &mut S)
where
    K: RegistryKey,
    S: Sink<MruEntry> + ?Sized,
{
    for entry in decode_mru_key(key) {
        sink.push(Collected {
            key_path: key_path.clone(),
            item: entry,
        });
    }
}
