//! Registry access boundary.
//!
//! Decoders never parse hive files themselves. They read value bytes
//! through the [`Registry`], [`RegistryKey`] and [`RegistryValue`] traits,
//! which any hive parser can implement. Key paths are `\`-separated and
//! matched case-insensitively; the root may be written in short form
//! (`HKLM\System`) or long form (`HKEY_LOCAL_MACHINE\System`).
//!
//! [`MemoryRegistry`] is a complete in-memory implementation, useful for
//! tests and for callers that already extracted the keys they need.

use crate::utils::{read_u32_le, read_utf16_string};
use std::borrow::Cow;
use tracing::debug;

/// Root key aliases and their canonical names.
const ROOT_ALIASES: [(&str, &str); 5] = [
    ("HKLM", "HKEY_LOCAL_MACHINE"),
    ("HKCU", "HKEY_CURRENT_USER"),
    ("HKU", "HKEY_USERS"),
    ("HKCR", "HKEY_CLASSES_ROOT"),
    ("HKCC", "HKEY_CURRENT_CONFIG"),
];

/// Name of the alias resolved through `Select\Current`.
pub const CURRENT_CONTROL_SET: &str = "CurrentControlSet";

/// A registry value.
pub trait RegistryValue {
    /// Returns the value name. The default value has an empty name.
    fn name(&self) -> &str;

    /// Returns the raw value data.
    fn data(&self) -> Cow<'_, [u8]>;

    /// Interprets the data as a REG_DWORD.
    fn data_as_u32(&self) -> Option<u32> {
        read_u32_le(&self.data(), 0).ok()
    }

    /// Interprets the data as a REG_SZ (UTF-16LE, NUL terminated).
    fn data_as_string(&self) -> Option<String> {
        read_utf16_string(&self.data(), 0).ok()
    }
}

/// A registry key.
pub trait RegistryKey: Sized {
    /// Value type produced by this key.
    type Value: RegistryValue;

    /// Returns the key name.
    fn name(&self) -> &str;

    /// Returns the subkeys of this key.
    fn subkeys(&self) -> Vec<Self>;

    /// Returns the values of this key.
    fn values(&self) -> Vec<Self::Value>;

    /// Gets a subkey by name, ignoring ASCII case.
    fn get_subkey_by_name(&self, name: &str) -> Option<Self> {
        self.subkeys()
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(name))
    }

    /// Gets a value by name, ignoring ASCII case.
    fn get_value_by_name(&self, name: &str) -> Option<Self::Value> {
        self.values()
            .into_iter()
            .find(|value| value.name().eq_ignore_ascii_case(name))
    }
}

/// A registry addressed by full key paths.
pub trait Registry {
    /// Key type produced by this registry.
    type Key<'a>: RegistryKey
    where
        Self: 'a;

    /// Gets a key by its full path, e.g. `HKLM\System\Select`.
    fn get_key_by_path(&self, path: &str) -> Option<Self::Key<'_>>;
}

/// Splits a key path into segments and expands a root key alias.
///
/// Empty segments are dropped, so leading, trailing and doubled
/// separators are tolerated.
///
/// ```
/// use reg_artifacts::registry::normalize_key_path;
///
/// assert_eq!(
///     normalize_key_path("hklm\\System\\\\Select\\"),
///     vec!["HKEY_LOCAL_MACHINE", "System", "Select"]
/// );
/// ```
pub fn normalize_key_path(path: &str) -> Vec<String> {
    let mut segments: Vec<String> = path
        .split('\\')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(root) = segments.first_mut() {
        for (alias, canonical) in ROOT_ALIASES {
            if root.eq_ignore_ascii_case(alias) || root.eq_ignore_ascii_case(canonical) {
                *root = canonical.to_string();
                break;
            }
        }
    }
    segments
}

/// Joins segments into a `\`-separated key path.
pub fn join_key_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\\")
}

/// Reads `Select\Current` below a System hive root and returns the name
/// of the current control set, e.g. `ControlSet001`.
pub fn current_control_set_name<K: RegistryKey>(system_root: &K) -> Option<String> {
    let current = system_root
        .get_subkey_by_name("Select")?
        .get_value_by_name("Current")?
        .data_as_u32()?;
    Some(format!("ControlSet{:03}", current))
}

/// An in-memory registry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryValue {
    name: String,
    data: Vec<u8>,
}

impl MemoryValue {
    /// Creates a REG_BINARY style value.
    pub fn binary(name: &str, data: impl Into<Vec<u8>>) -> Self {
        MemoryValue {
            name: name.to_string(),
            data: data.into(),
        }
    }

    /// Creates a REG_DWORD value.
    pub fn dword(name: &str, value: u32) -> Self {
        Self::binary(name, value.to_le_bytes().to_vec())
    }

    /// Creates a REG_SZ value (UTF-16LE with terminator).
    pub fn string(name: &str, value: &str) -> Self {
        let mut data: Vec<u8> = value.encode_utf16().flat_map(u16::to_le_bytes).collect();
        data.extend_from_slice(&[0, 0]);
        Self::binary(name, data)
    }
}

impl<'a> RegistryValue for &'a MemoryValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.data)
    }
}

/// An in-memory registry key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryKey {
    name: String,
    values: Vec<MemoryValue>,
    subkeys: Vec<MemoryKey>,
}

impl MemoryKey {
    /// Creates an empty key.
    pub fn new(name: &str) -> Self {
        MemoryKey {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Adds a value, replacing any value with the same name.
    pub fn with_value(mut self, value: MemoryValue) -> Self {
        self.add_value(value);
        self
    }

    /// Adds a subkey.
    pub fn with_subkey(mut self, key: MemoryKey) -> Self {
        self.subkeys.push(key);
        self
    }

    /// Adds a value, replacing any value with the same name.
    pub fn add_value(&mut self, value: MemoryValue) -> &mut Self {
        self.values
            .retain(|existing| !existing.name.eq_ignore_ascii_case(&value.name));
        self.values.push(value);
        self
    }

    /// Returns the key at `path` below this key, creating missing keys.
    pub fn create_key(&mut self, path: &str) -> &mut MemoryKey {
        let mut key = self;
        for segment in path.split('\\').filter(|s| !s.is_empty()) {
            let index = match key
                .subkeys
                .iter()
                .position(|k| k.name.eq_ignore_ascii_case(segment))
            {
                Some(index) => index,
                None => {
                    key.subkeys.push(MemoryKey::new(segment));
                    key.subkeys.len() - 1
                }
            };
            key = &mut key.subkeys[index];
        }
        key
    }

    /// Returns the key at `path` below this key.
    pub fn find_key(&self, path: &str) -> Option<&MemoryKey> {
        let segments: Vec<&str> = path.split('\\').filter(|s| !s.is_empty()).collect();
        self.walk(&segments)
    }

    fn walk<S: AsRef<str>>(&self, segments: &[S]) -> Option<&MemoryKey> {
        let mut key = self;
        for segment in segments {
            let segment = segment.as_ref();
            let name = if segment.eq_ignore_ascii_case(CURRENT_CONTROL_SET) {
                // Only meaningful directly below a System hive root
                match current_control_set_name(&key) {
                    Some(name) => Cow::Owned(name),
                    None => Cow::Borrowed(segment),
                }
            } else {
                Cow::Borrowed(segment)
            };
            key = key
                .subkeys
                .iter()
                .find(|k| k.name.eq_ignore_ascii_case(&name))?;
        }
        Some(key)
    }
}

impl<'a> RegistryKey for &'a MemoryKey {
    type Value = &'a MemoryValue;

    fn name(&self) -> &str {
        &self.name
    }

    fn subkeys(&self) -> Vec<Self> {
        self.subkeys.iter().collect()
    }

    fn values(&self) -> Vec<Self::Value> {
        self.values.iter().collect()
    }
}

/// An in-memory registry made of hive roots mounted at key paths.
///
/// ```
/// use reg_artifacts::registry::{MemoryKey, MemoryRegistry, MemoryValue, Registry, RegistryKey};
///
/// let mut system = MemoryKey::new("SYSTEM");
/// system.create_key("Select").add_value(MemoryValue::dword("Current", 1));
/// system.create_key("ControlSet001\\Control");
///
/// let mut registry = MemoryRegistry::new();
/// registry.mount("HKLM\\System", system);
///
/// let key = registry.get_key_by_path("hklm\\system\\CurrentControlSet\\Control").unwrap();
/// assert_eq!(key.name(), "Control");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    mounts: Vec<(Vec<String>, MemoryKey)>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a hive root at `path`, e.g. `HKLM\SAM` or `HKCU`.
    pub fn mount(&mut self, path: &str, root: MemoryKey) -> &mut Self {
        let segments = normalize_key_path(path);
        debug!(path = %join_key_path(&segments), "Mounting in-memory hive");
        self.mounts.push((segments, root));
        self
    }
}

impl Registry for MemoryRegistry {
    type Key<'a> = &'a MemoryKey;

    fn get_key_by_path(&self, path: &str) -> Option<Self::Key<'_>> {
        let segments = normalize_key_path(path);

        // Longest matching mount point wins
        let (prefix, root) = self
            .mounts
            .iter()
            .filter(|(prefix, _)| {
                prefix.len() <= segments.len()
                    && prefix
                        .iter()
                        .zip(&segments)
                        .all(|(a, b)| a.eq_ignore_ascii_case(b))
            })
            .max_by_key(|(prefix, _)| prefix.len())?;

        root.walk(&segments[prefix.len()..])
    }
}
