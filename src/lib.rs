//! # Windows Registry Artifact Decoders
//!
//! Decoders for the forensic artifacts Windows keeps in registry values,
//! working on raw value bytes handed over by any hive parser.
//!
//! ## Features
//!
//! - **AppCompatCache**: every layout from Windows XP to Windows 11, with
//!   lazy, bounds-checked entry iteration
//! - **Task Cache**: scheduled task run times resolved to task names
//! - **SAM**: local user accounts from the `F` and `V` values
//! - **Explorer history**: UserAssist counters, MRU lists, `ProgramsCache`
//! - **System configuration**: mounted devices and time zone information
//! - **Never panics on input**: every read is bounds-checked and malformed
//!   data becomes an [`ArtifactError`]
//!
//! ## Architecture
//!
//! 1. **Registry boundary** ([`registry`]): traits any hive parser can
//!    implement, plus an in-memory registry
//! 2. **Decoders** ([`appcompat`], [`taskcache`], [`sam`], ...): pure
//!    functions from value bytes to typed records
//! 3. **Collector** ([`collector`]): resolves key paths and control sets,
//!    runs the decoders and pushes records into a [`Sink`]
//!
//! ## AppCompatCache Layouts
//!
//! ```text
//! Signature    Layout        Header  Entry
//! 0xdeadbeef   XP            400     552 bytes, inline path
//! 0xbadc0ffe   2003 / Vista  8       24 / 32 bytes (32 / 64-bit)
//! 0xbadc0fee   7             128     32 / 48 bytes (32 / 64-bit)
//! 0x00000080   8 / 8.1       128     "00ts" / "10ts" + size
//! 0x00000030   10            48      "10ts" + size
//! 0x00000034   10 (1703+)    52      "10ts" + size
//! ```
//!
//! ## Examples
//!
//! ### Decoding a Value Dump
//!
//! ```no_run
//! use reg_artifacts::appcompat::{parse_app_compat_cache, SharedSignatureLayout};
//! use reg_artifacts::raw::RawValue;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let raw = RawValue::open("AppCompatCache.bin")?;
//! let cache = parse_app_compat_cache(&raw, SharedSignatureLayout::default())?;
//!
//! println!("Format: {}", cache.format());
//! for entry in &cache.entries {
//!     println!("{} {}", entry.last_modification(), entry.path);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Collecting from a Registry
//!
//! ```
//! use reg_artifacts::registry::{MemoryKey, MemoryRegistry};
//! use reg_artifacts::{CachedTask, Collected, Collector, CollectorOptions, UserAccount};
//!
//! let mut users = MemoryKey::new("Users");
//! users.create_key("Names\\Administrator");
//!
//! let mut registry = MemoryRegistry::new();
//! registry.mount("HKLM\\SAM\\SAM\\Domains\\Account\\Users", users);
//!
//! let collector = Collector::new(&registry, CollectorOptions::default());
//! let mut accounts: Vec<Collected<UserAccount>> = Vec::new();
//! assert!(collector.collect_user_accounts(&mut accounts));
//! assert!(accounts.is_empty());
//!
//! let mut tasks: Vec<Collected<CachedTask>> = Vec::new();
//! assert!(!collector.collect_task_cache(&mut tasks));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod appcompat;
pub mod collector;
pub mod error;
pub mod filetime;
pub mod mounted_devices;
pub mod mru;
pub mod programs_cache;
pub mod raw;
pub mod registry;
pub mod sam;
pub mod sink;
pub mod taskcache;
pub mod timezone;
pub mod userassist;
pub mod utils;

// Re-export main types for convenience
pub use appcompat::{AppCompatCache, AppCompatCacheEntry, FormatKind, SharedSignatureLayout};
pub use collector::{Collector, CollectorOptions};
pub use error::{ArtifactError, Result};
pub use filetime::Timestamp;
pub use mounted_devices::MountedDevice;
pub use mru::MruEntry;
pub use programs_cache::ProgramsCache;
pub use raw::RawValue;
pub use registry::{Registry, RegistryKey, RegistryValue};
pub use sam::UserAccount;
pub use sink::{Collected, Sink};
pub use taskcache::CachedTask;
pub use timezone::TimeZoneInformation;
pub use userassist::UserAssistEntry;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
