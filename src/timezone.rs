//! Time zone information.
//!
//! `ControlSetXXX\Control\TimeZoneInformation` holds the system time zone
//! as separate values. Biases are minutes west of UTC stored as REG_DWORD
//! (two's complement). `StandardStart` and `DaylightStart` are 16-byte
//! SYSTEMTIME transition rules.
//!
//! The same rule set appears as a single 44-byte `TZI` value below
//! `HKLM\Software\Microsoft\Windows NT\CurrentVersion\Time Zones\<name>`:
//!
//! ```text
//! Offset  Size  Description
//! 0x00    4     Bias
//! 0x04    4     Standard bias
//! 0x08    4     Daylight bias
//! 0x0C    16    Standard start (SYSTEMTIME)
//! 0x1C    16    Daylight start (SYSTEMTIME)
//! ```

use crate::error::{ArtifactError, Result};
use crate::filetime::SystemTime;
use crate::registry::{RegistryKey, RegistryValue};
use crate::utils::read_i32_le;

/// Key path of the time zone information, relative to a control set.
pub const KEY_PATH: &str = "Control\\TimeZoneInformation";

/// Size of a binary `TZI` record.
pub const TZI_RECORD_SIZE: usize = 44;

/// Binary `TZI` time zone record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TziRecord {
    /// Bias in minutes.
    pub bias: i32,
    /// Standard time bias in minutes.
    pub standard_bias: i32,
    /// Daylight saving time bias in minutes.
    pub daylight_bias: i32,
    /// Transition to standard time.
    pub standard_start: SystemTime,
    /// Transition to daylight saving time.
    pub daylight_start: SystemTime,
}

impl TziRecord {
    /// Parses a 44-byte `TZI` record.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < TZI_RECORD_SIZE {
            return Err(ArtifactError::truncated(0, TZI_RECORD_SIZE, data.len()));
        }
        Ok(TziRecord {
            bias: read_i32_le(data, 0x00)?,
            standard_bias: read_i32_le(data, 0x04)?,
            daylight_bias: read_i32_le(data, 0x08)?,
            standard_start: SystemTime::parse(data, 0x0C)?,
            daylight_start: SystemTime::parse(data, 0x1C)?,
        })
    }
}

/// Decoded `TimeZoneInformation` key.
///
/// Every field is optional; absent or malformed values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimeZoneInformation {
    /// Bias in minutes.
    pub bias: Option<i32>,
    /// Standard time name (often an indirect `@tzres.dll,-NNN` string).
    pub standard_name: Option<String>,
    /// Standard time bias in minutes.
    pub standard_bias: Option<i32>,
    /// Transition to standard time.
    pub standard_start: Option<SystemTime>,
    /// Daylight saving time name.
    pub daylight_name: Option<String>,
    /// Daylight saving time bias in minutes.
    pub daylight_bias: Option<i32>,
    /// Transition to daylight saving time.
    pub daylight_start: Option<SystemTime>,
    /// Bias in effect when the key was last written.
    pub active_time_bias: Option<i32>,
    /// Time zone key name (Vista and later).
    pub time_zone_key_name: Option<String>,
    /// Whether dynamic daylight saving time is disabled.
    pub dynamic_daylight_time_disabled: Option<bool>,
}

impl TimeZoneInformation {
    /// Decodes a `TimeZoneInformation` key.
    pub fn from_key<K: RegistryKey>(key: &K) -> Self {
        let dword = |name: &str| key.get_value_by_name(name).and_then(|v| v.data_as_u32());
        let bias = |name: &str| dword(name).map(|v| v as i32);
        let string = |name: &str| key.get_value_by_name(name).and_then(|v| v.data_as_string());
        let system_time = |name: &str| {
            key.get_value_by_name(name)
                .and_then(|v| SystemTime::parse(&v.data(), 0).ok())
        };

        TimeZoneInformation {
            bias: bias("Bias"),
            standard_name: string("StandardName"),
            standard_bias: bias("StandardBias"),
            standard_start: system_time("StandardStart"),
            daylight_name: string("DaylightName"),
            daylight_bias: bias("DaylightBias"),
            daylight_start: system_time("DaylightStart"),
            active_time_bias: bias("ActiveTimeBias"),
            time_zone_key_name: string("TimeZoneKeyName"),
            dynamic_daylight_time_disabled: dword("DynamicDaylightTimeDisabled").map(|v| v != 0),
        }
    }

    /// Returns true if no value was decoded.
    pub fn is_empty(&self) -> bool {
        *self == TimeZoneInformation::default()
    }

    /// Formats the active UTC offset as `UTC+hh:mm`.
    pub fn active_utc_offset(&self) -> Option<String> {
        let bias = self.active_time_bias.or(self.bias)?;
        // Bias is UTC minus local time
        let offset = -i64::from(bias);
        let sign = if offset < 0 { '-' } else { '+' };
        let offset = offset.abs();
        Some(format!("UTC{}{:02}:{:02}", sign, offset / 60, offset % 60))
    }
}
