//! Windows timestamp decoding.
//!
//! FILETIME is a 64-bit count of 100-nanosecond intervals since
//! 1601-01-01 00:00:00 UTC. Two values are reserved: `0` means the
//! timestamp was never set and `0x7FFFFFFFFFFFFFFF` means "never" (for
//! example an account that never expires).

use crate::error::Result;
use crate::utils::read_u16_le;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

/// FILETIME value meaning "not set".
pub const FILETIME_NOT_SET: u64 = 0;

/// FILETIME value meaning "never".
pub const FILETIME_NEVER: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

/// Size of a SYSTEMTIME structure in bytes.
pub const SYSTEMTIME_SIZE: usize = 16;

/// A decoded FILETIME.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Timestamp {
    /// The raw value was zero.
    NotSet,
    /// The raw value was `0x7FFFFFFFFFFFFFFF`.
    Never,
    /// A concrete point in time.
    Date(DateTime<Utc>),
}

impl Timestamp {
    /// Decodes a raw FILETIME value.
    pub fn from_filetime(filetime: u64) -> Self {
        match filetime {
            FILETIME_NOT_SET => Timestamp::NotSet,
            FILETIME_NEVER => Timestamp::Never,
            _ => {
                // u64::MAX / 10^7 fits comfortably in an i64
                let seconds = (filetime / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
                let nanos = ((filetime % 10_000_000) * 100) as u32;
                // Every u64 FILETIME lies within chrono's supported range
                DateTime::from_timestamp(seconds, nanos)
                    .map_or(Timestamp::Never, Timestamp::Date)
            }
        }
    }

    /// Returns the concrete date, if any.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Returns true if the timestamp carries a concrete date.
    pub fn is_set(&self) -> bool {
        matches!(self, Timestamp::Date(_))
    }
}

impl From<u64> for Timestamp {
    fn from(filetime: u64) -> Self {
        Timestamp::from_filetime(filetime)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::NotSet => write!(f, "Not set"),
            Timestamp::Never => write!(f, "Never"),
            Timestamp::Date(date) => write!(f, "{}", date.format("%Y-%m-%dT%H:%M:%S%.6fZ")),
        }
    }
}

/// Windows SYSTEMTIME structure.
///
/// Format:
/// ```text
/// Offset  Size  Description
/// 0x00    2     Year
/// 0x02    2     Month
/// 0x04    2     Day of week (0 = Sunday)
/// 0x06    2     Day
/// 0x08    2     Hour
/// 0x0A    2     Minute
/// 0x0C    2     Second
/// 0x0E    2     Milliseconds
/// ```
///
/// In time zone transition rules the year is usually 0 and `day` is the
/// occurrence of `day_of_week` within the month (5 = last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SystemTime {
    /// Year, 0 in transition rules.
    pub year: u16,
    /// Month, 1 to 12.
    pub month: u16,
    /// Day of week, 0 is Sunday.
    pub day_of_week: u16,
    /// Day of month, or week occurrence in transition rules.
    pub day: u16,
    /// Hour.
    pub hour: u16,
    /// Minute.
    pub minute: u16,
    /// Second.
    pub second: u16,
    /// Milliseconds.
    pub milliseconds: u16,
}

impl SystemTime {
    /// Parses a SYSTEMTIME at `offset`.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        Ok(SystemTime {
            year: read_u16_le(data, offset)?,
            month: read_u16_le(data, offset + 0x02)?,
            day_of_week: read_u16_le(data, offset + 0x04)?,
            day: read_u16_le(data, offset + 0x06)?,
            hour: read_u16_le(data, offset + 0x08)?,
            minute: read_u16_le(data, offset + 0x0A)?,
            second: read_u16_le(data, offset + 0x0C)?,
            milliseconds: read_u16_le(data, offset + 0x0E)?,
        })
    }

    /// Returns true if every field is zero (no transition rule).
    pub fn is_empty(&self) -> bool {
        *self == SystemTime::default()
    }

    /// Converts an absolute SYSTEMTIME into a UTC date time.
    ///
    /// Returns `None` for relative transition rules (year 0) and for
    /// out-of-range fields.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.year == 0 {
            return None;
        }
        NaiveDate::from_ymd_opt(self.year.into(), self.month.into(), self.day.into())?
            .and_hms_milli_opt(
                self.hour.into(),
                self.minute.into(),
                self.second.into(),
                self.milliseconds.into(),
            )
            .map(|naive| naive.and_utc())
    }
}
