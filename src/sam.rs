//! Security Account Manager user records.
//!
//! Every local account has a key below `SAM\Domains\Account\Users` named
//! after its relative identifier in hex (e.g. `000001F4`). The key holds
//! two binary values:
//!
//! - `F`: fixed-width fields (timestamps, RID, flags, counters).
//! - `V`: a table of 17 descriptors followed by variable-length data.
//!
//! F value layout:
//!
//! ```text
//! Offset  Size  Description
//! 0x00    2     Major version
//! 0x02    2     Minor version
//! 0x08    8     Last login time (FILETIME)
//! 0x18    8     Password last set time (FILETIME)
//! 0x20    8     Account expiration time (FILETIME)
//! 0x28    8     Last password failure time (FILETIME)
//! 0x30    4     Relative identifier
//! 0x34    4     Primary group identifier
//! 0x38    4     Account control flags
//! 0x3C    2     Country code
//! 0x3E    2     Codepage
//! 0x40    2     Failed login count
//! 0x42    2     Login count
//! ```
//!
//! V value descriptors are 12 bytes each (`offset`, `size`, `unknown`);
//! descriptor data starts at [`V_DATA_BASE`] plus the offset.

use crate::error::{ArtifactError, Result};
use crate::filetime::Timestamp;
use crate::registry::{RegistryKey, RegistryValue};
use crate::utils::{read_bytes, read_u16_le, read_u32_le, read_u64_le};
use encoding_rs::UTF_16LE;
use std::fmt;
use tracing::{debug, warn};

/// Key path of the user account keys.
pub const USERS_KEY_PATH: &str = "HKEY_LOCAL_MACHINE\\SAM\\SAM\\Domains\\Account\\Users";

/// Minimum size of an F value.
pub const F_VALUE_SIZE: usize = 0x50;

/// Number of descriptors at the start of a V value.
pub const V_DESCRIPTOR_COUNT: usize = 17;

/// Size of a V value descriptor.
pub const V_DESCRIPTOR_SIZE: usize = 12;

/// Base offset of V value descriptor data.
pub const V_DATA_BASE: usize = 0xCC;

/// V value descriptor slots.
pub mod slot {
    /// Username.
    pub const USERNAME: usize = 1;
    /// Full name.
    pub const FULL_NAME: usize = 2;
    /// Comment.
    pub const COMMENT: usize = 3;
    /// User comment.
    pub const USER_COMMENT: usize = 4;
    /// Home directory.
    pub const HOME_DIRECTORY: usize = 6;
    /// Logon script path.
    pub const SCRIPT_PATH: usize = 8;
    /// Profile path.
    pub const PROFILE_PATH: usize = 9;
}

/// Account control (ACB) flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum AccountFlag {
    /// Account disabled.
    Disabled,
    /// Home directory required.
    HomeDirectoryRequired,
    /// Password not required.
    PasswordNotRequired,
    /// Temporary duplicate account.
    TemporaryDuplicateAccount,
    /// Normal user account.
    NormalAccount,
    /// MNS logon user account.
    MnsLogonAccount,
    /// Interdomain trust account.
    InterdomainTrustAccount,
    /// Workstation trust account.
    WorkstationTrustAccount,
    /// Server trust account.
    ServerTrustAccount,
    /// Password does not expire.
    PasswordDoesNotExpire,
    /// Account auto locked.
    Locked,
}

impl AccountFlag {
    const ALL: [(u32, AccountFlag); 11] = [
        (0x0001, AccountFlag::Disabled),
        (0x0002, AccountFlag::HomeDirectoryRequired),
        (0x0004, AccountFlag::PasswordNotRequired),
        (0x0008, AccountFlag::TemporaryDuplicateAccount),
        (0x0010, AccountFlag::NormalAccount),
        (0x0020, AccountFlag::MnsLogonAccount),
        (0x0040, AccountFlag::InterdomainTrustAccount),
        (0x0080, AccountFlag::WorkstationTrustAccount),
        (0x0100, AccountFlag::ServerTrustAccount),
        (0x0200, AccountFlag::PasswordDoesNotExpire),
        (0x0400, AccountFlag::Locked),
    ];

    /// Decodes every flag set in `bits`. Unknown bits are ignored.
    pub fn decode(bits: u32) -> Vec<AccountFlag> {
        Self::ALL
            .iter()
            .filter(|(mask, _)| bits & mask != 0)
            .map(|(_, flag)| *flag)
            .collect()
    }
}

impl fmt::Display for AccountFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AccountFlag::Disabled => "Account disabled",
            AccountFlag::HomeDirectoryRequired => "Home directory required",
            AccountFlag::PasswordNotRequired => "Password not required",
            AccountFlag::TemporaryDuplicateAccount => "Temporary duplicate account",
            AccountFlag::NormalAccount => "Normal user account",
            AccountFlag::MnsLogonAccount => "MNS logon user account",
            AccountFlag::InterdomainTrustAccount => "Interdomain trust account",
            AccountFlag::WorkstationTrustAccount => "Workstation trust account",
            AccountFlag::ServerTrustAccount => "Server trust account",
            AccountFlag::PasswordDoesNotExpire => "Password does not expire",
            AccountFlag::Locked => "Account auto locked",
        };
        f.write_str(text)
    }
}

/// Fixed-width fields of the F value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FValue {
    /// Last successful logon (FILETIME, 0x08).
    pub last_login_time: u64,
    /// Last password change (FILETIME, 0x18).
    pub password_set_time: u64,
    /// Account expiry (FILETIME, 0x20). "Never" when unset.
    pub account_expiration_time: u64,
    /// Last failed logon (FILETIME, 0x28).
    pub password_failure_time: u64,
    /// Relative identifier.
    pub rid: u32,
    /// Primary group RID.
    pub primary_gid: u32,
    /// ACB control flags, see [`AccountFlag`].
    pub flags: u32,
    /// Country code.
    pub country_code: u16,
    /// Code page.
    pub codepage: u16,
    /// Failed logons since the last success.
    pub failed_login_count: u16,
    /// Successful logons.
    pub login_count: u16,
}

impl FValue {
    /// Parses an F value.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::TruncatedData`] if the value is shorter
    /// than [`F_VALUE_SIZE`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < F_VALUE_SIZE {
            return Err(ArtifactError::truncated(0, F_VALUE_SIZE, data.len()));
        }
        Ok(FValue {
            last_login_time: read_u64_le(data, 0x08)?,
            password_set_time: read_u64_le(data, 0x18)?,
            account_expiration_time: read_u64_le(data, 0x20)?,
            password_failure_time: read_u64_le(data, 0x28)?,
            rid: read_u32_le(data, 0x30)?,
            primary_gid: read_u32_le(data, 0x34)?,
            flags: read_u32_le(data, 0x38)?,
            country_code: read_u16_le(data, 0x3C)?,
            codepage: read_u16_le(data, 0x3E)?,
            failed_login_count: read_u16_le(data, 0x40)?,
            login_count: read_u16_le(data, 0x42)?,
        })
    }
}

/// Reads one V value descriptor slot as a UTF-16LE string.
///
/// Returns `None` when the descriptor table is too short, the slot is
/// empty, or the descriptor points outside the value. A bad slot never
/// affects the other slots.
pub fn read_v_string(data: &[u8], slot: usize) -> Option<String> {
    if slot >= V_DESCRIPTOR_COUNT {
        return None;
    }
    let descriptor = slot * V_DESCRIPTOR_SIZE;
    let offset = read_u32_le(data, descriptor).ok()? as usize;
    let size = read_u32_le(data, descriptor + 4).ok()? as usize;
    if size == 0 {
        return None;
    }

    let start = V_DATA_BASE.checked_add(offset)?;
    let bytes = match read_bytes(data, start, size) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(slot, offset, size, error = %e, "V descriptor out of range");
            return None;
        }
    };

    let (text, _) = UTF_16LE.decode_without_bom_handling(bytes);
    Some(text.trim_end_matches('\0').to_string())
}

/// A local user account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UserAccount {
    /// Name of the account key (RID in hex).
    pub key_name: String,

    /// Fields from the F value.
    pub f: FValue,

    /// Username.
    pub username: Option<String>,
    /// Full name.
    pub full_name: Option<String>,
    /// Comment.
    pub comment: Option<String>,
    /// User comment.
    pub user_comment: Option<String>,
    /// Home directory.
    pub home_directory: Option<String>,
    /// Logon script path.
    pub script_path: Option<String>,
    /// Profile path.
    pub profile_path: Option<String>,
}

impl UserAccount {
    /// Builds an account from its F and V values.
    ///
    /// A missing V value leaves every string slot `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the F value is truncated.
    pub fn parse(key_name: &str, f_data: &[u8], v_data: Option<&[u8]>) -> Result<Self> {
        let f = FValue::parse(f_data)?;
        let v = |slot| v_data.and_then(|data| read_v_string(data, slot));

        Ok(UserAccount {
            key_name: key_name.to_string(),
            f,
            username: v(slot::USERNAME),
            full_name: v(slot::FULL_NAME),
            comment: v(slot::COMMENT),
            user_comment: v(slot::USER_COMMENT),
            home_directory: v(slot::HOME_DIRECTORY),
            script_path: v(slot::SCRIPT_PATH),
            profile_path: v(slot::PROFILE_PATH),
        })
    }

    /// Relative identifier.
    pub fn rid(&self) -> u32 {
        self.f.rid
    }

    /// Decoded account control flags.
    pub fn account_flags(&self) -> Vec<AccountFlag> {
        AccountFlag::decode(self.f.flags)
    }

    /// Last login time.
    pub fn last_login(&self) -> Timestamp {
        Timestamp::from_filetime(self.f.last_login_time)
    }

    /// Password last set time.
    pub fn password_set(&self) -> Timestamp {
        Timestamp::from_filetime(self.f.password_set_time)
    }

    /// Account expiration time.
    pub fn account_expiration(&self) -> Timestamp {
        Timestamp::from_filetime(self.f.account_expiration_time)
    }

    /// Last password failure time.
    pub fn password_failure(&self) -> Timestamp {
        Timestamp::from_filetime(self.f.password_failure_time)
    }
}

/// Decodes one account key.
///
/// Returns `Ok(None)` for keys without an F value.
pub fn decode_account<K: RegistryKey>(key: &K) -> Result<Option<UserAccount>> {
    let Some(f_value) = key.get_value_by_name("F") else {
        return Ok(None);
    };
    let f_data = f_value.data();
    let v_value = key.get_value_by_name("V");
    let v_data = v_value.as_ref().map(|v| v.data());

    UserAccount::parse(key.name(), &f_data, v_data.as_deref()).map(Some)
}

/// Decodes every account below a `Users` key, skipping `Names`.
pub fn decode_users<K: RegistryKey>(users: &K) -> Vec<UserAccount> {
    let mut accounts = Vec::new();
    for key in users.subkeys() {
        if key.name().eq_ignore_ascii_case("Names") {
            continue;
        }
        match decode_account(&key) {
            Ok(Some(account)) => accounts.push(account),
            Ok(None) => debug!(key = key.name(), "Account key has no F value"),
            Err(e) => warn!(key = key.name(), error = %e, "Skipping malformed account"),
        }
    }
    accounts
}
