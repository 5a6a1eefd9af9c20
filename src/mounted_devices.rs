//! Mounted device descriptors.
//!
//! `HKLM\System\MountedDevices` has one value per drive letter
//! (`\DosDevices\C:`) or volume GUID (`\??\Volume{...}`). The value data
//! takes one of three shapes:
//!
//! - 12 bytes: MBR disk signature (u32) and partition byte offset (u64).
//! - `DMIO:ID:` followed by a 16-byte GPT partition GUID.
//! - anything else: a UTF-16LE device path, e.g. `\??\USBSTOR#Disk&...`.

use crate::error::Result;
use crate::registry::{RegistryKey, RegistryValue};
use crate::utils::{read_guid, read_u32_le, read_u64_le};
use encoding_rs::UTF_16LE;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// Key path of the mounted devices key.
pub const MOUNTED_DEVICES_KEY_PATH: &str = "HKEY_LOCAL_MACHINE\\System\\MountedDevices";

/// Prefix of a GPT partition descriptor.
pub const GPT_PREFIX: &[u8; 8] = b"DMIO:ID:";

/// Size of an MBR partition descriptor.
pub const MBR_DESCRIPTOR_SIZE: usize = 12;

/// Decoded value data of a mounted device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DeviceDescriptor {
    /// MBR partition.
    Mbr {
        /// Disk signature.
        disk_signature: u32,
        /// Partition offset in bytes.
        partition_offset: u64,
    },
    /// GPT partition.
    Gpt {
        /// Partition GUID.
        partition_guid: Uuid,
    },
    /// Device path, typically of a removable device.
    DevicePath(String),
}

impl DeviceDescriptor {
    /// Decodes mounted device value data.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() == MBR_DESCRIPTOR_SIZE {
            return Ok(DeviceDescriptor::Mbr {
                disk_signature: read_u32_le(data, 0)?,
                partition_offset: read_u64_le(data, 4)?,
            });
        }

        if data.starts_with(GPT_PREFIX) {
            return Ok(DeviceDescriptor::Gpt {
                partition_guid: read_guid(data, GPT_PREFIX.len())?,
            });
        }

        let (path, _) = UTF_16LE.decode_without_bom_handling(data);
        Ok(DeviceDescriptor::DevicePath(
            path.trim_end_matches('\0').to_string(),
        ))
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceDescriptor::Mbr {
                disk_signature,
                partition_offset,
            } => write!(
                f,
                "MBR disk signature {:#010x}, partition offset {:#x}",
                disk_signature, partition_offset
            ),
            DeviceDescriptor::Gpt { partition_guid } => {
                write!(f, "GPT partition {{{}}}", partition_guid)
            }
            DeviceDescriptor::DevicePath(path) => f.write_str(path),
        }
    }
}

/// One mounted device value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MountedDevice {
    /// Value name, e.g. `\DosDevices\C:`.
    pub name: String,
    /// Decoded value data.
    pub descriptor: DeviceDescriptor,
}

impl MountedDevice {
    /// Returns the drive letter for `\DosDevices\X:` names.
    pub fn drive_letter(&self) -> Option<char> {
        let rest = self.name.strip_prefix("\\DosDevices\\")?;
        let mut chars = rest.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(letter), Some(':'), None) if letter.is_ascii_alphabetic() => Some(letter),
            _ => None,
        }
    }
}

/// Decodes every value of a `MountedDevices` key.
pub fn decode_mounted_devices<K: RegistryKey>(key: &K) -> Vec<MountedDevice> {
    let mut devices = Vec::new();
    for value in key.values() {
        match DeviceDescriptor::parse(&value.data()) {
            Ok(descriptor) => devices.push(MountedDevice {
                name: value.name().to_string(),
                descriptor,
            }),
            Err(e) => warn!(value = value.name(), error = %e, "Skipping malformed mounted device"),
        }
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArtifactError;
    use crate::registry::{MemoryKey, MemoryValue};

    #[test]
    fn test_mbr_descriptor() {
        let mut data = 0x1234_5678u32.to_le_bytes().to_vec();
        data.extend_from_slice(&0x10_0000u64.to_le_bytes());
        assert_eq!(
            DeviceDescriptor::parse(&data).unwrap(),
            DeviceDescriptor::Mbr {
                disk_signature: 0x1234_5678,
                partition_offset: 0x10_0000
            }
        );
    }

    #[test]
    fn test_gpt_descriptor() {
        let mut data = GPT_PREFIX.to_vec();
        data.extend_from_slice(&[
            0x33, 0x22, 0x11, 0x00, 0x55, 0x44, 0x77, 0x66, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ]);
        let descriptor = DeviceDescriptor::parse(&data).unwrap();
        assert_eq!(
            descriptor.to_string(),
            "GPT partition {00112233-4455-6677-8899-aabbccddeeff}"
        );

        // Twelve bytes are always an MBR descriptor, even with the GPT prefix
        assert!(matches!(
            DeviceDescriptor::parse(&data[..12]),
            Ok(DeviceDescriptor::Mbr { .. })
        ));
        // GPT prefix with a truncated GUID
        assert!(matches!(
            DeviceDescriptor::parse(&data[..13]),
            Err(ArtifactError::TruncatedData { .. })
        ));
        assert!(DeviceDescriptor::parse(&data[..14]).is_err());
    }

    #[test]
    fn test_device_path() {
        let path = "\\??\\USBSTOR#Disk&Ven_Kingston";
        let data: Vec<u8> = path.encode_utf16().flat_map(u16::to_le_bytes).collect();
        assert_eq!(
            DeviceDescriptor::parse(&data).unwrap(),
            DeviceDescriptor::DevicePath(path.to_string())
        );
    }

    #[test]
    fn test_decode_key() {
        let mut mbr = 0xCAFEu32.to_le_bytes().to_vec();
        mbr.extend_from_slice(&0x7E00u64.to_le_bytes());
        let key = MemoryKey::new("MountedDevices")
            .with_value(MemoryValue::binary("\\DosDevices\\C:", mbr))
            .with_value(MemoryValue::string("\\??\\Volume{1234}", "\\??\\SCSI#CdRom"));

        let devices = decode_mounted_devices(&&key);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].drive_letter(), Some('C'));
        assert_eq!(devices[1].drive_letter(), None);
        assert_eq!(
            devices[1].descriptor,
            DeviceDescriptor::DevicePath("\\??\\SCSI#CdRom".to_string())
        );
    }
}
