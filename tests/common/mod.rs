//! Hand-assembled AppCompatCache values shared by the integration tests.

#![allow(dead_code)]

/// A FILETIME for 2021-05-18T07:41:53Z.
pub const FILETIME: u64 = 132_657_973_130_000_000;

pub fn utf16(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// Windows XP value: 400-byte header, 552-byte entries with inline paths.
pub fn xp_blob(paths: &[&str]) -> Vec<u8> {
    let mut blob = vec![0u8; 400];
    blob[0..4].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
    blob[4..8].copy_from_slice(&(paths.len() as u32).to_le_bytes());
    blob[8..12].copy_from_slice(&(paths.len() as u32).to_le_bytes());
    for (slot, _) in paths.iter().enumerate() {
        let at = 0x10 + slot * 4;
        blob[at..at + 4].copy_from_slice(&(slot as u32).to_le_bytes());
    }

    for (i, path) in paths.iter().enumerate() {
        let mut entry = vec![0u8; 552];
        let encoded = utf16(path);
        entry[..encoded.len()].copy_from_slice(&encoded);
        entry[528..536].copy_from_slice(&FILETIME.to_le_bytes());
        entry[536..544].copy_from_slice(&(1024 * (i as u64 + 1)).to_le_bytes());
        entry[544..552].copy_from_slice(&(FILETIME + 1).to_le_bytes());
        blob.extend_from_slice(&entry);
    }
    blob
}

/// Header-only 2003/Vista value.
pub fn vista_empty_blob() -> Vec<u8> {
    let mut blob = 0xbadc0ffeu32.to_le_bytes().to_vec();
    blob.extend_from_slice(&0u32.to_le_bytes());
    blob
}

/// Windows 7 32-bit value. Paths are stored after the entry table.
pub fn win7_blob(paths: &[&str], insertion_flags: u32) -> Vec<u8> {
    let header_size = 128;
    let entry_size = 32;
    let mut blob = vec![0u8; header_size];
    blob[0..4].copy_from_slice(&0xbadc0feeu32.to_le_bytes());
    blob[4..8].copy_from_slice(&(paths.len() as u32).to_le_bytes());

    let mut path_offset = header_size + entry_size * paths.len();
    let mut strings = Vec::new();
    for path in paths {
        let encoded = utf16(path);
        let mut entry = vec![0u8; entry_size];
        entry[0..2].copy_from_slice(&(encoded.len() as u16).to_le_bytes());
        entry[2..4].copy_from_slice(&(encoded.len() as u16 + 2).to_le_bytes());
        entry[4..8].copy_from_slice(&(path_offset as u32).to_le_bytes());
        entry[8..16].copy_from_slice(&FILETIME.to_le_bytes());
        entry[16..20].copy_from_slice(&insertion_flags.to_le_bytes());
        blob.extend_from_slice(&entry);

        path_offset += encoded.len() + 2;
        strings.extend_from_slice(&encoded);
        strings.extend_from_slice(&[0, 0]);
    }
    blob.extend_from_slice(&strings);
    blob
}

/// Windows 7 64-bit value. Each entry's data blob follows its path.
pub fn win7_64bit_blob(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let header_size = 128;
    let entry_size = 48;
    let mut blob = vec![0u8; header_size];
    blob[0..4].copy_from_slice(&0xbadc0feeu32.to_le_bytes());
    blob[4..8].copy_from_slice(&(entries.len() as u32).to_le_bytes());

    let mut offset = header_size + entry_size * entries.len();
    let mut trailer = Vec::new();
    for (path, data) in entries {
        let encoded = utf16(path);
        let data_offset = offset + encoded.len() + 2;
        let mut entry = vec![0u8; entry_size];
        entry[0..2].copy_from_slice(&(encoded.len() as u16).to_le_bytes());
        entry[2..4].copy_from_slice(&(encoded.len() as u16 + 2).to_le_bytes());
        entry[8..16].copy_from_slice(&(offset as u64).to_le_bytes());
        entry[16..24].copy_from_slice(&FILETIME.to_le_bytes());
        entry[24..28].copy_from_slice(&2u32.to_le_bytes());
        entry[32..40].copy_from_slice(&(data.len() as u64).to_le_bytes());
        entry[40..48].copy_from_slice(&(data_offset as u64).to_le_bytes());
        blob.extend_from_slice(&entry);

        trailer.extend_from_slice(&encoded);
        trailer.extend_from_slice(&[0, 0]);
        trailer.extend_from_slice(data);
        offset = data_offset + data.len();
    }
    blob.extend_from_slice(&trailer);
    blob
}

/// Windows 10 entry: marker, unknown, size, then path, time and data.
pub fn win10_entry(path: &str, data: &[u8]) -> Vec<u8> {
    let encoded = utf16(path);
    let mut body = Vec::new();
    body.extend_from_slice(&(encoded.len() as u16).to_le_bytes());
    body.extend_from_slice(&encoded);
    body.extend_from_slice(&FILETIME.to_le_bytes());
    body.extend_from_slice(&(data.len() as u32).to_le_bytes());
    body.extend_from_slice(data);

    let mut entry = b"10ts".to_vec();
    entry.extend_from_slice(&0u32.to_le_bytes());
    entry.extend_from_slice(&(body.len() as u32).to_le_bytes());
    entry.extend_from_slice(&body);
    entry
}

/// Windows 10 value with a 0x34-byte header.
pub fn win10_blob(paths: &[&str]) -> Vec<u8> {
    let mut blob = vec![0u8; 0x34];
    blob[0..4].copy_from_slice(&0x34u32.to_le_bytes());
    blob[0x24..0x28].copy_from_slice(&(paths.len() as u32).to_le_bytes());
    for path in paths {
        blob.extend_from_slice(&win10_entry(path, &[0xAB; 8]));
    }
    blob
}
