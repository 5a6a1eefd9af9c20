//! Collector tests over in-memory registries.

mod common;

use common::*;
use reg_artifacts::collector::{Collector, CollectorOptions};
use reg_artifacts::mounted_devices::DeviceDescriptor;
use reg_artifacts::registry::{MemoryKey, MemoryRegistry, MemoryValue};
use reg_artifacts::sink::FnSink;
use reg_artifacts::{
    AppCompatCacheEntry, CachedTask, Collected, MountedDevice, MruEntry, ProgramsCache,
    SharedSignatureLayout, TimeZoneInformation, UserAccount, UserAssistEntry,
};

const TASK_GUID: &str = "{ABCD0000-1111-2222-3333-444455556666}";

fn system_hive() -> MemoryKey {
    let mut system = MemoryKey::new("SYSTEM");
    system
        .create_key("Select")
        .add_value(MemoryValue::dword("Current", 1));

    // Current control set: Windows 10 layout
    system
        .create_key("ControlSet001\\Control\\Session Manager\\AppCompatCache")
        .add_value(MemoryValue::binary(
            "AppCompatCache",
            win10_blob(&["C:\\Windows\\explorer.exe", "C:\\Tools\\procmon.exe"]),
        ));
    system
        .create_key("ControlSet001\\Control\\TimeZoneInformation")
        .add_value(MemoryValue::dword("Bias", 0))
        .add_value(MemoryValue::string("TimeZoneKeyName", "UTC"));

    // Last known good: XP path variant holding an older value
    system
        .create_key("ControlSet002\\Control\\Session Manager\\AppCompatibility")
        .add_value(MemoryValue::binary("AppCompatCache", xp_blob(&["C:\\old.exe"])));

    let mut mbr = 0xDEADu32.to_le_bytes().to_vec();
    mbr.extend_from_slice(&0x100000u64.to_le_bytes());
    system
        .create_key("MountedDevices")
        .add_value(MemoryValue::binary("\\DosDevices\\C:", mbr));
    system
}

fn software_hive() -> MemoryKey {
    let mut dynamic_info = vec![0u8; 28];
    dynamic_info[4..12].copy_from_slice(&FILETIME.to_le_bytes());
    dynamic_info[12..20].copy_from_slice(&(FILETIME + 10_000_000).to_le_bytes());

    let mut software = MemoryKey::new("SOFTWARE");
    let cache = software.create_key("Microsoft\\Windows NT\\CurrentVersion\\Schedule\\TaskCache");
    cache
        .create_key("Tree\\MyTask")
        .add_value(MemoryValue::string("Id", TASK_GUID));
    cache
        .create_key(&format!("Tasks\\{}", TASK_GUID))
        .add_value(MemoryValue::binary("DynamicInfo", dynamic_info));
    software
}

fn sam_hive() -> MemoryKey {
    let mut f = vec![0u8; 0x50];
    f[0x30..0x34].copy_from_slice(&500u32.to_le_bytes());
    f[0x38..0x3C].copy_from_slice(&0x211u32.to_le_bytes());

    let name = utf16("Administrator");
    let mut v = vec![0u8; 0xCC];
    v[12..16].copy_from_slice(&0u32.to_le_bytes());
    v[16..20].copy_from_slice(&(name.len() as u32).to_le_bytes());
    v.extend_from_slice(&name);

    let mut sam = MemoryKey::new("SAM");
    let users = sam.create_key("SAM\\Domains\\Account\\Users");
    users.create_key("Names\\Administrator");
    users
        .create_key("000001F4")
        .add_value(MemoryValue::binary("F", f))
        .add_value(MemoryValue::binary("V", v));
    sam
}

fn ntuser_hive() -> MemoryKey {
    let mut ntuser = MemoryKey::new("NTUSER");
    let explorer = ntuser.create_key("Software\\Microsoft\\Windows\\CurrentVersion\\Explorer");

    let mut count = vec![0u8; 72];
    count[4..8].copy_from_slice(&3u32.to_le_bytes());
    let category = explorer.create_key("UserAssist\\{CEBFF5CD-ACE2-4F4F-9178-9926F41749EA}");
    category.add_value(MemoryValue::dword("Version", 5));
    category
        .create_key("Count")
        .add_value(MemoryValue::binary("P:\\Jvaqbjf\\pzq.rkr", count));

    let mut list_ex = 0u32.to_le_bytes().to_vec();
    list_ex.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    let mut doc = utf16("notes.txt");
    doc.extend_from_slice(&[0, 0]);
    let recent = explorer.create_key("RecentDocs");
    recent.add_value(MemoryValue::binary("MRUListEx", list_ex.clone()));
    recent.add_value(MemoryValue::binary("0", doc.clone()));
    let txt = recent.create_key(".txt");
    txt.add_value(MemoryValue::binary("MRUListEx", list_ex));
    txt.add_value(MemoryValue::binary("0", doc));

    explorer
        .create_key("RunMRU")
        .add_value(MemoryValue::string("MRUList", "a"))
        .add_value(MemoryValue::string("a", "cmd\\1"));

    let mut programs = 0x13u32.to_le_bytes().to_vec();
    programs.extend_from_slice(&[0x22; 16]);
    programs.push(0x00);
    programs.extend_from_slice(&3u32.to_le_bytes());
    programs.extend_from_slice(b"lnk");
    programs.push(0x02);
    explorer
        .create_key("StartPage2")
        .add_value(MemoryValue::binary("ProgramsCache", programs));
    ntuser
}

fn registry() -> MemoryRegistry {
    let mut registry = MemoryRegistry::new();
    registry
        .mount("HKLM\\System", system_hive())
        .mount("HKLM\\Software", software_hive())
        .mount("HKLM\\SAM", sam_hive())
        .mount("HKCU", ntuser_hive());
    registry
}

#[test]
fn test_app_compat_cache_all_control_sets() {
    let registry = registry();
    let collector = Collector::new(&registry, CollectorOptions::default());

    let mut entries: Vec<Collected<AppCompatCacheEntry>> = Vec::new();
    assert!(collector.collect_app_compat_cache(&mut entries));
    assert_eq!(entries.len(), 3);

    assert_eq!(
        entries[0].key_path,
        "HKEY_LOCAL_MACHINE\\System\\ControlSet001\\Control\\Session Manager\\AppCompatCache"
    );
    assert_eq!(entries[0].item.path, "C:\\Windows\\explorer.exe");
    assert_eq!(
        entries[2].key_path,
        "HKEY_LOCAL_MACHINE\\System\\ControlSet002\\Control\\Session Manager\\AppCompatibility"
    );
    assert_eq!(entries[2].item.path, "C:\\old.exe");
}

#[test]
fn test_app_compat_cache_current_control_set_only() {
    let registry = registry();
    let options = CollectorOptions {
        all_control_sets: false,
        shared_signature_layout: SharedSignatureLayout::Win2003,
    };
    let collector = Collector::new(&registry, options);

    let mut paths = Vec::new();
    let mut sink = FnSink(|record: Collected<AppCompatCacheEntry>| paths.push(record.item.path));
    assert!(collector.collect_app_compat_cache(&mut sink));
    drop(sink);
    assert_eq!(paths, vec!["C:\\Windows\\explorer.exe", "C:\\Tools\\procmon.exe"]);
}

#[test]
fn test_unknown_signature_is_not_found() {
    let mut system = MemoryKey::new("SYSTEM");
    system
        .create_key("ControlSet001\\Control\\Session Manager\\AppCompatCache")
        .add_value(MemoryValue::binary(
            "AppCompatCache",
            0x1234_5678u32.to_le_bytes().to_vec(),
        ));
    let mut registry = MemoryRegistry::new();
    registry.mount("HKLM\\System", system);

    let collector = Collector::new(&registry, CollectorOptions::default());
    let mut entries: Vec<Collected<AppCompatCacheEntry>> = Vec::new();
    assert!(!collector.collect_app_compat_cache(&mut entries));
    assert!(entries.is_empty());
}

#[test]
fn test_malformed_entry_keeps_partial_results() {
    let mut blob = win10_blob(&["C:\\a.exe", "C:\\b.exe"]);
    blob.truncate(blob.len() - 1);
    let mut system = MemoryKey::new("SYSTEM");
    system
        .create_key("ControlSet001\\Control\\Session Manager\\AppCompatCache")
        .add_value(MemoryValue::binary("AppCompatCache", blob));
    let mut registry = MemoryRegistry::new();
    registry.mount("HKLM\\System", system);

    let collector = Collector::new(&registry, CollectorOptions::default());
    let mut entries: Vec<Collected<AppCompatCacheEntry>> = Vec::new();
    assert!(collector.collect_app_compat_cache(&mut entries));
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_task_cache() {
    let registry = registry();
    let collector = Collector::new(&registry, CollectorOptions::default());

    let mut tasks: Vec<Collected<CachedTask>> = Vec::new();
    assert!(collector.collect_task_cache(&mut tasks));
    assert_eq!(tasks.len(), 1);

    let task = &tasks[0].item;
    assert_eq!(task.identifier, TASK_GUID);
    assert_eq!(task.name, "MyTask");
    assert_eq!(
        task.last_registered().to_string(),
        "2021-05-18T07:41:53.000000Z"
    );
    assert_eq!(task.launched().to_string(), "2021-05-18T07:41:54.000000Z");
    assert!(tasks[0].key_path.ends_with(&format!("TaskCache\\Tasks\\{}", TASK_GUID)));
}

#[test]
fn test_task_cache_without_tree_is_not_found() {
    let mut software = MemoryKey::new("SOFTWARE");
    software
        .create_key(&format!(
            "Microsoft\\Windows NT\\CurrentVersion\\Schedule\\TaskCache\\Tasks\\{}",
            TASK_GUID
        ))
        .add_value(MemoryValue::binary("DynamicInfo", vec![0u8; 28]));
    let mut registry = MemoryRegistry::new();
    registry.mount("HKLM\\Software", software);

    let collector = Collector::new(&registry, CollectorOptions::default());
    let mut tasks: Vec<Collected<CachedTask>> = Vec::new();
    assert!(!collector.collect_task_cache(&mut tasks));
    assert!(tasks.is_empty());
}

#[test]
fn test_user_accounts() {
    let registry = registry();
    let collector = Collector::new(&registry, CollectorOptions::default());

    let mut accounts: Vec<Collected<UserAccount>> = Vec::new();
    assert!(collector.collect_user_accounts(&mut accounts));
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].item.rid(), 500);
    assert_eq!(accounts[0].item.username.as_deref(), Some("Administrator"));
    assert_eq!(accounts[0].item.account_flags().len(), 3);
}

#[test]
fn test_mounted_devices_and_time_zone() {
    let registry = registry();
    let collector = Collector::new(&registry, CollectorOptions::default());

    let mut devices: Vec<Collected<MountedDevice>> = Vec::new();
    assert!(collector.collect_mounted_devices(&mut devices));
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].item.drive_letter(), Some('C'));
    assert!(matches!(
        devices[0].item.descriptor,
        DeviceDescriptor::Mbr { disk_signature: 0xDEAD, .. }
    ));

    let mut zones: Vec<Collected<TimeZoneInformation>> = Vec::new();
    assert!(collector.collect_time_zone(&mut zones));
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].item.time_zone_key_name.as_deref(), Some("UTC"));
    assert_eq!(zones[0].item.active_utc_offset().as_deref(), Some("UTC+00:00"));
}

#[test]
fn test_user_hive_artifacts() {
    let registry = registry();
    let collector = Collector::new(&registry, CollectorOptions::default());

    let mut user_assist: Vec<Collected<UserAssistEntry>> = Vec::new();
    assert!(collector.collect_user_assist(&mut user_assist));
    assert_eq!(user_assist.len(), 1);
    assert_eq!(user_assist[0].item.name, "C:\\Windows\\cmd.exe");
    assert_eq!(user_assist[0].item.run_count, 3);
    assert!(user_assist[0].key_path.ends_with("\\Count"));

    let mut mru: Vec<Collected<MruEntry>> = Vec::new();
    assert!(collector.collect_mru(&mut mru));
    let texts: Vec<&str> = mru.iter().map(|r| r.item.text.as_str()).collect();
    assert_eq!(texts, vec!["notes.txt", "notes.txt", "cmd\\1"]);
    assert!(mru[1].key_path.ends_with("RecentDocs\\.txt"));

    let mut programs: Vec<Collected<ProgramsCache>> = Vec::new();
    assert!(collector.collect_programs_cache(&mut programs));
    assert_eq!(programs.len(), 1);
    assert_eq!(programs[0].item.entries[0].data, b"lnk");
}

#[test]
fn test_empty_registry_reports_not_found() {
    let registry = MemoryRegistry::new();
    let collector = Collector::new(&registry, CollectorOptions::default());

    assert!(!collector.collect_mounted_devices(&mut Vec::<Collected<MountedDevice>>::new()));
    assert!(!collector.collect_user_assist(&mut Vec::<Collected<UserAssistEntry>>::new()));
    assert!(!collector.collect_mru(&mut Vec::<Collected<MruEntry>>::new()));
    assert!(!collector.collect_programs_cache(&mut Vec::<Collected<ProgramsCache>>::new()));
}
