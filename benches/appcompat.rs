use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reg_artifacts::appcompat::{detect, iterate, parse_app_compat_cache, parse_header, SharedSignatureLayout};

/// Builds a Windows 10 value with `count` entries.
fn win10_value(count: usize) -> Vec<u8> {
    let mut blob = vec![0u8; 0x34];
    blob[0..4].copy_from_slice(&0x34u32.to_le_bytes());
    blob[0x24..0x28].copy_from_slice(&(count as u32).to_le_bytes());

    for i in 0..count {
        let path: Vec<u8> = format!("C:\\Program Files\\Vendor\\tool{}.exe", i)
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        let mut body = Vec::new();
        body.extend_from_slice(&(path.len() as u16).to_le_bytes());
        body.extend_from_slice(&path);
        body.extend_from_slice(&132_657_973_130_000_000u64.to_le_bytes());
        body.extend_from_slice(&16u32.to_le_bytes());
        body.extend_from_slice(&[0x5A; 16]);

        blob.extend_from_slice(b"10ts");
        blob.extend_from_slice(&0u32.to_le_bytes());
        blob.extend_from_slice(&(body.len() as u32).to_le_bytes());
        blob.extend_from_slice(&body);
    }
    blob
}

fn bench_win10(c: &mut Criterion) {
    let blob = win10_value(1024);

    c.bench_function("Parsing Windows 10 AppCompatCache (1024 entries)", |b| {
        b.iter(|| parse_app_compat_cache(black_box(&blob), SharedSignatureLayout::default()))
    });

    c.bench_function("Iterating Windows 10 AppCompatCache (1024 entries)", |b| {
        b.iter(|| {
            let format = detect(black_box(&blob)).unwrap();
            let header = parse_header(format, &blob).unwrap();
            iterate(&header, &blob).filter(Result::is_ok).count()
        })
    });
}

criterion_group!(benches, bench_win10);
criterion_main!(benches);
