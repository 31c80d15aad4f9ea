//! Pin/unpin hot-path benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::tempdir;
use walpool::{BufferPool, Disposition, FileId, PageId, PinMode, PoolOptions, RecoveryMode};

fn bench_pin_hit(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let pool = BufferPool::open(
        dir.path(),
        PoolOptions {
            frames: 64,
            recovery_mode: RecoveryMode::Format,
            ..Default::default()
        },
    )
    .unwrap();

    let id = PageId::new(FileId(1), 0);
    let mut page = pool.pin(id, PinMode::Create).unwrap();
    page.with_data_mut(|d| d.fill(0xAA)).unwrap();
    page.unpin(Disposition::Dirty).unwrap();
    pool.flush_page(id).unwrap();

    c.bench_function("pin_read_hit", |b| {
        b.iter(|| {
            let page = pool.pin(id, PinMode::Read).unwrap();
            let first = page.with_data(|d| d[0]);
            page.unpin(Disposition::Clean).unwrap();
            first
        })
    });
}

fn bench_pin_miss_cycle(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let pool = BufferPool::open(
        dir.path(),
        PoolOptions {
            frames: 2,
            recovery_mode: RecoveryMode::Format,
            ..Default::default()
        },
    )
    .unwrap();

    // Materialize more pages than frames so every round robs a frame.
    for i in 0..8u32 {
        let mut page = pool.pin(PageId::new(FileId(1), i), PinMode::Create).unwrap();
        page.with_data_mut(|d| d.fill(i as u8)).unwrap();
        page.unpin(Disposition::Dirty).unwrap();
    }
    pool.force_flush_all().unwrap();

    let mut next = 0u32;
    c.bench_function("pin_read_evicting", |b| {
        b.iter(|| {
            let id = PageId::new(FileId(1), next % 8);
            next = next.wrapping_add(1);
            let page = pool.pin(id, PinMode::Read).unwrap();
            let first = page.with_data(|d| d[0]);
            page.unpin(Disposition::Clean).unwrap();
            first
        })
    });
}

criterion_group!(benches, bench_pin_hit, bench_pin_miss_cycle);
criterion_main!(benches);
