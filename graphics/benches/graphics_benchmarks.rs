use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cinder_graphics::backend::{TextureHandle, TextureViewHandle};
use cinder_graphics::{
    BarrierQueue, BindlessConfig, BindlessKind, DummyBackend, MacroSet, ResourceHandleTable,
    ResourceState,
};

// ---------------------------------------------------------------------------
// Bindless table
// ---------------------------------------------------------------------------

fn bench_table_register_1024(c: &mut Criterion) {
    c.bench_function("bindless_register_1024", |b| {
        b.iter(|| {
            let mut table = ResourceHandleTable::new(BindlessConfig::default(), 4096);
            for raw in 1..=1024 {
                black_box(
                    table
                        .register(TextureViewHandle::from_raw(raw), BindlessKind::Texture, true)
                        .unwrap(),
                );
            }
        });
    });
}

fn bench_table_churn(c: &mut Criterion) {
    let mut backend = DummyBackend::new();
    let log = backend.command_log();

    c.bench_function("bindless_churn_256_per_frame", |b| {
        let mut table = ResourceHandleTable::new(BindlessConfig::default(), 4096);
        let mut next = 1u64;
        b.iter(|| {
            let views: Vec<_> = (0..256)
                .map(|_| {
                    next += 1;
                    TextureViewHandle::from_raw(next)
                })
                .collect();
            for &view in &views {
                table.register(view, BindlessKind::Texture, true).unwrap();
            }
            for &view in &views {
                table.unregister(view);
            }
            table.update(&mut backend).unwrap();
            log.clear();
        });
    });
}

// ---------------------------------------------------------------------------
// Barrier queue
// ---------------------------------------------------------------------------

fn bench_barrier_flush(c: &mut Criterion) {
    let mut backend = DummyBackend::new();
    let log = backend.command_log();

    c.bench_function("barrier_flush_512", |b| {
        let mut queue = BarrierQueue::new();
        b.iter(|| {
            for raw in 1..=512 {
                queue.enqueue(
                    TextureHandle::from_raw(raw),
                    ResourceState::CopyDest,
                    ResourceState::ShaderResource,
                );
            }
            black_box(queue.flush(&mut backend));
            log.clear();
        });
    });
}

fn bench_barrier_collapse(c: &mut Criterion) {
    let mut backend = DummyBackend::new();
    let log = backend.command_log();

    c.bench_function("barrier_collapse_64x8", |b| {
        let mut queue = BarrierQueue::new();
        b.iter(|| {
            for _ in 0..8 {
                for raw in 1..=64 {
                    queue.enqueue(
                        TextureHandle::from_raw(raw),
                        ResourceState::Undefined,
                        ResourceState::RenderTarget,
                    );
                }
            }
            black_box(queue.flush(&mut backend));
            log.clear();
        });
    });
}

// ---------------------------------------------------------------------------
// Shader cache keys
// ---------------------------------------------------------------------------

fn bench_macro_hash(c: &mut Criterion) {
    let macros = (0..16).fold(MacroSet::new(), |set, i| set.with(format!("FEATURE_{i}"), true));

    c.bench_function("macro_set_hash_16", |b| {
        b.iter(|| black_box(macros.hash_key()));
    });
}

criterion_group!(
    benches,
    bench_table_register_1024,
    bench_table_churn,
    bench_barrier_flush,
    bench_barrier_collapse,
    bench_macro_hash,
);
criterion_main!(benches);
