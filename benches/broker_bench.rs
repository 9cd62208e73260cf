//! Benchmarks for the brokerage layer.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vram_broker::{
    AllocDescriptor, AllocKind, AllocRequest, MemorySpace, ResourceProvider, StreamId,
    StubProvider,
};

fn bench_request_rendering(c: &mut Criterion) {
    let req = AllocRequest::new(
        AllocDescriptor::new(
            AllocKind::TemporaryBuffer,
            0,
            MemorySpace::Temporary,
            StreamId::new(0x2a),
        ),
        4096,
    );

    c.bench_function("render_alloc_request", |b| {
        b.iter(|| black_box(&req).to_string())
    });
}

fn bench_handle_churn(c: &mut Criterion) {
    let provider = StubProvider::default();
    let req = AllocRequest::new(
        AllocDescriptor::new(
            AllocKind::TemporaryBuffer,
            0,
            MemorySpace::Temporary,
            StreamId::DEFAULT,
        ),
        4096,
    );

    c.bench_function("alloc_release_4kb_handle", |b| {
        b.iter(|| {
            let handle = provider.alloc_memory_handle(black_box(&req)).unwrap();
            black_box(handle.data());
        })
    });
}

fn bench_descriptor_helpers(c: &mut Criterion) {
    c.bench_function("build_temporary_descriptor", |b| {
        b.iter(|| {
            AllocDescriptor::temporary(
                black_box(AllocKind::TemporaryBuffer),
                black_box(StreamId::DEFAULT),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_request_rendering,
    bench_handle_churn,
    bench_descriptor_helpers
);
criterion_main!(benches);
