use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use hft_core::ids::SlotIdPool;
use std::thread;

fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot id pool");
    group.throughput(Throughput::Elements(1));
    group.bench_function("acquire + release", |b| {
        let pool: SlotIdPool<24> = SlotIdPool::new();
        b.iter(|| {
            let id = pool.acquire().unwrap();
            black_box(id);
            pool.release(id);
        });
    });
    group.finish();
}

fn bench_frontier_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot id pool frontier growth");
    group.throughput(Throughput::Elements(100_000));
    group.bench_function("100k fresh acquires, no reuse", |b| {
        b.iter(|| {
            let pool: SlotIdPool<24> = SlotIdPool::new();
            let mut ids = Vec::with_capacity(100_000);
            for _ in 0..100_000 {
                ids.push(black_box(pool.acquire().unwrap()));
            }
        });
    });
    group.finish();
}

fn bench_cross_thread_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot id pool cross-thread");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("acquirer thread + releaser thread", |b| {
        b.iter(|| {
            let pool: SlotIdPool<24> = SlotIdPool::new();
            let ids: Vec<_> = (0..1000).map(|_| pool.acquire().unwrap()).collect();
            thread::scope(|scope| {
                scope.spawn(|| {
                    for id in ids {
                        pool.release(id);
                    }
                });
            });
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_acquire_release,
    bench_frontier_growth,
    bench_cross_thread_release
);
criterion_main!(benches);
