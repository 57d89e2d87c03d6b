use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_decimal::Decimal;

use stockflow_allocation::combination::search;
use stockflow_core::{Quantity, StockAssignmentId};

/// Releasable maps shaped like a busy unit: quantities in descending order,
/// few of them summing exactly to the deficit.
fn releasable_map(len: usize) -> Vec<(StockAssignmentId, Quantity)> {
    (0..len)
        .map(|i| {
            let quantity = Decimal::from(3 + (len - i) as i64 * 7 % 23);
            (StockAssignmentId::new(i as u64 + 1), quantity)
        })
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("combination_search");

    for &len in &[4usize, 8, 12, 16] {
        let mut map = releasable_map(len);
        map.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        // Unreachable target: the whole search space is visited.
        let total: Decimal = map.iter().map(|(_, q)| *q).sum();
        let target = total + Decimal::new(5, 1);

        group.throughput(Throughput::Elements(1u64 << len));
        group.bench_with_input(BenchmarkId::new("exhaustive", len), &map, |b, map| {
            b.iter(|| search(black_box(map), black_box(target), len))
        });
    }

    let map = releasable_map(12);
    let target = map[0].1 + map[3].1;
    group.bench_function("exact_pair_12", |b| {
        b.iter(|| search(black_box(&map), black_box(target), 12))
    });

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
