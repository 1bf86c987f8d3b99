// Engine benchmark suite
//
// Compares the three engines on the same workloads:
// - MutableTree: arena, mutated in place
// - PersistentTree: path copying per operation
// - IdentityTree: persistent plus tie-break stamps
// and range reduce against a linear scan.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use treeducer::{Bounds, Config, FnConfig, IdentityTree, MutableTree, PersistentTree};

fn sum() -> impl Config<Value = u64, Mapped = u64> {
    return FnConfig::ordered(|v: &u64| *v, |a: &u64, b: &u64| a.wrapping_add(*b));
}

fn random_values(count: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    return (0..count).map(|_| rng.gen_range(0..1_000_000)).collect();
}

// =============================================================================
// Insert
// =============================================================================

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for size in [1_000usize, 10_000, 100_000] {
        let values = random_values(size, 1);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("mutable", size), &values, |b, values| {
            b.iter(|| {
                let mut tree = MutableTree::new(sum());
                for value in values {
                    tree.insert(*value);
                }
                black_box(tree.reduce().copied())
            })
        });

        group.bench_with_input(BenchmarkId::new("persistent", size), &values, |b, values| {
            b.iter(|| {
                let mut tree = PersistentTree::new(sum());
                for value in values {
                    tree = tree.insert(*value);
                }
                black_box(tree.reduce().copied())
            })
        });

        group.bench_with_input(BenchmarkId::new("identity", size), &values, |b, values| {
            b.iter(|| {
                let mut tree = IdentityTree::new(sum());
                for value in values {
                    tree.insert(*value);
                }
                black_box(tree.reduce().copied())
            })
        });
    }
    group.finish();
}

// =============================================================================
// Delete
// =============================================================================

fn bench_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete");
    for size in [1_000usize, 10_000] {
        let values = random_values(size, 2);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("mutable", size), &values, |b, values| {
            b.iter_batched(
                || {
                    let mut tree = MutableTree::new(sum());
                    let handles: Vec<_> = values.iter().map(|value| tree.insert(*value)).collect();
                    (tree, handles)
                },
                |(mut tree, handles)| {
                    for handle in handles {
                        tree.delete(handle);
                    }
                    black_box(tree.is_empty())
                },
                criterion::BatchSize::LargeInput,
            )
        });

        let full = values.iter().fold(PersistentTree::new(sum()), |tree, value| tree.insert(*value));
        group.bench_with_input(BenchmarkId::new("persistent", size), &values, |b, values| {
            b.iter(|| {
                let mut tree = full.clone();
                for value in values {
                    tree = tree.delete(value);
                }
                black_box(tree.is_empty())
            })
        });
    }
    group.finish();
}

// =============================================================================
// Range reduce
// =============================================================================

fn bench_range_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_reduce");
    for size in [1_000u64, 100_000] {
        let tree = PersistentTree::new(sum()).with_batch(|batch| {
            for value in 0..size {
                batch.insert(value);
            }
        });
        let low = size / 4;
        let high = size - size / 4;

        group.bench_function(BenchmarkId::new("select", size), |b| {
            b.iter(|| black_box(tree.select(Bounds(black_box(low)..black_box(high))).reduce()))
        });

        group.bench_function(BenchmarkId::new("scan", size), |b| {
            b.iter(|| {
                let total: u64 = tree
                    .iter()
                    .filter(|value| (low..high).contains(*value))
                    .fold(0, |acc, value| acc.wrapping_add(*value));
                black_box(total)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_delete, bench_range_reduce);
criterion_main!(benches);
