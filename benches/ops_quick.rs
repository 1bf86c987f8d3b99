// Quick engine timing - prints per-operation cost without criterion's warmup

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use treeducer::{Bounds, FnConfig, MutableTree, PersistentTree};

fn main() {
    let count = 100_000usize;
    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<u64> = (0..count).map(|_| rng.gen_range(0..1_000_000)).collect();
    let config = || FnConfig::ordered(|v: &u64| *v, |a: &u64, b: &u64| a.wrapping_add(*b));

    println!("=== {} random values ===", count);

    let start = Instant::now();
    let mut mutable = MutableTree::new(config());
    let handles: Vec<_> = values.iter().map(|value| mutable.insert(*value)).collect();
    let elapsed = start.elapsed();
    println!("  mutable insert:    {:?} ({:?}/op)", elapsed, elapsed / count as u32);

    let start = Instant::now();
    let mut persistent = PersistentTree::new(config());
    for value in &values {
        persistent = persistent.insert(*value);
    }
    let elapsed = start.elapsed();
    println!("  persistent insert: {:?} ({:?}/op)", elapsed, elapsed / count as u32);

    let start = Instant::now();
    let batched = PersistentTree::new(config()).with_batch(|batch| {
        for value in &values {
            batch.insert(*value);
        }
    });
    let elapsed = start.elapsed();
    println!("  batched insert:    {:?} ({:?}/op)", elapsed, elapsed / count as u32);
    assert_eq!(batched.reduce(), persistent.reduce());

    let queries = 10_000u32;
    let start = Instant::now();
    let mut total = 0u64;
    for _ in 0..queries {
        let low = rng.gen_range(0..900_000u64);
        if let Some(sum) = persistent.select(Bounds(low..low + 100_000)).reduce() {
            total = total.wrapping_add(sum);
        }
    }
    let elapsed = start.elapsed();
    println!("  range reduce:      {:?} ({:?}/op, checksum {})", elapsed, elapsed / queries, total);

    let start = Instant::now();
    for handle in handles {
        mutable.delete(handle);
    }
    let elapsed = start.elapsed();
    println!("  mutable delete:    {:?} ({:?}/op)", elapsed, elapsed / count as u32);
    assert!(mutable.is_empty());
}
