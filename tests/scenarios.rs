//! Concrete scenarios and seeded random stress runs across all engines.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use treeducer::{Bounds, Config, FnConfig, IdentityTree, MutableTree, PersistentTree};

fn sum() -> impl Config<Value = i64, Mapped = i64> {
    return FnConfig::ordered(|v: &i64| *v, |a: &i64, b: &i64| a + b);
}

fn sorted(mut values: Vec<i64>) -> Vec<i64> {
    values.sort();
    return values;
}

// =============================================================================
// Concrete scenarios
// =============================================================================

#[test]
fn sum_of_three_then_delete_middle() {
    let mut mutable = MutableTree::new(sum());
    let handles: Vec<_> = [1, 2, 3].into_iter().map(|value| mutable.insert(value)).collect();
    assert_eq!(mutable.reduce(), Some(&6));
    assert!(mutable.delete(handles[1]));
    assert_eq!(mutable.reduce(), Some(&4));

    let persistent = PersistentTree::new(sum()).insert(1).insert(2).insert(3);
    assert_eq!(persistent.reduce(), Some(&6));
    assert_eq!(persistent.delete(&2).reduce(), Some(&4));
    assert_eq!(persistent.reduce(), Some(&6));

    let mut identity = IdentityTree::new(sum());
    let handles: Vec<_> = [1, 2, 3].into_iter().map(|value| identity.insert(value)).collect();
    assert_eq!(identity.reduce(), Some(&6));
    assert_eq!(identity.delete(&handles[1]), Ok(true));
    assert_eq!(identity.reduce(), Some(&4));
}

#[test]
fn range_fifty_to_hundred() {
    let mut mutable = MutableTree::new(sum());
    let mut identity = IdentityTree::new(sum());
    for value in 0..1024 {
        mutable.insert(value);
        identity.insert(value);
    }
    let persistent = PersistentTree::new(sum()).with_batch(|batch| {
        for value in 0..1024 {
            batch.insert(value);
        }
    });

    let selection = mutable.select(Bounds(50..=100));
    assert_eq!((selection.first(), selection.last()), (Some(&50), Some(&100)));
    assert_eq!(selection.reduce(), Some(3825));

    let selection = persistent.select(Bounds(50..=100));
    assert_eq!((selection.first(), selection.last()), (Some(&50), Some(&100)));
    assert_eq!(selection.reduce(), Some(3825));

    let selection = identity.select(Bounds(50..=100));
    assert_eq!(selection.first().map(|entry| *entry.value()), Some(50));
    assert_eq!(selection.last().map(|entry| *entry.value()), Some(100));
    assert_eq!(selection.reduce(), Some(3825));
}

#[test]
fn closure_probe_selects_a_range() {
    let tree = (0..100).fold(PersistentTree::new(sum()), |tree, value| tree.insert(value));
    let probe = |v: &i64| {
        if *v < 10 {
            std::cmp::Ordering::Less
        } else if *v >= 20 {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    };
    let selection = tree.select(probe);
    assert_eq!(selection.iter().copied().collect::<Vec<_>>(), (10..20).collect::<Vec<_>>());
    assert_eq!(selection.before().reduce(), Some(45));
    assert_eq!(selection.after().first(), Some(&20));

    let mut seen = Vec::new();
    selection.for_each(|value| seen.push(*value));
    assert_eq!(seen.len(), 10);
}

#[test]
fn empty_selection_has_no_aggregate() {
    let tree = (0..100).fold(PersistentTree::new(sum()), |tree, value| tree.insert(value * 2));
    let selection = tree.select(Bounds(51..52));
    assert_eq!(selection.reduce(), None);
    assert_eq!(selection.first(), None);
    assert_eq!(selection.iter().next(), None);
    assert_eq!(selection.before().last(), Some(&50));
    assert_eq!(selection.after().first(), Some(&52));
}

#[test]
fn running_maximum_aggregate() {
    let config = FnConfig::new(
        |a: &(u32, i64), b: &(u32, i64)| a.0.cmp(&b.0),
        |v: &(u32, i64)| v.1,
        |a: &i64, b: &i64| *a.max(b),
    );
    let mut tree = MutableTree::new(config);
    let mut handles = Vec::new();
    for key in 0..64u32 {
        handles.push(tree.insert((key, (key as i64 * 37) % 101)));
    }
    assert_eq!(tree.reduce(), Some(&100));
    let peak = tree
        .find(&(11, 0))
        .and_then(|handle| tree.get(handle))
        .copied();
    assert_eq!(peak, Some((11, 3)));
    assert!(tree.check().is_ok());
}

// =============================================================================
// Seeded stress
// =============================================================================

#[test]
fn mutable_stress() {
    let mut rng = StdRng::seed_from_u64(0x7ee);
    let mut tree = MutableTree::new(sum());
    let mut live = Vec::new();
    for _ in 0..8024 {
        let value = rng.gen_range(-10_000..10_000);
        live.push((tree.insert(value), value));
    }
    assert_eq!(tree.check(), Ok(8024));

    for _ in 0..1024 {
        let (handle, _) = live.swap_remove(rng.gen_range(0..live.len()));
        assert!(tree.delete(handle));
        assert!(!tree.delete(handle));
    }
    assert_eq!(tree.check(), Ok(8024 - 1024));

    for _ in 0..128 {
        let at = rng.gen_range(0..live.len());
        let value = rng.gen_range(-10_000..10_000);
        assert!(tree.update(live[at].0, value));
        live[at].1 = value;
    }
    assert_eq!(tree.check(), Ok(8024 - 1024));

    for (handle, value) in &live {
        assert_eq!(tree.get(*handle), Some(value));
    }
    let expected = sorted(live.iter().map(|(_, value)| *value).collect());
    assert_eq!(tree.reduce().copied(), Some(expected.iter().sum::<i64>()));
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), expected);
}

#[test]
fn persistent_stress() {
    let mut rng = StdRng::seed_from_u64(0xbeef);
    let mut tree = PersistentTree::new(sum());
    let mut values = Vec::new();
    let mut checkpoints = Vec::new();
    for round in 0..8024 {
        let value = rng.gen_range(-10_000..10_000);
        tree = tree.insert(value);
        values.push(value);
        if round % 1000 == 0 {
            checkpoints.push((tree.clone(), sorted(values.clone())));
        }
    }
    for _ in 0..1024 {
        let value = values.swap_remove(rng.gen_range(0..values.len()));
        let next = tree.delete(&value);
        assert!(!next.ptr_eq(&tree));
        tree = next;
    }
    for _ in 0..128 {
        let at = rng.gen_range(0..values.len());
        let value = rng.gen_range(-10_000..10_000);
        tree = tree.update(&values[at], value);
        values[at] = value;
    }
    assert!(tree.delete(&20_000).ptr_eq(&tree));
    assert_eq!(tree.check(), Ok(values.len()));

    let expected = sorted(values);
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), expected);
    for (snapshot, expected) in &checkpoints {
        assert_eq!(snapshot.iter().copied().collect::<Vec<_>>(), *expected);
        assert!(snapshot.check().is_ok());
    }
}

#[test]
fn identity_stress() {
    let mut rng = StdRng::seed_from_u64(0x1d);
    let mut tree = IdentityTree::new(sum());
    let mut handles = Vec::new();
    for _ in 0..8024 {
        // Few distinct values, so most entries tie.
        handles.push(tree.insert(rng.gen_range(0..16)));
    }
    for _ in 0..1024 {
        let handle = handles.swap_remove(rng.gen_range(0..handles.len()));
        assert_eq!(tree.delete(&handle), Ok(true));
    }
    for _ in 0..128 {
        let at = rng.gen_range(0..handles.len());
        let value = rng.gen_range(0..16);
        assert_eq!(tree.update(&mut handles[at], value), Ok(true));
    }
    assert_eq!(tree.check(), Ok(8024 - 1024));
    assert_eq!(tree.len(), handles.len());

    let expected = sorted(handles.iter().map(|handle| *handle.value()).collect());
    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), expected);
    assert_eq!(tree.reduce().copied(), Some(expected.iter().sum::<i64>()));
}

#[test]
fn batch_stress_copies_each_node_once() {
    let mut rng = StdRng::seed_from_u64(0xba7c);
    let base = PersistentTree::new(sum()).with_batch(|batch| {
        for value in 0..512 {
            batch.insert(value);
        }
    });
    let mut batch = base.batch();
    let mut values: Vec<i64> = (0..512).collect();
    for _ in 0..4096 {
        if rng.gen_range(0..2) == 0 {
            let value = rng.gen_range(0..1024);
            batch.insert(value);
            values.push(value);
        } else {
            let at = rng.gen_range(0..values.len());
            assert!(batch.delete(&values.swap_remove(at)));
        }
        assert!(batch.copies() <= 512);
    }
    assert_eq!(batch.check(), Ok(values.len()));
    let after = batch.finish();
    assert_eq!(after.iter().copied().collect::<Vec<_>>(), sorted(values));
    assert_eq!(base.check(), Ok(512));
    assert_eq!(base.reduce(), Some(&(0..512).sum::<i64>()));
}
