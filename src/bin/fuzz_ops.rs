//! AFL fuzz harness for the tree engines
//!
//! Replays a byte-encoded operation stream against every engine at once and
//! checks after each step that:
//! 1. Each engine holds exactly the sorted model's values
//! 2. Each engine's aggregate equals the model's sum
//! 3. The AA level and aggregate invariants hold
//! 4. Persistent snapshots taken earlier never change

use afl::fuzz;
use treeducer::{Bounds, FnConfig, Handle, IdentityHandle, IdentityTree, MutableTree, PersistentTree};

/// Operation types the fuzzer can generate
#[derive(Debug, Clone, Copy)]
enum FuzzOp {
    /// Insert a value into every engine
    Insert { value: u8 },
    /// Delete the entry at a position in insertion order
    Delete { pick: u8 },
    /// Replace the entry at a position in insertion order
    Update { pick: u8, value: u8 },
    /// Take a persistent snapshot to re-check later
    Snapshot,
    /// Compare a range aggregate against the model
    Range { low: u8, width: u8 },
}

impl FuzzOp {
    fn from_bytes(bytes: &[u8]) -> Option<(FuzzOp, &[u8])> {
        if bytes.is_empty() {
            return None;
        }

        let op_type = bytes[0] % 5;
        let rest = &bytes[1..];

        match op_type {
            0 if !rest.is_empty() => Some((FuzzOp::Insert { value: rest[0] }, &rest[1..])),
            1 if !rest.is_empty() => Some((FuzzOp::Delete { pick: rest[0] }, &rest[1..])),
            2 if rest.len() >= 2 => {
                let op = FuzzOp::Update {
                    pick: rest[0],
                    value: rest[1],
                };
                Some((op, &rest[2..]))
            }
            3 => Some((FuzzOp::Snapshot, rest)),
            4 if rest.len() >= 2 => {
                let op = FuzzOp::Range {
                    low: rest[0],
                    width: rest[1],
                };
                Some((op, &rest[2..]))
            }
            _ => None,
        }
    }
}

/// One inserted entry, tracked in every engine.
struct Tracked {
    value: u64,
    handle: Handle,
    identity: IdentityHandle<u64>,
}

fn main() {
    let config = || FnConfig::ordered(|v: &u64| *v, |a: &u64, b: &u64| a + b);

    fuzz!(|data: &[u8]| {
        let mut mutable = MutableTree::new(config());
        let mut persistent = PersistentTree::new(config());
        let mut identity = IdentityTree::new(config());
        let mut tracked: Vec<Tracked> = Vec::new();
        let mut snapshots = Vec::new();
        let mut remaining = data;

        while let Some((op, rest)) = FuzzOp::from_bytes(remaining) {
            remaining = rest;
            match op {
                FuzzOp::Insert { value } => {
                    let value = value as u64;
                    persistent = persistent.insert(value);
                    tracked.push(Tracked {
                        value,
                        handle: mutable.insert(value),
                        identity: identity.insert(value),
                    });
                }
                FuzzOp::Delete { pick } => {
                    if tracked.is_empty() {
                        continue;
                    }
                    let entry = tracked.remove(pick as usize % tracked.len());
                    assert!(mutable.delete(entry.handle));
                    assert!(!mutable.delete(entry.handle));
                    let next = persistent.delete(&entry.value);
                    assert!(!next.ptr_eq(&persistent));
                    persistent = next;
                    assert_eq!(identity.delete(&entry.identity), Ok(true));
                    assert_eq!(identity.delete(&entry.identity), Ok(false));
                }
                FuzzOp::Update { pick, value } => {
                    if tracked.is_empty() {
                        continue;
                    }
                    let value = value as u64;
                    let at = pick as usize % tracked.len();
                    let entry = &mut tracked[at];
                    assert!(mutable.update(entry.handle, value));
                    persistent = persistent.update(&entry.value, value);
                    assert_eq!(identity.update(&mut entry.identity, value), Ok(true));
                    entry.value = value;
                }
                FuzzOp::Snapshot => {
                    let mut model: Vec<u64> = tracked.iter().map(|entry| entry.value).collect();
                    model.sort();
                    snapshots.push((persistent.clone(), model));
                }
                FuzzOp::Range { low, width } => {
                    let low = low as u64;
                    let high = low + width as u64;
                    let inside: Vec<u64> = tracked
                        .iter()
                        .map(|entry| entry.value)
                        .filter(|value| (low..high).contains(value))
                        .collect();
                    let expected = (!inside.is_empty()).then(|| inside.iter().sum::<u64>());
                    assert_eq!(mutable.select(Bounds(low..high)).reduce(), expected);
                    assert_eq!(persistent.select(Bounds(low..high)).reduce(), expected);
                    assert_eq!(identity.select(Bounds(low..high)).reduce(), expected);
                }
            }

            let mut model: Vec<u64> = tracked.iter().map(|entry| entry.value).collect();
            model.sort();
            let total = (!model.is_empty()).then(|| model.iter().sum::<u64>());

            assert_eq!(mutable.check(), Ok(model.len()));
            assert_eq!(persistent.check(), Ok(model.len()));
            assert_eq!(identity.check(), Ok(model.len()));
            assert_eq!(mutable.iter().copied().collect::<Vec<_>>(), model);
            assert_eq!(persistent.iter().copied().collect::<Vec<_>>(), model);
            assert_eq!(identity.iter().copied().collect::<Vec<_>>(), model);
            assert_eq!(mutable.reduce().copied(), total);
            assert_eq!(persistent.reduce().copied(), total);
            assert_eq!(identity.reduce().copied(), total);
        }

        for (snapshot, model) in &snapshots {
            assert_eq!(snapshot.iter().copied().collect::<Vec<_>>(), *model);
        }
    });
}
