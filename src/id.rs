//! Process-unique identifiers.
//!
//! Both counters only ever grow, so a retired [`Generation`] or a dropped
//! tree's [`TreeId`] is never handed out again.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);
static NEXT_TREE: AtomicU64 = AtomicU64::new(1);

/// Marks the nodes owned by one copy-on-write session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Generation(NonZeroU64);

impl Generation {
    /// Draw a fresh generation.
    pub fn next() -> Generation {
        return Generation(fresh(&NEXT_GENERATION));
    }

    pub fn get(self) -> u64 {
        return self.0.get();
    }
}

/// Identifies the tree that issued a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeId(NonZeroU64);

impl TreeId {
    pub fn next() -> TreeId {
        return TreeId(fresh(&NEXT_TREE));
    }
}

fn fresh(counter: &AtomicU64) -> NonZeroU64 {
    let raw = counter.fetch_add(1, Ordering::Relaxed);
    // Starts at 1 and would need 2^64 draws to wrap.
    return NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN);
}
