//! Entry identity on top of a persistent tree.
//!
//! Equal values are indistinguishable to a plain tree: deleting "a 5" may
//! remove any of them. [`IdentityTree`] stamps every insertion with a
//! monotonically increasing [`Seq`] and orders ties by it, so each entry has
//! a unique position and the [`IdentityHandle`] returned by
//! [`IdentityTree::insert`] always names exactly one entry.

use std::cmp::Ordering;
use std::fmt;

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::config::Config;
use crate::cow::Node;
use crate::error::Error;
use crate::id::TreeId;
use crate::persistent::PersistentTree;
use crate::select::{All, Probe, Selection};

/// Creation counter. Two words, so it cannot run out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seq {
    hi: u64,
    lo: u64,
}

impl Seq {
    pub const ZERO: Seq = Seq { hi: 0, lo: 0 };

    pub fn new(hi: u64, lo: u64) -> Seq {
        return Seq { hi, lo };
    }

    #[inline]
    pub fn hi(self) -> u64 {
        return self.hi;
    }

    #[inline]
    pub fn lo(self) -> u64 {
        return self.lo;
    }

    /// The following stamp, carrying into `hi` when `lo` overflows.
    pub fn next(self) -> Seq {
        return match self.lo.checked_add(1) {
            Some(lo) => Seq { hi: self.hi, lo },
            None => Seq {
                hi: self.hi.wrapping_add(1),
                lo: 0,
            },
        };
    }
}

/// A value together with its creation stamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<V> {
    value: V,
    seq: Seq,
}

impl<V> Entry<V> {
    #[inline]
    pub fn value(&self) -> &V {
        return &self.value;
    }

    #[inline]
    pub fn seq(&self) -> Seq {
        return self.seq;
    }
}

/// Orders [`Entry`]s by the wrapped config, then by creation stamp.
#[derive(Debug)]
pub struct Stamped<C>(C);

impl<C: Config> Stamped<C> {
    pub fn new(inner: C) -> Stamped<C> {
        return Stamped(inner);
    }

    #[inline]
    pub fn inner(&self) -> &C {
        return &self.0;
    }
}

impl<C: Config> Config for Stamped<C> {
    type Value = Entry<C::Value>;
    type Mapped = C::Mapped;

    fn compare(&self, a: &Entry<C::Value>, b: &Entry<C::Value>) -> Ordering {
        return self.0.compare(&a.value, &b.value).then(a.seq.cmp(&b.seq));
    }

    fn compare_mapped(
        &self,
        a: &Entry<C::Value>,
        b: &Entry<C::Value>,
        a_mapped: &C::Mapped,
        b_mapped: &C::Mapped,
    ) -> Ordering {
        return self
            .0
            .compare_mapped(&a.value, &b.value, a_mapped, b_mapped)
            .then(a.seq.cmp(&b.seq));
    }

    fn map(&self, entry: &Entry<C::Value>) -> C::Mapped {
        return self.0.map(&entry.value);
    }

    fn reduce(&self, a: &C::Mapped, b: &C::Mapped) -> C::Mapped {
        return self.0.reduce(a, b);
    }
}

/// Lifts a probe over values to a probe over entries.
#[derive(Clone, Copy, Debug)]
pub struct ByValue<P>(pub P);

impl<V, P: Probe<V>> Probe<Entry<V>> for ByValue<P> {
    #[inline]
    fn probe(&self, entry: &Entry<V>) -> Ordering {
        return self.0.probe(&entry.value);
    }
}

/// Names one entry of an [`IdentityTree`].
///
/// Not `Clone`: updating through one handle would leave a copy pointing at
/// the old value.
#[derive(Debug)]
pub struct IdentityHandle<V> {
    value: V,
    seq: Seq,
    tree: TreeId,
}

impl<V> IdentityHandle<V> {
    /// The value as of the last insert or update through this handle.
    #[inline]
    pub fn value(&self) -> &V {
        return &self.value;
    }

    #[inline]
    pub fn seq(&self) -> Seq {
        return self.seq;
    }
}

type EntryNode<C> = Node<Entry<<C as Config>::Value>, <C as Config>::Mapped>;

/// A tree of stamped entries addressed by [`IdentityHandle`]s.
pub struct IdentityTree<C: Config> {
    tree: PersistentTree<Stamped<C>>,
    live: FxHashSet<Seq>,
    next: Seq,
    id: TreeId,
}

impl<C: Config> IdentityTree<C> {
    pub fn new(config: C) -> IdentityTree<C> {
        return IdentityTree {
            tree: PersistentTree::new(Stamped(config)),
            live: FxHashSet::default(),
            next: Seq::ZERO,
            id: TreeId::next(),
        };
    }

    #[inline]
    pub fn len(&self) -> usize {
        return self.live.len();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.live.is_empty();
    }

    /// Aggregate of every value, `None` if empty.
    pub fn reduce(&self) -> Option<&C::Mapped> {
        return self.tree.reduce();
    }

    /// The current contents as a persistent tree of entries.
    pub fn snapshot(&self) -> PersistentTree<Stamped<C>> {
        return self.tree.clone();
    }

    pub fn for_each<F: FnMut(&C::Value)>(&self, mut func: F) {
        for value in self.iter() {
            func(value);
        }
    }

    /// In-order iterator over every value; equal values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &C::Value> {
        return self.tree.iter().map(|entry| &entry.value);
    }

    /// Select the entries whose values a probe accepts.
    pub fn select<P: Probe<C::Value>>(
        &self,
        probe: P,
    ) -> Selection<'_, Stamped<C>, &EntryNode<C>, ByValue<P>> {
        return self.tree.select(ByValue(probe));
    }

    pub fn select_all(&self) -> Selection<'_, Stamped<C>, &EntryNode<C>, All> {
        return self.tree.select_all();
    }

    /// Verify the tree's invariants and that it holds exactly the live
    /// entries, returning their number.
    pub fn check(&self) -> Result<usize, Error>
    where
        C::Mapped: PartialEq,
    {
        let count = self.tree.check()?;
        let mut seen = 0;
        for entry in self.tree.iter() {
            if !self.live.contains(&entry.seq) {
                return Err(Error::Inconsistent { operation: "check" });
            }
            seen += 1;
        }
        if seen != self.live.len() {
            return Err(Error::Inconsistent { operation: "check" });
        }
        return Ok(count);
    }

    fn owns<V>(&self, handle: &IdentityHandle<V>) -> Result<(), Error> {
        if handle.tree != self.id {
            debug!(hi = handle.seq.hi, lo = handle.seq.lo, "rejected handle issued by another tree");
            return Err(Error::ForeignHandle);
        }
        return Ok(());
    }
}

impl<C: Config> IdentityTree<C>
where
    C::Value: Clone,
{
    /// Insert a value, returning the handle that names it.
    pub fn insert(&mut self, value: C::Value) -> IdentityHandle<C::Value> {
        let seq = self.next;
        self.next = seq.next();
        self.tree = self.tree.insert(Entry {
            value: value.clone(),
            seq,
        });
        self.live.insert(seq);
        return IdentityHandle {
            value,
            seq,
            tree: self.id,
        };
    }

    /// Delete the entry a handle names.
    ///
    /// `Ok(false)` if it was already deleted.
    pub fn delete(&mut self, handle: &IdentityHandle<C::Value>) -> Result<bool, Error> {
        self.owns(handle)?;
        if !self.live.contains(&handle.seq) {
            debug!(hi = handle.seq.hi, lo = handle.seq.lo, "handle is detached");
            return Ok(false);
        }
        self.detach(handle, "delete")?;
        self.live.remove(&handle.seq);
        return Ok(true);
    }

    /// Replace the value of the entry a handle names. The entry keeps its
    /// stamp and the handle stays valid.
    pub fn update(&mut self, handle: &mut IdentityHandle<C::Value>, value: C::Value) -> Result<bool, Error> {
        self.owns(handle)?;
        if !self.live.contains(&handle.seq) {
            debug!(hi = handle.seq.hi, lo = handle.seq.lo, "handle is detached");
            return Ok(false);
        }
        self.detach(handle, "update")?;
        self.tree = self.tree.insert(Entry {
            value: value.clone(),
            seq: handle.seq,
        });
        handle.value = value;
        return Ok(true);
    }

    fn detach(&mut self, handle: &IdentityHandle<C::Value>, operation: &'static str) -> Result<(), Error> {
        let key = Entry {
            value: handle.value.clone(),
            seq: handle.seq,
        };
        let mut batch = self.tree.batch();
        if !batch.delete(&key) {
            warn!(operation, hi = handle.seq.hi, lo = handle.seq.lo, "live entry not found");
            return Err(Error::Inconsistent { operation });
        }
        self.tree = batch.finish();
        return Ok(());
    }
}

impl<C: Config> fmt::Debug for IdentityTree<C>
where
    C::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
