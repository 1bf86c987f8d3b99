//! Batched mutation of a persistent tree.
//!
//! A [`Batch`] owns a private root and a fresh [`Generation`]. Nodes reached
//! from the starting tree are copied the first time the batch writes to
//! them; nodes the batch created or already copied are written in place. The
//! starting tree never observes any of it, and [`Batch::finish`] publishes
//! the result as an ordinary [`PersistentTree`].
//!
//! ```
//! use treeducer::{FnConfig, PersistentTree};
//!
//! let empty = PersistentTree::new(FnConfig::ordered(|v: &u64| *v, |a: &u64, b: &u64| a + b));
//! let mut batch = empty.batch();
//! for value in 1..=100 {
//!     batch.insert(value);
//! }
//! let full = batch.finish();
//! assert_eq!(full.reduce(), Some(&5050));
//! assert!(empty.is_empty());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::config::Config;
use crate::cow::{self, Link, Node, Txn};
use crate::error::Error;
use crate::id::Generation;
use crate::kernel;
use crate::persistent::PersistentTree;
use crate::select::{self, All, Iter, Probe, Selection};

/// A copy-on-write editing session over a [`PersistentTree`].
///
/// Exclusive by construction: writing needs `&mut Batch`, and
/// [`finish`](Batch::finish) consumes it.
pub struct Batch<C: Config> {
    config: Arc<C>,
    root: Link<C>,
    txn: Txn,
}

impl<C: Config> Batch<C> {
    pub(crate) fn open(config: Arc<C>, root: Link<C>) -> Batch<C> {
        let txn = Txn::new(Generation::next());
        trace!(generation = txn.tag.get(), "batch opened");
        return Batch { config, root, txn };
    }

    /// Tag stamped on every node this batch creates or copies.
    #[inline]
    pub fn generation(&self) -> Generation {
        return self.txn.tag;
    }

    /// Number of shared nodes copied into this batch so far.
    #[inline]
    pub fn copies(&self) -> usize {
        return self.txn.copies;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.root.is_none();
    }

    /// Aggregate of every value, `None` if empty.
    pub fn reduce(&self) -> Option<&C::Mapped> {
        return self.root.as_deref().map(|root| &root.reduced);
    }

    /// Some value comparing equal to `value`.
    pub fn find(&self, value: &C::Value) -> Option<&C::Value> {
        let mapped = self.config.map(value);
        let node = kernel::find(&*self.config, self.root.as_deref(), value, &mapped)?;
        return Some(&node.value);
    }

    pub fn for_each<F: FnMut(&C::Value)>(&self, mut func: F) {
        for value in self.iter() {
            func(value);
        }
    }

    pub fn iter(&self) -> Iter<'_, 'static, &Node<C::Value, C::Mapped>, All> {
        return Iter::new(self.root.as_deref(), &All, true, true);
    }

    pub fn select<P: Probe<C::Value>>(
        &self,
        probe: P,
    ) -> Selection<'_, C, &Node<C::Value, C::Mapped>, P> {
        return Selection::new(&*self.config, self.root.as_deref(), probe);
    }

    pub fn select_all(&self) -> Selection<'_, C, &Node<C::Value, C::Mapped>, All> {
        return select::everything(&*self.config, self.root.as_deref());
    }

    /// Verify the tree's invariants, returning the number of values.
    pub fn check(&self) -> Result<usize, Error>
    where
        C::Mapped: PartialEq,
    {
        return Ok(kernel::check(&*self.config, self.root.as_deref())?);
    }

    /// Publish the batch's tree. The generation is never handed out again.
    pub fn finish(self) -> PersistentTree<C> {
        trace!(
            generation = self.txn.tag.get(),
            copies = self.txn.copies,
            "batch finished"
        );
        return PersistentTree::from_parts(self.config, self.root);
    }
}

impl<C: Config> Batch<C>
where
    C::Value: Clone,
{
    pub fn insert(&mut self, value: C::Value) {
        let config = &*self.config;
        let fresh = cow::leaf(config, &self.txn, value);
        let root = self.root.take();
        self.root = Some(cow::insert(config, &mut self.txn, root, fresh));
    }

    /// Delete one value comparing equal to `value`. Returns `false`, copying
    /// nothing, if there is none.
    pub fn delete(&mut self, value: &C::Value) -> bool {
        let config = &*self.config;
        let mapped = config.map(value);
        if kernel::find(config, self.root.as_deref(), value, &mapped).is_none() {
            return false;
        }
        return cow::remove(config, &mut self.txn, &mut self.root, value, &mapped);
    }

    /// Replace one value comparing equal to `from` with `to`.
    pub fn update(&mut self, from: &C::Value, to: C::Value) -> bool {
        if !self.delete(from) {
            return false;
        }
        self.insert(to);
        return true;
    }
}

impl<C: Config> fmt::Debug for Batch<C>
where
    C::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("generation", &self.txn.tag)
            .field("values", &DebugValues(self))
            .finish()
    }
}

struct DebugValues<'b, C: Config>(&'b Batch<C>);

impl<C: Config> fmt::Debug for DebugValues<'_, C>
where
    C::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FnConfig;

    fn base(values: impl IntoIterator<Item = i64>) -> PersistentTree<impl Config<Value = i64, Mapped = i64>> {
        let empty = PersistentTree::new(FnConfig::ordered(|v: &i64| *v, |a: &i64, b: &i64| a + b));
        return empty.with_batch(|batch| {
            for value in values {
                batch.insert(value);
            }
        });
    }

    #[test]
    fn fresh_batch_copies_nothing() {
        let tree = base(0..64);
        let batch = tree.batch();
        assert_eq!(batch.copies(), 0);
        assert_eq!(batch.reduce(), tree.reduce());
        assert!(batch.finish().ptr_eq(&tree));
    }

    #[test]
    fn generations_are_distinct() {
        let tree = base(0..4);
        let a = tree.batch();
        let b = tree.batch();
        assert_ne!(a.generation(), b.generation());
    }

    #[test]
    fn owned_nodes_are_written_in_place() {
        let tree = base(0..64);
        let mut batch = tree.batch();
        batch.insert(1000);
        let after_first = batch.copies();
        assert!(after_first > 0);
        batch.insert(1001);
        assert_eq!(batch.copies(), after_first);
        assert!(batch.check().is_ok());
    }

    #[test]
    fn each_shared_node_is_copied_at_most_once() {
        let tree = base(0..64);
        let mut batch = tree.batch();
        for round in 0..100 {
            batch.insert(round % 64);
            assert!(batch.delete(&(round % 64)));
            batch.insert(1000 + round);
            assert!(batch.delete(&(1000 + round)));
        }
        assert!(batch.copies() <= 64);
        assert!(batch.check().is_ok());
        let after = batch.finish();
        assert_eq!(after.reduce(), tree.reduce());
        assert_eq!(tree.iter().copied().collect::<Vec<_>>(), (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn missing_delete_copies_nothing() {
        let tree = base(0..64);
        let mut batch = tree.batch();
        assert!(!batch.delete(&500));
        assert!(!batch.update(&500, 1));
        assert_eq!(batch.copies(), 0);
        assert!(batch.finish().ptr_eq(&tree));
    }

    #[test]
    fn batch_reads_its_own_writes() {
        let tree = base([3, 1, 2]);
        let mut batch = tree.batch();
        assert!(batch.update(&2, 20));
        assert_eq!(batch.find(&20), Some(&20));
        assert_eq!(batch.find(&2), None);
        assert_eq!(batch.iter().copied().collect::<Vec<_>>(), vec![1, 3, 20]);
        assert_eq!(batch.select_all().reduce(), Some(24));
        assert_eq!(tree.find(&2), Some(&2));
    }
}
