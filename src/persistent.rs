//! Fully persistent AA-tree.
//!
//! Every mutation returns a new tree and leaves `self` untouched. The new
//! root shares every subtree the operation did not walk through, so an
//! insert or delete allocates O(log n) nodes. Internally each operation is a
//! one-operation [`Batch`].

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::batch::Batch;
use crate::config::Config;
use crate::cow::{Link, Node};
use crate::error::Error;
use crate::kernel;
use crate::select::{self, All, Iter, Probe, Selection};

/// An immutable snapshot of an AA-tree. Cloning is O(1).
pub struct PersistentTree<C: Config> {
    config: Arc<C>,
    root: Link<C>,
}

impl<C: Config> Clone for PersistentTree<C> {
    fn clone(&self) -> Self {
        return PersistentTree {
            config: Arc::clone(&self.config),
            root: self.root.clone(),
        };
    }
}

impl<C: Config> PersistentTree<C> {
    pub fn new(config: C) -> PersistentTree<C> {
        return PersistentTree {
            config: Arc::new(config),
            root: None,
        };
    }

    pub(crate) fn from_parts(config: Arc<C>, root: Link<C>) -> PersistentTree<C> {
        return PersistentTree { config, root };
    }

    #[inline]
    pub fn config(&self) -> &C {
        return &self.config;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.root.is_none();
    }

    /// The root node, for read-only inspection.
    #[inline]
    pub fn root(&self) -> Option<&Node<C::Value, C::Mapped>> {
        return self.root.as_deref();
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

    /// Smallest value.
    pub fn first(&self) -> Option<&C::Value> {
        return kernel::min(self.root.as_deref()).map(|node| &node.value);
    }

    /// Largest value.
    pub fn last(&self) -> Option<&C::Value> {
        return kernel::max(self.root.as_deref()).map(|node| &node.value);
    }

    pub fn for_each<F: FnMut(&C::Value)>(&self, mut func: F) {
        for value in self.iter() {
            func(value);
        }
    }

    /// In-order iterator over every value.
    pub fn iter(&self) -> Iter<'_, 'static, &Node<C::Value, C::Mapped>, All> {
        return Iter::new(self.root.as_deref(), &All, true, true);
    }

    /// Select the values a probe accepts.
    pub fn select<P: Probe<C::Value>>(
        &self,
        probe: P,
    ) -> Selection<'_, C, &Node<C::Value, C::Mapped>, P> {
        return Selection::new(&*self.config, self.root.as_deref(), probe);
    }

    pub fn select_all(&self) -> Selection<'_, C, &Node<C::Value, C::Mapped>, All> {
        return select::everything(&*self.config, self.root.as_deref());
    }

    /// Whether both trees have the same root node (or are both empty).
    pub fn ptr_eq(&self, other: &PersistentTree<C>) -> bool {
        return match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
    }

    /// Number of this tree's nodes that are also nodes of `other`.
    pub fn shared_nodes(&self, other: &PersistentTree<C>) -> usize {
        let mut theirs = FxHashSet::default();
        let mut stack: Vec<&Node<C::Value, C::Mapped>> = other.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            theirs.insert(node as *const Node<C::Value, C::Mapped>);
            stack.extend(node.left());
            stack.extend(node.right());
        }

        let mut shared = 0;
        stack.extend(self.root.as_deref());
        while let Some(node) = stack.pop() {
            if theirs.contains(&(node as *const Node<C::Value, C::Mapped>)) {
                shared += 1;
            }
            stack.extend(node.left());
            stack.extend(node.right());
        }
        return shared;
    }

    /// Verify the tree's invariants, returning the number of values.
    pub fn check(&self) -> Result<usize, Error>
    where
        C::Mapped: PartialEq,
    {
        return Ok(kernel::check(&*self.config, self.root.as_deref())?);
    }
}

impl<C: Config> PersistentTree<C>
where
    C::Value: Clone,
{
    /// A new tree with `value` added.
    pub fn insert(&self, value: C::Value) -> PersistentTree<C> {
        return self.with_batch(|batch| batch.insert(value));
    }

    /// A new tree with one value comparing equal to `value` removed. If there
    /// is none the result shares this tree's root.
    pub fn delete(&self, value: &C::Value) -> PersistentTree<C> {
        return self.with_batch(|batch| {
            batch.delete(value);
        });
    }

    /// A new tree with one value comparing equal to `from` replaced by `to`.
    /// If there is none the result shares this tree's root.
    pub fn update(&self, from: &C::Value, to: C::Value) -> PersistentTree<C> {
        return self.with_batch(|batch| {
            batch.update(from, to);
        });
    }

    /// Open an editing session starting from this tree.
    pub fn batch(&self) -> Batch<C> {
        return Batch::open(Arc::clone(&self.config), self.root.clone());
    }

    /// Apply `routine` to a batch and publish the result.
    pub fn with_batch<F: FnOnce(&mut Batch<C>)>(&self, routine: F) -> PersistentTree<C> {
        let mut batch = self.batch();
        routine(&mut batch);
        return batch.finish();
    }
}

impl<C: Config> fmt::Debug for PersistentTree<C>
where
    C::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
