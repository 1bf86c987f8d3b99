//! Exclusively owned AA-tree with stable handles.
//!
//! Structure:
//! - Nodes live in a slot arena and link to each other by `u32` index,
//!   including a parent link, so there are no raw pointers or cycles of
//!   owning references.
//! - A [`Handle`] names a slot plus the stamp the slot had when the value was
//!   inserted. Deleting bumps the stamp, so stale handles are rejected even
//!   after the slot is reused. A slot whose `u64` stamp runs out is retired.
//! - Deleting relinks the in-order successor *node* into the deleted node's
//!   place instead of moving values, so every other handle keeps pointing at
//!   its own value.
//!
//! Operations:
//! - insert: O(log n) - descend, then fix levels upward through parent links
//! - delete/update by handle: O(log n) - unlink, then rebalance up to the root
//! - reduce: O(1) - the root's aggregate

use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Violation};
use crate::id::TreeId;
use crate::kernel::{self, NodeRef, LEAF_LEVEL};
use crate::select::{self, All, Iter, Probe, Selection};

/// Index into the slot arena.
type NodeIdx = u32;
/// Sentinel value for no parent / no child.
const NONE: u32 = u32::MAX;

/// A node of the mutable tree.
#[derive(Clone, Debug)]
struct Entry<V, M> {
    value: V,
    mapped: M,
    reduced: M,
    level: u32,
    left: NodeIdx,
    right: NodeIdx,
    parent: NodeIdx,
}

#[derive(Clone, Debug)]
enum Slot<V, M> {
    Occupied { stamp: u64, entry: Entry<V, M> },
    Vacant { stamp: u64 },
}

#[inline]
fn entry<V, M>(slots: &[Slot<V, M>], index: NodeIdx) -> &Entry<V, M> {
    match &slots[index as usize] {
        Slot::Occupied { entry, .. } => entry,
        Slot::Vacant { .. } => unreachable!("link to vacant slot {index}"),
    }
}

/// A stable reference to one value in a [`MutableTree`].
///
/// Stays valid across updates of its own value and across any operation on
/// other values; becomes stale once its value is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: NodeIdx,
    stamp: u64,
    tree: TreeId,
}

/// Read-only reference to a node of a [`MutableTree`].
pub struct SlotRef<'a, V, M> {
    slots: &'a [Slot<V, M>],
    index: NodeIdx,
}

impl<V, M> Clone for SlotRef<'_, V, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V, M> Copy for SlotRef<'_, V, M> {}

impl<'a, V, M> SlotRef<'a, V, M> {
    #[inline]
    fn at(slots: &'a [Slot<V, M>], index: NodeIdx) -> Option<Self> {
        return (index != NONE).then_some(SlotRef { slots, index });
    }

    #[inline]
    fn entry(self) -> &'a Entry<V, M> {
        return entry(self.slots, self.index);
    }
}

impl<'a, V, M> NodeRef<'a> for SlotRef<'a, V, M> {
    type Value = V;
    type Mapped = M;

    #[inline]
    fn value(self) -> &'a V {
        return &self.entry().value;
    }

    #[inline]
    fn mapped(self) -> &'a M {
        return &self.entry().mapped;
    }

    #[inline]
    fn reduced(self) -> &'a M {
        return &self.entry().reduced;
    }

    #[inline]
    fn level(self) -> u32 {
        return self.entry().level;
    }

    #[inline]
    fn left(self) -> Option<Self> {
        return SlotRef::at(self.slots, self.entry().left);
    }

    #[inline]
    fn right(self) -> Option<Self> {
        return SlotRef::at(self.slots, self.entry().right);
    }
}

/// An AA-tree mutated in place, handing out stable [`Handle`]s.
pub struct MutableTree<C: Config> {
    config: C,
    slots: Vec<Slot<C::Value, C::Mapped>>,
    /// Free list (indices of vacated slots).
    free: Vec<NodeIdx>,
    root: NodeIdx,
    len: usize,
    id: TreeId,
}

impl<C: Config> MutableTree<C> {
    pub fn new(config: C) -> MutableTree<C> {
        return MutableTree {
            config,
            slots: Vec::new(),
            free: Vec::new(),
            root: NONE,
            len: 0,
            id: TreeId::next(),
        };
    }

    #[inline]
    pub fn config(&self) -> &C {
        return &self.config;
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        return self.len;
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        return self.root == NONE;
    }

    /// Aggregate of every value, `None` if empty.
    pub fn reduce(&self) -> Option<&C::Mapped> {
        return self.cursor(self.root).map(|root| root.reduced());
    }

    /// Insert a value, returning a handle to it.
    pub fn insert(&mut self, value: C::Value) -> Handle {
        let mapped = self.config.map(&value);
        let entry = Entry {
            value,
            reduced: mapped.clone(),
            mapped,
            level: LEAF_LEVEL,
            left: NONE,
            right: NONE,
            parent: NONE,
        };
        let (index, stamp) = self.alloc(entry);
        self.link(index);
        self.len += 1;
        return Handle {
            index,
            stamp,
            tree: self.id,
        };
    }

    /// The value behind a handle, `None` if the handle is stale.
    pub fn get(&self, handle: Handle) -> Option<&C::Value> {
        let index = self.resolve(handle)?;
        return Some(&self.node(index).value);
    }

    /// Handle to some value comparing equal to `value`.
    pub fn find(&self, value: &C::Value) -> Option<Handle> {
        let mapped = self.config.map(value);
        let node = kernel::find(&self.config, self.cursor(self.root), value, &mapped)?;
        return Some(self.handle(node.index));
    }

    /// Handle to the smallest value.
    pub fn min(&self) -> Option<Handle> {
        let node = kernel::min(self.cursor(self.root))?;
        return Some(self.handle(node.index));
    }

    /// Handle to the largest value.
    pub fn max(&self) -> Option<Handle> {
        let node = kernel::max(self.cursor(self.root))?;
        return Some(self.handle(node.index));
    }

    /// Delete the value behind a handle. Returns `false` if the handle is
    /// stale or was issued by another tree.
    pub fn delete(&mut self, handle: Handle) -> bool {
        let Some(index) = self.resolve(handle) else {
            return false;
        };
        self.unlink(index);
        self.vacate(index);
        self.len -= 1;
        return true;
    }

    /// Replace the value behind a handle. The handle stays valid.
    pub fn update(&mut self, handle: Handle, value: C::Value) -> bool {
        let Some(index) = self.resolve(handle) else {
            return false;
        };
        self.unlink(index);
        let mapped = self.config.map(&value);
        let entry = self.node_mut(index);
        entry.value = value;
        entry.reduced = mapped.clone();
        entry.mapped = mapped;
        entry.level = LEAF_LEVEL;
        self.link(index);
        return true;
    }

    /// Delete some value comparing equal to `value`.
    pub fn delete_value(&mut self, value: &C::Value) -> bool {
        return match self.find(value) {
            Some(handle) => self.delete(handle),
            None => false,
        };
    }

    /// Replace some value comparing equal to `from` with `to`.
    pub fn update_value(&mut self, from: &C::Value, to: C::Value) -> bool {
        return match self.find(from) {
            Some(handle) => self.update(handle, to),
            None => false,
        };
    }

    pub fn for_each<F: FnMut(&C::Value)>(&self, mut func: F) {
        for value in self.iter() {
            func(value);
        }
    }

    /// In-order iterator over every value.
    pub fn iter(&self) -> Iter<'_, 'static, SlotRef<'_, C::Value, C::Mapped>, All> {
        return Iter::new(self.cursor(self.root), &All, true, true);
    }

    /// Select the values a probe accepts.
    pub fn select<P: Probe<C::Value>>(
        &self,
        probe: P,
    ) -> Selection<'_, C, SlotRef<'_, C::Value, C::Mapped>, P> {
        return Selection::new(&self.config, self.cursor(self.root), probe);
    }

    pub fn select_all(&self) -> Selection<'_, C, SlotRef<'_, C::Value, C::Mapped>, All> {
        return select::everything(&self.config, self.cursor(self.root));
    }

    /// Verify the tree's invariants, returning the number of values.
    pub fn check(&self) -> Result<usize, Error>
    where
        C::Mapped: PartialEq,
    {
        let count = kernel::check(&self.config, self.cursor(self.root))?;
        if self.root != NONE && self.node(self.root).parent != NONE {
            return Err(Violation::ParentLink.into());
        }
        let mut stack = Vec::new();
        if self.root != NONE {
            stack.push(self.root);
        }
        while let Some(index) = stack.pop() {
            let node = self.node(index);
            for child in [node.left, node.right] {
                if child == NONE {
                    continue;
                }
                if self.node(child).parent != index {
                    return Err(Violation::ParentLink.into());
                }
                stack.push(child);
            }
        }
        return Ok(count);
    }

    #[inline]
    fn cursor(&self, index: NodeIdx) -> Option<SlotRef<'_, C::Value, C::Mapped>> {
        return SlotRef::at(&self.slots, index);
    }

    #[inline]
    fn node(&self, index: NodeIdx) -> &Entry<C::Value, C::Mapped> {
        return entry(&self.slots, index);
    }

    #[inline]
    fn node_mut(&mut self, index: NodeIdx) -> &mut Entry<C::Value, C::Mapped> {
        match &mut self.slots[index as usize] {
            Slot::Occupied { entry, .. } => entry,
            Slot::Vacant { .. } => unreachable!("link to vacant slot {index}"),
        }
    }

    #[inline]
    fn level(&self, index: NodeIdx) -> Option<u32> {
        return (index != NONE).then(|| self.node(index).level);
    }

    fn handle(&self, index: NodeIdx) -> Handle {
        let stamp = match &self.slots[index as usize] {
            Slot::Occupied { stamp, .. } | Slot::Vacant { stamp } => *stamp,
        };
        return Handle {
            index,
            stamp,
            tree: self.id,
        };
    }

    fn resolve(&self, handle: Handle) -> Option<NodeIdx> {
        if handle.tree != self.id {
            debug!(index = handle.index, "rejected handle issued by another tree");
            return None;
        }
        return match self.slots.get(handle.index as usize) {
            Some(Slot::Occupied { stamp, .. }) if *stamp == handle.stamp => Some(handle.index),
            _ => {
                debug!(index = handle.index, stamp = handle.stamp, "rejected stale handle");
                None
            }
        };
    }

    fn alloc(&mut self, entry: Entry<C::Value, C::Mapped>) -> (NodeIdx, u64) {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let stamp = match slot {
                Slot::Occupied { stamp, .. } | Slot::Vacant { stamp } => *stamp,
            };
            *slot = Slot::Occupied { stamp, entry };
            return (index, stamp);
        }
        let index = self.slots.len() as NodeIdx;
        self.slots.push(Slot::Occupied { stamp: 0, entry });
        return (index, 0);
    }

    /// Empty a slot. A slot whose stamp is exhausted is retired instead of
    /// recycled, so no stamp is ever issued twice.
    fn vacate(&mut self, index: NodeIdx) {
        let slot = &mut self.slots[index as usize];
        let stamp = match slot {
            Slot::Occupied { stamp, .. } | Slot::Vacant { stamp } => *stamp,
        };
        match stamp.checked_add(1) {
            Some(next) => {
                *slot = Slot::Vacant { stamp: next };
                self.free.push(index);
            }
            None => {
                debug!(index, "retired slot with exhausted stamp");
                *slot = Slot::Vacant { stamp };
            }
        }
    }

    fn rereduce(&mut self, index: NodeIdx) {
        let node = self.node(index);
        let left = (node.left != NONE).then(|| &self.node(node.left).reduced);
        let right = (node.right != NONE).then(|| &self.node(node.right).reduced);
        let reduced = kernel::rereduce(&self.config, &node.mapped, left, right);
        self.node_mut(index).reduced = reduced;
    }

    /// Point `from`'s parent at `to` instead.
    fn take_parent(&mut self, from: NodeIdx, to: NodeIdx) {
        let parent = self.node(from).parent;
        if parent != NONE {
            let node = self.node_mut(parent);
            if node.left == from {
                node.left = to;
            } else {
                node.right = to;
            }
        }
        if to != NONE {
            self.node_mut(to).parent = parent;
        }
    }

    /// Rotate right if the left child shares this node's level.
    fn skew(&mut self, index: NodeIdx) -> NodeIdx {
        let left = self.node(index).left;
        if !kernel::needs_skew(self.node(index).level, self.level(left)) {
            return index;
        }
        self.take_parent(index, left);
        let moved = self.node(left).right;
        self.node_mut(index).left = moved;
        if moved != NONE {
            self.node_mut(moved).parent = index;
        }
        self.node_mut(left).right = index;
        self.node_mut(index).parent = left;
        self.rereduce(index);
        self.rereduce(left);
        return left;
    }

    /// Rotate left and raise the new root if three nodes share a level.
    fn split(&mut self, index: NodeIdx) -> NodeIdx {
        let right = self.node(index).right;
        let right_right = if right == NONE { NONE } else { self.node(right).right };
        if !kernel::needs_split(self.node(index).level, self.level(right_right)) {
            return index;
        }
        self.take_parent(index, right);
        let moved = self.node(right).left;
        self.node_mut(index).right = moved;
        if moved != NONE {
            self.node_mut(moved).parent = index;
        }
        self.node_mut(right).left = index;
        self.node_mut(index).parent = right;
        self.node_mut(right).level += 1;
        self.rereduce(index);
        self.rereduce(right);
        return right;
    }

    /// Attach a detached level-1 node and fix levels up to the root.
    fn link(&mut self, index: NodeIdx) {
        if self.root == NONE {
            self.root = index;
            return;
        }
        let mut current = self.root;
        loop {
            let node = self.node(index);
            let parent = self.node(current);
            let ordering = self.config.compare_mapped(&node.value, &parent.value, &node.mapped, &parent.mapped);
            let next = if ordering == Ordering::Less { parent.left } else { parent.right };
            if next == NONE {
                if ordering == Ordering::Less {
                    self.node_mut(current).left = index;
                } else {
                    self.node_mut(current).right = index;
                }
                self.node_mut(index).parent = current;
                break;
            }
            current = next;
        }

        let mut up = current;
        loop {
            self.rereduce(up);
            up = self.skew(up);
            up = self.split(up);
            let parent = self.node(up).parent;
            if parent == NONE {
                self.root = up;
                return;
            }
            up = parent;
        }
    }

    /// Detach a node from the tree, leaving it childless and parentless.
    fn unlink(&mut self, index: NodeIdx) {
        let (left, right, parent, level) = {
            let node = self.node(index);
            (node.left, node.right, node.parent, node.level)
        };

        let up;
        if left == NONE || right == NONE {
            let child = if left == NONE { right } else { left };
            self.take_parent(index, child);
            if parent == NONE {
                self.root = child;
            }
            up = parent;
        } else if self.node(right).left == NONE {
            self.take_parent(index, right);
            let successor = self.node_mut(right);
            successor.left = left;
            successor.level = level;
            self.node_mut(left).parent = right;
            up = right;
        } else {
            let mut successor = self.node(right).left;
            while self.node(successor).left != NONE {
                successor = self.node(successor).left;
            }
            up = self.node(successor).parent;
            let orphan = self.node(successor).right;
            self.node_mut(up).left = orphan;
            if orphan != NONE {
                self.node_mut(orphan).parent = up;
            }

            self.take_parent(index, successor);
            let node = self.node_mut(successor);
            node.level = level;
            node.left = left;
            node.right = right;
            self.node_mut(left).parent = successor;
            self.node_mut(right).parent = successor;
        }

        let node = self.node_mut(index);
        node.left = NONE;
        node.right = NONE;
        node.parent = NONE;

        if up != NONE {
            self.rebalance(up);
        }
    }

    /// Restore levels and aggregates from `up` to the root after an unlink.
    fn rebalance(&mut self, mut up: NodeIdx) {
        loop {
            self.rereduce(up);
            let (left, right, level) = {
                let node = self.node(up);
                (node.left, node.right, node.level)
            };
            let should_be = kernel::lowered_level(self.level(left), self.level(right));
            if should_be < level {
                self.node_mut(up).level = should_be;
                if right != NONE && should_be < self.node(right).level {
                    self.node_mut(right).level = should_be;
                }
            }

            up = self.skew(up);
            let right = self.node(up).right;
            if right != NONE {
                let right = self.skew(right);
                let right_right = self.node(right).right;
                if right_right != NONE {
                    self.skew(right_right);
                    self.rereduce(right);
                }
            }
            up = self.split(up);
            let right = self.node(up).right;
            if right != NONE {
                self.split(right);
            }
            self.rereduce(up);

            let parent = self.node(up).parent;
            if parent == NONE {
                self.root = up;
                return;
            }
            up = parent;
        }
    }
}

impl<C: Config> fmt::Debug for MutableTree<C>
where
    C::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
