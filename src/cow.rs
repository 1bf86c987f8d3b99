//! Copy-on-write AA-tree kernel.
//!
//! Nodes are shared through [`Arc`] and carry the [`Generation`] of the
//! session that created them. A session may write to a node only if the node
//! carries the session's own tag; any other node is first copied ("unlocked")
//! and the copy is stamped with the session's tag. A node created by an
//! earlier session is therefore never written again, which is what makes
//! published roots immutable, while a session that revisits its own nodes
//! mutates them in place.
//!
//! Every function takes the subtree by value (or by `&mut` link) and hands
//! back the new subtree root. Children are moved out of their parent with
//! `take` before descending so a session-owned node is never aliased while
//! it is being written.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::config::Config;
use crate::id::Generation;
use crate::kernel::{self, NodeRef, LEAF_LEVEL};

/// A node of a persistent or batched tree.
#[derive(Clone, Debug)]
pub struct Node<V, M> {
    pub(crate) value: V,
    pub(crate) mapped: M,
    pub(crate) reduced: M,
    pub(crate) level: u32,
    pub(crate) left: Option<Arc<Node<V, M>>>,
    pub(crate) right: Option<Arc<Node<V, M>>>,
    pub(crate) tag: Generation,
}

pub(crate) type Shared<C> = Arc<Node<<C as Config>::Value, <C as Config>::Mapped>>;
pub(crate) type Link<C> = Option<Shared<C>>;

impl<V, M> Node<V, M> {
    #[inline]
    pub fn value(&self) -> &V {
        return &self.value;
    }

    #[inline]
    pub fn mapped(&self) -> &M {
        return &self.mapped;
    }

    #[inline]
    pub fn reduced(&self) -> &M {
        return &self.reduced;
    }

    #[inline]
    pub fn level(&self) -> u32 {
        return self.level;
    }

    /// Session that created this node.
    #[inline]
    pub fn generation(&self) -> Generation {
        return self.tag;
    }

    pub fn left(&self) -> Option<&Node<V, M>> {
        return self.left.as_deref();
    }

    pub fn right(&self) -> Option<&Node<V, M>> {
        return self.right.as_deref();
    }
}

impl<'a, V, M> NodeRef<'a> for &'a Node<V, M> {
    type Value = V;
    type Mapped = M;

    #[inline]
    fn value(self) -> &'a V {
        return &self.value;
    }

    #[inline]
    fn mapped(self) -> &'a M {
        return &self.mapped;
    }

    #[inline]
    fn reduced(self) -> &'a M {
        return &self.reduced;
    }

    #[inline]
    fn level(self) -> u32 {
        return self.level;
    }

    #[inline]
    fn left(self) -> Option<Self> {
        return self.left.as_deref();
    }

    #[inline]
    fn right(self) -> Option<Self> {
        return self.right.as_deref();
    }
}

/// Write access for one copy-on-write session.
#[derive(Debug)]
pub(crate) struct Txn {
    pub(crate) tag: Generation,
    /// Shared nodes copied into this session so far.
    pub(crate) copies: usize,
}

impl Txn {
    pub(crate) fn new(tag: Generation) -> Txn {
        return Txn { tag, copies: 0 };
    }
}

pub(crate) fn leaf<C: Config>(config: &C, txn: &Txn, value: C::Value) -> Shared<C> {
    let mapped = config.map(&value);
    return Arc::new(Node {
        value,
        reduced: mapped.clone(),
        mapped,
        level: LEAF_LEVEL,
        left: None,
        right: None,
        tag: txn.tag,
    });
}

/// Get write access to `node`, copying it first unless this session owns it.
pub(crate) fn unlock<'n, V: Clone, M: Clone>(
    txn: &mut Txn,
    node: &'n mut Arc<Node<V, M>>,
) -> &'n mut Node<V, M> {
    if node.tag != txn.tag {
        let mut copy = Node::clone(&**node);
        copy.tag = txn.tag;
        *node = Arc::new(copy);
        txn.copies += 1;
    }
    // Only copies if a session-owned node is aliased, which `take` prevents.
    return Arc::make_mut(node);
}

fn rereduce<C: Config>(config: &C, node: &mut Node<C::Value, C::Mapped>) {
    node.reduced = kernel::rereduce(
        config,
        &node.mapped,
        node.left.as_ref().map(|left| &left.reduced),
        node.right.as_ref().map(|right| &right.reduced),
    );
}

fn skews<V, M>(node: Option<&Node<V, M>>) -> bool {
    return node.is_some_and(|node| {
        kernel::needs_skew(node.level, node.left.as_ref().map(|left| left.level))
    });
}

fn splits<V, M>(node: Option<&Node<V, M>>) -> bool {
    return node.is_some_and(|node| {
        let right_right = node.right.as_ref().and_then(|right| right.right.as_ref());
        kernel::needs_split(node.level, right_right.map(|right_right| right_right.level))
    });
}

/// Rotate right if the left child shares this node's level.
pub(crate) fn skew<C>(config: &C, txn: &mut Txn, mut node: Shared<C>) -> Shared<C>
where
    C: Config,
    C::Value: Clone,
{
    if !skews(Some(&*node)) {
        return node;
    }
    let parent = unlock(txn, &mut node);
    let Some(mut left) = parent.left.take() else {
        return node;
    };
    let child = unlock(txn, &mut left);
    parent.left = child.right.take();
    rereduce(config, parent);
    child.right = Some(node);
    rereduce(config, child);
    return left;
}

/// Rotate left and raise the new root if the right spine holds three nodes
/// on this node's level.
pub(crate) fn split<C>(config: &C, txn: &mut Txn, mut node: Shared<C>) -> Shared<C>
where
    C: Config,
    C::Value: Clone,
{
    if !splits(Some(&*node)) {
        return node;
    }
    let parent = unlock(txn, &mut node);
    let Some(mut right) = parent.right.take() else {
        return node;
    };
    let child = unlock(txn, &mut right);
    parent.right = child.left.take();
    rereduce(config, parent);
    child.level += 1;
    child.left = Some(node);
    rereduce(config, child);
    return right;
}

/// Insert `fresh` below `link`. Equal values go right.
pub(crate) fn insert<C>(config: &C, txn: &mut Txn, link: Link<C>, fresh: Shared<C>) -> Shared<C>
where
    C: Config,
    C::Value: Clone,
{
    let Some(mut node) = link else {
        return fresh;
    };
    let parent = unlock(txn, &mut node);
    let ordering = config.compare_mapped(&fresh.value, &parent.value, &fresh.mapped, &parent.mapped);
    if ordering == Ordering::Less {
        let left = parent.left.take();
        parent.left = Some(insert(config, txn, left, fresh));
    } else {
        let right = parent.right.take();
        parent.right = Some(insert(config, txn, right, fresh));
    }
    rereduce(config, parent);
    let node = skew(config, txn, node);
    return split(config, txn, node);
}

/// Remove one node equal to `value` below `link`.
///
/// Returns `false`, leaving the subtree's content untouched, if no node
/// matches.
pub(crate) fn remove<C>(
    config: &C,
    txn: &mut Txn,
    link: &mut Link<C>,
    value: &C::Value,
    mapped: &C::Mapped,
) -> bool
where
    C: Config,
    C::Value: Clone,
{
    let ordering = match link.as_ref() {
        Some(node) => config.compare_mapped(value, &node.value, mapped, &node.mapped),
        None => return false,
    };
    match ordering {
        Ordering::Equal => {
            let Some(mut node) = link.take() else {
                return false;
            };
            if node.left.is_none() || node.right.is_none() {
                let (left, right) = into_children(node);
                *link = left.or(right);
                return true;
            }
            let target = unlock(txn, &mut node);
            if let Some(min) = detach_min(config, txn, &mut target.right) {
                target.value = min.value;
                target.mapped = min.mapped;
            }
            rereduce(config, target);
            *link = Some(rebalance(config, txn, node));
            return true;
        }
        Ordering::Less => {
            let Some(node) = link.as_mut() else {
                return false;
            };
            let parent = unlock(txn, node);
            if !remove(config, txn, &mut parent.left, value, mapped) {
                return false;
            }
            rereduce(config, parent);
        }
        Ordering::Greater => {
            let Some(node) = link.as_mut() else {
                return false;
            };
            let parent = unlock(txn, node);
            if !remove(config, txn, &mut parent.right, value, mapped) {
                return false;
            }
            rereduce(config, parent);
        }
    }
    if let Some(node) = link.take() {
        *link = Some(rebalance(config, txn, node));
    }
    return true;
}

/// Value and aggregate pulled out of the tree by [`detach_min`].
pub(crate) struct Detached<V, M> {
    pub(crate) value: V,
    pub(crate) mapped: M,
}

/// Unlink the leftmost node below `link`, rebalancing on the way back up.
pub(crate) fn detach_min<C>(
    config: &C,
    txn: &mut Txn,
    link: &mut Link<C>,
) -> Option<Detached<C::Value, C::Mapped>>
where
    C: Config,
    C::Value: Clone,
{
    let node = link.as_mut()?;
    if node.left.is_none() {
        let node = link.take()?;
        let (detached, right) = match Arc::try_unwrap(node) {
            Ok(owned) => (
                Detached {
                    value: owned.value,
                    mapped: owned.mapped,
                },
                owned.right,
            ),
            Err(shared) => (
                Detached {
                    value: shared.value.clone(),
                    mapped: shared.mapped.clone(),
                },
                shared.right.clone(),
            ),
        };
        *link = right;
        return Some(detached);
    }
    let parent = unlock(txn, node);
    let detached = detach_min(config, txn, &mut parent.left)?;
    rereduce(config, parent);
    if let Some(node) = link.take() {
        *link = Some(rebalance(config, txn, node));
    }
    return Some(detached);
}

/// Restore the level rules after a deletion below `node`.
pub(crate) fn rebalance<C>(config: &C, txn: &mut Txn, mut node: Shared<C>) -> Shared<C>
where
    C: Config,
    C::Value: Clone,
{
    let should_be = kernel::lowered_level(
        node.left.as_ref().map(|left| left.level),
        node.right.as_ref().map(|right| right.level),
    );
    if should_be >= node.level {
        return node;
    }

    let parent = unlock(txn, &mut node);
    parent.level = should_be;
    if let Some(right) = parent.right.as_mut() {
        if should_be < right.level {
            unlock(txn, right).level = should_be;
        }
    }

    let mut node = skew(config, txn, node);
    if skews(node.right.as_deref()) {
        let parent = unlock(txn, &mut node);
        if let Some(right) = parent.right.take() {
            parent.right = Some(skew(config, txn, right));
        }
    }
    if skews(node.right.as_deref().and_then(|right| right.right.as_deref())) {
        let parent = unlock(txn, &mut node);
        if let Some(right) = parent.right.as_mut() {
            let right = unlock(txn, right);
            if let Some(right_right) = right.right.take() {
                right.right = Some(skew(config, txn, right_right));
            }
            rereduce(config, right);
        }
    }

    let mut node = split(config, txn, node);
    if splits(node.right.as_deref()) {
        let parent = unlock(txn, &mut node);
        if let Some(right) = parent.right.take() {
            parent.right = Some(split(config, txn, right));
        }
    }
    rereduce(config, unlock(txn, &mut node));
    return node;
}

/// Children of a node leaving the tree, moved out when nothing else holds it.
fn into_children<V: Clone, M: Clone>(
    node: Arc<Node<V, M>>,
) -> (Option<Arc<Node<V, M>>>, Option<Arc<Node<V, M>>>) {
    return match Arc::try_unwrap(node) {
        Ok(owned) => (owned.left, owned.right),
        Err(shared) => (shared.left.clone(), shared.right.clone()),
    };
}
