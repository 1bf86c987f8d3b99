//! Balance and aggregation rules shared by every engine.
//!
//! The engines differ only in how they own their nodes: the mutable engine
//! links arena slots by index, the persistent and batched engines link
//! reference-counted nodes. The AA-tree level rules, the aggregate fold and
//! the read-only navigation used by searches, selections and the invariant
//! checker live here and are written once.
//!
//! AA-tree rules, for a node at level `L`:
//! - a leaf has level 1;
//! - the left child has level `L - 1`;
//! - the right child has level `L` or `L - 1`;
//! - the right grandchild (right of right) has a level below `L`;
//! - a node above level 1 has two children.

use std::cmp::Ordering;

use crate::config::Config;
use crate::error::Violation;

/// Level of a freshly inserted node.
pub const LEAF_LEVEL: u32 = 1;

/// Read-only view of one node, independent of how nodes are owned.
pub trait NodeRef<'a>: Copy {
    type Value: 'a;
    type Mapped: 'a;

    fn value(self) -> &'a Self::Value;
    fn mapped(self) -> &'a Self::Mapped;
    /// Aggregate of the whole subtree rooted here.
    fn reduced(self) -> &'a Self::Mapped;
    fn level(self) -> u32;
    fn left(self) -> Option<Self>;
    fn right(self) -> Option<Self>;
}

/// Level after a deletion below a node, given its children's levels.
#[inline]
pub(crate) fn lowered_level(left: Option<u32>, right: Option<u32>) -> u32 {
    return left.unwrap_or(0).min(right.unwrap_or(0)) + 1;
}

/// A left child on the same level is a horizontal left link.
#[inline]
pub(crate) fn needs_skew(level: u32, left: Option<u32>) -> bool {
    return left == Some(level);
}

/// Three nodes in a row on one level along the right spine.
#[inline]
pub(crate) fn needs_split(level: u32, right_right: Option<u32>) -> bool {
    return right_right == Some(level);
}

/// Recompute a subtree aggregate: `mapped`, then left, then right.
pub(crate) fn rereduce<C: Config>(
    config: &C,
    mapped: &C::Mapped,
    left: Option<&C::Mapped>,
    right: Option<&C::Mapped>,
) -> C::Mapped {
    let mut reduced = match left {
        Some(left) => config.reduce(mapped, left),
        None => mapped.clone(),
    };
    if let Some(right) = right {
        reduced = config.reduce(&reduced, right);
    }
    return reduced;
}

/// Append a partial aggregate to an accumulated one.
pub(crate) fn merge<C: Config>(
    config: &C,
    acc: Option<C::Mapped>,
    next: Option<C::Mapped>,
) -> Option<C::Mapped> {
    match (acc, next) {
        (Some(acc), Some(next)) => Some(config.reduce(&acc, &next)),
        (acc, None) => acc,
        (None, next) => next,
    }
}

/// Find some node comparing equal to `value`.
pub(crate) fn find<'a, C, N>(
    config: &C,
    root: Option<N>,
    value: &C::Value,
    mapped: &C::Mapped,
) -> Option<N>
where
    C: Config,
    N: NodeRef<'a, Value = C::Value, Mapped = C::Mapped>,
    C::Value: 'a,
    C::Mapped: 'a,
{
    let mut current = root;
    while let Some(node) = current {
        match config.compare_mapped(value, node.value(), mapped, node.mapped()) {
            Ordering::Less => current = node.left(),
            Ordering::Greater => current = node.right(),
            Ordering::Equal => return Some(node),
        }
    }
    return None;
}

/// Leftmost node.
pub(crate) fn min<'a, N: NodeRef<'a>>(root: Option<N>) -> Option<N> {
    let mut node = root?;
    while let Some(left) = node.left() {
        node = left;
    }
    return Some(node);
}

/// Rightmost node.
pub(crate) fn max<'a, N: NodeRef<'a>>(root: Option<N>) -> Option<N> {
    let mut node = root?;
    while let Some(right) = node.right() {
        node = right;
    }
    return Some(node);
}

/// Verify ordering, level and aggregate invariants of a whole tree.
/// Returns the number of nodes.
pub fn check<'a, C, N>(config: &C, root: Option<N>) -> Result<usize, Violation>
where
    C: Config,
    C::Mapped: PartialEq,
    N: NodeRef<'a, Value = C::Value, Mapped = C::Mapped>,
    C::Value: 'a,
    C::Mapped: 'a,
{
    let mut previous = None;
    return match root {
        Some(root) => check_node(config, root, &mut previous),
        None => Ok(0),
    };
}

fn check_node<'a, C, N>(config: &C, node: N, previous: &mut Option<N>) -> Result<usize, Violation>
where
    C: Config,
    C::Mapped: PartialEq,
    N: NodeRef<'a, Value = C::Value, Mapped = C::Mapped>,
    C::Value: 'a,
    C::Mapped: 'a,
{
    let level = node.level();
    let left = node.left();
    let right = node.right();

    if left.is_none() && right.is_none() && level != LEAF_LEVEL {
        return Err(Violation::LeafLevel);
    }
    let left_level = left.map_or(0, |left| left.level());
    if left_level == level {
        return Err(Violation::LeftHorizontal);
    }
    if left_level + 1 != level {
        return Err(Violation::LeftLevel);
    }
    let right_level = right.map_or(0, |right| right.level());
    if right_level > level || right_level + 1 < level {
        return Err(Violation::RightLevel);
    }
    if let Some(right_right) = right.and_then(|right| right.right()) {
        if right_right.level() >= level {
            return Err(Violation::RightGrandchild);
        }
    }

    let expected = rereduce(
        config,
        node.mapped(),
        left.map(|left| left.reduced()),
        right.map(|right| right.reduced()),
    );
    if expected != *node.reduced() {
        return Err(Violation::Aggregate);
    }

    let mut count = 1;
    if let Some(left) = left {
        count += check_node(config, left, previous)?;
    }
    if let Some(before) = *previous {
        let ordering = config.compare_mapped(before.value(), node.value(), before.mapped(), node.mapped());
        if ordering == Ordering::Greater {
            return Err(Violation::Order);
        }
    }
    *previous = Some(node);
    if let Some(right) = right {
        count += check_node(config, right, previous)?;
    }
    return Ok(count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FnConfig;

    fn sum() -> impl Config<Value = i64, Mapped = i64> {
        return FnConfig::ordered(|v: &i64| *v, |a: &i64, b: &i64| a + b);
    }

    #[test]
    fn lowered_level_counts_missing_children_as_zero() {
        assert_eq!(lowered_level(None, None), 1);
        assert_eq!(lowered_level(Some(2), None), 1);
        assert_eq!(lowered_level(Some(2), Some(3)), 3);
    }

    #[test]
    fn skew_and_split_predicates() {
        assert!(needs_skew(2, Some(2)));
        assert!(!needs_skew(2, Some(1)));
        assert!(!needs_skew(1, None));
        assert!(needs_split(1, Some(1)));
        assert!(!needs_split(2, Some(1)));
    }

    #[test]
    fn rereduce_folds_self_left_right() {
        let concat = FnConfig::ordered(
            |v: &char| v.to_string(),
            |a: &String, b: &String| format!("{a}{b}"),
        );
        let mapped = "n".to_string();
        let left = "l".to_string();
        let right = "r".to_string();
        assert_eq!(rereduce(&concat, &mapped, Some(&left), Some(&right)), "nlr");
        assert_eq!(rereduce(&concat, &mapped, None, Some(&right)), "nr");
        assert_eq!(rereduce(&concat, &mapped, None, None), "n");
    }

    #[test]
    fn merge_skips_missing_parts() {
        let config = sum();
        assert_eq!(merge(&config, None, None), None);
        assert_eq!(merge(&config, Some(2), None), Some(2));
        assert_eq!(merge(&config, None, Some(3)), Some(3));
        assert_eq!(merge(&config, Some(2), Some(3)), Some(5));
    }
}
