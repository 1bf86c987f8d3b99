//! Caller-supplied callbacks that drive a tree.
//!
//! Every engine is parameterized by a [`Config`]: a total order over values,
//! a mapping from a value to its aggregate, and an associative reducer that
//! folds two aggregates together. The engines treat these as pure functions.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// The comparator, mapper and reducer for one family of trees.
pub trait Config {
    /// The values stored in the tree.
    type Value;
    /// The aggregate computed per value and folded per subtree.
    type Mapped: Clone;

    /// Total order over values. Equal values are kept, later ones to the right.
    fn compare(&self, a: &Self::Value, b: &Self::Value) -> Ordering;

    /// Ordering that may also inspect the already-mapped aggregates.
    ///
    /// The engines always call this variant; the default ignores the
    /// aggregates and defers to [`Config::compare`].
    fn compare_mapped(
        &self,
        a: &Self::Value,
        b: &Self::Value,
        _a_mapped: &Self::Mapped,
        _b_mapped: &Self::Mapped,
    ) -> Ordering {
        return self.compare(a, b);
    }

    /// Map a single value to its aggregate.
    fn map(&self, value: &Self::Value) -> Self::Mapped;

    /// Combine two aggregates. Must be associative; the combination order is
    /// always `reduce(reduce(node, left), right)`.
    fn reduce(&self, a: &Self::Mapped, b: &Self::Mapped) -> Self::Mapped;
}

/// A [`Config`] assembled from three closures.
///
/// ```
/// use treeducer::{FnConfig, PersistentTree};
///
/// let config = FnConfig::ordered(|v: &i64| *v, |a: &i64, b: &i64| a + b);
/// let tree = PersistentTree::new(config).insert(1).insert(2).insert(3);
/// assert_eq!(tree.reduce(), Some(&6));
/// ```
pub struct FnConfig<V, M, Cmp, Map, Red> {
    compare: Cmp,
    map: Map,
    reduce: Red,
    _types: PhantomData<fn(&V) -> M>,
}

impl<V, M, Cmp, Map, Red> FnConfig<V, M, Cmp, Map, Red>
where
    Cmp: Fn(&V, &V) -> Ordering,
    Map: Fn(&V) -> M,
    Red: Fn(&M, &M) -> M,
{
    pub fn new(compare: Cmp, map: Map, reduce: Red) -> Self {
        return FnConfig {
            compare,
            map,
            reduce,
            _types: PhantomData,
        };
    }
}

impl<V: Ord, M, Map, Red> FnConfig<V, M, fn(&V, &V) -> Ordering, Map, Red>
where
    Map: Fn(&V) -> M,
    Red: Fn(&M, &M) -> M,
{
    /// Order values by their [`Ord`] implementation.
    pub fn ordered(map: Map, reduce: Red) -> Self {
        return FnConfig::new(<V as Ord>::cmp as fn(&V, &V) -> Ordering, map, reduce);
    }
}

impl<V, M, Cmp, Map, Red> Config for FnConfig<V, M, Cmp, Map, Red>
where
    M: Clone,
    Cmp: Fn(&V, &V) -> Ordering,
    Map: Fn(&V) -> M,
    Red: Fn(&M, &M) -> M,
{
    type Value = V;
    type Mapped = M;

    fn compare(&self, a: &V, b: &V) -> Ordering {
        return (self.compare)(a, b);
    }

    fn map(&self, value: &V) -> M {
        return (self.map)(value);
    }

    fn reduce(&self, a: &M, b: &M) -> M {
        return (self.reduce)(a, b);
    }
}

impl<V, M, Cmp, Map, Red> fmt::Debug for FnConfig<V, M, Cmp, Map, Red> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConfig").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_uses_ord() {
        let config = FnConfig::ordered(|v: &u32| *v as u64, |a: &u64, b: &u64| a + b);
        assert_eq!(config.compare(&1, &2), Ordering::Less);
        assert_eq!(config.compare(&2, &2), Ordering::Equal);
        assert_eq!(config.compare_mapped(&3, &2, &3, &2), Ordering::Greater);
        assert_eq!(config.map(&7), 7);
        assert_eq!(config.reduce(&7, &8), 15);
    }

    #[test]
    fn custom_comparator_is_used() {
        let config = FnConfig::new(
            |a: &i32, b: &i32| b.cmp(a),
            |v: &i32| vec![*v],
            |a: &Vec<i32>, b: &Vec<i32>| a.iter().chain(b).copied().collect(),
        );
        assert_eq!(config.compare(&1, &2), Ordering::Greater);
        assert_eq!(config.reduce(&vec![1], &vec![2, 3]), vec![1, 2, 3]);
    }
}
