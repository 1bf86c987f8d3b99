//! Range selection over any engine.
//!
//! A [`Probe`] classifies a value against a contiguous subrange of the sorted
//! sequence: [`Ordering::Less`] when the value lies below the range (the
//! search continues to the right), [`Ordering::Greater`] when it lies above
//! (continue left), [`Ordering::Equal`] when it is inside. A [`Selection`]
//! uses the probe to find the range's edges, to iterate it lazily and to
//! reduce it without visiting subtrees that lie wholly inside or outside.

use std::cmp::Ordering;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};

use smallvec::SmallVec;

use crate::config::Config;
use crate::kernel::{self, NodeRef};

/// Three-way classifier of values against a subrange.
pub trait Probe<V: ?Sized> {
    fn probe(&self, value: &V) -> Ordering;
}

impl<V: ?Sized, F> Probe<V> for F
where
    F: Fn(&V) -> Ordering,
{
    #[inline]
    fn probe(&self, value: &V) -> Ordering {
        return self(value);
    }
}

/// Selects every value.
#[derive(Clone, Copy, Debug, Default)]
pub struct All;

impl<V: ?Sized> Probe<V> for All {
    #[inline]
    fn probe(&self, _value: &V) -> Ordering {
        return Ordering::Equal;
    }
}

/// Selects the values inside a standard range, ordered by [`Ord`].
///
/// ```
/// use treeducer::{Bounds, FnConfig, MutableTree};
///
/// let mut tree = MutableTree::new(FnConfig::ordered(|v: &u32| *v, |a: &u32, b: &u32| a + b));
/// for value in 0..10 {
///     tree.insert(value);
/// }
/// assert_eq!(tree.select(Bounds(3..6)).reduce(), Some(12));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Bounds<R>(pub R);

impl<V: Ord, R: RangeBounds<V>> Probe<V> for Bounds<R> {
    fn probe(&self, value: &V) -> Ordering {
        let below = match self.0.start_bound() {
            Bound::Included(start) => value < start,
            Bound::Excluded(start) => value <= start,
            Bound::Unbounded => false,
        };
        if below {
            return Ordering::Less;
        }
        let above = match self.0.end_bound() {
            Bound::Included(end) => value > end,
            Bound::Excluded(end) => value >= end,
            Bound::Unbounded => false,
        };
        if above {
            return Ordering::Greater;
        }
        return Ordering::Equal;
    }
}

/// Everything strictly below the lower edge of another probe's range.
#[derive(Debug)]
pub struct Before<'p, P: ?Sized>(&'p P);

impl<V: ?Sized, P: Probe<V> + ?Sized> Probe<V> for Before<'_, P> {
    fn probe(&self, value: &V) -> Ordering {
        return match self.0.probe(value) {
            Ordering::Less => Ordering::Equal,
            _ => Ordering::Greater,
        };
    }
}

/// Everything strictly above the upper edge of another probe's range.
#[derive(Debug)]
pub struct After<'p, P: ?Sized>(&'p P);

impl<V: ?Sized, P: Probe<V> + ?Sized> Probe<V> for After<'_, P> {
    fn probe(&self, value: &V) -> Ordering {
        return match self.0.probe(value) {
            Ordering::Greater => Ordering::Equal,
            _ => Ordering::Less,
        };
    }
}

/// A contiguous subrange of a tree, evaluated lazily.
///
/// `all_left` records that nothing in the tree lies below the range and
/// `all_right` that nothing lies above it, so a subtree reached with both
/// flags set is wholly inside and its stored aggregate is used as is.
pub struct Selection<'a, C, N, P> {
    config: &'a C,
    root: Option<N>,
    probe: P,
    all_left: bool,
    all_right: bool,
}

impl<'a, C, N, P> Selection<'a, C, N, P>
where
    C: Config,
    N: NodeRef<'a, Value = C::Value, Mapped = C::Mapped>,
    P: Probe<C::Value>,
{
    pub(crate) fn new(config: &'a C, root: Option<N>, probe: P) -> Self {
        return Selection {
            config,
            root,
            probe,
            all_left: false,
            all_right: false,
        };
    }

    pub fn probe(&self) -> &P {
        return &self.probe;
    }

    /// Smallest value in range.
    pub fn first(&self) -> Option<&'a C::Value> {
        return self.edge(true);
    }

    /// Largest value in range.
    pub fn last(&self) -> Option<&'a C::Value> {
        return self.edge(false);
    }

    fn edge(&self, first: bool) -> Option<&'a C::Value> {
        let mut current = self.root;
        let mut found = None;
        while let Some(node) = current {
            match self.probe.probe(node.value()) {
                Ordering::Greater => current = node.left(),
                Ordering::Less => current = node.right(),
                Ordering::Equal => {
                    found = Some(node.value());
                    current = if first { node.left() } else { node.right() };
                }
            }
        }
        return found;
    }

    /// Everything below this selection.
    pub fn before(&self) -> Selection<'a, C, N, Before<'_, P>> {
        return Selection {
            config: self.config,
            root: self.root,
            probe: Before(&self.probe),
            all_left: true,
            all_right: false,
        };
    }

    /// Everything above this selection.
    pub fn after(&self) -> Selection<'a, C, N, After<'_, P>> {
        return Selection {
            config: self.config,
            root: self.root,
            probe: After(&self.probe),
            all_left: false,
            all_right: true,
        };
    }

    /// In-order iterator over the values in range.
    pub fn iter(&self) -> Iter<'a, '_, N, P> {
        return Iter::new(self.root, &self.probe, self.all_left, self.all_right);
    }

    pub fn for_each<F: FnMut(&'a C::Value)>(&self, mut func: F) {
        for value in self.iter() {
            func(value);
        }
    }

    /// Aggregate of the values in range, `None` if the range is empty.
    pub fn reduce(&self) -> Option<C::Mapped> {
        let root = self.root?;
        return reduce_node(self.config, &self.probe, root, self.all_left, self.all_right);
    }
}

/// Select a whole tree.
pub(crate) fn everything<'a, C, N>(config: &'a C, root: Option<N>) -> Selection<'a, C, N, All> {
    return Selection {
        config,
        root,
        probe: All,
        all_left: true,
        all_right: true,
    };
}

impl<'a, 's, C, N, P> IntoIterator for &'s Selection<'a, C, N, P>
where
    C: Config,
    N: NodeRef<'a, Value = C::Value, Mapped = C::Mapped>,
    P: Probe<C::Value>,
{
    type Item = &'a C::Value;
    type IntoIter = Iter<'a, 's, N, P>;

    fn into_iter(self) -> Self::IntoIter {
        return self.iter();
    }
}

fn reduce_node<'a, C, N, P>(
    config: &C,
    probe: &P,
    node: N,
    all_left: bool,
    all_right: bool,
) -> Option<C::Mapped>
where
    C: Config,
    N: NodeRef<'a, Value = C::Value, Mapped = C::Mapped>,
    C::Value: 'a,
    C::Mapped: 'a,
    P: Probe<C::Value> + ?Sized,
{
    if all_left && all_right {
        return Some(node.reduced().clone());
    }
    let ordering = probe.probe(node.value());
    let inside = ordering == Ordering::Equal;
    let mut reduced = inside.then(|| node.mapped().clone());
    if ordering != Ordering::Less {
        if let Some(left) = node.left() {
            let partial = reduce_node(config, probe, left, all_left, inside);
            reduced = kernel::merge(config, reduced, partial);
        }
    }
    if ordering != Ordering::Greater {
        if let Some(right) = node.right() {
            let partial = reduce_node(config, probe, right, inside, all_right);
            reduced = kernel::merge(config, reduced, partial);
        }
    }
    return reduced;
}

/// Lazy in-order walk over the values a probe accepts.
///
/// Pending ancestors sit on an explicit stack together with the `all_right`
/// flag their right subtree is entered with.
pub struct Iter<'a, 'p, N, P: ?Sized> {
    probe: &'p P,
    current: Option<N>,
    stack: SmallVec<[(N, bool); 32]>,
    all_left: bool,
    all_right: bool,
    _values: PhantomData<&'a ()>,
}

impl<'a, 'p, N, P: ?Sized> Iter<'a, 'p, N, P>
where
    N: NodeRef<'a>,
    P: Probe<N::Value>,
{
    pub(crate) fn new(root: Option<N>, probe: &'p P, all_left: bool, all_right: bool) -> Self {
        return Iter {
            probe,
            current: root,
            stack: SmallVec::new(),
            all_left,
            all_right,
            _values: PhantomData,
        };
    }
}

impl<'a, 'p, N, P: ?Sized> Iterator for Iter<'a, 'p, N, P>
where
    N: NodeRef<'a>,
    P: Probe<N::Value>,
{
    type Item = &'a N::Value;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.current {
            let ordering = if self.all_left && self.all_right {
                Ordering::Equal
            } else {
                self.probe.probe(node.value())
            };
            match ordering {
                Ordering::Greater => self.current = node.left(),
                Ordering::Less => self.current = node.right(),
                Ordering::Equal => match node.left() {
                    Some(left) => {
                        self.stack.push((node, self.all_right));
                        self.current = Some(left);
                        self.all_right = true;
                    }
                    None => {
                        self.current = node.right();
                        self.all_left = true;
                        return Some(node.value());
                    }
                },
            }
        }
        let (node, all_right) = self.stack.pop()?;
        self.all_left = true;
        self.all_right = all_right;
        self.current = node.right();
        return Some(node.value());
    }
}
