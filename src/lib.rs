//! Treeducer - balanced search trees that keep a running aggregate.
//!
//! A tree holds a sorted multiset of values and, at every node, the fold of
//! a caller-supplied `map` then `reduce` over that node's subtree. Inserts,
//! deletes and updates are O(log n), and so is the aggregate of any
//! contiguous range.
//!
//! Three engines share one balancing kernel:
//! - [`MutableTree`]: mutated in place, hands out stable [`Handle`]s.
//! - [`PersistentTree`]: every mutation returns a new tree sharing the
//!   untouched subtrees with the old one.
//! - [`Batch`]: a copy-on-write session over a persistent tree that copies
//!   each shared node at most once.
//!
//! [`IdentityTree`] adds per-entry identity on top of the persistent engine,
//! so equal values can be told apart.
//!
//! # Quick Start
//!
//! ```
//! use treeducer::{Bounds, FnConfig, PersistentTree};
//!
//! // Sum of values, ordered by `Ord`.
//! let config = FnConfig::ordered(|v: &u64| *v, |a: &u64, b: &u64| a + b);
//! let tree = PersistentTree::new(config).with_batch(|batch| {
//!     for value in 0..1024 {
//!         batch.insert(value);
//!     }
//! });
//!
//! assert_eq!(tree.reduce(), Some(&523776));
//! assert_eq!(tree.select(Bounds(50..=100)).reduce(), Some(3825));
//!
//! let smaller = tree.delete(&0).delete(&1);
//! assert_eq!(smaller.first(), Some(&2));
//! assert_eq!(tree.first(), Some(&0));
//! ```

pub mod batch;
pub mod config;
mod cow;
pub mod error;
pub mod id;
pub mod identity;
pub mod kernel;
pub mod mutable;
pub mod persistent;
pub mod select;

pub use batch::Batch;
pub use config::{Config, FnConfig};
pub use cow::Node;
pub use error::{Error, Violation};
pub use id::{Generation, TreeId};
pub use identity::{ByValue, Entry, IdentityHandle, IdentityTree, Seq, Stamped};
pub use kernel::NodeRef;
pub use mutable::{Handle, MutableTree, SlotRef};
pub use persistent::PersistentTree;
pub use select::{After, All, Before, Bounds, Iter, Probe, Selection};
