//! Error types.

/// Errors surfaced by handle-scoped operations and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The handle was issued by a different tree.
    #[error("handle was issued by a different tree")]
    ForeignHandle,

    /// A live entry could not be found where its stamped key says it must be.
    /// The comparator is not a stable total order.
    #[error("comparator is inconsistent: {operation} could not relocate a live entry")]
    Inconsistent {
        /// The operation that failed to relocate its entry.
        operation: &'static str,
    },

    /// A structural invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(#[from] Violation),
}

/// A broken structural invariant, reported by the `check` diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("in-order sequence is not sorted")]
    Order,
    #[error("leaf is not at level 1")]
    LeafLevel,
    #[error("left child shares its parent's level")]
    LeftHorizontal,
    #[error("left child is not exactly one level below its parent")]
    LeftLevel,
    #[error("right child is more than one level below its parent")]
    RightLevel,
    #[error("right grandchild shares its grandparent's level")]
    RightGrandchild,
    #[error("stored aggregate does not match its children")]
    Aggregate,
    #[error("parent link does not point back to the parent")]
    ParentLink,
}
