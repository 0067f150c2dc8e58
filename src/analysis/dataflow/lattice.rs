//! Lattice traits for abstract interpretation.
//!
//! Abstract values form a join semi-lattice: the fixpoint iterator starts every
//! block at bottom (unreachable) and only ever moves states up by joining.
//! Domains that also have a greatest element and a meet implement
//! [`AbstractDomain`].
//!
//! # Laws
//!
//! For all `a`, `b`, `c` of a domain:
//!
//! - `a.join(&bottom) == a`
//! - `a.join(&b) == b.join(&a)`
//! - `a.join(&b.join(&c)) == a.join(&b).join(&c)`
//! - `a.join(&a) == a`
//! - `a.leq(&a.join(&b))`
//! - `a.leq(&a.widen(&b))` and `b.leq(&a.widen(&b))`

use std::fmt::Debug;

/// A join semi-lattice with a least element.
///
/// # Examples
///
/// ```rust
/// use optscope::analysis::dataflow::{JoinSemiLattice, SignedConstantDomain};
///
/// let one = SignedConstantDomain::Value(1);
/// let two = SignedConstantDomain::Value(2);
/// assert_eq!(one.join(&SignedConstantDomain::bottom()), one);
/// assert!(one.join(&two).leq(&SignedConstantDomain::Top));
/// ```
pub trait JoinSemiLattice: Clone + Debug + PartialEq {
    /// The least element; for states it means "unreachable".
    fn bottom() -> Self;

    /// Returns `true` if this is the least element.
    fn is_bottom(&self) -> bool;

    /// The partial order.
    fn leq(&self, other: &Self) -> bool;

    /// Least upper bound.
    #[must_use]
    fn join(&self, other: &Self) -> Self;

    /// Widening of `self` (the previous value) by `other` (the new value).
    ///
    /// Must be an upper bound of both and guarantee that every increasing
    /// chain `x0, x0.widen(x1), ...` stabilizes. Finite-height domains can
    /// keep the default.
    #[must_use]
    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }

    /// Joins `other` into `self`, returning `true` if `self` changed.
    fn join_with(&mut self, other: &Self) -> bool {
        let joined = self.join(other);
        if joined == *self {
            false
        } else {
            *self = joined;
            true
        }
    }
}

/// A complete abstract domain: a join semi-lattice that also has a greatest
/// element (no information) and a meet.
pub trait AbstractDomain: JoinSemiLattice {
    /// The greatest element.
    fn top() -> Self;

    /// Returns `true` if this is the greatest element.
    fn is_top(&self) -> bool;

    /// Greatest lower bound.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;
}
