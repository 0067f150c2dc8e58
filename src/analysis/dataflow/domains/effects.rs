//! Side-effect flags.

use bitflags::bitflags;

use crate::analysis::dataflow::lattice::{AbstractDomain, JoinSemiLattice};

bitflags! {
    /// Observable side effects of a method.
    ///
    /// The numeric values are part of the serialized summary format.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Effects: u32 {
        /// May throw explicitly.
        const THROWS = 1;
        /// Enters or exits a monitor.
        const LOCKS = 1 << 1;
        /// Writes a static field, or heap memory reachable from outside.
        const WRITE_MAY_ESCAPE = 1 << 2;
        /// Calls something without a summary.
        const UNKNOWN_INVOKE = 1 << 3;
        /// Flagged as not to be optimized.
        const NO_OPTIMIZE = 1 << 4;
    }
}

impl JoinSemiLattice for Effects {
    fn bottom() -> Self {
        Self::empty()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        other.contains(*self)
    }

    fn join(&self, other: &Self) -> Self {
        *self | *other
    }
}

impl AbstractDomain for Effects {
    fn top() -> Self {
        Self::all()
    }

    fn is_top(&self) -> bool {
        self.is_all()
    }

    fn meet(&self, other: &Self) -> Self {
        *self & *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert_eq!(Effects::THROWS.bits(), 1);
        assert_eq!(Effects::LOCKS.bits(), 2);
        assert_eq!(Effects::WRITE_MAY_ESCAPE.bits(), 4);
        assert_eq!(Effects::UNKNOWN_INVOKE.bits(), 8);
        assert_eq!(Effects::NO_OPTIMIZE.bits(), 16);
        assert_eq!(Effects::all().bits(), 31);
    }

    #[test]
    fn test_union_order() {
        let a = Effects::THROWS;
        let b = Effects::LOCKS;
        assert_eq!(a.join(&b), Effects::THROWS | Effects::LOCKS);
        assert!(a.leq(&a.join(&b)));
        assert!(Effects::bottom().leq(&a));
        assert!(!b.leq(&a));
    }
}
