//! Flat lattice of signed integer constants.

use crate::analysis::dataflow::lattice::{AbstractDomain, JoinSemiLattice};

/// A signed integer that is either unknown, exactly known, or impossible.
///
/// Narrow and wide values share the domain; 32-bit results are kept
/// sign-extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignedConstantDomain {
    /// No value is possible.
    Bottom,
    /// Exactly this value.
    Value(i64),
    /// Any value.
    Top,
}

impl SignedConstantDomain {
    /// The constant, if exactly known.
    #[must_use]
    pub const fn constant(self) -> Option<i64> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl JoinSemiLattice for SignedConstantDomain {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom)
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bottom, _) | (_, Self::Top) => true,
            (Self::Value(a), Self::Value(b)) => a == b,
            _ => false,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Bottom, x) | (x, Self::Bottom) => *x,
            (Self::Value(a), Self::Value(b)) if a == b => *self,
            _ => Self::Top,
        }
    }
}

impl AbstractDomain for SignedConstantDomain {
    fn top() -> Self {
        Self::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Top, x) | (x, Self::Top) => *x,
            (Self::Value(a), Self::Value(b)) if a == b => *self,
            _ => Self::Bottom,
        }
    }
}
