//! Flat lattice of string constants.

use std::sync::Arc;

use crate::analysis::dataflow::lattice::{AbstractDomain, JoinSemiLattice};

/// A string reference that is either unknown, a known literal, or impossible.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StringDomain {
    /// No value is possible.
    Bottom,
    /// Exactly this literal.
    Value(Arc<str>),
    /// Any string.
    Top,
}

impl StringDomain {
    /// The literal, if exactly known.
    #[must_use]
    pub fn constant(&self) -> Option<&Arc<str>> {
        match self {
            Self::Value(s) => Some(s),
            _ => None,
        }
    }
}

impl JoinSemiLattice for StringDomain {
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
            (Self::Bottom, x) | (x, Self::Bottom) => x.clone(),
            (Self::Value(a), Self::Value(b)) if a == b => self.clone(),
            _ => Self::Top,
        }
    }
}

impl AbstractDomain for StringDomain {
    fn top() -> Self {
        Self::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Top, x) | (x, Self::Top) => x.clone(),
            (Self::Value(a), Self::Value(b)) if a == b => self.clone(),
            _ => Self::Bottom,
        }
    }
}
