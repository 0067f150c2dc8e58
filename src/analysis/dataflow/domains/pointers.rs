//! Sets of allocation sites.

use std::collections::BTreeSet;

use crate::{
    analysis::dataflow::lattice::{AbstractDomain, JoinSemiLattice},
    ir::InsnId,
};

/// The allocation sites a register may point to.
///
/// Sites are identified by the instruction that creates the object
/// (`new-instance`, `new-array`) or receives it (`load-param-object`). The
/// empty set describes registers that hold no tracked pointer; top describes
/// pointers of unknown origin.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PointerSet {
    /// Unreachable.
    Bottom,
    /// One of these sites.
    Sites(BTreeSet<InsnId>),
    /// Anything.
    Top,
}

impl PointerSet {
    /// A single site.
    #[must_use]
    pub fn site(id: InsnId) -> Self {
        Self::Sites(BTreeSet::from([id]))
    }

    /// No tracked pointer.
    #[must_use]
    pub fn empty() -> Self {
        Self::Sites(BTreeSet::new())
    }

    /// The sites, unless this is top or bottom.
    #[must_use]
    pub fn sites(&self) -> Option<&BTreeSet<InsnId>> {
        match self {
            Self::Sites(sites) => Some(sites),
            _ => None,
        }
    }
}

impl JoinSemiLattice for PointerSet {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom)
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bottom, _) | (_, Self::Top) => true,
            (Self::Sites(a), Self::Sites(b)) => a.is_subset(b),
            _ => false,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Bottom, x) | (x, Self::Bottom) => x.clone(),
            (Self::Sites(a), Self::Sites(b)) => Self::Sites(a.union(b).copied().collect()),
            _ => Self::Top,
        }
    }
}

impl AbstractDomain for PointerSet {
    fn top() -> Self {
        Self::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Top, x) | (x, Self::Top) => x.clone(),
            (Self::Sites(a), Self::Sites(b)) => Self::Sites(a.intersection(b).copied().collect()),
            _ => Self::Bottom,
        }
    }
}
