//! The value domain of constant propagation.

use std::sync::Arc;

use crate::analysis::dataflow::{
    domains::{SignedConstantDomain, StringDomain},
    lattice::{AbstractDomain, JoinSemiLattice},
};

/// A value held by a register or a field: the disjoint sum of the integer and
/// string constant domains.
///
/// Values are kept normalized: `Signed` and `String` never wrap their
/// domain's own top or bottom, which are lifted to [`ConstantValue::Top`] and
/// [`ConstantValue::Bottom`]. Joining values of different kinds gives top.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstantValue {
    /// No value is possible.
    Bottom,
    /// A known integer.
    Signed(SignedConstantDomain),
    /// A known string literal.
    String(StringDomain),
    /// Unknown.
    Top,
}

impl ConstantValue {
    /// A known integer.
    #[must_use]
    pub const fn int(value: i64) -> Self {
        Self::Signed(SignedConstantDomain::Value(value))
    }

    /// A known string literal.
    #[must_use]
    pub fn string(value: Arc<str>) -> Self {
        Self::String(StringDomain::Value(value))
    }

    /// Lifts an integer domain value, normalizing its extremes.
    #[must_use]
    pub fn from_signed(value: SignedConstantDomain) -> Self {
        match value {
            SignedConstantDomain::Bottom => Self::Bottom,
            SignedConstantDomain::Top => Self::Top,
            known @ SignedConstantDomain::Value(_) => Self::Signed(known),
        }
    }

    /// Lifts a string domain value, normalizing its extremes.
    #[must_use]
    pub fn from_string(value: StringDomain) -> Self {
        match value {
            StringDomain::Bottom => Self::Bottom,
            StringDomain::Top => Self::Top,
            known @ StringDomain::Value(_) => Self::String(known),
        }
    }

    /// The integer, if exactly known.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Signed(v) => v.constant(),
            _ => None,
        }
    }

    /// The string literal, if exactly known.
    #[must_use]
    pub fn as_string(&self) -> Option<&Arc<str>> {
        match self {
            Self::String(s) => s.constant(),
            _ => None,
        }
    }

    /// Returns `true` for an exactly known integer or string.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Signed(_) | Self::String(_))
    }
}

impl JoinSemiLattice for ConstantValue {
    fn bottom() -> Self {
        Self::Bottom
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom)
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bottom, _) | (_, Self::Top) => true,
            (Self::Signed(a), Self::Signed(b)) => a.leq(b),
            (Self::String(a), Self::String(b)) => a.leq(b),
            _ => false,
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Bottom, x) | (x, Self::Bottom) => x.clone(),
            (Self::Signed(a), Self::Signed(b)) => Self::from_signed(a.join(b)),
            (Self::String(a), Self::String(b)) => Self::from_string(a.join(b)),
            _ => Self::Top,
        }
    }
}

impl AbstractDomain for ConstantValue {
    fn top() -> Self {
        Self::Top
    }

    fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Top, x) | (x, Self::Top) => x.clone(),
            (Self::Signed(a), Self::Signed(b)) => Self::from_signed(a.meet(b)),
            (Self::String(a), Self::String(b)) => Self::from_string(a.meet(b)),
            _ => Self::Bottom,
        }
    }
}
