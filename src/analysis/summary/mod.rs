//! Interprocedural side-effect summaries.
//!
//! A [`Summary`] records what calling a method may do: the [`Effects`] it
//! has and which of its parameters it writes through. Summaries are computed
//! bottom-up over the call graph by the [`SummaryDriver`], so that a method's
//! summary includes the effects of every callee that is statically known.
//!
//! # Recursion
//!
//! A call that closes a cycle sees no summary for its callee and is treated
//! as an unknown invoke; the whole cycle therefore ends up with
//! [`Effects::UNKNOWN_INVOKE`].
//!
//! # Serialized Form
//!
//! ```text
//! ("<effect bits as decimal>" (<modified parameter index>...))
//! ```
//!
//! For example `("5" (0 2))` throws, writes escaping memory and modifies
//! parameters 0 and 2. The [`cache`] module stores many of them in a file.

mod builder;
pub mod cache;
mod driver;

use std::{collections::BTreeSet, fmt};

use dashmap::DashMap;

use crate::{
    analysis::{
        callgraph::{CallGraph, CallType},
        dataflow::{Effects, JoinSemiLattice},
    },
    ir::{Instruction, MethodRef},
    utils::SExpr,
    Error, Result,
};

pub use builder::SummaryBuilder;
pub use driver::SummaryDriver;

/// The side effects of calling a method.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Effect flags.
    pub effects: Effects,
    /// Indices of parameters written through; the receiver is parameter 0
    /// of instance methods.
    pub modified_params: BTreeSet<u32>,
}

impl Summary {
    /// Creates a summary.
    #[must_use]
    pub fn new(effects: Effects, modified_params: impl IntoIterator<Item = u32>) -> Self {
        Self {
            effects,
            modified_params: modified_params.into_iter().collect(),
        }
    }

    /// Returns `true` if calling the method has no observable effect.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.effects.is_empty() && self.modified_params.is_empty()
    }

    /// Returns `true` if the callee can neither publish nor store away any
    /// of its arguments, given `arg_count` arguments.
    ///
    /// With at most one argument, writing through it cannot make it
    /// reachable from anything else.
    #[must_use]
    pub fn retains_args(&self, arg_count: usize) -> bool {
        !self
            .effects
            .intersects(Effects::WRITE_MAY_ESCAPE | Effects::UNKNOWN_INVOKE)
            && (self.modified_params.is_empty() || arg_count <= 1)
    }

    /// Serializes to `("<effects>" (<index>...))`.
    #[must_use]
    pub fn to_s_expr(&self) -> SExpr {
        SExpr::List(vec![
            SExpr::string(self.effects.bits().to_string()),
            SExpr::List(
                self.modified_params
                    .iter()
                    .map(|&i| SExpr::Int(i64::from(i)))
                    .collect(),
            ),
        ])
    }

    /// Deserializes a summary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptSummaryCache`] if the expression is not a
    /// two-element list, the effects are not a decimal string of known
    /// flags, or a parameter index is not a non-negative integer.
    pub fn from_s_expr(expr: &SExpr) -> Result<Self> {
        let corrupt = |reason: String| Error::CorruptSummaryCache(reason);

        let [effects, params] = expr
            .as_list()
            .ok_or_else(|| corrupt(format!("expected a list, got {expr}")))?
        else {
            return Err(corrupt(format!("expected two elements in {expr}")));
        };

        let text = effects
            .as_str()
            .ok_or_else(|| corrupt(format!("effects must be a string in {expr}")))?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(corrupt(format!("effects '{text}' are not decimal")));
        }
        let bits: u32 = text
            .parse()
            .map_err(|_| corrupt(format!("effects '{text}' out of range")))?;
        let effects =
            Effects::from_bits(bits).ok_or_else(|| corrupt(format!("unknown effect bits in {bits}")))?;

        let modified_params = params
            .as_list()
            .ok_or_else(|| corrupt(format!("parameters must be a list in {expr}")))?
            .iter()
            .map(|index| {
                index
                    .as_int()
                    .and_then(|i| u32::try_from(i).ok())
                    .ok_or_else(|| corrupt(format!("bad parameter index {index}")))
            })
            .collect::<Result<BTreeSet<u32>>>()?;

        Ok(Self {
            effects,
            modified_params,
        })
    }
}

impl JoinSemiLattice for Summary {
    fn bottom() -> Self {
        Self::default()
    }

    fn is_bottom(&self) -> bool {
        self.is_pure()
    }

    fn leq(&self, other: &Self) -> bool {
        self.effects.leq(&other.effects) && self.modified_params.is_subset(&other.modified_params)
    }

    fn join(&self, other: &Self) -> Self {
        Self {
            effects: self.effects | other.effects,
            modified_params: self
                .modified_params
                .union(&other.modified_params)
                .copied()
                .collect(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_s_expr())
    }
}

/// Published summaries, keyed by method.
///
/// Entries are written once and never changed afterwards.
pub type SummaryMap = DashMap<MethodRef, Summary>;

/// A summary map holding the bootstrap entry for the root constructor,
/// which only initializes its receiver.
#[must_use]
pub fn seeded_summaries() -> SummaryMap {
    let summaries = SummaryMap::new();
    summaries.insert(MethodRef::object_init(), Summary::new(Effects::empty(), [0]));
    summaries
}

/// The summary of the method an invoke certainly calls, if it has one.
///
/// Direct and static calls to methods outside the program are looked up by
/// their declared reference, so seeded entries apply to them.
pub(crate) fn callee_summary(
    call_graph: &CallGraph,
    caller: &MethodRef,
    insn: &Instruction,
    summaries: &SummaryMap,
) -> Option<Summary> {
    let call_type = CallType::from_opcode(insn.opcode)?;
    let target = match (call_graph.callee_at(caller, insn.id), call_type) {
        (Some(target), _) => target,
        (None, CallType::Static | CallType::Direct) => insn.method()?,
        (None, _) => return None,
    };
    summaries.get(target).map(|summary| summary.clone())
}
