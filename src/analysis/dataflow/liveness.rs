//! Live register analysis.
//!
//! A register is *live* at a program point if some path from that point reads
//! it before writing it. This is a backward analysis:
//!
//! - `OUT[B]` = ∪{IN[S] | S is a successor of B}
//! - `IN[B]` = USE[B] ∪ (OUT[B] - DEF[B])
//!
//! The state of a block that cannot reach any exit stays bottom, which is
//! distinct from "nothing live".

use crate::{
    analysis::dataflow::{
        framework::{Direction, Transfer},
        lattice::JoinSemiLattice,
        solver::MonotonicFixpointIterator,
    },
    ir::{ControlFlowGraph, Instruction, Opcode, Reg},
    utils::BitSet,
};

/// The set of live registers, or bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRegisters(Option<BitSet>);

impl LiveRegisters {
    /// No register live.
    #[must_use]
    pub fn empty() -> Self {
        Self(Some(BitSet::new()))
    }

    /// Returns `true` if `reg` is live.
    #[must_use]
    pub fn is_live(&self, reg: Reg) -> bool {
        self.0.as_ref().is_some_and(|set| set.contains(reg as usize))
    }

    /// Live registers in ascending order.
    pub fn registers(&self) -> impl Iterator<Item = Reg> + '_ {
        self.0
            .iter()
            .flat_map(BitSet::iter)
            .filter_map(|r| Reg::try_from(r).ok())
    }
}

impl JoinSemiLattice for LiveRegisters {
    fn bottom() -> Self {
        Self(None)
    }

    fn is_bottom(&self) -> bool {
        self.0.is_none()
    }

    fn leq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, _) => true,
            (_, None) => false,
            (Some(a), Some(b)) => a.is_subset(b),
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (None, _) => other.clone(),
            (_, None) => self.clone(),
            (Some(a), Some(b)) => {
                let mut set = a.clone();
                set.union_with(b);
                Self(Some(set))
            }
        }
    }
}

/// Calls `f` for every register `insn` reads, including the upper halves of
/// register pairs.
pub fn for_each_use(insn: &Instruction, mut f: impl FnMut(Reg)) {
    let param_offset = usize::from(insn.opcode != Opcode::InvokeStatic);
    for (i, &reg) in insn.srcs.iter().enumerate() {
        f(reg);
        let wide = if insn.opcode.is_invoke() {
            i.checked_sub(param_offset)
                .and_then(|p| insn.method().and_then(|m| m.params().get(p)))
                .is_some_and(|ty| ty.is_wide())
        } else {
            insn.opcode.src_is_wide(i)
        };
        if wide {
            f(reg.saturating_add(1));
        }
    }
}

/// Backward transfer for liveness.
#[derive(Debug, Default, Clone, Copy)]
pub struct LivenessTransfer;

impl Transfer for LivenessTransfer {
    type Domain = LiveRegisters;
    const DIRECTION: Direction = Direction::Backward;

    fn analyze_instruction(&self, insn: &Instruction, state: &mut LiveRegisters) {
        let Some(live) = &mut state.0 else {
            return;
        };
        if let Some(dest) = insn.dest {
            live.remove(dest as usize);
            if insn.opcode.dest_is_wide() {
                live.remove(dest as usize + 1);
            }
        }
        for_each_use(insn, |reg| {
            live.insert(reg as usize);
        });
    }
}

/// Runs liveness over `cfg`.
///
/// Use [`MonotonicFixpointIterator::replay`] to get the registers live after
/// each instruction.
#[must_use]
pub fn analyze(cfg: &ControlFlowGraph) -> MonotonicFixpointIterator<'_, LivenessTransfer> {
    let mut iterator = MonotonicFixpointIterator::new(cfg, LivenessTransfer);
    iterator.run(LiveRegisters::empty());
    iterator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::assembler::code_from_str;

    #[test]
    fn test_live_across_branch() {
        let cfg = code_from_str(
            r#"(
              (load-param v0)
              (const v1 1)
              (const v2 2)
              (if-eqz v0 :other)
              (return v1)
              (:other)
              (return v0)
            )"#,
        )
        .unwrap();
        let liveness = analyze(&cfg);

        // Backward: the entry block's exit state is the live-in set
        let live_in = liveness.exit_state_at(cfg.entry());
        assert!(!live_in.is_live(0));

        let live_out = liveness.entry_state_at(cfg.entry());
        assert!(live_out.is_live(0));
        assert!(live_out.is_live(1));
        assert!(!live_out.is_live(2));
    }

    #[test]
    fn test_replay_reports_live_after() {
        let cfg = code_from_str(
            r#"(
              (const-wide v0 1)
              (const v2 7)
              (return-wide v0)
            )"#,
        )
        .unwrap();
        let liveness = analyze(&cfg);
        let mut dead = Vec::new();
        liveness.replay(cfg.entry(), |insn, live_after| {
            if let Some(dest) = insn.dest {
                if !live_after.is_live(dest) {
                    dead.push(dest);
                }
            }
        });
        assert_eq!(dead, vec![2]);
        assert_eq!(liveness.exit_state_at(cfg.entry()).registers().count(), 0);
    }

    #[test]
    fn test_infinite_loop_stays_bottom() {
        let cfg = code_from_str(
            r#"(
              (const v0 0)
              (:spin)
              (add-int/lit8 v0 v0 1)
              (goto :spin)
            )"#,
        )
        .unwrap();
        let liveness = analyze(&cfg);
        assert!(liveness.entry_state_at(cfg.entry()).is_bottom());
    }
}
