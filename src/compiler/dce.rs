//! Local dead code elimination.

use std::collections::HashSet;

use log::debug;

use crate::{
    analysis::dataflow::{liveness, JoinSemiLattice, LiveRegisters},
    compiler::EditQueue,
    ir::{ControlFlowGraph, InsnId, Instruction, Opcode},
    Result,
};

/// Upper bound on removal rounds; each round can only expose the producers
/// of the instructions removed by the previous one.
const MAX_ROUNDS: usize = 16;

/// Removes side-effect-free instructions whose results are never read.
///
/// Removal is repeated until nothing changes, so chains of dead values
/// disappear entirely. A `const-string` goes together with its
/// `move-result-pseudo-object`. Methods containing a block from which no
/// exit is reachable are left alone: liveness has no facts for such blocks.
///
/// # Example
///
/// ```rust
/// use optscope::compiler::LocalDce;
/// use optscope::ir::assembler;
///
/// let mut code = assembler::code_from_str(r#"(
///     (const v0 1)
///     (add-int/lit8 v1 v0 2)
///     (const v2 3)
///     (return v2)
/// )"#)?;
/// assert_eq!(LocalDce::new().run(&mut code)?, 2);
/// assert_eq!(assembler::to_s_expr(&code).to_string(), "((const v2 3) (return v2))");
/// # Ok::<(), optscope::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDce;

impl LocalDce {
    /// Creates the eliminator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Removes dead instructions from `cfg`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCode`] if the result fails validation.
    pub fn run(&self, cfg: &mut ControlFlowGraph) -> Result<usize> {
        let mut removed = 0;
        for _ in 0..MAX_ROUNDS {
            let dead = Self::dead_instructions(cfg);
            if dead.is_empty() {
                break;
            }
            removed += dead.len();
            let mut queue = EditQueue::new();
            for id in dead {
                queue.delete(id);
            }
            queue.commit(cfg)?;
        }
        if removed > 0 {
            debug!("local dce removed {} instructions", removed);
        }
        Ok(removed)
    }

    fn dead_instructions(cfg: &ControlFlowGraph) -> Vec<InsnId> {
        let iterator = liveness::analyze(cfg);
        if cfg
            .blocks()
            .iter()
            .any(|b| iterator.entry_state_at(b.id()).is_bottom())
        {
            return Vec::new();
        }

        // Instructions whose destination is not live right after them
        let mut unused: HashSet<InsnId> = HashSet::new();
        for block in cfg.blocks() {
            iterator.replay(block.id(), |insn, live_after| {
                if writes_only_dead(insn, live_after) {
                    unused.insert(insn.id);
                }
            });
        }

        let mut dead = Vec::new();
        for block in cfg.blocks() {
            let insns = block.insns();
            for (i, insn) in insns.iter().enumerate() {
                let op = insn.opcode;
                if op == Opcode::ConstString {
                    let pseudo = insns.get(i + 1).filter(|next| unused.contains(&next.id));
                    if let Some(pseudo) = pseudo {
                        dead.push(insn.id);
                        dead.push(pseudo.id);
                    }
                } else if op == Opcode::Nop || (op.is_pure() && unused.contains(&insn.id)) {
                    dead.push(insn.id);
                }
            }
        }
        dead
    }
}

fn writes_only_dead(insn: &Instruction, live_after: &LiveRegisters) -> bool {
    let Some(dest) = insn.dest else {
        return false;
    };
    let upper_live = insn.opcode.dest_is_wide() && live_after.is_live(dest.saturating_add(1));
    !live_after.is_live(dest) && !upper_live
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::assembler::{code_from_str, to_s_expr};

    fn canonical(code: &str) -> String {
        to_s_expr(&code_from_str(code).unwrap()).to_string()
    }

    #[test]
    fn test_chains_are_removed() {
        let mut cfg = code_from_str(
            r#"(
              (load-param v0)
              (const v1 1)
              (add-int v2 v1 v0)
              (mul-int/lit8 v3 v2 2)
              (const-string "unused")
              (move-result-pseudo-object v4)
              (return v0)
            )"#,
        )
        .unwrap();
        assert_eq!(LocalDce::new().run(&mut cfg).unwrap(), 5);
        assert_eq!(
            to_s_expr(&cfg).to_string(),
            canonical("((load-param v0) (return v0))")
        );
    }

    #[test]
    fn test_side_effects_are_kept() {
        let code = r#"(
          (load-param v0)
          (const v1 0)
          (div-int v2 v0 v1)
          (sget "LFoo;.x:I")
          (move-result-pseudo v3)
          (invoke-static () "LFoo;.f:()I")
          (move-result v4)
          (return-void)
        )"#;
        let mut cfg = code_from_str(code).unwrap();
        assert_eq!(LocalDce::new().run(&mut cfg).unwrap(), 0);
        assert_eq!(to_s_expr(&cfg).to_string(), canonical(code));
    }

    #[test]
    fn test_wide_halves() {
        let mut cfg = code_from_str(
            r#"(
              (const-wide v0 7)
              (const-wide v2 8)
              (return-wide v0)
            )"#,
        )
        .unwrap();
        assert_eq!(LocalDce::new().run(&mut cfg).unwrap(), 1);
        assert_eq!(
            to_s_expr(&cfg).to_string(),
            canonical("((const-wide v0 7) (return-wide v0))")
        );
    }

    #[test]
    fn test_infinite_loop_is_skipped() {
        let code = r#"(
          (load-param v0)
          (const v1 5)
          (if-eqz v0 :spin)
          (return-void)
          (:spin)
          (add-int/lit8 v1 v1 1)
          (goto :spin)
        )"#;
        let mut cfg = code_from_str(code).unwrap();
        assert_eq!(LocalDce::new().run(&mut cfg).unwrap(), 0);
        assert_eq!(to_s_expr(&cfg).to_string(), canonical(code));
    }
}
