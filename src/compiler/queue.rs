//! Deferred code edits.
//!
//! Transforms read analysis results that refer to the code as it was
//! analyzed, so they never edit it directly. Instead they queue their
//! decisions, keyed by the [`InsnId`] of the instruction concerned, and
//! commit them all at once when reading is done.
//!
//! # Example
//!
//! ```rust
//! use optscope::compiler::EditQueue;
//! use optscope::ir::{assembler, Instruction, Opcode};
//!
//! let mut code = assembler::code_from_str(r#"(
//!     (const v0 1)
//!     (move v1 v0)
//!     (return v1)
//! )"#)?;
//! let mv = code.instructions().find(|i| i.opcode == Opcode::Move).unwrap().id;
//!
//! let mut queue = EditQueue::new();
//! queue.replace(mv, vec![Instruction::new(Opcode::Const).with_dest(1).with_literal(1)]);
//! queue.commit(&mut code)?;
//!
//! assert_eq!(
//!     assembler::to_s_expr(&code).to_string(),
//!     "((const v0 1) (const v1 1) (return v1))"
//! );
//! # Ok::<(), optscope::Error>(())
//! ```

use std::collections::BTreeMap;

use crate::{
    ir::{BlockId, ControlFlowGraph, InsnId, Instruction},
    Result,
};

/// A queued decision about one instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace the instruction by zero or more instructions.
    Replace(Vec<Instruction>),
    /// Remove the instruction.
    Delete,
    /// Replace a conditional branch by a `goto` to one of its successors:
    /// the branch target if `taken`, the fall-through otherwise.
    FoldBranch {
        /// Which side of the branch survives.
        taken: bool,
    },
}

/// Edits waiting to be applied to one method body.
///
/// Only the last edit queued for an instruction is kept.
#[derive(Debug, Clone, Default)]
pub struct EditQueue {
    edits: BTreeMap<InsnId, Edit>,
}

impl EditQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the replacement of `insn` by `replacement`.
    ///
    /// The replacement instructions get fresh ids on commit.
    pub fn replace(&mut self, insn: InsnId, replacement: Vec<Instruction>) {
        self.edits.insert(insn, Edit::Replace(replacement));
    }

    /// Queues the removal of `insn`.
    pub fn delete(&mut self, insn: InsnId) {
        self.edits.insert(insn, Edit::Delete);
    }

    /// Queues folding the conditional branch `insn`.
    pub fn fold_branch(&mut self, insn: InsnId, taken: bool) {
        self.edits.insert(insn, Edit::FoldBranch { taken });
    }

    /// The edit queued for `insn`.
    #[must_use]
    pub fn get(&self, insn: InsnId) -> Option<&Edit> {
        self.edits.get(&insn)
    }

    /// Number of queued edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Applies every queued edit to `cfg` in one pass over its instructions,
    /// then rebuilds the graph.
    ///
    /// A branch fold queued for an instruction that is not the conditional
    /// branch ending its block is ignored. Committing an empty queue leaves
    /// the code untouched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCode`] if the edited code fails
    /// validation.
    pub fn commit(mut self, cfg: &mut ControlFlowGraph) -> Result<()> {
        if self.edits.is_empty() {
            return Ok(());
        }

        for edit in self.edits.values_mut() {
            if let Edit::Replace(insns) = edit {
                for insn in insns {
                    insn.id = cfg.fresh_id();
                }
            }
        }

        let mut folds: Vec<(BlockId, bool)> = Vec::new();
        for block in cfg.blocks_mut() {
            let id = block.id();
            let branch = block.branch().map(|b| b.id);
            let old = std::mem::take(block.insns_mut());
            let mut new = Vec::with_capacity(old.len());
            for insn in old {
                match self.edits.remove(&insn.id) {
                    None => new.push(insn),
                    Some(Edit::Delete) => {}
                    Some(Edit::Replace(replacement)) => new.extend(replacement),
                    Some(Edit::FoldBranch { taken }) => {
                        if branch == Some(insn.id) {
                            folds.push((id, taken));
                        }
                        new.push(insn);
                    }
                }
            }
            *block.insns_mut() = new;
        }

        for (block, taken) in folds {
            cfg.fold_branch(block, taken);
        }
        cfg.rebuild()
    }
}
