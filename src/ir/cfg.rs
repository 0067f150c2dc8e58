//! Control-flow graphs.
//!
//! A [`ControlFlowGraph`] owns the code of a method as basic blocks joined by
//! typed edges. Unconditional jumps are not instructions inside the graph: a
//! `goto` becomes a [`EdgeKind::Goto`] edge, and a conditional branch keeps a
//! [`EdgeKind::Branch`] edge to its taken target plus a [`EdgeKind::Goto`]
//! edge to its fall-through block.
//!
//! The graph is built from, and flattened back into, linear code made of
//! labels and instructions ([`LinearEntry`]). Every structural change ends
//! with [`ControlFlowGraph::rebuild`], which threads empty blocks, drops
//! unreachable ones, renumbers the rest and validates the result.
//!
//! # Invariants
//!
//! - block 0 is the entry block
//! - `move-result-pseudo*` immediately follows its producer in the same block
//! - `move-result*` immediately follows an invoke
//! - `load-param*` only appears at the start of the entry block
//! - every register is below [`ControlFlowGraph::registers_size`]

use std::collections::{BTreeSet, HashMap};

use crate::{
    ir::{InsnId, Instruction, Label, Opcode, Operand},
    utils::graph::{
        algorithms::{postorder, reverse_postorder},
        GraphBase, NodeId, Predecessors, Successors,
    },
    Result,
};

/// Identifier of a basic block.
pub type BlockId = NodeId;

/// The kind of a control-flow edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Fall-through or unconditional jump.
    Goto,
    /// The taken side of a conditional branch.
    Branch,
}

/// A control-flow edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Block the edge leaves.
    pub source: BlockId,
    /// Block the edge enters.
    pub target: BlockId,
    /// Whether this is the taken side of a branch.
    pub kind: EdgeKind,
}

/// A basic block.
#[derive(Clone, Debug)]
pub struct Block {
    id: BlockId,
    insns: Vec<Instruction>,
    succs: Vec<Edge>,
    preds: Vec<Edge>,
}

impl Block {
    fn new(id: BlockId, insns: Vec<Instruction>) -> Self {
        Self {
            id,
            insns,
            succs: Vec::new(),
            preds: Vec::new(),
        }
    }

    /// The block id.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// The instructions, in execution order.
    #[must_use]
    pub fn insns(&self) -> &[Instruction] {
        &self.insns
    }

    /// Outgoing edges.
    #[must_use]
    pub fn succs(&self) -> &[Edge] {
        &self.succs
    }

    /// Incoming edges.
    #[must_use]
    pub fn preds(&self) -> &[Edge] {
        &self.preds
    }

    /// The conditional branch ending this block, if any.
    #[must_use]
    pub fn branch(&self) -> Option<&Instruction> {
        self.insns
            .last()
            .filter(|insn| insn.opcode.is_conditional_branch())
    }

    /// Target of the outgoing edge of the given kind.
    #[must_use]
    pub fn target(&self, kind: EdgeKind) -> Option<BlockId> {
        self.succs.iter().find(|e| e.kind == kind).map(|e| e.target)
    }

    /// Returns `true` if control leaves the method from this block.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.succs.is_empty()
    }

    pub(crate) fn insns_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.insns
    }
}

/// An entry of linear code.
#[derive(Clone, Debug, PartialEq)]
pub enum LinearEntry {
    /// A branch target.
    Label(Label),
    /// An instruction.
    Insn(Instruction),
}

/// The code of a method as a control-flow graph.
#[derive(Clone, Debug)]
pub struct ControlFlowGraph {
    blocks: Vec<Block>,
    registers_size: u32,
    next_id: u32,
}

impl ControlFlowGraph {
    /// Builds a graph from linear code.
    ///
    /// Instructions without an id receive fresh ones. When `registers_size` is
    /// `None` it is derived from the highest register used.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCode`] for empty code, undefined or
    /// duplicate labels, control falling off the end of the code, or code
    /// that fails validation.
    pub fn from_linear(entries: Vec<LinearEntry>, registers_size: Option<u32>) -> Result<Self> {
        let mut insns = Vec::new();
        let mut labels: HashMap<Label, usize> = HashMap::new();
        for entry in entries {
            match entry {
                LinearEntry::Label(label) => {
                    if labels.insert(label.clone(), insns.len()).is_some() {
                        return Err(invalid_code!("duplicate label {}", label));
                    }
                }
                LinearEntry::Insn(insn) => insns.push(insn),
            }
        }
        if insns.is_empty() {
            return Err(invalid_code!("empty code"));
        }

        let mut next_id = insns
            .iter()
            .filter(|i| i.id != InsnId::UNASSIGNED)
            .map(|i| i.id.raw() + 1)
            .max()
            .unwrap_or(0);
        for insn in &mut insns {
            if insn.id == InsnId::UNASSIGNED {
                insn.id = InsnId::new(next_id);
                next_id += 1;
            }
        }

        let registers_size = registers_size.unwrap_or_else(|| required_registers(&insns));

        let mut leaders = BTreeSet::from([0usize]);
        leaders.extend(labels.values().copied().filter(|&i| i < insns.len()));
        for (i, insn) in insns.iter().enumerate() {
            if insn.opcode.is_terminator() && i + 1 < insns.len() {
                leaders.insert(i + 1);
            }
        }
        let leaders: Vec<usize> = leaders.into_iter().collect();
        let block_of: HashMap<usize, BlockId> = leaders
            .iter()
            .enumerate()
            .map(|(b, &start)| (start, NodeId::new(b)))
            .collect();

        let resolve = |insn: &Instruction| -> Result<BlockId> {
            let Operand::Label(label) = &insn.operand else {
                return Err(invalid_code!("{} without a target label", insn.opcode));
            };
            labels
                .get(label)
                .and_then(|index| block_of.get(index))
                .copied()
                .ok_or_else(|| invalid_code!("undefined or dangling label {}", label))
        };

        let mut blocks = Vec::with_capacity(leaders.len());
        let mut rest = insns;
        for (b, &start) in leaders.iter().enumerate().rev() {
            let tail = rest.split_off(start);
            blocks.push((b, tail));
        }
        blocks.reverse();

        let count = blocks.len();
        let mut built = Vec::with_capacity(count);
        for (b, mut block_insns) in blocks {
            let id = NodeId::new(b);
            let fallthrough = (b + 1 < count).then(|| NodeId::new(b + 1));
            let mut succs = Vec::new();
            let last_op = block_insns.last().map(|i| i.opcode);
            match last_op {
                Some(op) if op.is_goto() => {
                    let goto = block_insns.pop();
                    if let Some(goto) = goto {
                        succs.push(Edge { source: id, target: resolve(&goto)?, kind: EdgeKind::Goto });
                    }
                }
                Some(op) if op.is_conditional_branch() => {
                    if let Some(branch) = block_insns.last_mut() {
                        let target = resolve(&*branch)?;
                        branch.operand = Operand::None;
                        succs.push(Edge { source: id, target, kind: EdgeKind::Branch });
                    }
                    let next = fallthrough
                        .ok_or_else(|| invalid_code!("conditional branch falls off the end"))?;
                    succs.push(Edge { source: id, target: next, kind: EdgeKind::Goto });
                }
                Some(op) if op.is_return() || op.is_throw() => {}
                _ => {
                    let next = fallthrough.ok_or_else(|| invalid_code!("code falls off the end"))?;
                    succs.push(Edge { source: id, target: next, kind: EdgeKind::Goto });
                }
            }
            let mut block = Block::new(id, block_insns);
            block.succs = succs;
            built.push(block);
        }

        let mut cfg = Self {
            blocks: built,
            registers_size,
            next_id,
        };
        cfg.rebuild()?;
        Ok(cfg)
    }

    /// The entry block.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        NodeId::new(0)
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// All blocks in layout order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// A single block.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a block of this graph.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Blocks without successors.
    #[must_use]
    pub fn exit_blocks(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.is_exit())
            .map(Block::id)
            .collect()
    }

    /// Number of virtual registers.
    #[must_use]
    pub const fn registers_size(&self) -> u32 {
        self.registers_size
    }

    /// All instructions in layout order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.blocks.iter().flat_map(|b| b.insns.iter())
    }

    /// Number of instructions.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insns.len()).sum()
    }

    /// The `load-param*` instructions, in parameter order.
    pub fn param_instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.blocks
            .first()
            .into_iter()
            .flat_map(|b| b.insns.iter())
            .take_while(|i| i.opcode.is_load_param())
    }

    /// Blocks reachable from the entry in reverse postorder.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        reverse_postorder(self, self.entry())
    }

    /// Blocks reachable from the entry in postorder.
    #[must_use]
    pub fn postorder(&self) -> Vec<BlockId> {
        postorder(self, self.entry())
    }

    /// Allocates a fresh instruction id.
    pub fn fresh_id(&mut self) -> InsnId {
        let id = InsnId::new(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// Replaces a conditional branch by its `taken` or fall-through side.
    ///
    /// The branch instruction is removed and the surviving edge becomes a
    /// [`EdgeKind::Goto`]. Call [`Self::rebuild`] afterwards.
    pub(crate) fn fold_branch(&mut self, block: BlockId, taken: bool) {
        let block = &mut self.blocks[block.index()];
        if block.branch().is_none() {
            return;
        }
        block.insns.pop();
        let dropped = if taken { EdgeKind::Goto } else { EdgeKind::Branch };
        block.succs.retain(|e| e.kind != dropped);
        for edge in &mut block.succs {
            edge.kind = EdgeKind::Goto;
        }
    }

    /// Normalizes and validates the graph after structural edits.
    ///
    /// Empty blocks with a single successor are threaded, blocks unreachable
    /// from the entry are dropped, the remaining blocks are renumbered with the
    /// entry first and predecessor lists are recomputed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCode`] if the result violates any graph
    /// invariant.
    pub fn rebuild(&mut self) -> Result<()> {
        let count = self.blocks.len();
        if count == 0 {
            return Err(invalid_code!("empty code"));
        }

        let forward: Vec<Option<usize>> = self
            .blocks
            .iter()
            .map(|b| match b.succs.as_slice() {
                [edge] if b.insns.is_empty() => Some(edge.target.index()),
                _ => None,
            })
            .collect();
        let resolve = |start: usize| {
            let mut current = start;
            for _ in 0..count {
                match forward[current] {
                    Some(next) if next != current => current = next,
                    _ => break,
                }
            }
            current
        };
        for block in &mut self.blocks {
            for edge in &mut block.succs {
                edge.target = NodeId::new(resolve(edge.target.index()));
            }
        }
        let entry = resolve(0);

        let mut reachable = vec![false; count];
        let mut stack = vec![entry];
        while let Some(b) = stack.pop() {
            if std::mem::replace(&mut reachable[b], true) {
                continue;
            }
            stack.extend(self.blocks[b].succs.iter().map(|e| e.target.index()));
        }

        let order: Vec<usize> = std::iter::once(entry)
            .chain((0..count).filter(|&b| b != entry && reachable[b]))
            .collect();
        let mut renumber = vec![usize::MAX; count];
        for (new, &old) in order.iter().enumerate() {
            renumber[old] = new;
        }

        let mut old_blocks: Vec<Option<Block>> = std::mem::take(&mut self.blocks)
            .into_iter()
            .map(Some)
            .collect();
        for (new, &old) in order.iter().enumerate() {
            let Some(mut block) = old_blocks[old].take() else {
                continue;
            };
            block.id = NodeId::new(new);
            block.preds.clear();
            for edge in &mut block.succs {
                edge.source = block.id;
                edge.target = NodeId::new(renumber[edge.target.index()]);
            }
            self.blocks.push(block);
        }

        let edges: Vec<Edge> = self
            .blocks
            .iter()
            .flat_map(|b| b.succs.iter().copied())
            .collect();
        for edge in edges {
            self.blocks[edge.target.index()].preds.push(edge);
        }

        self.validate()
    }

    /// Checks every graph invariant.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCode`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        for block in &self.blocks {
            let id = block.id;
            let insns = &block.insns;
            for (i, insn) in insns.iter().enumerate() {
                let op = insn.opcode;
                let is_last = i + 1 == insns.len();
                let prev = i.checked_sub(1).map(|p| insns[p].opcode);

                if op.is_goto() {
                    return Err(invalid_code!("goto {} inside block {}", insn.id, id));
                }
                if op.is_terminator() && !is_last {
                    return Err(invalid_code!("{} {} is not last in block {}", op, insn.id, id));
                }
                if let Some(expected) = op.src_count() {
                    if insn.srcs.len() != expected {
                        return Err(invalid_code!(
                            "{} {} has {} sources, expected {}",
                            op,
                            insn.id,
                            insn.srcs.len(),
                            expected
                        ));
                    }
                }
                if op.has_dest() != insn.dest.is_some() {
                    return Err(invalid_code!("{} {} has a malformed destination", op, insn.id));
                }
                let width = if op.dest_is_wide() { 2 } else { 1 };
                let out_of_range = insn.srcs.iter().any(|&r| r >= self.registers_size)
                    || insn
                        .dest
                        .is_some_and(|d| u64::from(d) + width > u64::from(self.registers_size));
                if out_of_range {
                    return Err(invalid_code!(
                        "{} {} uses a register beyond {}",
                        op,
                        insn.id,
                        self.registers_size
                    ));
                }
                if op.is_move_result_pseudo() && !prev.is_some_and(Opcode::has_move_result_pseudo) {
                    return Err(invalid_code!("{} {} does not follow its producer", op, insn.id));
                }
                if op.has_move_result_pseudo()
                    && !insns
                        .get(i + 1)
                        .is_some_and(|next| next.opcode.is_move_result_pseudo())
                {
                    return Err(invalid_code!("{} {} lacks its move-result-pseudo", op, insn.id));
                }
                if op.is_move_result() && !prev.is_some_and(Opcode::is_invoke) {
                    return Err(invalid_code!("{} {} does not follow an invoke", op, insn.id));
                }
                if op.is_load_param()
                    && (id != self.entry() || !prev.map_or(true, Opcode::is_load_param))
                {
                    return Err(invalid_code!("{} {} is not at method entry", op, insn.id));
                }
            }

            let branches = block.succs.iter().filter(|e| e.kind == EdgeKind::Branch).count();
            let gotos = block.succs.len() - branches;
            let last = insns.last().map(|i| i.opcode);
            let edges_ok = match last {
                Some(op) if op.is_conditional_branch() => branches == 1 && gotos == 1,
                Some(op) if op.is_return() || op.is_throw() => block.succs.is_empty(),
                _ => branches == 0 && gotos == 1,
            };
            if !edges_ok {
                return Err(invalid_code!("block {} has inconsistent successor edges", id));
            }
        }
        Ok(())
    }

    /// Flattens the graph into labels and instructions.
    ///
    /// Blocks keep their layout order. Labels are named `L0`, `L1`, ... in
    /// layout order and are only emitted for blocks that are jumped to; a
    /// `goto` is only emitted when the successor is not the next block.
    #[must_use]
    pub fn linearize(&self) -> Vec<LinearEntry> {
        let count = self.blocks.len();
        let mut needs_label = vec![false; count];
        for block in &self.blocks {
            for edge in &block.succs {
                let falls_through = edge.kind == EdgeKind::Goto
                    && edge.target.index() == block.id.index() + 1;
                if !falls_through {
                    needs_label[edge.target.index()] = true;
                }
            }
        }
        let mut labels = vec![None; count];
        let mut next_label = 0;
        for (b, needed) in needs_label.iter().enumerate() {
            if *needed {
                labels[b] = Some(Label::new(&format!("L{next_label}")));
                next_label += 1;
            }
        }
        let label_of = |target: BlockId| {
            labels[target.index()]
                .clone()
                .unwrap_or_else(|| Label::new("unreachable"))
        };

        let mut entries = Vec::with_capacity(self.instruction_count() + count);
        for block in &self.blocks {
            if let Some(label) = &labels[block.id.index()] {
                entries.push(LinearEntry::Label(label.clone()));
            }
            for insn in &block.insns {
                let mut insn = insn.clone();
                if insn.opcode.is_conditional_branch() {
                    if let Some(target) = block.target(EdgeKind::Branch) {
                        insn.operand = Operand::Label(label_of(target));
                    }
                }
                entries.push(LinearEntry::Insn(insn));
            }
            if let Some(target) = block.target(EdgeKind::Goto) {
                if target.index() != block.id.index() + 1 {
                    let goto = Instruction::new(Opcode::Goto)
                        .with_operand(Operand::Label(label_of(target)));
                    entries.push(LinearEntry::Insn(goto));
                }
            }
        }
        entries
    }
}

/// Smallest register count covering every register used by `insns`.
pub(crate) fn required_registers(insns: &[Instruction]) -> u32 {
    insns
        .iter()
        .flat_map(|insn| {
            let dest_end = insn
                .dest
                .map(|d| d.saturating_add(if insn.opcode.dest_is_wide() { 2 } else { 1 }));
            insn.srcs
                .iter()
                .map(|&r| r.saturating_add(1))
                .chain(dest_end)
        })
        .max()
        .unwrap_or(0)
}

impl GraphBase for ControlFlowGraph {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }
}

impl Successors for ControlFlowGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.blocks[node.index()].succs.iter().map(|e| e.target)
    }
}

impl Predecessors for ControlFlowGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.blocks[node.index()].preds.iter().map(|e| e.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::assembler::code_from_str, Error};

    #[test]
    fn test_diamond_shape() {
        let cfg = code_from_str(
            r#"(
              (load-param v0)
              (if-eqz v0 :zero)
              (const v1 1)
              (goto :join)
              (:zero)
              (const v1 2)
              (:join)
              (return v1)
            )"#,
        )
        .unwrap();

        assert_eq!(cfg.block_count(), 4);
        let entry = cfg.block(cfg.entry());
        assert!(entry.branch().is_some());
        assert_eq!(entry.succs().len(), 2);
        assert_eq!(cfg.exit_blocks().len(), 1);

        let exit = cfg.exit_blocks()[0];
        assert_eq!(cfg.block(exit).preds().len(), 2);
        assert_eq!(cfg.param_instructions().count(), 1);
        assert_eq!(cfg.registers_size(), 2);
    }

    #[test]
    fn test_unreachable_blocks_are_dropped() {
        let cfg = code_from_str(
            r#"(
              (const v0 0)
              (return v0)
              (const v0 1)
              (return v0)
            )"#,
        )
        .unwrap();
        assert_eq!(cfg.block_count(), 1);
        assert_eq!(cfg.instruction_count(), 2);
    }

    #[test]
    fn test_goto_chains_are_threaded() {
        let cfg = code_from_str(
            r#"(
              (goto :a)
              (:b)
              (return-void)
              (:a)
              (goto :b)
            )"#,
        )
        .unwrap();
        assert_eq!(cfg.block_count(), 1);
        assert_eq!(cfg.block(cfg.entry()).insns()[0].opcode, Opcode::ReturnVoid);
    }

    #[test]
    fn test_invalid_code_is_rejected() {
        let falls_off = code_from_str("((const v0 0))");
        assert!(matches!(falls_off, Err(Error::InvalidCode(_))));

        let undefined = code_from_str("((goto :nowhere))");
        assert!(matches!(undefined, Err(Error::InvalidCode(_))));

        let orphan_pseudo = code_from_str("((move-result-pseudo v0) (return-void))");
        assert!(matches!(orphan_pseudo, Err(Error::InvalidCode(_))));

        let missing_pseudo = code_from_str(r#"((sget "LFoo;.bar:I") (return-void))"#);
        assert!(matches!(missing_pseudo, Err(Error::InvalidCode(_))));

        let late_param = code_from_str("((const v0 0) (load-param v1) (return-void))");
        assert!(matches!(late_param, Err(Error::InvalidCode(_))));
    }

    #[test]
    fn test_fold_branch_and_rebuild() {
        let mut cfg = code_from_str(
            r#"(
              (const v0 0)
              (if-eqz v0 :zero)
              (const v1 1)
              (return v1)
              (:zero)
              (const v1 2)
              (return v1)
            )"#,
        )
        .unwrap();
        assert_eq!(cfg.block_count(), 3);

        cfg.fold_branch(cfg.entry(), true);
        cfg.rebuild().unwrap();

        assert_eq!(cfg.block_count(), 2);
        let entry = cfg.block(cfg.entry());
        assert!(entry.branch().is_none());
        let next = entry.target(EdgeKind::Goto).unwrap();
        assert_eq!(cfg.block(next).insns()[0].literal(), Some(2));
    }

    #[test]
    fn test_linearize_loop() {
        let cfg = code_from_str(
            r#"(
              (const v0 0)
              (:loop)
              (add-int/lit8 v0 v0 1)
              (if-nez v0 :loop)
              (return v0)
            )"#,
        )
        .unwrap();
        let labels: Vec<_> = cfg
            .linearize()
            .into_iter()
            .filter_map(|e| match e {
                LinearEntry::Label(l) => Some(l.name().to_string()),
                LinearEntry::Insn(_) => None,
            })
            .collect();
        assert_eq!(labels, vec!["L0"]);
        assert_eq!(cfg.reverse_postorder().len(), cfg.block_count());
    }
}
