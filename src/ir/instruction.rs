//! Instructions and their operands.

use std::{fmt, sync::Arc};

use crate::ir::{FieldRef, MethodRef, Opcode, TypeRef};

/// A virtual register number.
pub type Reg = u32;

/// Pseudo register holding the result of an invoke or of an instruction
/// followed by `move-result-pseudo*`. Never appears in instructions.
pub const RESULT_REGISTER: Reg = Reg::MAX;

/// Stable identity of an instruction within its method.
///
/// Ids survive every transform that does not remove the instruction, which
/// makes them usable as allocation-site identities and as keys of the edit
/// queue.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InsnId(u32);

impl InsnId {
    /// Placeholder carried by instructions that have not been inserted into a
    /// control-flow graph yet.
    pub const UNASSIGNED: InsnId = InsnId(u32::MAX);

    /// Creates an id from its raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for InsnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::UNASSIGNED {
            f.write_str("#?")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

impl fmt::Display for InsnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A branch target name in linear code.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Label(Arc<str>);

impl Label {
    /// Creates a label; a leading `:` is stripped.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name.strip_prefix(':').unwrap_or(name)))
    }

    /// The label name without the leading `:`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

/// The non-register operand of an instruction.
#[derive(Clone, PartialEq, Debug, Default)]
pub enum Operand {
    /// No operand.
    #[default]
    None,
    /// An integer literal.
    Literal(i64),
    /// A string constant.
    String(Arc<str>),
    /// A field reference.
    Field(FieldRef),
    /// A method reference.
    Method(MethodRef),
    /// A type reference.
    Type(TypeRef),
    /// A branch target. Only present in linear code; inside a control-flow
    /// graph the target is an edge.
    Label(Label),
    /// An array payload.
    ArrayData(Arc<[i64]>),
}

/// A single instruction.
#[derive(Clone, PartialEq, Debug)]
pub struct Instruction {
    /// Stable identity.
    pub id: InsnId,
    /// The opcode.
    pub opcode: Opcode,
    /// The destination register, if the opcode writes one.
    pub dest: Option<Reg>,
    /// Source registers.
    pub srcs: Vec<Reg>,
    /// The non-register operand.
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction without registers or operand.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            id: InsnId::UNASSIGNED,
            opcode,
            dest: None,
            srcs: Vec::new(),
            operand: Operand::None,
        }
    }

    /// Sets the destination register.
    #[must_use]
    pub fn with_dest(mut self, dest: Reg) -> Self {
        self.dest = Some(dest);
        self
    }

    /// Sets the source registers.
    #[must_use]
    pub fn with_srcs(mut self, srcs: impl Into<Vec<Reg>>) -> Self {
        self.srcs = srcs.into();
        self
    }

    /// Sets the operand.
    #[must_use]
    pub fn with_operand(mut self, operand: Operand) -> Self {
        self.operand = operand;
        self
    }

    /// Sets an integer literal operand.
    #[must_use]
    pub fn with_literal(self, literal: i64) -> Self {
        self.with_operand(Operand::Literal(literal))
    }

    /// Returns the `i`-th source register.
    #[must_use]
    pub fn src(&self, i: usize) -> Option<Reg> {
        self.srcs.get(i).copied()
    }

    /// The integer literal operand.
    #[must_use]
    pub fn literal(&self) -> Option<i64> {
        match self.operand {
            Operand::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// The string operand.
    #[must_use]
    pub fn string(&self) -> Option<&Arc<str>> {
        match &self.operand {
            Operand::String(s) => Some(s),
            _ => None,
        }
    }

    /// The field operand.
    #[must_use]
    pub fn field(&self) -> Option<&FieldRef> {
        match &self.operand {
            Operand::Field(f) => Some(f),
            _ => None,
        }
    }

    /// The method operand.
    #[must_use]
    pub fn method(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(m) => Some(m),
            _ => None,
        }
    }

    /// Returns `true` if this instruction writes `reg`, including the upper
    /// half of a wide destination.
    #[must_use]
    pub fn writes(&self, reg: Reg) -> bool {
        match self.dest {
            Some(d) => d == reg || (self.opcode.dest_is_wide() && d.checked_add(1) == Some(reg)),
            None => false,
        }
    }

    /// Returns `true` if two instructions are the same modulo identity.
    #[must_use]
    pub fn same_as(&self, other: &Instruction) -> bool {
        self.opcode == other.opcode
            && self.dest == other.dest
            && self.srcs == other.srcs
            && self.operand == other.operand
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::ir::assembler::insn_to_s_expr(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_accessors() {
        let insn = Instruction::new(Opcode::AddIntLit8)
            .with_dest(1)
            .with_srcs([0])
            .with_literal(41);
        assert_eq!(insn.id, InsnId::UNASSIGNED);
        assert_eq!(insn.literal(), Some(41));
        assert_eq!(insn.src(0), Some(0));
        assert_eq!(insn.src(1), None);
        assert_eq!(insn.to_string(), "(add-int/lit8 v1 v0 41)");
    }

    #[test]
    fn test_wide_writes() {
        let insn = Instruction::new(Opcode::ConstWide).with_dest(4).with_literal(7);
        assert!(insn.writes(4));
        assert!(insn.writes(5));
        assert!(!insn.writes(3));
    }

    #[test]
    fn test_label_strips_colon() {
        assert_eq!(Label::new(":loop").name(), "loop");
        assert_eq!(Label::new("loop").to_string(), ":loop");
    }
}
