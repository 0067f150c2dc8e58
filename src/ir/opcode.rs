//! Opcodes and their category predicates.
//!
//! Mnemonics follow the Dalvik naming scheme (`move-result-pseudo-object`,
//! `add-int/lit8`, ...). Analyses never match on individual opcodes when a
//! category predicate exists, so new opcodes only need to be classified here.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// What kind of operand an opcode carries besides its registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Registers only.
    None,
    /// An integer literal.
    Literal,
    /// A string constant.
    String,
    /// A field reference.
    Field,
    /// A method reference.
    Method,
    /// A type reference.
    Type,
    /// A branch target.
    Label,
    /// An array payload.
    ArrayData,
}

/// An instruction opcode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
#[allow(missing_docs)]
pub enum Opcode {
    Nop,

    LoadParam,
    LoadParamWide,
    LoadParamObject,

    Const,
    ConstWide,
    ConstString,

    Move,
    MoveWide,
    MoveObject,
    MoveResult,
    MoveResultWide,
    MoveResultObject,
    MoveResultPseudo,
    MoveResultPseudoWide,
    MoveResultPseudoObject,

    ReturnVoid,
    Return,
    ReturnWide,
    ReturnObject,
    Throw,
    MonitorEnter,
    MonitorExit,

    Goto,
    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfEqz,
    IfNez,
    IfLtz,
    IfGez,
    IfGtz,
    IfLez,

    Sget,
    SgetWide,
    SgetObject,
    SgetBoolean,
    Sput,
    SputWide,
    SputObject,
    SputBoolean,
    Iget,
    IgetWide,
    IgetObject,
    IgetBoolean,
    Iput,
    IputWide,
    IputObject,
    IputBoolean,
    Aget,
    AgetWide,
    AgetObject,
    Aput,
    AputWide,
    AputObject,
    FillArrayData,

    NewInstance,
    NewArray,
    CheckCast,
    ArrayLength,

    NegInt,
    NotInt,
    NegLong,
    IntToLong,
    LongToInt,

    AddInt,
    SubInt,
    MulInt,
    DivInt,
    RemInt,
    AndInt,
    OrInt,
    XorInt,
    ShlInt,
    ShrInt,
    UshrInt,
    AddLong,
    SubLong,
    MulLong,
    AndLong,
    OrLong,
    XorLong,
    CmpLong,

    #[strum(to_string = "add-int/lit8")]
    AddIntLit8,
    #[strum(to_string = "add-int/lit16")]
    AddIntLit16,
    #[strum(to_string = "mul-int/lit8")]
    MulIntLit8,
    #[strum(to_string = "mul-int/lit16")]
    MulIntLit16,
    #[strum(to_string = "div-int/lit8")]
    DivIntLit8,
    #[strum(to_string = "div-int/lit16")]
    DivIntLit16,
    #[strum(to_string = "rem-int/lit8")]
    RemIntLit8,
    #[strum(to_string = "rem-int/lit16")]
    RemIntLit16,
    #[strum(to_string = "and-int/lit8")]
    AndIntLit8,
    #[strum(to_string = "and-int/lit16")]
    AndIntLit16,
    #[strum(to_string = "or-int/lit8")]
    OrIntLit8,
    #[strum(to_string = "or-int/lit16")]
    OrIntLit16,
    #[strum(to_string = "xor-int/lit8")]
    XorIntLit8,
    #[strum(to_string = "xor-int/lit16")]
    XorIntLit16,
    #[strum(to_string = "shl-int/lit8")]
    ShlIntLit8,
    #[strum(to_string = "shr-int/lit8")]
    ShrIntLit8,
    #[strum(to_string = "ushr-int/lit8")]
    UshrIntLit8,

    InvokeStatic,
    InvokeDirect,
    InvokeVirtual,
    InvokeSuper,
    InvokeInterface,
}

impl Opcode {
    /// `load-param*` pseudo instructions at method entry.
    #[must_use]
    pub const fn is_load_param(self) -> bool {
        matches!(self, Self::LoadParam | Self::LoadParamWide | Self::LoadParamObject)
    }

    /// Instructions that load a constant.
    #[must_use]
    pub const fn is_const(self) -> bool {
        matches!(self, Self::Const | Self::ConstWide | Self::ConstString)
    }

    /// Register-to-register moves.
    #[must_use]
    pub const fn is_move(self) -> bool {
        matches!(self, Self::Move | Self::MoveWide | Self::MoveObject)
    }

    /// `move-result*` following an invoke.
    #[must_use]
    pub const fn is_move_result(self) -> bool {
        matches!(
            self,
            Self::MoveResult | Self::MoveResultWide | Self::MoveResultObject
        )
    }

    /// `move-result-pseudo*` following an instruction whose result lives in the
    /// result register.
    #[must_use]
    pub const fn is_move_result_pseudo(self) -> bool {
        matches!(
            self,
            Self::MoveResultPseudo | Self::MoveResultPseudoWide | Self::MoveResultPseudoObject
        )
    }

    /// Instructions whose result must be picked up by a `move-result-pseudo*`.
    #[must_use]
    pub const fn has_move_result_pseudo(self) -> bool {
        self.is_sget()
            || self.is_iget()
            || self.is_aget()
            || matches!(
                self,
                Self::ConstString
                    | Self::NewInstance
                    | Self::NewArray
                    | Self::CheckCast
                    | Self::ArrayLength
            )
    }

    /// Method returns.
    #[must_use]
    pub const fn is_return(self) -> bool {
        matches!(
            self,
            Self::ReturnVoid | Self::Return | Self::ReturnWide | Self::ReturnObject
        )
    }

    /// `throw`.
    #[must_use]
    pub const fn is_throw(self) -> bool {
        matches!(self, Self::Throw)
    }

    /// `monitor-enter` and `monitor-exit`.
    #[must_use]
    pub const fn is_monitor(self) -> bool {
        matches!(self, Self::MonitorEnter | Self::MonitorExit)
    }

    /// Unconditional jump.
    #[must_use]
    pub const fn is_goto(self) -> bool {
        matches!(self, Self::Goto)
    }

    /// Two-register conditional branches.
    #[must_use]
    pub const fn is_if_test(self) -> bool {
        matches!(
            self,
            Self::IfEq | Self::IfNe | Self::IfLt | Self::IfGe | Self::IfGt | Self::IfLe
        )
    }

    /// Compare-against-zero conditional branches.
    #[must_use]
    pub const fn is_if_testz(self) -> bool {
        matches!(
            self,
            Self::IfEqz | Self::IfNez | Self::IfLtz | Self::IfGez | Self::IfGtz | Self::IfLez
        )
    }

    /// Any conditional branch.
    #[must_use]
    pub const fn is_conditional_branch(self) -> bool {
        self.is_if_test() || self.is_if_testz()
    }

    /// Instructions that end a basic block.
    #[must_use]
    pub const fn is_terminator(self) -> bool {
        self.is_return() || self.is_throw() || self.is_goto() || self.is_conditional_branch()
    }

    /// Static field reads.
    #[must_use]
    pub const fn is_sget(self) -> bool {
        matches!(
            self,
            Self::Sget | Self::SgetWide | Self::SgetObject | Self::SgetBoolean
        )
    }

    /// Static field writes.
    #[must_use]
    pub const fn is_sput(self) -> bool {
        matches!(
            self,
            Self::Sput | Self::SputWide | Self::SputObject | Self::SputBoolean
        )
    }

    /// Instance field reads.
    #[must_use]
    pub const fn is_iget(self) -> bool {
        matches!(
            self,
            Self::Iget | Self::IgetWide | Self::IgetObject | Self::IgetBoolean
        )
    }

    /// Instance field writes.
    #[must_use]
    pub const fn is_iput(self) -> bool {
        matches!(
            self,
            Self::Iput | Self::IputWide | Self::IputObject | Self::IputBoolean
        )
    }

    /// Array element reads.
    #[must_use]
    pub const fn is_aget(self) -> bool {
        matches!(self, Self::Aget | Self::AgetWide | Self::AgetObject)
    }

    /// Array element writes.
    #[must_use]
    pub const fn is_aput(self) -> bool {
        matches!(self, Self::Aput | Self::AputWide | Self::AputObject)
    }

    /// Writes into a heap object reachable through a register: `iput*`,
    /// `aput*` and `fill-array-data`.
    #[must_use]
    pub const fn is_heap_write(self) -> bool {
        self.is_iput() || self.is_aput() || matches!(self, Self::FillArrayData)
    }

    /// Index of the source register holding the object written by a heap
    /// write.
    #[must_use]
    pub const fn heap_write_base(self) -> Option<usize> {
        if self.is_iput() || self.is_aput() {
            Some(1)
        } else if matches!(self, Self::FillArrayData) {
            Some(0)
        } else {
            None
        }
    }

    /// Method invocations.
    #[must_use]
    pub const fn is_invoke(self) -> bool {
        matches!(
            self,
            Self::InvokeStatic
                | Self::InvokeDirect
                | Self::InvokeVirtual
                | Self::InvokeSuper
                | Self::InvokeInterface
        )
    }

    /// Binary operations with a literal operand.
    #[must_use]
    pub const fn is_binop_lit(self) -> bool {
        matches!(
            self,
            Self::AddIntLit8
                | Self::AddIntLit16
                | Self::MulIntLit8
                | Self::MulIntLit16
                | Self::DivIntLit8
                | Self::DivIntLit16
                | Self::RemIntLit8
                | Self::RemIntLit16
                | Self::AndIntLit8
                | Self::AndIntLit16
                | Self::OrIntLit8
                | Self::OrIntLit16
                | Self::XorIntLit8
                | Self::XorIntLit16
                | Self::ShlIntLit8
                | Self::ShrIntLit8
                | Self::UshrIntLit8
        )
    }

    /// Two-register binary operations.
    #[must_use]
    pub const fn is_binop(self) -> bool {
        matches!(
            self,
            Self::AddInt
                | Self::SubInt
                | Self::MulInt
                | Self::DivInt
                | Self::RemInt
                | Self::AndInt
                | Self::OrInt
                | Self::XorInt
                | Self::ShlInt
                | Self::ShrInt
                | Self::UshrInt
                | Self::AddLong
                | Self::SubLong
                | Self::MulLong
                | Self::AndLong
                | Self::OrLong
                | Self::XorLong
                | Self::CmpLong
        )
    }

    /// Unary operations and conversions.
    #[must_use]
    pub const fn is_unop(self) -> bool {
        matches!(
            self,
            Self::NegInt | Self::NotInt | Self::NegLong | Self::IntToLong | Self::LongToInt
        )
    }

    /// Arithmetic of any shape.
    #[must_use]
    pub const fn is_arithmetic(self) -> bool {
        self.is_binop() || self.is_binop_lit() || self.is_unop()
    }

    /// Divisions and remainders, which throw on a zero divisor.
    #[must_use]
    pub const fn is_division(self) -> bool {
        matches!(
            self,
            Self::DivInt
                | Self::RemInt
                | Self::DivIntLit8
                | Self::DivIntLit16
                | Self::RemIntLit8
                | Self::RemIntLit16
        )
    }

    /// Instructions that write their destination register directly.
    ///
    /// Instructions with a `move-result-pseudo*` have no destination of their
    /// own; the pseudo move carries it.
    #[must_use]
    pub const fn has_dest(self) -> bool {
        self.is_load_param()
            || self.is_move()
            || self.is_move_result()
            || self.is_move_result_pseudo()
            || self.is_arithmetic()
            || matches!(self, Self::Const | Self::ConstWide)
    }

    /// Instructions whose destination is a register pair.
    #[must_use]
    pub const fn dest_is_wide(self) -> bool {
        matches!(
            self,
            Self::LoadParamWide
                | Self::ConstWide
                | Self::MoveWide
                | Self::MoveResultWide
                | Self::MoveResultPseudoWide
                | Self::NegLong
                | Self::IntToLong
                | Self::AddLong
                | Self::SubLong
                | Self::MulLong
                | Self::AndLong
                | Self::OrLong
                | Self::XorLong
        )
    }

    /// Instructions whose destination holds an object reference.
    #[must_use]
    pub const fn dest_is_object(self) -> bool {
        matches!(
            self,
            Self::LoadParamObject | Self::MoveObject | Self::MoveResultObject | Self::MoveResultPseudoObject
        )
    }

    /// Returns `true` if source `index` is a register pair. Invoke arguments
    /// depend on the callee prototype and are not covered.
    #[must_use]
    pub const fn src_is_wide(self, index: usize) -> bool {
        match self {
            Self::MoveWide
            | Self::ReturnWide
            | Self::NegLong
            | Self::LongToInt
            | Self::SputWide
            | Self::IputWide
            | Self::AputWide => index == 0,
            Self::AddLong
            | Self::SubLong
            | Self::MulLong
            | Self::AndLong
            | Self::OrLong
            | Self::XorLong
            | Self::CmpLong => index < 2,
            _ => false,
        }
    }

    /// Number of source registers, or `None` for invokes whose arity comes
    /// from the callee.
    #[must_use]
    pub const fn src_count(self) -> Option<usize> {
        if self.is_invoke() {
            return None;
        }
        let count = if self.is_sput() {
            1
        } else if self.is_iput() || self.is_if_test() || self.is_binop() || self.is_aget() {
            2
        } else if self.is_aput() {
            3
        } else if self.is_iget()
            || self.is_move()
            || self.is_if_testz()
            || self.is_unop()
            || self.is_binop_lit()
        {
            1
        } else {
            match self {
                Self::Return
                | Self::ReturnWide
                | Self::ReturnObject
                | Self::Throw
                | Self::MonitorEnter
                | Self::MonitorExit
                | Self::FillArrayData
                | Self::NewArray
                | Self::CheckCast
                | Self::ArrayLength => 1,
                _ => 0,
            }
        };
        Some(count)
    }

    /// The non-register operand this opcode carries.
    #[must_use]
    pub const fn operand_kind(self) -> OperandKind {
        if self.is_sget() || self.is_sput() || self.is_iget() || self.is_iput() {
            OperandKind::Field
        } else if self.is_invoke() {
            OperandKind::Method
        } else if self.is_conditional_branch() || self.is_goto() {
            OperandKind::Label
        } else if self.is_binop_lit() {
            OperandKind::Literal
        } else {
            match self {
                Self::Const | Self::ConstWide => OperandKind::Literal,
                Self::ConstString => OperandKind::String,
                Self::NewInstance | Self::NewArray | Self::CheckCast => OperandKind::Type,
                Self::FillArrayData => OperandKind::ArrayData,
                _ => OperandKind::None,
            }
        }
    }

    /// Instructions that may be removed when their result is unused.
    ///
    /// Anything that can throw, touch the heap, synchronize, transfer control
    /// or trigger class initialization is kept.
    #[must_use]
    pub const fn is_pure(self) -> bool {
        (self.is_arithmetic() && !self.is_division())
            || self.is_move()
            || matches!(self, Self::Const | Self::ConstWide | Self::ConstString | Self::Nop)
    }

    /// The `move-result-pseudo*` variant matching a destination kind.
    #[must_use]
    pub const fn pseudo_for(wide: bool, object: bool) -> Self {
        if wide {
            Self::MoveResultPseudoWide
        } else if object {
            Self::MoveResultPseudoObject
        } else {
            Self::MoveResultPseudo
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::MoveResultPseudoObject.to_string(), "move-result-pseudo-object");
        assert_eq!(Opcode::AddIntLit8.to_string(), "add-int/lit8");
        assert_eq!(Opcode::from_str("if-nez").unwrap(), Opcode::IfNez);
        assert_eq!(Opcode::from_str("ushr-int/lit8").unwrap(), Opcode::UshrIntLit8);
        assert!(Opcode::from_str("add-int-lit8").is_err());
    }

    #[test]
    fn test_mnemonics_are_unique() {
        let mut names: Vec<&'static str> = Opcode::iter().map(Into::into).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_categories_are_consistent() {
        for op in Opcode::iter() {
            // A result lives either in a destination or in the result register
            assert!(!(op.has_dest() && op.has_move_result_pseudo()), "{op}");
            if op.dest_is_wide() || op.dest_is_object() {
                assert!(op.has_dest(), "{op}");
            }
            if op.is_heap_write() {
                let base = op.heap_write_base().unwrap();
                assert!(base < op.src_count().unwrap(), "{op}");
            }
            if op.is_pure() {
                assert!(!op.is_terminator() && !op.is_invoke(), "{op}");
            }
        }
    }

    #[test]
    fn test_src_counts() {
        assert_eq!(Opcode::Aput.src_count(), Some(3));
        assert_eq!(Opcode::Iput.src_count(), Some(2));
        assert_eq!(Opcode::Sput.src_count(), Some(1));
        assert_eq!(Opcode::IfEq.src_count(), Some(2));
        assert_eq!(Opcode::IfEqz.src_count(), Some(1));
        assert_eq!(Opcode::Const.src_count(), Some(0));
        assert_eq!(Opcode::InvokeVirtual.src_count(), None);
        assert_eq!(Opcode::Sget.operand_kind(), OperandKind::Field);
    }
}
