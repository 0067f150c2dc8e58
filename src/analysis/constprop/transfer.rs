//! Constant propagation transfer functions.
//!
//! Integer arithmetic follows the bytecode semantics: 32-bit operations wrap
//! and are sign-extended into the `i64` carried by the domain, 64-bit
//! operations wrap in place. Divisions fold only when the divisor is a known
//! non-zero constant, otherwise the instruction may throw at runtime and its
//! result is left unknown.

use std::sync::Arc;

use crate::{
    analysis::{
        constprop::{ConstantEnvironment, Location, WholeProgramState},
        dataflow::{AbstractDomain, ConstantValue, Direction, JoinSemiLattice, Transfer},
    },
    ir::{Block, Edge, EdgeKind, FieldRef, Instruction, Opcode, Reg, TypeRef},
};

/// Forward constant propagation.
///
/// Static fields of the class under initialization are tracked in the
/// environment; reads of other static fields fall back to the
/// [`WholeProgramState`], if one is attached.
#[derive(Debug, Clone, Default)]
pub struct ConstantTransfer {
    class_under_init: Option<TypeRef>,
    whole_program: Option<Arc<WholeProgramState>>,
}

impl ConstantTransfer {
    /// Creates a transfer without field tracking.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks the static fields of `class`, as when analyzing its
    /// initializer.
    #[must_use]
    pub fn with_class_under_init(mut self, class: TypeRef) -> Self {
        self.class_under_init = Some(class);
        self
    }

    /// Resolves reads of untracked static fields through `state`.
    #[must_use]
    pub fn with_whole_program_state(mut self, state: Arc<WholeProgramState>) -> Self {
        self.whole_program = Some(state);
        self
    }

    /// The class whose static fields are tracked.
    #[must_use]
    pub fn class_under_init(&self) -> Option<&TypeRef> {
        self.class_under_init.as_ref()
    }

    /// Returns `true` if `field` is tracked in the environment.
    #[must_use]
    pub fn tracks(&self, field: &FieldRef) -> bool {
        self.class_under_init.as_ref() == Some(field.class())
    }

    /// The value a static read of `field` produces in `env`.
    #[must_use]
    pub fn field_value(&self, field: &FieldRef, env: &ConstantEnvironment) -> ConstantValue {
        if self.tracks(field) {
            return env.get(&Location::Field(field.clone()));
        }
        self.whole_program
            .as_ref()
            .and_then(|state| state.get(field))
            .cloned()
            .unwrap_or(ConstantValue::Top)
    }

    fn write_dest(insn: &Instruction, env: &mut ConstantEnvironment, value: ConstantValue) {
        let Some(dest) = insn.dest else {
            return;
        };
        env.set(Location::Register(dest), value);
        if insn.opcode.dest_is_wide() {
            if let Some(upper) = dest.checked_add(1) {
                env.forget(&Location::Register(upper));
            }
        }
    }

    fn read(insn: &Instruction, index: usize, env: &ConstantEnvironment) -> ConstantValue {
        insn.src(index)
            .map_or(ConstantValue::Top, |r| env.get(&Location::Register(r)))
    }
}

impl Transfer for ConstantTransfer {
    type Domain = ConstantEnvironment;
    const DIRECTION: Direction = Direction::Forward;

    fn analyze_instruction(&self, insn: &Instruction, env: &mut ConstantEnvironment) {
        let op = insn.opcode;
        let result = Location::result();

        if op.is_move() {
            let value = Self::read(insn, 0, env);
            Self::write_dest(insn, env, value);
        } else if op.is_move_result() || op.is_move_result_pseudo() {
            let value = env.get(&result);
            Self::write_dest(insn, env, value);
        } else if op.is_arithmetic() {
            let value = fold(insn, env);
            Self::write_dest(insn, env, value);
        } else if op.is_sget() {
            let value = insn
                .field()
                .map_or(ConstantValue::Top, |f| self.field_value(f, env));
            env.set(result, value);
        } else if op.is_sput() {
            if let Some(field) = insn.field().filter(|f| self.tracks(f)) {
                let value = Self::read(insn, 0, env);
                env.set(Location::Field(field.clone()), value);
            }
        } else if op.is_invoke() {
            // The callee may run arbitrary code, including writes to any
            // static field.
            env.retain(|location, _| matches!(location, Location::Register(_)));
            env.forget(&result);
        } else {
            match op {
                Opcode::Const | Opcode::ConstWide => {
                    let value = insn.literal().map_or(ConstantValue::Top, ConstantValue::int);
                    Self::write_dest(insn, env, value);
                }
                Opcode::ConstString => {
                    let value = insn
                        .string()
                        .map_or(ConstantValue::Top, |s| ConstantValue::string(s.clone()));
                    env.set(result, value);
                }
                _ if op.has_move_result_pseudo() => env.forget(&result),
                _ => Self::write_dest(insn, env, ConstantValue::Top),
            }
        }
    }

    fn analyze_edge(&self, edge: &Edge, block: &Block, exit: &ConstantEnvironment) -> ConstantEnvironment {
        let mut env = exit.clone();
        if env.is_bottom() {
            return env;
        }
        let Some(branch) = block.branch() else {
            return env;
        };
        let taken = edge.kind == EdgeKind::Branch;
        let op = branch.opcode;

        let lhs = Self::read(branch, 0, &env);
        let rhs = if op.is_if_testz() {
            ConstantValue::int(0)
        } else {
            Self::read(branch, 1, &env)
        };

        if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
            if let Some(outcome) = evaluate_condition(op, a, b) {
                if outcome != taken {
                    env.set_to_bottom();
                }
                return env;
            }
        }

        // On the edge where the operands are equal, each one is refined by the
        // other.
        let equal_edge = match op {
            Opcode::IfEq | Opcode::IfEqz => taken,
            Opcode::IfNe | Opcode::IfNez => !taken,
            _ => return env,
        };
        if equal_edge {
            let both = lhs.meet(&rhs);
            if let Some(r) = branch.src(0) {
                env.set(Location::Register(r), both.clone());
            }
            if op.is_if_test() {
                if let Some(r) = branch.src(1) {
                    env.set(Location::Register(r), both);
                }
            }
        }
        env
    }
}

/// Evaluates a conditional branch on known operands. For the compare-to-zero
/// forms `b` is zero.
#[must_use]
pub(crate) fn evaluate_condition(op: Opcode, a: i64, b: i64) -> Option<bool> {
    let outcome = match op {
        Opcode::IfEq | Opcode::IfEqz => a == b,
        Opcode::IfNe | Opcode::IfNez => a != b,
        Opcode::IfLt | Opcode::IfLtz => a < b,
        Opcode::IfGe | Opcode::IfGez => a >= b,
        Opcode::IfGt | Opcode::IfGtz => a > b,
        Opcode::IfLe | Opcode::IfLez => a <= b,
        _ => return None,
    };
    Some(outcome)
}

fn fold(insn: &Instruction, env: &ConstantEnvironment) -> ConstantValue {
    let op = insn.opcode;
    let operand = |index: usize| -> Option<i64> {
        let reg: Reg = insn.src(index)?;
        env.get(&Location::Register(reg)).as_int()
    };

    let folded = if op.is_binop_lit() {
        operand(0).zip(insn.literal()).and_then(|(a, b)| fold_binary(op, a, b))
    } else if op.is_binop() {
        operand(0).zip(operand(1)).and_then(|(a, b)| fold_binary(op, a, b))
    } else {
        operand(0).and_then(|a| fold_unary(op, a))
    };
    folded.map_or(ConstantValue::Top, ConstantValue::int)
}

fn fold_unary(op: Opcode, a: i64) -> Option<i64> {
    let value = match op {
        Opcode::NegInt => i64::from((a as i32).wrapping_neg()),
        Opcode::NotInt => i64::from(!(a as i32)),
        Opcode::NegLong => a.wrapping_neg(),
        Opcode::IntToLong => i64::from(a as i32),
        Opcode::LongToInt => i64::from(a as i32),
        _ => return None,
    };
    Some(value)
}

fn fold_binary(op: Opcode, a: i64, b: i64) -> Option<i64> {
    use Opcode::{
        AddInt, AddIntLit16, AddIntLit8, AddLong, AndInt, AndIntLit16, AndIntLit8, AndLong, CmpLong,
        DivInt, DivIntLit16, DivIntLit8, MulInt, MulIntLit16, MulIntLit8, MulLong, OrInt, OrIntLit16,
        OrIntLit8, OrLong, RemInt, RemIntLit16, RemIntLit8, ShlInt, ShlIntLit8, ShrInt, ShrIntLit8,
        SubInt, SubLong, UshrInt, UshrIntLit8, XorInt, XorIntLit16, XorIntLit8, XorLong,
    };

    let (x, y) = (a as i32, b as i32);
    let int = |v: i32| Some(i64::from(v));
    match op {
        AddInt | AddIntLit8 | AddIntLit16 => int(x.wrapping_add(y)),
        SubInt => int(x.wrapping_sub(y)),
        MulInt | MulIntLit8 | MulIntLit16 => int(x.wrapping_mul(y)),
        DivInt | DivIntLit8 | DivIntLit16 if y != 0 => int(x.wrapping_div(y)),
        RemInt | RemIntLit8 | RemIntLit16 if y != 0 => int(x.wrapping_rem(y)),
        AndInt | AndIntLit8 | AndIntLit16 => int(x & y),
        OrInt | OrIntLit8 | OrIntLit16 => int(x | y),
        XorInt | XorIntLit8 | XorIntLit16 => int(x ^ y),
        ShlInt | ShlIntLit8 => int(x.wrapping_shl(y as u32 & 0x1f)),
        ShrInt | ShrIntLit8 => int(x.wrapping_shr(y as u32 & 0x1f)),
        UshrInt | UshrIntLit8 => int(((x as u32) >> (y as u32 & 0x1f)) as i32),
        AddLong => Some(a.wrapping_add(b)),
        SubLong => Some(a.wrapping_sub(b)),
        MulLong => Some(a.wrapping_mul(b)),
        AndLong => Some(a & b),
        OrLong => Some(a | b),
        XorLong => Some(a ^ b),
        CmpLong => Some(match a.cmp(&b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::dataflow::MonotonicFixpointIterator,
        ir::{assembler::code_from_str, ControlFlowGraph},
    };

    fn exit_env(code: &ControlFlowGraph, transfer: ConstantTransfer) -> ConstantEnvironment {
        let mut iterator = MonotonicFixpointIterator::new(code, transfer);
        iterator.run(ConstantEnvironment::top());
        code.exit_blocks()
            .into_iter()
            .map(|b| iterator.exit_state_at(b).clone())
            .fold(ConstantEnvironment::bottom(), |acc, env| acc.join(&env))
    }

    fn reg(env: &ConstantEnvironment, r: Reg) -> ConstantValue {
        env.get(&Location::Register(r))
    }

    #[test]
    fn test_arithmetic_wraps() {
        let code = code_from_str(
            r#"(
              (const v0 2147483647)
              (add-int/lit8 v1 v0 1)
              (const v2 0)
              (div-int v3 v0 v2)
              (const-wide v4 9223372036854775807)
              (const-wide v6 1)
              (add-long v8 v4 v6)
              (const v10 -8)
              (ushr-int/lit8 v11 v10 28)
              (return-void)
            )"#,
        )
        .unwrap();
        let env = exit_env(&code, ConstantTransfer::default());

        assert_eq!(reg(&env, 1).as_int(), Some(i64::from(i32::MIN)));
        assert_eq!(reg(&env, 3), ConstantValue::Top);
        assert_eq!(reg(&env, 8).as_int(), Some(i64::MIN));
        assert_eq!(reg(&env, 11).as_int(), Some(15));
    }

    #[test]
    fn test_strings_flow_through_pseudo() {
        let code = code_from_str(
            r#"(
              (const-string "hello")
              (move-result-pseudo-object v0)
              (move-object v1 v0)
              (return-object v1)
            )"#,
        )
        .unwrap();
        let env = exit_env(&code, ConstantTransfer::default());
        assert_eq!(reg(&env, 1).as_string().map(|s| &**s), Some("hello"));
    }

    #[test]
    fn test_static_fields_of_class_under_init() {
        let code = code_from_str(
            r#"(
              (const v0 7)
              (sput v0 "LFoo;.bar:I")
              (sget "LFoo;.bar:I")
              (move-result-pseudo v1)
              (sget "LOther;.f:I")
              (move-result-pseudo v2)
              (return-void)
            )"#,
        )
        .unwrap();
        let foo = TypeRef::parse("LFoo;").unwrap();
        let mut state = WholeProgramState::new();
        state.insert(FieldRef::parse("LOther;.f:I").unwrap(), ConstantValue::int(3));
        let transfer = ConstantTransfer::new()
            .with_class_under_init(foo)
            .with_whole_program_state(Arc::new(state));
        let env = exit_env(&code, transfer);

        assert_eq!(reg(&env, 1).as_int(), Some(7));
        assert_eq!(reg(&env, 2).as_int(), Some(3));
        let bar = Location::Field(FieldRef::parse("LFoo;.bar:I").unwrap());
        assert_eq!(env.get(&bar).as_int(), Some(7));
    }

    #[test]
    fn test_invoke_clobbers_fields() {
        let code = code_from_str(
            r#"(
              (const v0 7)
              (sput v0 "LFoo;.bar:I")
              (invoke-static () "LFoo;.f:()V")
              (sget "LFoo;.bar:I")
              (move-result-pseudo v1)
              (return-void)
            )"#,
        )
        .unwrap();
        let transfer = ConstantTransfer::new().with_class_under_init(TypeRef::parse("LFoo;").unwrap());
        let env = exit_env(&code, transfer);
        assert_eq!(reg(&env, 0).as_int(), Some(7));
        assert_eq!(reg(&env, 1), ConstantValue::Top);
    }

    #[test]
    fn test_branch_refinement() {
        let code = code_from_str(
            r#"(
              (load-param v0)
              (if-nez v0 :other)
              (move v1 v0)
              (return v1)
              (:other)
              (const v1 5)
              (return v1)
            )"#,
        )
        .unwrap();
        let mut iterator = MonotonicFixpointIterator::new(&code, ConstantTransfer::default());
        iterator.run(ConstantEnvironment::top());

        // The fall-through block returns the refined zero
        let fallthrough = code.block(code.entry()).target(EdgeKind::Goto).unwrap();
        let env = iterator.exit_state_at(fallthrough);
        assert_eq!(reg(env, 1).as_int(), Some(0));
    }

    #[test]
    fn test_known_condition_prunes_edge() {
        let code = code_from_str(
            r#"(
              (const v0 1)
              (const v1 2)
              (if-lt v0 v1 :less)
              (const v2 0)
              (return v2)
              (:less)
              (const v2 1)
              (return v2)
            )"#,
        )
        .unwrap();
        let mut iterator = MonotonicFixpointIterator::new(&code, ConstantTransfer::default());
        iterator.run(ConstantEnvironment::top());

        let entry = code.block(code.entry());
        let fallthrough = entry.target(EdgeKind::Goto).unwrap();
        let taken = entry.target(EdgeKind::Branch).unwrap();
        assert!(iterator.entry_state_at(fallthrough).is_bottom());
        assert!(!iterator.entry_state_at(taken).is_bottom());
    }

    #[test]
    fn test_condition_evaluation() {
        assert_eq!(evaluate_condition(Opcode::IfLez, 0, 0), Some(true));
        assert_eq!(evaluate_condition(Opcode::IfGt, 1, 2), Some(false));
        assert_eq!(evaluate_condition(Opcode::Goto, 1, 2), None);
    }
}
