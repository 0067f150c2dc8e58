//! Rewrites driven by constant propagation.
//!
//! A [`Transform`] reads a finished constant propagation run and queues
//! three kinds of rewrites:
//!
//! - value producers whose result is exactly known become constant loads
//! - static writes of a value the field already holds are removed
//! - conditional branches with a single feasible successor are folded
//!
//! Nothing is edited until [`Transform::commit`].

use std::{
    iter::Sum,
    ops::{Add, AddAssign},
};

use log::trace;

use crate::{
    analysis::{
        constprop::{ConstantEnvironment, ConstantTransfer, Location, WholeProgramState},
        dataflow::{
            ConstantValue, JoinSemiLattice, MonotonicFixpointIterator, SignedConstantDomain,
            StringDomain, Transfer,
        },
    },
    compiler::{EditQueue, EventKind, EventLog},
    ir::{
        BlockId, ControlFlowGraph, EdgeKind, InsnId, Instruction, MethodRef, Opcode, Operand,
        TypeRef,
    },
    Result,
};

/// Knobs of the constant propagation transform.
#[derive(Debug, Clone)]
pub struct Config {
    /// Replace register moves whose value is known by constant loads.
    pub replace_moves_with_consts: bool,
    /// The class whose initializer is being transformed. Static writes to
    /// its fields are compared against the whole-program field values.
    pub class_under_init: Option<TypeRef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replace_moves_with_consts: true,
            class_under_init: None,
        }
    }
}

impl Config {
    /// Sets [`Config::replace_moves_with_consts`].
    #[must_use]
    pub fn with_replace_moves_with_consts(mut self, enabled: bool) -> Self {
        self.replace_moves_with_consts = enabled;
        self
    }

    /// Sets [`Config::class_under_init`].
    #[must_use]
    pub fn with_class_under_init(mut self, class: TypeRef) -> Self {
        self.class_under_init = Some(class);
        self
    }
}

/// Counters of committed rewrites.
///
/// Stats of different methods are combined with `+`, in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Conditional branches replaced by a `goto`.
    pub branches_removed: usize,
    /// Value producers replaced by constant loads.
    pub constants_materialized: usize,
    /// Writes removed because they change nothing observable.
    pub dead_writes_eliminated: usize,
}

impl TransformStats {
    /// Returns `true` if nothing was rewritten.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for TransformStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            branches_removed: self.branches_removed + other.branches_removed,
            constants_materialized: self.constants_materialized + other.constants_materialized,
            dead_writes_eliminated: self.dead_writes_eliminated + other.dead_writes_eliminated,
        }
    }
}

impl AddAssign for TransformStats {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sum for TransformStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// The constant propagation transform for one method body.
///
/// # Example
///
/// ```rust
/// use optscope::compiler::{Config, Transform};
/// use optscope::prelude::*;
///
/// let mut code = assembler::code_from_str(r#"(
///     (const v0 0)
///     (if-eqz v0 :zero)
///     (const v1 1)
///     (return v1)
///     (:zero)
///     (add-int/lit8 v1 v0 2)
///     (return v1)
/// )"#)?;
///
/// let mut iterator = MonotonicFixpointIterator::new(&code, ConstantTransfer::default());
/// iterator.run(ConstantEnvironment::top());
/// let mut transform = Transform::new(Config::default());
/// transform.analyze(&iterator, None);
/// drop(iterator);
///
/// let stats = transform.commit(&mut code)?;
/// assert_eq!(stats.branches_removed, 1);
/// assert_eq!(stats.constants_materialized, 1);
/// assert_eq!(
///     assembler::to_s_expr(&code).to_string(),
///     "((const v0 0) (const v1 2) (return v1))"
/// );
/// # Ok::<(), optscope::Error>(())
/// ```
pub struct Transform<'a> {
    config: Config,
    queue: EditQueue,
    stats: TransformStats,
    events: Option<(&'a EventLog, &'a MethodRef)>,
}

impl<'a> Transform<'a> {
    /// Creates a transform with nothing queued.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            queue: EditQueue::new(),
            stats: TransformStats::default(),
            events: None,
        }
    }

    /// Records every queued rewrite of `method` into `log`.
    #[must_use]
    pub fn with_events(mut self, log: &'a EventLog, method: &'a MethodRef) -> Self {
        self.events = Some((log, method));
        self
    }

    /// The edits queued so far.
    #[must_use]
    pub fn queue(&self) -> &EditQueue {
        &self.queue
    }

    /// Queues every rewrite justified by `iterator`.
    ///
    /// `whole_program` holds the field values static writes inside the
    /// class under initialization are compared against. Unreachable blocks
    /// are left alone.
    pub fn analyze(
        &mut self,
        iterator: &MonotonicFixpointIterator<'_, ConstantTransfer>,
        whole_program: Option<&WholeProgramState>,
    ) {
        let cfg = iterator.cfg();
        let transfer = iterator.transfer();
        for block in cfg.blocks() {
            let mut previous: Option<(Opcode, InsnId)> = None;
            iterator.replay(block.id(), |insn, env| {
                self.analyze_instruction(insn, env, previous, transfer, whole_program);
                previous = Some((insn.opcode, insn.id));
            });
            self.analyze_branch(cfg, block.id(), iterator);
        }
    }

    fn analyze_instruction(
        &mut self,
        insn: &Instruction,
        env: &ConstantEnvironment,
        previous: Option<(Opcode, InsnId)>,
        transfer: &ConstantTransfer,
        whole_program: Option<&WholeProgramState>,
    ) {
        let op = insn.opcode;
        if op.is_sput() {
            if self.is_redundant_put(insn, env, whole_program) {
                self.queue.delete(insn.id);
                self.stats.dead_writes_eliminated += 1;
                self.record(EventKind::RedundantWriteRemoved, insn.id, || {
                    format!("{insn} writes the value the field already holds")
                });
            }
            return;
        }

        let sget_result = op.is_move_result_pseudo()
            && previous.is_some_and(|(prev, _)| prev.is_sget());
        let eligible = (op.is_move() && self.config.replace_moves_with_consts)
            || op.is_arithmetic()
            || sget_result;
        let Some(dest) = insn.dest.filter(|_| eligible) else {
            return;
        };

        let mut after = env.clone();
        transfer.analyze_instruction(insn, &mut after);
        let value = after.get(&Location::Register(dest));
        let Some(replacement) = materialize(dest, op.dest_is_wide(), &value) else {
            return;
        };

        if sget_result {
            if let Some((_, producer)) = previous {
                self.queue.delete(producer);
            }
        }
        trace!("materializing {:?} for {}", value, insn);
        self.queue.replace(insn.id, replacement);
        self.stats.constants_materialized += 1;
        self.record(EventKind::ConstantMaterialized, insn.id, || {
            format!("v{dest} = {value:?}")
        });
    }

    /// A static write is redundant when the field already holds the written
    /// value: either its whole-program value inside its own class
    /// initializer, or the value the environment binds it to.
    fn is_redundant_put(
        &self,
        insn: &Instruction,
        env: &ConstantEnvironment,
        whole_program: Option<&WholeProgramState>,
    ) -> bool {
        let (Some(field), Some(src)) = (insn.field(), insn.src(0)) else {
            return false;
        };
        let written = env.get(&Location::Register(src));
        if !written.is_constant() {
            return false;
        }

        let in_own_initializer = self.config.class_under_init.as_ref() == Some(field.class());
        if in_own_initializer
            && whole_program
                .and_then(|state| state.get(field))
                .is_some_and(|known| *known == written)
        {
            return true;
        }
        env.get(&Location::Field(field.clone())) == written
    }

    fn analyze_branch(
        &mut self,
        cfg: &ControlFlowGraph,
        block: BlockId,
        iterator: &MonotonicFixpointIterator<'_, ConstantTransfer>,
    ) {
        let block = cfg.block(block);
        let Some(branch) = block.branch() else {
            return;
        };
        let exit = iterator.exit_state_at(block.id());
        if exit.is_bottom() {
            return;
        }

        let feasible = |kind: EdgeKind| {
            block
                .succs()
                .iter()
                .filter(|edge| edge.kind == kind)
                .any(|edge| !iterator.transfer().analyze_edge(edge, block, exit).is_bottom())
        };
        let taken = match (feasible(EdgeKind::Branch), feasible(EdgeKind::Goto)) {
            (true, false) => true,
            (false, true) => false,
            _ => return,
        };

        self.queue.fold_branch(branch.id, taken);
        self.stats.branches_removed += 1;
        self.record(EventKind::BranchFolded, branch.id, || {
            format!("{branch} is {}", if taken { "always taken" } else { "never taken" })
        });
    }

    fn record(&self, kind: EventKind, insn: InsnId, message: impl FnOnce() -> String) {
        if let Some((log, method)) = self.events {
            log.record(kind).at(method.clone(), insn).message(message());
        }
    }

    /// Applies the queued rewrites to `cfg`, the graph that was analyzed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCode`] if the rewritten code fails
    /// validation.
    pub fn commit(self, cfg: &mut ControlFlowGraph) -> Result<TransformStats> {
        self.queue.commit(cfg)?;
        Ok(self.stats)
    }
}

/// The constant load(s) writing `value` into `dest`, if `value` is an
/// exactly known scalar or string.
fn materialize(dest: u32, wide: bool, value: &ConstantValue) -> Option<Vec<Instruction>> {
    match value {
        ConstantValue::Signed(SignedConstantDomain::Value(literal)) => {
            let op = if wide { Opcode::ConstWide } else { Opcode::Const };
            Some(vec![Instruction::new(op).with_dest(dest).with_literal(*literal)])
        }
        ConstantValue::String(StringDomain::Value(string)) => Some(vec![
            Instruction::new(Opcode::ConstString).with_operand(Operand::String(string.clone())),
            Instruction::new(Opcode::MoveResultPseudoObject).with_dest(dest),
        ]),
        ConstantValue::Signed(SignedConstantDomain::Bottom | SignedConstantDomain::Top)
        | ConstantValue::String(StringDomain::Bottom | StringDomain::Top)
        | ConstantValue::Bottom
        | ConstantValue::Top => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::dataflow::AbstractDomain,
        ir::{
            assembler::{code_from_str, to_s_expr},
            FieldRef,
        },
    };

    fn transform(code: &str, transfer: ConstantTransfer, config: Config) -> (String, TransformStats) {
        transform_with(code, transfer, config, None)
    }

    fn transform_with(
        code: &str,
        transfer: ConstantTransfer,
        config: Config,
        whole_program: Option<&WholeProgramState>,
    ) -> (String, TransformStats) {
        let mut cfg = code_from_str(code).unwrap();
        let mut transform = Transform::new(config);
        {
            let mut iterator = MonotonicFixpointIterator::new(&cfg, transfer);
            iterator.run(ConstantEnvironment::top());
            transform.analyze(&iterator, whole_program);
        }
        let stats = transform.commit(&mut cfg).unwrap();
        (to_s_expr(&cfg).to_string(), stats)
    }

    fn canonical(code: &str) -> String {
        to_s_expr(&code_from_str(code).unwrap()).to_string()
    }

    #[test]
    fn test_materialize_only_exact_values() {
        let wide = materialize(2, true, &ConstantValue::int(-1)).unwrap();
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].opcode, Opcode::ConstWide);
        assert_eq!((wide[0].dest, wide[0].literal()), (Some(2), Some(-1)));

        let string = materialize(0, false, &ConstantValue::string("hi".into())).unwrap();
        let opcodes: Vec<_> = string.iter().map(|insn| insn.opcode).collect();
        assert_eq!(opcodes, [Opcode::ConstString, Opcode::MoveResultPseudoObject]);
        assert_eq!(string[1].dest, Some(0));

        for unknown in [
            ConstantValue::Top,
            ConstantValue::Bottom,
            ConstantValue::Signed(SignedConstantDomain::Top),
            ConstantValue::String(StringDomain::Bottom),
        ] {
            assert!(materialize(0, false, &unknown).is_none());
        }
    }

    #[test]
    fn test_stats_are_additive() {
        let a = TransformStats {
            branches_removed: 1,
            constants_materialized: 2,
            dead_writes_eliminated: 3,
        };
        let b = TransformStats {
            branches_removed: 4,
            ..TransformStats::default()
        };
        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
        assert_eq!(c, [b, a].into_iter().sum());
        assert_eq!(c.branches_removed, 5);
        assert!(TransformStats::default().is_empty());
    }

    #[test]
    fn test_moves_and_arithmetic() {
        let code = r#"(
          (const v0 6)
          (move v1 v0)
          (mul-int/lit8 v2 v1 7)
          (const-wide v4 1)
          (move-wide v6 v4)
          (return v2)
        )"#;
        let (out, stats) = transform(code, ConstantTransfer::new(), Config::default());
        assert_eq!(stats.constants_materialized, 3);
        assert_eq!(
            out,
            canonical(
                r#"(
                  (const v0 6)
                  (const v1 6)
                  (const v2 42)
                  (const-wide v4 1)
                  (const-wide v6 1)
                  (return v2)
                )"#
            )
        );

        let config = Config::default().with_replace_moves_with_consts(false);
        let (_, stats) = transform(code, ConstantTransfer::new(), config);
        assert_eq!(stats.constants_materialized, 1);
    }

    #[test]
    fn test_string_moves_use_pseudo_idiom() {
        let (out, _) = transform(
            r#"(
              (const-string "hello")
              (move-result-pseudo-object v0)
              (move-object v1 v0)
              (return-object v1)
            )"#,
            ConstantTransfer::new(),
            Config::default(),
        );
        assert_eq!(
            out,
            canonical(
                r#"(
                  (const-string "hello")
                  (move-result-pseudo-object v0)
                  (const-string "hello")
                  (move-result-pseudo-object v1)
                  (return-object v1)
                )"#
            )
        );
    }

    #[test]
    fn test_known_static_read_is_materialized() {
        let field = FieldRef::parse("LBar;.k:I").unwrap();
        let mut state = WholeProgramState::new();
        state.insert(field, ConstantValue::int(9));
        let transfer = ConstantTransfer::new().with_whole_program_state(state.into());

        let (out, stats) = transform(
            r#"(
              (sget "LBar;.k:I")
              (move-result-pseudo v0)
              (sget "LBar;.other:I")
              (move-result-pseudo v1)
              (return v0)
            )"#,
            transfer,
            Config::default(),
        );
        assert_eq!(stats.constants_materialized, 1);
        assert_eq!(
            out,
            canonical(
                r#"(
                  (const v0 9)
                  (sget "LBar;.other:I")
                  (move-result-pseudo v1)
                  (return v0)
                )"#
            )
        );
    }

    #[test]
    fn test_redundant_puts() {
        let foo = TypeRef::parse("LFoo;").unwrap();
        let transfer = ConstantTransfer::new().with_class_under_init(foo.clone());
        let config = Config::default().with_class_under_init(foo);
        let mut state = WholeProgramState::new();
        state.insert(FieldRef::parse("LFoo;.a:I").unwrap(), ConstantValue::int(1));

        let (out, stats) = transform_with(
            r#"(
              (const v0 1)
              (sput v0 "LFoo;.a:I")
              (sput v0 "LFoo;.b:I")
              (sput v0 "LFoo;.b:I")
              (return-void)
            )"#,
            transfer,
            config,
            Some(&state),
        );
        assert_eq!(stats.dead_writes_eliminated, 2);
        assert_eq!(
            out,
            canonical(r#"((const v0 1) (sput v0 "LFoo;.b:I") (return-void))"#)
        );
    }

    #[test]
    fn test_refined_branch_is_folded() {
        // v0 is known to be zero on the fall-through edge of the first test,
        // so the second test always branches.
        let (out, stats) = transform(
            r#"(
              (load-param v0)
              (if-nez v0 :nonzero)
              (if-eqz v0 :zero)
              (const v1 1)
              (return v1)
              (:zero)
              (const v1 2)
              (return v1)
              (:nonzero)
              (return v0)
            )"#,
            ConstantTransfer::new(),
            Config::default(),
        );
        assert_eq!(stats.branches_removed, 1);
        assert_eq!(
            out,
            canonical(
                r#"(
                  (load-param v0)
                  (if-nez v0 :nonzero)
                  (const v1 2)
                  (return v1)
                  (:nonzero)
                  (return v0)
                )"#
            )
        );
    }

    #[test]
    fn test_unknown_values_are_kept() {
        let code = r#"(
          (load-param v0)
          (add-int/lit8 v1 v0 1)
          (if-eqz v1 :end)
          (div-int v2 v1 v0)
          (:end)
          (return-void)
        )"#;
        let (out, stats) = transform(code, ConstantTransfer::new(), Config::default());
        assert!(stats.is_empty());
        assert_eq!(out, canonical(code));
    }
}
