//! Constant propagation pass.
//!
//! Runs constant propagation over each method, commits the resulting
//! [`Transform`] and cleans up with [`LocalDce`]. Class initializers are
//! analyzed with their own class under initialization, so writes of a value
//! the field already holds are recognized.
//!
//! Reads of static final fields that no code writes resolve to their encoded
//! value through a [`WholeProgramState`] collected when the pass starts.

use std::sync::Arc;

use crate::{
    analysis::{
        constprop::{ConstantEnvironment, ConstantTransfer, WholeProgramState},
        dataflow::{AbstractDomain, MonotonicFixpointIterator},
    },
    compiler::{EventKind, EventLog, LocalDce, Pass, PassContext, Transform, TransformStats},
    ir::{Method, Program},
    Result,
};

/// Per-method constant propagation with branch folding.
#[derive(Default)]
pub struct ConstantPropagationPass {
    whole_program: Arc<WholeProgramState>,
}

impl ConstantPropagationPass {
    /// Creates a new constant propagation pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pass for ConstantPropagationPass {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn description(&self) -> &'static str {
        "Replaces known values by constant loads and folds decided branches"
    }

    fn initialize(&mut self, program: &Program, _ctx: &PassContext) -> Result<()> {
        self.whole_program = Arc::new(WholeProgramState::from_program(program));
        Ok(())
    }

    fn run_on_method(&self, method: &mut Method, ctx: &PassContext) -> Result<TransformStats> {
        let reference = &method.reference;
        let Some(code) = method.code.as_mut() else {
            return Ok(TransformStats::default());
        };

        let mut transfer =
            ConstantTransfer::new().with_whole_program_state(Arc::clone(&self.whole_program));
        let mut config = ctx.config.transform_config();
        if reference.is_clinit() {
            transfer = transfer.with_class_under_init(reference.class().clone());
            config = config.with_class_under_init(reference.class().clone());
        }

        let events = EventLog::new();
        let mut transform = Transform::new(config).with_events(&events, reference);
        {
            let mut iterator = MonotonicFixpointIterator::new(code, transfer)
                .with_widening_threshold(ctx.config.widening_threshold);
            iterator.run(ConstantEnvironment::top());
            transform.analyze(&iterator, Some(&*self.whole_program));
        }
        let stats = transform.commit(code)?;

        let removed = LocalDce::new().run(code)?;
        if removed > 0 {
            events
                .record(EventKind::InstructionRemoved)
                .method(reference.clone())
                .message(format!("{removed} dead instructions"));
        }
        ctx.events.merge(&events);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::PassManager,
        ir::{assembler, MethodRef},
    };

    fn code(program: &Program, name: &str) -> String {
        let method = program.method(&MethodRef::parse(name).unwrap()).unwrap();
        assembler::to_s_expr(method.code.as_ref().unwrap()).to_string()
    }

    #[test]
    fn test_folds_and_cleans_up() {
        let mut program = assembler::program_from_str(
            r#"
            (class (public) "LFoo;"
              (method (public static) "LFoo;.f:()I"
                (
                  (const v0 0)
                  (if-eqz v0 :zero)
                  (const v1 1)
                  (return v1)
                  (:zero)
                  (add-int/lit8 v1 v0 2)
                  (return v1)
                )))
            "#,
        )
        .unwrap();
        let ctx = PassContext::default();
        let mut manager = PassManager::new();
        manager.add(ConstantPropagationPass::new());

        let stats = manager.run(&mut program, &ctx).unwrap();
        assert_eq!(stats.branches_removed, 1);
        assert_eq!(stats.constants_materialized, 1);
        assert_eq!(code(&program, "LFoo;.f:()I"), "((const v1 2) (return v1))");
        assert!(ctx.events.has(EventKind::BranchFolded));
        assert!(ctx.events.has(EventKind::InstructionRemoved));
    }

    #[test]
    fn test_reads_unwritten_final_fields() {
        let mut program = assembler::program_from_str(
            r#"
            (class (public) "LFoo;"
              (field (public static final) "LFoo;.k:I" 7)
              (method (public static) "LFoo;.f:()I"
                (
                  (sget "LFoo;.k:I")
                  (move-result-pseudo v0)
                  (return v0)
                )))
            "#,
        )
        .unwrap();
        let ctx = PassContext::default();
        let mut manager = PassManager::new();
        manager.add(ConstantPropagationPass::new());

        let stats = manager.run(&mut program, &ctx).unwrap();
        assert_eq!(stats.constants_materialized, 1);
        assert_eq!(code(&program, "LFoo;.f:()I"), "((const v0 7) (return v0))");
    }

    #[test]
    fn test_skips_flagged_methods() {
        let mut program = assembler::program_from_str(
            r#"
            (class (public) "LFoo;"
              (method (public static) "LFoo;.f:()I"
                ((const v0 1) (move v1 v0) (return v1))))
            "#,
        )
        .unwrap();
        let reference = MethodRef::parse("LFoo;.f:()I").unwrap();
        program.method_mut(&reference).unwrap().no_optimizations = true;
        let before = code(&program, "LFoo;.f:()I");

        let mut manager = PassManager::new();
        manager.add(ConstantPropagationPass::new());
        let stats = manager.run(&mut program, &PassContext::default()).unwrap();
        assert!(stats.is_empty());
        assert_eq!(code(&program, "LFoo;.f:()I"), before);
    }
}
