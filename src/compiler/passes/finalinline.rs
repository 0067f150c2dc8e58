//! Static initializer inlining.
//!
//! For each class initializer, constant propagation is run with the class
//! under initialization, starting from the encoded values of its static
//! fields. Fields holding a known constant on every normal exit get that
//! constant as their encoded value, and the writes that produced it become
//! redundant. An initializer left doing nothing is deleted.
//!
//! Fields the initializer reads itself are left alone: their encoded value
//! is observable before the initializer assigns them.

use std::{collections::HashSet, sync::Arc};

use log::debug;

use crate::{
    analysis::{
        constprop::{
            encoded_to_constant, ConstantEnvironment, ConstantTransfer, Location, WholeProgramState,
        },
        dataflow::{AbstractDomain, ConstantValue, JoinSemiLattice, MonotonicFixpointIterator},
    },
    compiler::{Config, EventKind, LocalDce, Pass, PassContext, Transform, TransformStats},
    ir::{Class, EncodedValue, FieldRef, Opcode, Program, TypeRef},
    Result,
};

/// Moves values computed by class initializers into encoded field values.
#[derive(Debug, Default)]
pub struct FinalInlinePass;

impl FinalInlinePass {
    /// Creates a new static initializer inlining pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn inline_class(class: &mut Class, ctx: &PassContext) -> Result<TransformStats> {
        let Some(clinit) = class.clinit() else {
            return Ok(TransformStats::default());
        };
        let Some(code) = clinit.code.as_ref().filter(|_| !clinit.no_optimizations) else {
            return Ok(TransformStats::default());
        };
        let reference = clinit.reference.clone();

        let mut entry = ConstantEnvironment::top();
        for field in class.static_fields() {
            let value = field
                .static_value
                .as_ref()
                .map_or(ConstantValue::int(0), encoded_to_constant);
            entry.set(Location::Field(field.reference.clone()), value);
        }

        let transfer = ConstantTransfer::new().with_class_under_init(class.ty.clone());
        let mut iterator = MonotonicFixpointIterator::new(code, transfer)
            .with_widening_threshold(ctx.config.widening_threshold);
        iterator.run(entry);

        let mut exit = ConstantEnvironment::bottom();
        for block in code.blocks() {
            if block.insns().last().is_some_and(|i| i.opcode.is_return()) {
                exit.join_with(iterator.exit_state_at(block.id()));
            }
        }
        if exit.is_bottom() {
            return Ok(TransformStats::default());
        }

        let read: HashSet<&FieldRef> = code
            .instructions()
            .filter(|insn| insn.opcode.is_sget())
            .filter_map(|insn| insn.field())
            .collect();

        let mut whole_program = WholeProgramState::new();
        let mut encoded: Vec<(FieldRef, EncodedValue)> = Vec::new();
        for field in class.static_fields() {
            if read.contains(&field.reference) {
                continue;
            }
            let value = exit.get(&Location::Field(field.reference.clone()));
            if let Some(encoded_value) = encode(field.reference.ty(), &value) {
                whole_program.insert(field.reference.clone(), encoded_to_constant(&encoded_value));
                encoded.push((field.reference.clone(), encoded_value));
            }
        }

        let config = Config::default()
            .with_replace_moves_with_consts(ctx.config.replace_moves_with_consts)
            .with_class_under_init(class.ty.clone());
        let mut transform = Transform::new(config).with_events(&ctx.events, &reference);
        transform.analyze(&iterator, Some(&whole_program));
        drop(iterator);

        for (field, value) in encoded {
            debug!("{}: encoding {} as {:?}", reference, field, value);
            ctx.events
                .record(EventKind::FieldEncoded)
                .method(reference.clone())
                .message(format!("{field} = {value:?}"));
            if let Some(definition) = class.field_mut(&field) {
                definition.static_value = Some(value);
            }
        }

        let Some(code) = class.clinit_mut().and_then(|m| m.code.as_mut()) else {
            return Ok(TransformStats::default());
        };
        let stats = transform.commit(code)?;
        LocalDce::new().run(code)?;

        let is_empty = code.instruction_count() == 1
            && code
                .instructions()
                .all(|insn| insn.opcode == Opcode::ReturnVoid);
        if is_empty {
            debug!("{}: removing empty initializer", reference);
            class.remove_clinit();
            ctx.events
                .record(EventKind::InitializerRemoved)
                .method(reference);
        }
        Ok(stats)
    }
}

/// The encoded form of `value` for a field of type `ty`, if it has one.
fn encode(ty: &TypeRef, value: &ConstantValue) -> Option<EncodedValue> {
    if let Some(v) = value.as_int() {
        return match (ty.is_object(), v) {
            (false, _) => Some(EncodedValue::Int(v)),
            (true, 0) => Some(EncodedValue::Null),
            (true, _) => None,
        };
    }
    let s = value.as_string()?;
    (ty.descriptor() == "Ljava/lang/String;").then(|| EncodedValue::String(Arc::clone(s)))
}

impl Pass for FinalInlinePass {
    fn name(&self) -> &'static str {
        "final-inline"
    }

    fn description(&self) -> &'static str {
        "Encodes static field values computed by class initializers"
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run_global(&self, program: &mut Program, ctx: &PassContext) -> Result<TransformStats> {
        let mut total = TransformStats::default();
        for class in program.classes_mut() {
            let clinit = class.clinit().map(|m| m.reference.clone());
            let stats = Self::inline_class(class, ctx).map_err(|e| match &clinit {
                Some(method) => e.in_method(method),
                None => e,
            })?;
            total += stats;
        }
        Ok(total)
    }
}
