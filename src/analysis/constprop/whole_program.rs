//! Static field values known for the whole program.

use std::collections::{HashMap, HashSet};

use crate::{
    analysis::dataflow::ConstantValue,
    ir::{EncodedValue, FieldRef, Program},
};

/// Values of static fields that hold the same constant everywhere.
///
/// A field qualifies when it is `static final`, carries an encoded value and
/// no code in the program writes it; its encoded value is then the only value
/// any read can observe.
#[derive(Debug, Clone, Default)]
pub struct WholeProgramState {
    fields: HashMap<FieldRef, ConstantValue>,
}

impl WholeProgramState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the constant static fields of `program`.
    #[must_use]
    pub fn from_program(program: &Program) -> Self {
        let written: HashSet<&FieldRef> = program
            .methods()
            .filter_map(|m| m.code.as_ref())
            .flat_map(|code| code.instructions())
            .filter(|insn| insn.opcode.is_sput())
            .filter_map(|insn| insn.field())
            .collect();

        let fields = program
            .classes()
            .iter()
            .flat_map(|class| class.static_fields())
            .filter(|field| field.is_final() && !written.contains(&field.reference))
            .filter_map(|field| {
                let value = field.static_value.as_ref()?;
                Some((field.reference.clone(), encoded_to_constant(value)))
            })
            .collect();
        Self { fields }
    }

    /// Records a known field value.
    pub fn insert(&mut self, field: FieldRef, value: ConstantValue) {
        self.fields.insert(field, value);
    }

    /// The value of `field`, if it is known.
    #[must_use]
    pub fn get(&self, field: &FieldRef) -> Option<&ConstantValue> {
        self.fields.get(field)
    }

    /// Number of known fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The abstract value of an encoded static value. `null` is the zero
/// reference.
#[must_use]
pub fn encoded_to_constant(value: &EncodedValue) -> ConstantValue {
    match value {
        EncodedValue::Int(v) => ConstantValue::int(*v),
        EncodedValue::String(s) => ConstantValue::string(s.clone()),
        EncodedValue::Null => ConstantValue::int(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::assembler::program_from_str;

    #[test]
    fn test_only_unwritten_final_fields() {
        let program = program_from_str(
            r#"
            (class (public) "LFoo;"
              (field (public static final) "LFoo;.a:I" 3)
              (field (public static final) "LFoo;.b:I" 4)
              (field (public static) "LFoo;.c:I" 5)
              (field (public static final) "LFoo;.s:Ljava/lang/String;" "hi")
              (method (public static) "LFoo;.f:()V"
                ((const v0 1) (sput v0 "LFoo;.b:I") (return-void))))
            "#,
        )
        .unwrap();
        let state = WholeProgramState::from_program(&program);
        let f = |d: &str| FieldRef::parse(d).unwrap();

        assert_eq!(state.len(), 2);
        assert_eq!(state.get(&f("LFoo;.a:I")).and_then(ConstantValue::as_int), Some(3));
        assert!(state.get(&f("LFoo;.b:I")).is_none());
        assert!(state.get(&f("LFoo;.c:I")).is_none());
        assert!(state.get(&f("LFoo;.s:Ljava/lang/String;")).is_some_and(ConstantValue::is_constant));
    }
}
