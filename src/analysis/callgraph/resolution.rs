//! Static call target resolution.
//!
//! A call resolves only when exactly one definition can run:
//!
//! - `invoke-static` and `invoke-direct` resolve to the named method, looked
//!   up along the superclass chain
//! - `invoke-virtual` resolves when the dispatched definition is never
//!   overridden in the program
//! - `invoke-super` and `invoke-interface` never resolve

use crate::{
    analysis::callgraph::CallType,
    ir::{MethodRef, Program},
};

/// Resolves invoke targets against a program's class hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct CallResolver<'a> {
    program: &'a Program,
}

impl<'a> CallResolver<'a> {
    /// Creates a resolver over `program`.
    #[must_use]
    pub const fn new(program: &'a Program) -> Self {
        Self { program }
    }

    /// The definition a call certainly invokes, if any.
    #[must_use]
    pub fn resolve(&self, declared: &MethodRef, call_type: CallType) -> Option<MethodRef> {
        match call_type {
            CallType::Static | CallType::Direct => self
                .program
                .resolve_virtual(declared)
                .map(|m| m.reference.clone()),
            CallType::Virtual => {
                let method = self.program.resolve_virtual(declared)?;
                (!self.program.is_overridden(method)).then(|| method.reference.clone())
            }
            CallType::Super | CallType::Interface => None,
        }
    }

    /// Returns `true` if a virtual call could dispatch to more than one
    /// definition.
    #[must_use]
    pub fn is_polymorphic(&self, declared: &MethodRef) -> bool {
        self.program
            .resolve_virtual(declared)
            .is_some_and(|m| self.program.is_overridden(m))
    }
}
