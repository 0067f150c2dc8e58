//! Call site representation.

use crate::ir::{InsnId, MethodRef, Opcode};

/// Kind of invoke instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// `invoke-static`.
    Static,
    /// `invoke-direct`: constructors and private methods.
    Direct,
    /// `invoke-virtual`.
    Virtual,
    /// `invoke-super`.
    Super,
    /// `invoke-interface`.
    Interface,
}

impl CallType {
    /// The call type of an invoke opcode.
    #[must_use]
    pub const fn from_opcode(opcode: Opcode) -> Option<Self> {
        match opcode {
            Opcode::InvokeStatic => Some(Self::Static),
            Opcode::InvokeDirect => Some(Self::Direct),
            Opcode::InvokeVirtual => Some(Self::Virtual),
            Opcode::InvokeSuper => Some(Self::Super),
            Opcode::InvokeInterface => Some(Self::Interface),
            _ => None,
        }
    }

    /// Returns `true` if the target is chosen by the receiver at runtime.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual | Self::Interface)
    }

    /// Returns `true` if the call passes a receiver as its first argument.
    #[must_use]
    pub const fn has_receiver(&self) -> bool {
        !matches!(self, Self::Static)
    }
}

/// A single invoke instruction and what it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// The invoke instruction.
    pub insn: InsnId,
    /// The method named by the instruction.
    pub declared: MethodRef,
    /// The definition that is certainly invoked, if known statically.
    pub target: Option<MethodRef>,
    /// The invoke kind.
    pub call_type: CallType,
}

impl CallSite {
    /// Returns `true` if the callee is statically known.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }
}
