//! # optscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the optscope library. Import this module to get quick access to the essential
//! types for analyzing and optimizing bytecode.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all optscope operations
pub use crate::Error;

/// The result type used throughout optscope
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Text form of code, methods and programs
pub use crate::ir::assembler;

/// Instructions and control flow
pub use crate::ir::{
    Block, BlockId, ControlFlowGraph, Edge, EdgeKind, InsnId, Instruction, Opcode, Operand, Reg,
};

/// Program model
pub use crate::ir::{
    AccessFlags, Class, EncodedValue, Field, FieldRef, Method, MethodRef, Program, TypeRef,
};

// ================================================================================================
// Dataflow Framework
// ================================================================================================

/// Lattice traits, needed to call `top()`, `bottom()` and `join()`
pub use crate::analysis::dataflow::{AbstractDomain, JoinSemiLattice};

/// The fixpoint iterator and the transfer interface
pub use crate::analysis::dataflow::{Direction, MonotonicFixpointIterator, Transfer};

/// Abstract domains and environments
pub use crate::analysis::dataflow::{
    ConstantValue, Effects, Environment, PointerSet, SignedConstantDomain, StringDomain,
};

/// Constant propagation
pub use crate::analysis::constprop::{
    ConstantEnvironment, ConstantTransfer, Location, WholeProgramState,
};

// ================================================================================================
// Interprocedural Analysis
// ================================================================================================

/// Call graph construction
pub use crate::analysis::callgraph::CallGraph;

/// Side-effect summaries
pub use crate::analysis::summary::{seeded_summaries, Summary, SummaryDriver, SummaryMap};

// ================================================================================================
// Transforms and Passes
// ================================================================================================

/// Deferred edits and the constant propagation transform
pub use crate::compiler::{Config, EditQueue, LocalDce, Transform, TransformStats};

/// Pass pipeline
pub use crate::compiler::{EventKind, EventLog, Pass, PassConfig, PassContext, PassManager};
