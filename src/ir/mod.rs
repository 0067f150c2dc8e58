//! The register-based program representation the analyses run on.
//!
//! - [`types`]: type, field and method references
//! - [`opcode`]: opcodes and their category predicates
//! - [`instruction`]: instructions, operands and identities
//! - [`cfg`]: control-flow graphs built from linear code
//! - [`program`]: classes, fields, methods and whole programs
//! - [`assembler`]: the s-expression text form
//!
//! # Examples
//!
//! ```rust
//! use optscope::ir::assembler;
//!
//! let cfg = assembler::code_from_str(r#"(
//!     (const v0 1)
//!     (sput v0 "LFoo;.bar:I")
//!     (return-void)
//! )"#)?;
//! assert_eq!(cfg.block_count(), 1);
//! assert_eq!(cfg.instruction_count(), 3);
//! # Ok::<(), optscope::Error>(())
//! ```

pub mod assembler;
pub mod cfg;
pub mod instruction;
pub mod opcode;
pub mod program;
pub mod types;

pub use cfg::{Block, BlockId, ControlFlowGraph, Edge, EdgeKind, LinearEntry};
pub use instruction::{InsnId, Instruction, Label, Operand, Reg, RESULT_REGISTER};
pub use opcode::{Opcode, OperandKind};
pub use program::{AccessFlags, Class, EncodedValue, Field, Method, Program};
pub use types::{FieldRef, MethodRef, TypeRef};
