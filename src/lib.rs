// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # optscope
//!
//! Static analysis and optimization toolkit for register-based bytecode.
//!
//! `optscope` expresses its analyses as abstract interpretation over the control-flow
//! graph of a method and composes them interprocedurally through a call graph. Results
//! are turned into code rewrites by a transform engine that never mutates code while it
//! is still being read.
//!
//! ## Features
//!
//! - **Monotonic fixpoint iterator** - Kildall-style worklist over a CFG, forward or
//!   backward, with widening at loop heads
//! - **Abstract domains** - signed constants, string constants, allocation-site pointer
//!   sets, effect bitsets, and location-keyed environments over any of them
//! - **Side-effect summaries** - bottom-up, memoized and cycle-safe summarization of every
//!   method in parallel, with a compact s-expression cache format
//! - **Deferred-commit transforms** - replacement, deletion and branch folding queued
//!   during analysis and applied in one pass followed by CFG validation
//!
//! ## Quick Start
//!
//! ```rust
//! use optscope::prelude::*;
//!
//! let code = assembler::code_from_str(
//!     r#"(
//!       (const v0 1)
//!       (add-int/lit8 v1 v0 41)
//!       (return v1)
//!     )"#,
//! )?;
//!
//! let mut iterator = MonotonicFixpointIterator::new(&code, ConstantTransfer::default());
//! iterator.run(ConstantEnvironment::top());
//! # Ok::<(), optscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - instructions, opcodes, control-flow graphs and the program model
//! - [`analysis`] - dataflow framework, domains, constant propagation, pointers,
//!   call graph and side-effect summaries
//! - [`compiler`] - the edit queue, transforms, passes and the pass manager
//! - [`Error`] and [`Result`] - error handling shared by all modules
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use optscope::{analysis::summary::Summary, utils::SExpr, Error};
//!
//! let expr = SExpr::parse(r#"("banana" (0))"#)?;
//! match Summary::from_s_expr(&expr) {
//!     Err(Error::CorruptSummaryCache(reason)) => println!("rebuilding: {reason}"),
//!     other => println!("{other:?}"),
//! }
//! # Ok::<(), optscope::Error>(())
//! ```
#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
pub mod prelude;

/// Shared data structures: bit sets, graph algorithms and s-expressions.
pub mod utils;

/// Register-based intermediate representation.
///
/// # Key Types
///
/// - [`ir::Instruction`] - a single instruction with a stable [`ir::InsnId`]
/// - [`ir::Opcode`] - the opcode and its category predicates
/// - [`ir::ControlFlowGraph`] - basic blocks, edges, linearization and validation
/// - [`ir::Program`] - classes, fields and methods
pub mod ir;

/// Static analyses built on abstract interpretation.
pub mod analysis;

/// Transform engine and pass pipeline.
pub mod compiler;

/// `optscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `optscope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;
