//! Abstract interpretation framework.
//!
//! The framework is built around three core abstractions:
//!
//! - **Lattice**: [`JoinSemiLattice`] and [`AbstractDomain`] define abstract
//!   values and how they combine where control flow merges
//! - **Transfer**: a [`Transfer`] implementation specifies how instructions
//!   and edges transform a state, and in which [`Direction`]
//! - **Iterator**: [`MonotonicFixpointIterator`] computes the fixpoint with a
//!   worklist, widening after a bounded number of joins
//!
//! States are usually [`Environment`]s mapping locations (registers, fields)
//! to values of one of the [`domains`].
//!
//! # Analyses Provided
//!
//! - [`liveness`]: live registers, backward
//! - [`crate::analysis::constprop`]: constants, forward
//! - [`crate::analysis::pointers`]: allocation sites and escapes, forward
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync` when their domain is; one
//! iterator runs per method, so methods are analyzed in parallel.

pub mod domains;
mod environment;
mod framework;
mod lattice;
pub mod liveness;
mod solver;

pub use domains::{ConstantValue, Effects, PointerSet, SignedConstantDomain, StringDomain};
pub use environment::Environment;
pub use framework::{Direction, Transfer};
pub use lattice::{AbstractDomain, JoinSemiLattice};
pub use liveness::{LiveRegisters, LivenessTransfer};
pub use solver::{MonotonicFixpointIterator, DEFAULT_WIDENING_THRESHOLD};
