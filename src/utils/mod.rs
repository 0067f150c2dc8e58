//! Shared utilities used across the analysis and compiler layers.
//!
//! - [`BitSet`] - compact register sets for liveness
//! - [`graph`] - node identifiers, graph traits, traversal orders and SCCs
//! - [`SExpr`] - the s-expression reader and printer behind the assembler and the
//!   summary cache

mod bitset;
pub mod graph;
mod sexpr;

pub use bitset::{BitSet, BitSetIter};
pub use sexpr::SExpr;
