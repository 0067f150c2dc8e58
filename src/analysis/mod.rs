//! Static analyses over the register-based IR.
//!
//! Every intraprocedural analysis is an abstract interpretation driven by the
//! [`dataflow`] framework; interprocedural results are composed over the
//! [`callgraph`].
//!
//! # Architecture
//!
//! - [`dataflow`] - lattices, domains, environments and the fixpoint iterator
//! - [`constprop`] - constant propagation with branch refinement
//! - [`pointers`] - allocation sites and escapes
//! - [`callgraph`] - statically resolved call edges and recursion detection
//! - [`summary`] - bottom-up side-effect summaries
//!
//! # Usage
//!
//! ```rust
//! use optscope::analysis::{
//!     callgraph::CallGraph,
//!     summary::{seeded_summaries, SummaryDriver},
//! };
//! use optscope::ir::assembler::program_from_str;
//!
//! let program = program_from_str(r#"
//!     (class (public) "LFoo;"
//!       (method (public static) "LFoo;.f:()V" ((return-void))))
//! "#)?;
//!
//! let graph = CallGraph::build(&program);
//! let summaries = seeded_summaries();
//! assert_eq!(SummaryDriver::new(&program, &graph, &summaries).run(), 1);
//! # Ok::<(), optscope::Error>(())
//! ```

pub mod callgraph;
pub mod constprop;
pub mod dataflow;
pub mod pointers;
pub mod summary;
