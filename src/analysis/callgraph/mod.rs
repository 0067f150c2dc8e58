//! Inter-procedural call graph construction.
//!
//! The call graph is built by scanning method bodies for invoke instructions
//! and resolving their targets against the class hierarchy. Only targets that
//! are certain become edges: the summary driver treats every other call site
//! as an unknown invoke.
//!
//! # Components
//!
//! - [`CallGraph`]: methods, call sites and caller/callee edges
//! - [`CallGraphNode`]: a method and its call sites
//! - [`CallSite`]: a single invoke instruction
//! - [`CallResolver`]: static target resolution
//!
//! # Example
//!
//! ```rust,ignore
//! let graph = CallGraph::build(&program);
//!
//! for callee in graph.callees(&method) {
//!     println!("calls {callee}");
//! }
//!
//! for method in graph.recursive_methods() {
//!     println!("recursive: {method}");
//! }
//! ```

mod graph;
mod resolution;
mod site;

pub use graph::{CallGraph, CallGraphNode, CallGraphStats};
pub use resolution::CallResolver;
pub use site::{CallSite, CallType};
