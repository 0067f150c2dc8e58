//! Graph algorithms for program analysis.
//!
//! ## Traversal
//!
//! - [`postorder`] - Postorder traversal, the iteration order of backward analyses
//! - [`reverse_postorder`] - Reverse postorder, the iteration order of forward analyses
//!
//! ## Strongly Connected Components
//!
//! - [`strongly_connected_components`] - Tarjan's SCC algorithm, used for
//!   recursion detection in the call graph
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | Postorder / RPO | O(V + E) | Worklist seeding |
//! | SCC | O(V + E) | Recursion detection |

mod scc;
mod traversal;

pub use scc::strongly_connected_components;
pub use traversal::{postorder, reverse_postorder};
