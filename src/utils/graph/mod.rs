//! Directed graph abstractions shared by control-flow graphs and call graphs.
//!
//! Graphs in this crate store their nodes in dense vectors, so a node is
//! identified by a [`NodeId`] wrapping its index. Algorithms are written
//! against the small [`Successors`] / [`Predecessors`] traits instead of a
//! concrete graph type, which lets [`crate::ir::ControlFlowGraph`] and
//! [`crate::analysis::callgraph::CallGraph`] share traversal orders and
//! strongly connected component detection.

use std::fmt;

pub mod algorithms;

/// A strongly-typed identifier for nodes within a directed graph.
///
/// `NodeId` wraps a `usize` index so that node indices cannot be confused with
/// registers, instruction ids or other integers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

/// Basic information about a graph with densely numbered nodes.
pub trait GraphBase {
    /// Returns the number of nodes; valid ids are `0..node_count()`.
    fn node_count(&self) -> usize;
}

/// A graph whose outgoing edges can be enumerated.
pub trait Successors: GraphBase {
    /// Returns the successors of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// A graph whose incoming edges can be enumerated.
pub trait Predecessors: GraphBase {
    /// Returns the predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Adjacency-list graph used by the algorithm tests.
    pub(crate) struct TestGraph {
        pub(crate) succs: Vec<Vec<usize>>,
    }

    impl TestGraph {
        pub(crate) fn new(node_count: usize, edges: &[(usize, usize)]) -> Self {
            let mut succs = vec![Vec::new(); node_count];
            for &(from, to) in edges {
                succs[from].push(to);
            }
            Self { succs }
        }
    }

    impl GraphBase for TestGraph {
        fn node_count(&self) -> usize {
            self.succs.len()
        }
    }

    impl Successors for TestGraph {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
            self.succs[node.index()].iter().map(|&s| NodeId::new(s))
        }
    }

    #[test]
    fn test_node_id_roundtrip() {
        let node: NodeId = 123usize.into();
        assert_eq!(node.index(), 123);
        assert_eq!(format!("{node:?}"), "NodeId(123)");
        assert_eq!(format!("{node}"), "n123");
    }

    #[test]
    fn test_node_id_ordering() {
        let mut nodes = vec![NodeId::new(3), NodeId::new(1), NodeId::new(2)];
        nodes.sort();
        assert_eq!(nodes, vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);
    }
}
