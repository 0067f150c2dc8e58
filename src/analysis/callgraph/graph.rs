//! Call graph construction and representation.
//!
//! Nodes are the methods of a [`Program`]; an edge joins a caller to every
//! callee one of its invoke instructions certainly reaches. Call sites whose
//! target cannot be resolved statically are kept on the caller's node without
//! an edge, so that analyses can treat them as unknown.

use std::{
    collections::{BTreeSet, HashMap},
    sync::OnceLock,
};

use crate::{
    analysis::callgraph::{CallResolver, CallSite, CallType},
    ir::{InsnId, MethodRef, Program},
    utils::graph::{
        algorithms::strongly_connected_components, GraphBase, NodeId, Predecessors, Successors,
    },
};

/// A method in the call graph.
#[derive(Debug, Clone)]
pub struct CallGraphNode {
    /// The method.
    pub method: MethodRef,
    /// Every invoke in the method body, in layout order.
    pub call_sites: Vec<CallSite>,
    /// Whether the method has a body.
    pub has_code: bool,
}

/// Inter-procedural call graph of a program.
///
/// # Example
///
/// ```rust
/// use optscope::analysis::callgraph::CallGraph;
/// use optscope::ir::{assembler::program_from_str, MethodRef};
///
/// let program = program_from_str(r#"
///     (class (public) "LFoo;"
///       (method (public static) "LFoo;.a:()V"
///         ((invoke-static () "LFoo;.b:()V") (return-void)))
///       (method (public static) "LFoo;.b:()V" ((return-void))))
/// "#)?;
/// let graph = CallGraph::build(&program);
///
/// let a = MethodRef::parse("LFoo;.a:()V")?;
/// assert_eq!(graph.callees(&a), vec![MethodRef::parse("LFoo;.b:()V")?]);
/// assert!(!graph.has_recursion());
/// # Ok::<(), optscope::Error>(())
/// ```
#[derive(Debug)]
pub struct CallGraph {
    /// Method nodes.
    nodes: Vec<CallGraphNode>,
    /// Callees of each node, deduplicated.
    succs: Vec<Vec<NodeId>>,
    /// Callers of each node, deduplicated.
    preds: Vec<Vec<NodeId>>,
    /// Map from method to node.
    index: HashMap<MethodRef, NodeId>,
    /// Strongly connected components (lazily computed on first access).
    sccs: OnceLock<Vec<Vec<NodeId>>>,
}

impl CallGraph {
    /// Builds the call graph of `program`.
    #[must_use]
    pub fn build(program: &Program) -> Self {
        let resolver = CallResolver::new(program);

        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        for method in program.methods() {
            index.insert(method.reference.clone(), NodeId::new(nodes.len()));
            nodes.push(CallGraphNode {
                method: method.reference.clone(),
                call_sites: Vec::new(),
                has_code: method.code.is_some(),
            });
        }

        let mut succs = vec![Vec::new(); nodes.len()];
        let mut preds = vec![Vec::new(); nodes.len()];
        for (caller, method) in program.methods().enumerate() {
            let Some(code) = &method.code else {
                continue;
            };
            let mut callees = BTreeSet::new();
            for insn in code.instructions() {
                let (Some(call_type), Some(declared)) =
                    (CallType::from_opcode(insn.opcode), insn.method())
                else {
                    continue;
                };
                let target = resolver.resolve(declared, call_type);
                if let Some(callee) = target.as_ref().and_then(|t| index.get(t)) {
                    callees.insert(*callee);
                }
                nodes[caller].call_sites.push(CallSite {
                    insn: insn.id,
                    declared: declared.clone(),
                    target,
                    call_type,
                });
            }
            for callee in callees {
                succs[caller].push(callee);
                preds[callee.index()].push(NodeId::new(caller));
            }
        }

        Self {
            nodes,
            succs,
            preds,
            index,
            sccs: OnceLock::new(),
        }
    }

    /// Number of methods.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of caller/callee pairs.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.succs.iter().map(Vec::len).sum()
    }

    /// Looks up the node of a method.
    #[must_use]
    pub fn node(&self, method: &MethodRef) -> Option<&CallGraphNode> {
        self.index.get(method).map(|id| &self.nodes[id.index()])
    }

    /// All nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &CallGraphNode> {
        self.nodes.iter()
    }

    /// Methods certainly called by `caller`.
    #[must_use]
    pub fn callees(&self, caller: &MethodRef) -> Vec<MethodRef> {
        self.neighbors(caller, &self.succs)
    }

    /// Methods that certainly call `callee`.
    #[must_use]
    pub fn callers(&self, callee: &MethodRef) -> Vec<MethodRef> {
        self.neighbors(callee, &self.preds)
    }

    fn neighbors(&self, method: &MethodRef, adjacency: &[Vec<NodeId>]) -> Vec<MethodRef> {
        let Some(id) = self.index.get(method) else {
            return Vec::new();
        };
        adjacency[id.index()]
            .iter()
            .map(|n| self.nodes[n.index()].method.clone())
            .collect()
    }

    /// Every invoke of `method`.
    #[must_use]
    pub fn call_sites(&self, method: &MethodRef) -> &[CallSite] {
        self.node(method).map_or(&[], |n| n.call_sites.as_slice())
    }

    /// The resolved callee of the invoke `insn` in `caller`.
    #[must_use]
    pub fn callee_at(&self, caller: &MethodRef, insn: InsnId) -> Option<&MethodRef> {
        self.call_sites(caller)
            .iter()
            .find(|site| site.insn == insn)
            .and_then(|site| site.target.as_ref())
    }

    /// Strongly connected components, callees first.
    #[must_use]
    pub fn sccs(&self) -> &[Vec<NodeId>] {
        self.sccs.get_or_init(|| strongly_connected_components(self))
    }

    /// Returns `true` if any method can reach itself through calls.
    #[must_use]
    pub fn has_recursion(&self) -> bool {
        !self.recursive_methods().is_empty()
    }

    /// Methods that call themselves, directly or through a cycle, sorted.
    #[must_use]
    pub fn recursive_methods(&self) -> Vec<MethodRef> {
        let mut recursive: Vec<MethodRef> = self
            .sccs()
            .iter()
            .filter(|scc| scc.len() > 1 || scc.iter().any(|&n| self.succs[n.index()].contains(&n)))
            .flatten()
            .map(|n| self.nodes[n.index()].method.clone())
            .collect();
        recursive.sort();
        recursive
    }

    /// Aggregate metrics.
    #[must_use]
    pub fn stats(&self) -> CallGraphStats {
        let sites = || self.nodes.iter().flat_map(|n| &n.call_sites);
        CallGraphStats {
            method_count: self.method_count(),
            edge_count: self.edge_count(),
            total_call_sites: sites().count(),
            virtual_calls: sites().filter(|s| s.call_type.is_virtual()).count(),
            resolved_calls: sites().filter(|s| s.is_resolved()).count(),
            scc_count: self.sccs().len(),
            recursive_methods: self.recursive_methods().len(),
        }
    }
}

impl GraphBase for CallGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Successors for CallGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.succs[node.index()].iter().copied()
    }
}

impl Predecessors for CallGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.preds[node.index()].iter().copied()
    }
}

/// Call graph metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallGraphStats {
    /// Number of methods.
    pub method_count: usize,
    /// Number of caller/callee pairs.
    pub edge_count: usize,
    /// Number of invoke instructions.
    pub total_call_sites: usize,
    /// Number of virtual and interface invokes.
    pub virtual_calls: usize,
    /// Number of invokes with a statically known target.
    pub resolved_calls: usize,
    /// Number of strongly connected components.
    pub scc_count: usize,
    /// Number of methods in a recursive cycle.
    pub recursive_methods: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::assembler::program_from_str;

    fn m(desc: &str) -> MethodRef {
        MethodRef::parse(desc).unwrap()
    }

    #[test]
    fn test_mutual_recursion() {
        let program = program_from_str(
            r#"
            (class (public) "LFoo;"
              (method (public static) "LFoo;.even:()V"
                ((invoke-static () "LFoo;.odd:()V") (return-void)))
              (method (public static) "LFoo;.odd:()V"
                ((invoke-static () "LFoo;.even:()V") (return-void)))
              (method (public static) "LFoo;.self:()V"
                ((invoke-static () "LFoo;.self:()V") (return-void)))
              (method (public static) "LFoo;.leaf:()V" ((return-void))))
            "#,
        )
        .unwrap();
        let graph = CallGraph::build(&program);

        assert_eq!(graph.method_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.has_recursion());
        assert_eq!(
            graph.recursive_methods(),
            vec![m("LFoo;.even:()V"), m("LFoo;.odd:()V"), m("LFoo;.self:()V")]
        );
        assert_eq!(graph.callers(&m("LFoo;.even:()V")), vec![m("LFoo;.odd:()V")]);
        assert!(graph.callees(&m("LFoo;.leaf:()V")).is_empty());
    }

    #[test]
    fn test_unresolved_sites_have_no_edge() {
        let program = program_from_str(
            r#"
            (class (public) "LFoo;"
              (method (public) "LFoo;.run:(LBar;)V"
                (
                  (load-param-object v0)
                  (load-param-object v1)
                  (invoke-interface (v1) "LBar;.go:()V")
                  (invoke-super (v0) "Ljava/lang/Object;.hashCode:()I")
                  (invoke-static () "LExternal;.f:()V")
                  (return-void)
                )))
            "#,
        )
        .unwrap();
        let graph = CallGraph::build(&program);
        let run = m("LFoo;.run:(LBar;)V");

        assert_eq!(graph.call_sites(&run).len(), 3);
        assert_eq!(graph.edge_count(), 0);
        let stats = graph.stats();
        assert_eq!(stats.total_call_sites, 3);
        assert_eq!(stats.resolved_calls, 0);
        assert_eq!(stats.virtual_calls, 1);

        let first = graph.call_sites(&run)[0].insn;
        assert!(graph.callee_at(&run, first).is_none());
    }
}
