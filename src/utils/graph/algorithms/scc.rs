//! Strongly Connected Components (SCC) using Tarjan's algorithm.
//!
//! In a call graph, an SCC with more than one method (or a single method that
//! calls itself) is a recursive cycle.

use crate::utils::graph::{NodeId, Successors};

/// Computes the strongly connected components of a directed graph.
///
/// Components are returned in reverse topological order of the condensation:
/// a component is emitted before any component that can reach it, so callees
/// come before their callers.
pub fn strongly_connected_components<G>(graph: &G) -> Vec<Vec<NodeId>>
where
    G: Successors,
{
    let node_count = graph.node_count();
    let mut state = TarjanState::new(node_count);

    for i in 0..node_count {
        if state.index[i].is_none() {
            state.strongconnect(graph, NodeId::new(i));
        }
    }

    state.sccs
}

struct TarjanState {
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<NodeId>,
    current_index: usize,
    sccs: Vec<Vec<NodeId>>,
}

impl TarjanState {
    fn new(n: usize) -> Self {
        Self {
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            current_index: 0,
            sccs: Vec::new(),
        }
    }

    fn strongconnect<G: Successors>(&mut self, graph: &G, v: NodeId) {
        let v_idx = v.index();
        let v_index = self.current_index;

        self.index[v_idx] = Some(v_index);
        self.lowlink[v_idx] = v_index;
        self.current_index += 1;
        self.stack.push(v);
        self.on_stack[v_idx] = true;

        let successors: Vec<NodeId> = graph.successors(v).collect();
        for w in successors {
            let w_idx = w.index();
            match self.index[w_idx] {
                None => {
                    self.strongconnect(graph, w);
                    self.lowlink[v_idx] = self.lowlink[v_idx].min(self.lowlink[w_idx]);
                }
                Some(w_index) if self.on_stack[w_idx] => {
                    self.lowlink[v_idx] = self.lowlink[v_idx].min(w_index);
                }
                Some(_) => {}
            }
        }

        if self.lowlink[v_idx] == v_index {
            let mut scc = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w.index()] = false;
                scc.push(w);
                if w == v {
                    break;
                }
            }
            scc.sort();
            self.sccs.push(scc);
        }
    }
}
