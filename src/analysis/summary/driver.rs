//! Bottom-up summary computation over the call graph.
//!
//! Every method is visited from a parallel top-level loop. A visit first
//! visits the method's statically known callees, then builds the method's
//! summary from theirs and publishes it. Visits started by different threads
//! may race on the same method; the first published summary wins and later
//! ones are dropped. Each of them is sound on its own.

use log::{debug, info};
use rayon::prelude::*;

use crate::{
    analysis::{
        callgraph::CallGraph,
        summary::{Summary, SummaryBuilder, SummaryMap},
    },
    ir::{Method, MethodRef, Program},
};

/// The methods on the current visit path, innermost first.
///
/// Each frame lives on the stack of the visit that pushed it, so a path is
/// never shared between threads.
#[derive(Debug, Clone, Copy)]
enum VisitPath<'p> {
    Root,
    Frame {
        method: &'p MethodRef,
        parent: &'p VisitPath<'p>,
    },
}

impl<'p> VisitPath<'p> {
    fn contains(&self, target: &MethodRef) -> bool {
        let mut path = self;
        while let VisitPath::Frame { method, parent } = path {
            if *method == target {
                return true;
            }
            path = *parent;
        }
        false
    }

    fn push(&'p self, method: &'p MethodRef) -> VisitPath<'p> {
        VisitPath::Frame {
            method,
            parent: self,
        }
    }
}

/// Computes the summaries of all methods of a program.
///
/// # Example
///
/// ```rust
/// use optscope::analysis::{
///     callgraph::CallGraph,
///     dataflow::Effects,
///     summary::{seeded_summaries, SummaryDriver},
/// };
/// use optscope::ir::{assembler::program_from_str, MethodRef};
///
/// let program = program_from_str(r#"
///     (class (public) "LFoo;"
///       (method (public static) "LFoo;.a:()V"
///         ((invoke-static () "LFoo;.b:()V") (return-void)))
///       (method (public static) "LFoo;.b:()V"
///         ((const v0 1) (sput v0 "LFoo;.x:I") (return-void))))
/// "#)?;
/// let graph = CallGraph::build(&program);
/// let summaries = seeded_summaries();
/// SummaryDriver::new(&program, &graph, &summaries).run();
///
/// let a = summaries.get(&MethodRef::parse("LFoo;.a:()V")?).unwrap();
/// assert_eq!(a.effects, Effects::WRITE_MAY_ESCAPE);
/// # Ok::<(), optscope::Error>(())
/// ```
pub struct SummaryDriver<'a> {
    program: &'a Program,
    call_graph: &'a CallGraph,
    summaries: &'a SummaryMap,
}

impl<'a> SummaryDriver<'a> {
    /// Creates a driver publishing into `summaries`. Entries already present
    /// are kept as they are.
    #[must_use]
    pub fn new(program: &'a Program, call_graph: &'a CallGraph, summaries: &'a SummaryMap) -> Self {
        Self {
            program,
            call_graph,
            summaries,
        }
    }

    /// Summarizes every method with code. Returns the number of summaries
    /// published by this run.
    pub fn run(&self) -> usize {
        let before = self.summaries.len();
        let methods: Vec<&Method> = self.program.methods().collect();
        methods
            .par_iter()
            .for_each(|method| self.visit(method, &VisitPath::Root));

        let published = self.summaries.len() - before;
        info!(
            "Summarized {} methods ({} recursive)",
            published,
            self.call_graph.recursive_methods().len()
        );
        published
    }

    fn visit(&self, method: &Method, path: &VisitPath<'_>) {
        let reference = &method.reference;
        if method.code.is_none()
            || self.summaries.contains_key(reference)
            || path.contains(reference)
        {
            return;
        }
        let path = path.push(reference);

        for callee in self.call_graph.callees(reference) {
            if let Some(callee) = self.program.method(&callee) {
                self.visit(callee, &path);
            }
        }

        let Some(summary) = SummaryBuilder::new(method, self.call_graph, self.summaries).build()
        else {
            return;
        };
        self.publish(reference, summary);
    }

    fn publish(&self, method: &MethodRef, summary: Summary) {
        debug!(
            "{} {} side effects ({}), modified params {:?}",
            method,
            if summary.effects.is_empty() { "has no" } else { "has" },
            summary.effects.bits(),
            summary.modified_params
        );
        self.summaries.entry(method.clone()).or_insert(summary);
    }
}
