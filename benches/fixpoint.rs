#![allow(unused)]
extern crate optscope;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use optscope::{analysis::dataflow::liveness, prelude::*};
use std::{fmt::Write, hint::black_box};

/// Builds a method with `loops` sequential counting loops, each folding a
/// constant into an accumulator.
fn nested_loops(loops: usize) -> String {
    let mut code = String::from("((load-param v9) (const v0 0) (const v1 1)");
    for i in 0..loops {
        let _ = write!(
            code,
            " (const v2 0) (:head{i}) (if-eq v2 v9 :done{i}) (add-int v0 v0 v1) \
             (add-int/lit8 v2 v2 1) (goto :head{i}) (:done{i})"
        );
    }
    code.push_str(" (return v0))");
    code
}

/// Benchmark forward constant propagation and backward liveness over
/// methods of growing size.
fn bench_fixpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixpoint");
    for loops in [1, 8, 64] {
        let cfg = assembler::code_from_str(&nested_loops(loops)).unwrap();
        group.throughput(Throughput::Elements(cfg.instruction_count() as u64));

        group.bench_with_input(BenchmarkId::new("constprop", loops), &cfg, |b, cfg| {
            b.iter(|| {
                let mut iterator = MonotonicFixpointIterator::new(cfg, ConstantTransfer::new());
                iterator.run(ConstantEnvironment::top());
                black_box(iterator.iterations())
            });
        });

        group.bench_with_input(BenchmarkId::new("liveness", loops), &cfg, |b, cfg| {
            b.iter(|| black_box(liveness::analyze(black_box(cfg)).iterations()));
        });
    }
    group.finish();
}

/// Benchmark the summary driver over a chain of callers.
fn bench_summaries(c: &mut Criterion) {
    let mut source = String::from(r#"(class (public) "LChain;""#);
    for i in 0..200 {
        let _ = write!(
            source,
            r#" (method (public static) "LChain;.m{i}:()V" ((invoke-static () "LChain;.m{}:()V") (return-void)))"#,
            i + 1
        );
    }
    source.push_str(r#" (method (public static) "LChain;.m200:()V" ((return-void))))"#);
    let program = assembler::program_from_str(&source).unwrap();
    let graph = CallGraph::build(&program);

    c.bench_function("summaries_chain_200", |b| {
        b.iter(|| {
            let summaries = seeded_summaries();
            black_box(SummaryDriver::new(&program, &graph, &summaries).run())
        });
    });
}

criterion_group!(benches, bench_fixpoint, bench_summaries);
criterion_main!(benches);
