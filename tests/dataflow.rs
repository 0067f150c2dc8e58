//! Lattice laws and fixpoint properties of the dataflow framework.

use std::sync::Arc;

use optscope::{analysis::dataflow::liveness, prelude::*};
use test_log::test;

type Env = Environment<u32, SignedConstantDomain>;

fn samples() -> Vec<Env> {
    let mut out = vec![Env::bottom(), Env::top()];
    for bindings in [&[(0, 1)][..], &[(0, 2)], &[(0, 1), (1, 5)], &[(1, 5)], &[(2, -3), (0, 1)]] {
        let mut env = Env::top();
        for &(k, v) in bindings {
            env.set(k, SignedConstantDomain::Value(v));
        }
        out.push(env);
    }
    out
}

#[test]
fn environment_join_is_a_semilattice() {
    let envs = samples();
    for a in &envs {
        assert_eq!(a.join(a), *a, "idempotent");
        assert_eq!(a.join(&Env::bottom()), *a, "bottom is neutral");
        assert!(a.join(&Env::top()).is_top(), "top absorbs");
        for b in &envs {
            assert_eq!(a.join(b), b.join(a), "commutative");
            assert!(a.leq(&a.join(b)) && b.leq(&a.join(b)), "upper bound");
            for c in &envs {
                assert_eq!(a.join(b).join(c), a.join(&b.join(c)), "associative");
            }
        }
    }
}

#[test]
fn environment_meet_is_a_lower_bound() {
    let envs = samples();
    for a in &envs {
        assert_eq!(a.meet(&Env::top()), *a);
        assert!(a.meet(&Env::bottom()).is_bottom());
        for b in &envs {
            let m = a.meet(b);
            assert_eq!(m, b.meet(a));
            assert!(m.leq(a) && m.leq(b));
        }
    }
}

#[test]
fn constant_values_of_different_kinds_join_to_top() {
    let int = ConstantValue::int(1);
    let string = ConstantValue::string(Arc::from("x"));
    assert!(int.join(&string).is_top());
    assert_eq!(int.join(&ConstantValue::int(1)), int);
    assert!(int.meet(&string).is_bottom());
}

const LOOP: &str = r#"(
  (load-param v2)
  (const v0 0)
  (const v1 1)
  (:head)
  (if-eq v0 v2 :done)
  (add-int/lit8 v0 v0 1)
  (goto :head)
  (:done)
  (return v1)
)"#;

#[test]
fn fixpoint_is_a_post_fixpoint() {
    let code = assembler::code_from_str(LOOP).unwrap();
    let mut iterator = MonotonicFixpointIterator::new(&code, ConstantTransfer::new());
    iterator.run(ConstantEnvironment::top());

    // Rerunning the transfer on the computed states changes nothing
    let transfer = iterator.transfer();
    for block in code.blocks() {
        let mut state = iterator.entry_state_at(block.id()).clone();
        transfer.analyze_node(block, &mut state);
        assert!(state.leq(iterator.exit_state_at(block.id())), "block {:?}", block.id());
        for edge in block.succs() {
            let out = transfer.analyze_edge(edge, block, iterator.exit_state_at(block.id()));
            assert!(out.leq(iterator.entry_state_at(edge.target)));
        }
    }

    let exit = code.exit_blocks()[0];
    let env = iterator.exit_state_at(exit);
    assert_eq!(env.get(&Location::Register(1)).as_int(), Some(1));
    assert!(env.get(&Location::Register(0)).is_top());
}

#[test]
fn widening_early_keeps_finite_height_results() {
    let code = assembler::code_from_str(LOOP).unwrap();
    let mut first = MonotonicFixpointIterator::new(&code, ConstantTransfer::new());
    first.run(ConstantEnvironment::top());
    let mut second = MonotonicFixpointIterator::new(&code, ConstantTransfer::new())
        .with_widening_threshold(1);
    second.run(ConstantEnvironment::top());

    for block in code.blocks() {
        assert_eq!(first.entry_state_at(block.id()), second.entry_state_at(block.id()));
    }
}

#[test]
fn liveness_runs_backward() {
    let code = assembler::code_from_str(LOOP).unwrap();
    let iterator = liveness::analyze(&code);
    let first = code.blocks()[0].id();
    // In analysis order a block is entered at its end
    let live_out = iterator.entry_state_at(first);
    assert!(live_out.is_live(0) && live_out.is_live(1) && live_out.is_live(2));
    let live_in = iterator.exit_state_at(first);
    assert!(!live_in.is_live(0) && !live_in.is_live(1) && !live_in.is_live(2));

    let mut seen = Vec::new();
    iterator.replay(first, |insn, live_after| {
        seen.push((insn.opcode, live_after.is_live(1)));
    });
    assert!(seen.contains(&(Opcode::Const, true)));
}
