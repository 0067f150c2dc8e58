//! Interprocedural side-effect summaries.

use std::fs;

use optscope::{
    analysis::summary::cache,
    prelude::*,
};
use test_log::test;

const PROGRAM: &str = r#"
    (class (public) "LFoo;"
      (method (public static) "LFoo;.even:(I)V"
        ((load-param v0) (invoke-static (v0) "LFoo;.odd:(I)V") (return-void)))
      (method (public static) "LFoo;.odd:(I)V"
        ((load-param v0) (invoke-static (v0) "LFoo;.even:(I)V") (return-void)))
      (method (public static) "LFoo;.set:(LFoo;)V"
        (
          (load-param-object v0)
          (const v1 1)
          (iput v1 v0 "LFoo;.x:I")
          (return-void)
        ))
      (method (public static) "LFoo;.caller:()V"
        (
          (new-instance "LFoo;")
          (move-result-pseudo-object v0)
          (invoke-direct (v0) "Ljava/lang/Object;.<init>:()V")
          (invoke-static (v0) "LFoo;.set:(LFoo;)V")
          (return-void)
        ))
      (method (public static) "LFoo;.throws:()V"
        (
          (new-instance "Ljava/lang/RuntimeException;")
          (move-result-pseudo-object v0)
          (throw v0)
        )))
"#;

fn summarize(program: &Program) -> SummaryMap {
    let graph = CallGraph::build(program);
    let summaries = seeded_summaries();
    SummaryDriver::new(program, &graph, &summaries).run();
    summaries
}

fn summary(summaries: &SummaryMap, name: &str) -> Summary {
    summaries
        .get(&MethodRef::parse(name).unwrap())
        .map(|s| s.clone())
        .unwrap()
}

#[test]
fn mutual_recursion_is_an_unknown_invoke() {
    let program = assembler::program_from_str(PROGRAM).unwrap();
    let summaries = summarize(&program);
    for name in ["LFoo;.even:(I)V", "LFoo;.odd:(I)V"] {
        assert!(summary(&summaries, name).effects.contains(Effects::UNKNOWN_INVOKE));
    }
}

#[test]
fn parameter_writes_are_tracked() {
    let program = assembler::program_from_str(PROGRAM).unwrap();
    let summaries = summarize(&program);

    let set = summary(&summaries, "LFoo;.set:(LFoo;)V");
    assert!(set.effects.is_empty());
    assert_eq!(set.modified_params.iter().copied().collect::<Vec<_>>(), [0]);

    // the written object is allocated locally and never escapes
    let caller = summary(&summaries, "LFoo;.caller:()V");
    assert!(caller.is_pure(), "{caller}");

    assert_eq!(summary(&summaries, "LFoo;.throws:()V").effects, Effects::THROWS);
}

#[test]
fn cache_round_trip() {
    let program = assembler::program_from_str(PROGRAM).unwrap();
    let summaries = summarize(&program);
    let path = std::env::temp_dir().join(format!("optscope-roundtrip-{}.sexp", std::process::id()));

    cache::save(&path, &summaries).unwrap();
    let loaded = cache::load(&path).unwrap();
    let _ = fs::remove_file(&path);

    assert_eq!(loaded.len(), summaries.len());
    for (method, summary) in &loaded {
        assert_eq!(summaries.get(method).as_deref(), Some(summary));
    }
}

#[test]
fn corrupt_cache_is_reported() {
    for text in ["(", r#"("LFoo;.f:()V" ("x" ()))"#, r#"("not a method" ("0" ()))"#] {
        assert!(matches!(cache::parse(text), Err(Error::CorruptSummaryCache(_))), "{text}");
    }
}
