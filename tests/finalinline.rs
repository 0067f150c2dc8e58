//! Static initializer inlining on whole classes.

use optscope::prelude::*;
use test_log::test;

fn class(fields: &str, clinit: &str) -> Program {
    assembler::program_from_str(&format!(
        r#"(class (public) "LFoo;" {fields} (method (public static) "LFoo;.<clinit>:()V" {clinit}))"#
    ))
    .unwrap()
}

fn run(program: &mut Program) -> (TransformStats, PassContext) {
    let ctx = PassContext::new(PassConfig::default());
    let mut manager = PassManager::new();
    manager.add(optscope::compiler::FinalInlinePass::new());
    let stats = manager.run(program, &ctx).unwrap();
    (stats, ctx)
}

fn clinit(program: &Program) -> Option<String> {
    let class = program.class(&TypeRef::parse("LFoo;").unwrap())?;
    let code = class.clinit()?.code.as_ref()?;
    Some(assembler::to_s_expr(code).to_string())
}

fn value(program: &Program, field: &str) -> Option<EncodedValue> {
    program
        .field(&FieldRef::parse(field).unwrap())
        .and_then(|f| f.static_value.clone())
}

#[test]
fn encodes_values_and_removes_initializer() {
    let mut program = class(
        r#"(field (public static) "LFoo;.bar:I" 0)"#,
        r#"((const v0 1) (sput v0 "LFoo;.bar:I") (return-void))"#,
    );
    let (stats, ctx) = run(&mut program);

    assert!(clinit(&program).is_none());
    assert_eq!(value(&program, "LFoo;.bar:I"), Some(EncodedValue::Int(1)));
    assert_eq!(stats.dead_writes_eliminated, 1);
    assert!(ctx.events.has(EventKind::FieldEncoded));
    assert!(ctx.events.has(EventKind::InitializerRemoved));
}

#[test]
fn field_set_in_loop_is_unchanged() {
    let mut program = class(
        r#"(field (public static) "LFoo;.bar:I" 0)"#,
        r#"(
          (:loop)
          (sget "LFoo;.bar:I")
          (move-result-pseudo v0)
          (add-int/lit8 v0 v0 1)
          (sput v0 "LFoo;.bar:I")
          (const v1 10)
          (if-ne v0 v1 :loop)
          (return-void)
        )"#,
    );
    let original = clinit(&program);
    let (stats, _) = run(&mut program);

    assert!(stats.is_empty());
    assert_eq!(clinit(&program), original);
    assert_eq!(value(&program, "LFoo;.bar:I"), Some(EncodedValue::Int(0)));
}

#[test]
fn conditionally_set_field_is_unchanged() {
    let mut program = class(
        r#"(field (public static) "LFoo;.bar:I" 0) (field (public static) "LFoo;.baz:I" 0)"#,
        r#"(
          (sget "LUnknown;.field:I")
          (move-result-pseudo v0)
          (if-eqz v0 :true)
          (const v1 1)
          (sput v1 "LFoo;.bar:I")
          (:true)
          (sget "LFoo;.bar:I")
          (move-result-pseudo v0)
          (sput v0 "LFoo;.baz:I")
          (sput v1 "LFoo;.bar:I")
          (return-void)
        )"#,
    );
    let original = clinit(&program);
    run(&mut program);

    assert_eq!(clinit(&program), original);
    assert_eq!(value(&program, "LFoo;.bar:I"), Some(EncodedValue::Int(0)));
    assert_eq!(value(&program, "LFoo;.baz:I"), Some(EncodedValue::Int(0)));
}

#[test]
fn dominated_read_is_folded() {
    let mut program = class(
        r#"(field (public static) "LFoo;.bar:I" 0) (field (public static) "LFoo;.baz:I" 0)"#,
        r#"(
          (const v0 1)
          (sput v0 "LFoo;.bar:I")
          (sget "LFoo;.bar:I")
          (move-result-pseudo v0)
          (sput v0 "LFoo;.baz:I")
          (return-void)
        )"#,
    );
    let expected = assembler::to_s_expr(
        &assembler::code_from_str(
            r#"((const v0 1) (sput v0 "LFoo;.bar:I") (return-void))"#,
        )
        .unwrap(),
    )
    .to_string();
    run(&mut program);

    // bar is read by the initializer, so only baz can be encoded
    assert_eq!(clinit(&program), Some(expected));
    assert_eq!(value(&program, "LFoo;.bar:I"), Some(EncodedValue::Int(0)));
    assert_eq!(value(&program, "LFoo;.baz:I"), Some(EncodedValue::Int(1)));
}

#[test]
fn encodes_strings_and_null() {
    let mut program = class(
        r#"(field (public static) "LFoo;.s:Ljava/lang/String;") (field (public static) "LFoo;.o:LFoo;")"#,
        r#"(
          (const-string "hello")
          (move-result-pseudo-object v0)
          (sput-object v0 "LFoo;.s:Ljava/lang/String;")
          (const v1 0)
          (sput-object v1 "LFoo;.o:LFoo;")
          (return-void)
        )"#,
    );
    run(&mut program);

    assert!(clinit(&program).is_none());
    assert_eq!(
        value(&program, "LFoo;.s:Ljava/lang/String;"),
        Some(EncodedValue::String("hello".into()))
    );
    assert_eq!(value(&program, "LFoo;.o:LFoo;"), Some(EncodedValue::Null));
}

#[test]
fn flagged_initializer_is_left_alone() {
    let mut program = class(
        r#"(field (public static) "LFoo;.bar:I" 0)"#,
        r#"((const v0 1) (sput v0 "LFoo;.bar:I") (return-void))"#,
    );
    let ty = TypeRef::parse("LFoo;").unwrap();
    if let Some(m) = program.class_mut(&ty).and_then(|c| c.clinit_mut()) {
        m.no_optimizations = true;
    }
    let original = clinit(&program);
    run(&mut program);

    assert_eq!(clinit(&program), original);
    assert_eq!(value(&program, "LFoo;.bar:I"), Some(EncodedValue::Int(0)));
}
