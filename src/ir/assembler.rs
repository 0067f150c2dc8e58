//! Textual s-expression form of code, methods and classes.
//!
//! ```text
//! (class (public) "LFoo;"
//!   (super "Ljava/lang/Object;")
//!   (field (public static) "LFoo;.bar:I" 0)
//!   (method (public static) "LFoo;.<clinit>:()V"
//!     (
//!       (const v0 1)
//!       (sput v0 "LFoo;.bar:I")
//!       (:done)
//!       (return-void)
//!     )))
//! ```
//!
//! Registers are written `vN`, labels `:name`. Invokes list their argument
//! registers: `(invoke-static (v0 v1) "LFoo;.f:(II)V")`. Printing is
//! canonical, so two bodies can be compared through their printed form.

use std::{str::FromStr, sync::Arc};

use crate::{
    ir::{
        AccessFlags, Class, ControlFlowGraph, EncodedValue, Field, FieldRef, Instruction, Label,
        LinearEntry, Method, MethodRef, Opcode, Operand, OperandKind, Program, Reg, TypeRef,
    },
    utils::SExpr,
    Error, Result,
};

/// Parses a code body `( insn-or-label ... )`.
///
/// # Errors
///
/// Returns [`Error::Malformed`] for syntax errors, [`Error::UnknownOpcode`] for
/// unknown mnemonics and [`Error::InvalidCode`] if the code does not form a
/// valid control-flow graph.
pub fn code_from_str(input: &str) -> Result<ControlFlowGraph> {
    code_from_s_expr(&SExpr::parse(input)?)
}

/// Builds a code body from its parsed form.
///
/// # Errors
///
/// See [`code_from_str`].
pub fn code_from_s_expr(expr: &SExpr) -> Result<ControlFlowGraph> {
    let items = expr
        .as_list()
        .ok_or_else(|| malformed_error!("code must be a list, got {}", expr))?;
    let entries = items
        .iter()
        .map(entry_from_s_expr)
        .collect::<Result<Vec<_>>>()?;
    ControlFlowGraph::from_linear(entries, None)
}

/// Parses a method `(method (flags...) "descriptor" (code...))`.
///
/// # Errors
///
/// See [`code_from_str`].
pub fn method_from_str(input: &str) -> Result<Method> {
    method_from_s_expr(&SExpr::parse(input)?)
}

fn method_from_s_expr(expr: &SExpr) -> Result<Method> {
    let items = tagged(expr, "method")?;
    let [flags, descriptor, rest @ ..] = items else {
        return Err(malformed_error!("method needs flags and a descriptor: {}", expr));
    };
    let access = flags_from_s_expr(flags)?;
    let reference = MethodRef::parse(string_atom(descriptor)?)?;
    let code = match rest {
        [] => None,
        [code] => Some(code_from_s_expr(code)?),
        _ => return Err(malformed_error!("trailing items in method {}", reference)),
    };
    Ok(Method::new(reference, access, code))
}

/// Parses a class `(class (flags...) "LFoo;" member...)` where members are
/// `(super "LBar;")`, `(field ...)` and `(method ...)` forms.
///
/// # Errors
///
/// See [`code_from_str`].
pub fn class_from_str(input: &str) -> Result<Class> {
    class_from_s_expr(&SExpr::parse(input)?)
}

fn class_from_s_expr(expr: &SExpr) -> Result<Class> {
    let items = tagged(expr, "class")?;
    let [flags, ty, members @ ..] = items else {
        return Err(malformed_error!("class needs flags and a type: {}", expr));
    };
    let mut class = Class::new(TypeRef::parse(string_atom(ty)?)?, flags_from_s_expr(flags)?);
    for member in members {
        let tag = member
            .as_list()
            .and_then(|l| l.first())
            .and_then(SExpr::as_symbol)
            .unwrap_or_default();
        match tag {
            "super" => {
                let parent = tagged(member, "super")?;
                let [parent] = parent else {
                    return Err(malformed_error!("malformed super clause {}", member));
                };
                class.super_class = Some(TypeRef::parse(string_atom(parent)?)?);
            }
            "field" => class.fields.push(field_from_s_expr(member)?),
            "method" => class.methods.push(method_from_s_expr(member)?),
            _ => return Err(malformed_error!("unknown class member {}", member)),
        }
    }
    Ok(class)
}

fn field_from_s_expr(expr: &SExpr) -> Result<Field> {
    let items = tagged(expr, "field")?;
    let [flags, descriptor, value @ ..] = items else {
        return Err(malformed_error!("field needs flags and a descriptor: {}", expr));
    };
    let mut field = Field::new(FieldRef::parse(string_atom(descriptor)?)?, flags_from_s_expr(flags)?);
    field.static_value = match value {
        [] => None,
        [SExpr::Int(v)] => Some(EncodedValue::Int(*v)),
        [SExpr::Str(s)] => Some(EncodedValue::String(Arc::from(s.as_str()))),
        [SExpr::Symbol(s)] if s == "null" => Some(EncodedValue::Null),
        _ => return Err(malformed_error!("bad encoded value in {}", expr)),
    };
    Ok(field)
}

/// Parses any number of classes into a program.
///
/// # Errors
///
/// See [`code_from_str`].
pub fn program_from_str(input: &str) -> Result<Program> {
    let mut program = Program::new();
    for expr in SExpr::parse_all(input)? {
        program.add_class(class_from_s_expr(&expr)?);
    }
    Ok(program)
}

/// Prints a code body in canonical form.
#[must_use]
pub fn to_s_expr(cfg: &ControlFlowGraph) -> SExpr {
    SExpr::List(
        cfg.linearize()
            .iter()
            .map(|entry| match entry {
                LinearEntry::Label(label) => SExpr::List(vec![SExpr::symbol(label.to_string())]),
                LinearEntry::Insn(insn) => insn_to_s_expr(insn),
            })
            .collect(),
    )
}

/// Prints a method with its flags and code.
#[must_use]
pub fn method_to_s_expr(method: &Method) -> SExpr {
    let mut items = vec![
        SExpr::symbol("method"),
        flags_to_s_expr(method.access),
        SExpr::string(method.reference.to_string()),
    ];
    if let Some(code) = &method.code {
        items.push(to_s_expr(code));
    }
    SExpr::List(items)
}

/// Prints a single instruction.
#[must_use]
pub fn insn_to_s_expr(insn: &Instruction) -> SExpr {
    let mut items = vec![SExpr::symbol(insn.opcode.to_string())];
    if let Some(dest) = insn.dest {
        items.push(register(dest));
    }
    if insn.opcode.is_invoke() {
        items.push(SExpr::List(insn.srcs.iter().map(|&r| register(r)).collect()));
    } else {
        items.extend(insn.srcs.iter().map(|&r| register(r)));
    }
    match &insn.operand {
        Operand::None => {}
        Operand::Literal(v) => items.push(SExpr::Int(*v)),
        Operand::String(s) => items.push(SExpr::string(s.to_string())),
        Operand::Field(f) => items.push(SExpr::string(f.to_string())),
        Operand::Method(m) => items.push(SExpr::string(m.to_string())),
        Operand::Type(t) => items.push(SExpr::string(t.to_string())),
        Operand::Label(l) => items.push(SExpr::symbol(l.to_string())),
        Operand::ArrayData(data) => {
            items.push(SExpr::List(data.iter().map(|&v| SExpr::Int(v)).collect()));
        }
    }
    SExpr::List(items)
}

fn register(reg: Reg) -> SExpr {
    SExpr::symbol(format!("v{reg}"))
}

fn tagged<'a>(expr: &'a SExpr, tag: &str) -> Result<&'a [SExpr]> {
    match expr.as_list() {
        Some([SExpr::Symbol(head), rest @ ..]) if head == tag => Ok(rest),
        _ => Err(malformed_error!("expected ({} ...), got {}", tag, expr)),
    }
}

fn string_atom(expr: &SExpr) -> Result<&str> {
    expr.as_str()
        .ok_or_else(|| malformed_error!("expected a quoted string, got {}", expr))
}

fn flags_from_s_expr(expr: &SExpr) -> Result<AccessFlags> {
    let names = expr
        .as_list()
        .ok_or_else(|| malformed_error!("access flags must be a list, got {}", expr))?;
    names.iter().try_fold(AccessFlags::empty(), |flags, name| {
        let flag = name
            .as_symbol()
            .and_then(|n| AccessFlags::from_name(&n.to_ascii_uppercase()))
            .ok_or_else(|| malformed_error!("unknown access flag {}", name))?;
        Ok(flags | flag)
    })
}

fn flags_to_s_expr(flags: AccessFlags) -> SExpr {
    SExpr::List(
        flags
            .iter_names()
            .map(|(name, _)| SExpr::symbol(name.to_ascii_lowercase()))
            .collect(),
    )
}

fn parse_register(name: &str) -> Option<Reg> {
    name.strip_prefix('v')?.parse().ok()
}

fn entry_from_s_expr(expr: &SExpr) -> Result<LinearEntry> {
    let items = expr
        .as_list()
        .ok_or_else(|| malformed_error!("expected an instruction list, got {}", expr))?;
    let (mnemonic, args) = match items {
        [SExpr::Symbol(head), rest @ ..] => (head.as_str(), rest),
        _ => return Err(malformed_error!("expected a mnemonic in {}", expr)),
    };
    if let Some(name) = mnemonic.strip_prefix(':') {
        if !args.is_empty() {
            return Err(malformed_error!("label {} takes no arguments", mnemonic));
        }
        return Ok(LinearEntry::Label(Label::new(name)));
    }
    let opcode = Opcode::from_str(mnemonic).map_err(|_| Error::UnknownOpcode(mnemonic.to_string()))?;

    let mut registers = Vec::new();
    let mut operand = Operand::None;
    for arg in args {
        let parsed = match arg {
            SExpr::Symbol(s) if s.starts_with(':') => Operand::Label(Label::new(s)),
            SExpr::Symbol(s) => {
                let reg = parse_register(s)
                    .ok_or_else(|| malformed_error!("bad register {} in {}", s, expr))?;
                registers.push(reg);
                continue;
            }
            SExpr::Int(v) => Operand::Literal(*v),
            SExpr::Str(s) => match opcode.operand_kind() {
                OperandKind::String => Operand::String(Arc::from(s.as_str())),
                OperandKind::Field => Operand::Field(FieldRef::parse(s)?),
                OperandKind::Method => Operand::Method(MethodRef::parse(s)?),
                OperandKind::Type => Operand::Type(TypeRef::parse(s)?),
                _ => return Err(malformed_error!("unexpected string operand in {}", expr)),
            },
            SExpr::List(list) if opcode.is_invoke() => {
                for item in list {
                    let reg = item
                        .as_symbol()
                        .and_then(parse_register)
                        .ok_or_else(|| malformed_error!("bad invoke argument {}", item))?;
                    registers.push(reg);
                }
                continue;
            }
            SExpr::List(list) => {
                let data = list
                    .iter()
                    .map(|v| v.as_int().ok_or_else(|| malformed_error!("bad array element {}", v)))
                    .collect::<Result<Vec<_>>>()?;
                Operand::ArrayData(data.into())
            }
        };
        if operand != Operand::None {
            return Err(malformed_error!("more than one operand in {}", expr));
        }
        operand = parsed;
    }

    let expected = opcode.operand_kind();
    let matches = matches!(
        (&operand, expected),
        (Operand::None, OperandKind::None)
            | (Operand::Literal(_), OperandKind::Literal)
            | (Operand::String(_), OperandKind::String)
            | (Operand::Field(_), OperandKind::Field)
            | (Operand::Method(_), OperandKind::Method)
            | (Operand::Type(_), OperandKind::Type)
            | (Operand::Label(_), OperandKind::Label)
            | (Operand::ArrayData(_), OperandKind::ArrayData)
    );
    if !matches {
        return Err(malformed_error!("{} expects a {:?} operand: {}", opcode, expected, expr));
    }

    let mut insn = Instruction::new(opcode).with_operand(operand);
    if opcode.has_dest() {
        if registers.is_empty() {
            return Err(malformed_error!("{} needs a destination: {}", opcode, expr));
        }
        insn.dest = Some(registers.remove(0));
    }
    insn.srcs = registers;
    Ok(LinearEntry::Insn(insn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_prints_canonically() {
        let text = r#"(
          (load-param-object v2)
          (const v0 1)
          (sput v0 "LFoo;.bar:I")
          (:loop)
          (invoke-static (v0 v2) "LFoo;.f:(ILBar;)V")
          (if-nez v0 :loop)
          (return-void)
        )"#;
        let cfg = code_from_str(text).unwrap();
        let printed = to_s_expr(&cfg).to_string();
        assert_eq!(
            printed,
            r#"((load-param-object v2) (const v0 1) (sput v0 "LFoo;.bar:I") (:L0) (invoke-static (v0 v2) "LFoo;.f:(ILBar;)V") (if-nez v0 :L0) (return-void))"#
        );
        let reparsed = code_from_str(&printed).unwrap();
        assert_eq!(to_s_expr(&reparsed), to_s_expr(&cfg));
        assert_eq!(cfg.registers_size(), 3);
    }

    #[test]
    fn test_method_and_class() {
        let method = method_from_str(
            r#"(method (public static) "LFoo;.<clinit>:()V" ((return-void)))"#,
        )
        .unwrap();
        assert!(method.reference.is_clinit());
        assert_eq!(method.access, AccessFlags::PUBLIC | AccessFlags::STATIC);
        assert_eq!(
            method_to_s_expr(&method).to_string(),
            r#"(method (public static) "LFoo;.<clinit>:()V" ((return-void)))"#
        );

        let class = class_from_str(
            r#"(class (public) "LFoo;"
                 (super "LBase;")
                 (field (public static final) "LFoo;.bar:I" 7)
                 (field (public static) "LFoo;.name:Ljava/lang/String;" "x")
                 (method (public) "LFoo;.run:()V" ((return-void))))"#,
        )
        .unwrap();
        assert_eq!(class.super_class.as_ref().unwrap().descriptor(), "LBase;");
        assert_eq!(class.fields[0].static_value, Some(EncodedValue::Int(7)));
        assert!(class.fields[0].is_final());
        assert_eq!(class.methods.len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            code_from_str("((frobnicate v0))"),
            Err(Error::UnknownOpcode(name)) if name == "frobnicate"
        ));
        assert!(matches!(code_from_str("((const x0 1))"), Err(Error::Malformed { .. })));
        assert!(matches!(code_from_str(r#"((const v0 "s") (return-void))"#), Err(Error::Malformed { .. })));
        assert!(matches!(code_from_str("((return-void) (move v0))"), Err(Error::InvalidCode(_))));
        assert!(matches!(
            method_from_str(r#"(method (bogus) "LFoo;.f:()V")"#),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn test_array_data() {
        let cfg = code_from_str(
            r#"(
              (const v0 3)
              (new-array v0 "[I")
              (move-result-pseudo-object v1)
              (fill-array-data v1 (1 2 3))
              (return-object v1)
            )"#,
        )
        .unwrap();
        let fill = cfg
            .instructions()
            .find(|i| i.opcode == Opcode::FillArrayData)
            .unwrap();
        assert_eq!(fill.operand, Operand::ArrayData(Arc::from([1, 2, 3].as_slice())));
    }
}
