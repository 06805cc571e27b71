//! Expression Lowering
//!
//! Translates one checked expression into Rust expression text. Lowering is
//! pure: everything it needs (receiver name, result name, old-value table,
//! symbol tables) arrives through [`LowerCtx`].
//!
//! Binary operations are always parenthesized so the output never depends
//! on Rust precedence matching Pact precedence; [`lower_condition`] strips
//! the outermost pair for use in `assert!`/`if` positions.

mod old;

pub use old::{OLD_PREFIX, OldCapture, OldCaptures, canonical_key};

use crate::ast::{BinOp, Expr, LiteralPattern, MatchArm, Pattern, QuantKind, Type, UnOp};
use crate::error::{CompileError, Result};
use crate::symbols::SymbolTable;
use crate::util::{find_similar_name, format_suggestion_hint, str_literal};

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

/// Substitution context for one lowering call
#[derive(Clone, Copy)]
pub struct LowerCtx<'a, 'p> {
    pub symbols: &'a SymbolTable<'p>,
    /// Module the expression appears in
    pub module: &'a str,
    /// Identifier standing in for `self`
    pub receiver: &'a str,
    /// Identifier standing in for `result`; `None` outside postconditions
    pub result: Option<&'a str>,
    /// Active old-value table; `None` outside postconditions and invariants
    pub olds: Option<&'a OldCaptures>,
}

impl<'a, 'p> LowerCtx<'a, 'p> {
    pub fn new(symbols: &'a SymbolTable<'p>, module: &'a str) -> Self {
        Self {
            symbols,
            module,
            receiver: "self",
            result: None,
            olds: None,
        }
    }

    pub fn with_receiver(self, receiver: &'a str) -> Self {
        Self { receiver, ..self }
    }

    pub fn with_result(self, result: &'a str) -> Self {
        Self {
            result: Some(result),
            ..self
        }
    }

    pub fn with_olds(self, olds: &'a OldCaptures) -> Self {
        Self {
            olds: Some(olds),
            ..self
        }
    }

    /// Same context without result or old substitution (entry-time state)
    pub fn at_entry(self) -> Self {
        Self {
            result: None,
            olds: None,
            ..self
        }
    }
}

/// Lower an expression to Rust text
pub fn lower_expr(expr: &Expr, ctx: &LowerCtx<'_, '_>) -> Result<String> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || lower_inner(expr, ctx))
}

/// Lower an expression used as a condition, without redundant outer parentheses
pub fn lower_condition(expr: &Expr, ctx: &LowerCtx<'_, '_>) -> Result<String> {
    let text = lower_expr(expr, ctx)?;
    Ok(strip_outer_parens(&text).to_string())
}

fn lower_inner(expr: &Expr, ctx: &LowerCtx<'_, '_>) -> Result<String> {
    match expr {
        Expr::IntLit(n) => Ok(int_literal(*n)),
        Expr::FloatLit(x) => Ok(float_literal(*x)),
        Expr::BoolLit(b) => Ok(b.to_string()),
        Expr::StringLit(s) => Ok(format!("String::from({})", str_literal(s))),
        Expr::Unit => Ok("()".to_string()),

        Expr::Var(name) => Ok(match ctx.symbols.variant(ctx.module, name) {
            Some((enum_def, variant)) if variant.fields.is_empty() => format!(
                "{}::{}",
                ctx.symbols.type_name(ctx.module, &enum_def.name),
                variant.name
            ),
            _ => name.clone(),
        }),

        Expr::SelfRef => Ok(ctx.receiver.to_string()),

        Expr::Result => ctx.result.map(str::to_string).ok_or_else(|| {
            CompileError::lowering("`result` is only available in postconditions", Default::default())
        }),

        Expr::Old(inner) => {
            let olds = ctx.olds.ok_or_else(|| {
                CompileError::lowering(
                    format!("`old({inner})` is only available in postconditions and invariants"),
                    Default::default(),
                )
            })?;
            olds.ident_for(inner).map(str::to_string).ok_or_else(|| {
                CompileError::lowering(format!("`old({inner})` was not captured"), Default::default())
            })
        }

        Expr::Binary { left, op, right } => lower_binary(left, *op, right, ctx),

        Expr::Unary { op, expr } => {
            let inner = lower_expr(expr, ctx)?;
            Ok(match op {
                UnOp::Neg => format!("(-{inner})"),
                UnOp::Not => format!("!{inner}"),
            })
        }

        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => Ok(format!(
            "(if {} {{ {} }} else {{ {} }})",
            lower_condition(cond, ctx)?,
            lower_condition(then_branch, ctx)?,
            lower_condition(else_branch, ctx)?
        )),

        Expr::Call { func, args } => lower_call(func, args, ctx),

        Expr::QualifiedCall { module, func, args } => lower_qualified_call(module, func, args, ctx),

        Expr::MethodCall {
            receiver,
            method,
            args,
        } => Ok(format!(
            "{}.{}({})",
            lower_expr(receiver, ctx)?,
            method,
            lower_list(args, ctx)?
        )),

        Expr::FieldAccess { expr, field } => Ok(format!("{}.{}", lower_expr(expr, ctx)?, field)),

        Expr::Index { base, index } => Ok(format!(
            "{}[{} as usize]",
            lower_expr(base, ctx)?,
            parenthesize(&lower_expr(index, ctx)?)
        )),

        Expr::Len(inner) => Ok(format!("({}.len() as i64)", lower_expr(inner, ctx)?)),

        Expr::SeqLit(items) => Ok(format!("vec![{}]", lower_list(items, ctx)?)),

        Expr::Quantifier {
            kind,
            var,
            start,
            end,
            body,
        } => lower_quantifier(*kind, var, start, end, body, ctx),

        Expr::Match { expr, arms } => lower_match(expr, arms, ctx),

        Expr::Try(inner) => Ok(format!("{}?", lower_expr(inner, ctx)?)),
    }
}

fn lower_binary(left: &Expr, op: BinOp, right: &Expr, ctx: &LowerCtx<'_, '_>) -> Result<String> {
    let l = lower_expr(left, ctx)?;
    let r = lower_expr(right, ctx)?;
    Ok(match op {
        BinOp::Implies => format!("(!{} || {})", parenthesize(&l), r),
        // Syntactic: a literal operand marks the `+` as concatenation.
        BinOp::Add if is_string_literal(left) || is_string_literal(right) => {
            format!("format!(\"{{}}{{}}\", {l}, {r})")
        }
        _ => format!("({l} {} {r})", op.rust_op()),
    })
}

fn is_string_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::StringLit(_))
}

/// `forall`: accumulator starts true, cleared at the first failing index.
/// `exists`: accumulator starts false, set at the first passing index.
fn lower_quantifier(
    kind: QuantKind,
    var: &str,
    start: &Expr,
    end: &Expr,
    body: &Expr,
    ctx: &LowerCtx<'_, '_>,
) -> Result<String> {
    let start = lower_expr(start, ctx)?;
    let end = lower_expr(end, ctx)?;
    let cond = lower_condition(body, ctx)?;
    let (acc, init, test, hit) = match kind {
        QuantKind::Forall => (format!("__forall_{var}"), "true", format!("!({cond})"), "false"),
        QuantKind::Exists => (format!("__exists_{var}"), "false", cond, "true"),
    };
    Ok(format!(
        "{{ let mut {acc} = {init}; for {var} in {start}..{end} {{ if {test} {{ {acc} = {hit}; break; }} }} {acc} }}"
    ))
}

fn lower_match(scrutinee: &Expr, arms: &[MatchArm], ctx: &LowerCtx<'_, '_>) -> Result<String> {
    let mut subject = lower_expr(scrutinee, ctx)?;
    if scrutinee.is_place() {
        subject = format!("{subject}.clone()");
    }
    let matches_str = arms
        .iter()
        .any(|arm| matches!(arm.pattern, Pattern::Literal(LiteralPattern::Str(_))));
    if matches_str {
        subject = format!("{subject}.as_str()");
    }

    let mut out = format!("(match {subject} {{ ");
    for arm in arms {
        let pattern = lower_pattern(&arm.pattern, ctx)?;
        let body = lower_condition(&arm.body, ctx)?;
        out.push_str(&format!("{pattern} => {body}, "));
    }
    out.push_str("})");
    Ok(out)
}

fn lower_pattern(pattern: &Pattern, ctx: &LowerCtx<'_, '_>) -> Result<String> {
    match pattern {
        Pattern::Wildcard => Ok("_".to_string()),
        Pattern::Binding(name) => Ok(name.clone()),
        Pattern::Literal(LiteralPattern::Int(n)) => Ok(n.to_string()),
        Pattern::Literal(LiteralPattern::Bool(b)) => Ok(b.to_string()),
        Pattern::Literal(LiteralPattern::Str(s)) => Ok(str_literal(s)),
        Pattern::Variant { name, bindings } => {
            let (enum_def, variant) = ctx.symbols.variant(ctx.module, name).ok_or_else(|| {
                CompileError::resolve(format!("unknown enum variant `{name}`"), Default::default())
            })?;
            let path = format!(
                "{}::{}",
                ctx.symbols.type_name(ctx.module, &enum_def.name),
                variant.name
            );
            if variant.fields.is_empty() {
                return Ok(path);
            }
            if bindings.len() > variant.fields.len() {
                return Err(CompileError::lowering(
                    format!(
                        "pattern `{name}` binds {} values but the variant has {} fields",
                        bindings.len(),
                        variant.fields.len()
                    ),
                    Default::default(),
                ));
            }
            let mut parts: Vec<String> = variant
                .fields
                .iter()
                .zip(bindings)
                .map(|(field, binding)| format!("{}: {}", field.name, binding))
                .collect();
            if bindings.len() < variant.fields.len() {
                parts.push("..".to_string());
            }
            Ok(format!("{path} {{ {} }}", parts.join(", ")))
        }
    }
}

fn lower_call(func: &str, args: &[Expr], ctx: &LowerCtx<'_, '_>) -> Result<String> {
    match (func, args) {
        ("Ok" | "Err" | "Some", _) => return Ok(format!("{func}({})", lower_list(args, ctx)?)),
        ("None", []) => return Ok("None".to_string()),
        ("abs", [x]) => return Ok(format!("{}.abs()", parenthesize(&lower_expr(x, ctx)?))),
        ("min" | "max", [a, b]) => {
            return Ok(format!(
                "{}.{func}({})",
                parenthesize(&lower_expr(a, ctx)?),
                lower_condition(b, ctx)?
            ));
        }
        _ => {}
    }

    lower_resolved_call(ctx.module, func, args, ctx)?.map_or_else(
        || Ok(format!("{func}({})", lower_list(args, ctx)?)),
        Ok,
    )
}

fn lower_qualified_call(
    module: &str,
    func: &str,
    args: &[Expr],
    ctx: &LowerCtx<'_, '_>,
) -> Result<String> {
    if let Some(text) = lower_resolved_call(module, func, args, ctx)? {
        return Ok(text);
    }
    let candidates = ctx.symbols.function_names(module);
    let hint = format_suggestion_hint(find_similar_name(func, &candidates, 2));
    Err(CompileError::resolve(
        format!("unknown function `{module}.{func}`{hint}"),
        Default::default(),
    ))
}

/// Constructor, variant, or function declared in `module`; `None` if the
/// name resolves to none of them.
fn lower_resolved_call(
    module: &str,
    func: &str,
    args: &[Expr],
    ctx: &LowerCtx<'_, '_>,
) -> Result<Option<String>> {
    let symbols = ctx.symbols;

    if let Some(entity) = symbols.entity(module, func) {
        let params = entity
            .constructor
            .as_ref()
            .map(|c| c.params.iter().map(|p| &p.ty).collect::<Vec<_>>())
            .unwrap_or_default();
        let args = lower_args(args, &params, false, ctx)?;
        return Ok(Some(format!("{}::new({args})", symbols.type_name(module, func))));
    }

    if let Some((enum_def, variant)) = symbols.variant(module, func) {
        let path = format!("{}::{}", symbols.type_name(module, &enum_def.name), variant.name);
        if variant.fields.is_empty() {
            return Ok(Some(path));
        }
        let values = args
            .iter()
            .zip(&variant.fields)
            .map(|(arg, field)| Ok(format!("{}: {}", field.name, owned_arg(arg, &field.ty, ctx)?)))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Some(format!("{path} {{ {} }}", values.join(", "))));
    }

    if let Some(def) = symbols.function(module, func) {
        let params: Vec<&Type> = def.params.iter().map(|p| &p.ty).collect();
        let by_ref = !symbols.is_primary(module);
        let args = lower_args(args, &params, by_ref, ctx)?;
        return Ok(Some(format!("{}({args})", symbols.fn_name(module, func))));
    }

    Ok(None)
}

/// Arguments against known parameter types: sequence parameters of
/// non-primary callees take a reference, other non-`Copy` places are cloned.
fn lower_args(args: &[Expr], params: &[&Type], by_ref: bool, ctx: &LowerCtx<'_, '_>) -> Result<String> {
    let mut out = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        let text = match params.get(i) {
            Some(ty) if by_ref && ty.is_seq() => format!("&{}", lower_expr(arg, ctx)?),
            Some(ty) => owned_arg(arg, ty, ctx)?,
            None => lower_condition(arg, ctx)?,
        };
        out.push(text);
    }
    Ok(out.join(", "))
}

fn owned_arg(arg: &Expr, ty: &Type, ctx: &LowerCtx<'_, '_>) -> Result<String> {
    let text = lower_condition(arg, ctx)?;
    Ok(if !ty.is_copy() && arg.is_place() {
        format!("{text}.clone()")
    } else {
        text
    })
}

fn lower_list(args: &[Expr], ctx: &LowerCtx<'_, '_>) -> Result<String> {
    let parts = args
        .iter()
        .map(|a| lower_condition(a, ctx))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

fn int_literal(n: i64) -> String {
    if n == i64::MIN {
        "i64::MIN".to_string()
    } else if n < 0 {
        format!("({n})")
    } else {
        n.to_string()
    }
}

fn float_literal(x: f64) -> String {
    if x.is_nan() {
        "f64::NAN".to_string()
    } else if x.is_infinite() {
        let name = if x > 0.0 { "f64::INFINITY" } else { "f64::NEG_INFINITY" };
        name.to_string()
    } else if x < 0.0 {
        format!("({x:?})")
    } else {
        format!("{x:?}")
    }
}

/// Wrap in parentheses unless already a single parenthesized group
fn parenthesize(text: &str) -> String {
    if strip_outer_parens(text).len() != text.len() || is_atom(text) {
        text.to_string()
    } else {
        format!("({text})")
    }
}

fn is_atom(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Remove one pair of parentheses that encloses the whole text
pub(crate) fn strip_outer_parens(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'(' || bytes[bytes.len() - 1] != b')' {
        return text;
    }
    let mut depth = 0i32;
    let mut in_str = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_str {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_str = true,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 && i != bytes.len() - 1 {
                    return text;
                }
            }
            _ => {}
        }
    }
    &text[1..text.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EnumDef, EnumVariant, Field, FnDef, Module, Param, Program};

    fn program() -> Program {
        let shape = EnumDef {
            name: "Shape".to_string(),
            variants: vec![
                EnumVariant {
                    name: "Circle".to_string(),
                    fields: vec![Field::new("radius", Type::Int)],
                },
                EnumVariant {
                    name: "Rect".to_string(),
                    fields: vec![Field::new("w", Type::Int), Field::new("h", Type::Int)],
                },
                EnumVariant {
                    name: "Empty".to_string(),
                    fields: vec![],
                },
            ],
            docs: vec![],
            span: Default::default(),
        };
        let stats = Module {
            name: "stats".to_string(),
            primary: false,
            functions: vec![FnDef::new(
                "total",
                vec![Param::new("xs", Type::seq(Type::Int))],
                Type::Int,
            )],
            ..Module::default()
        };
        let main = Module {
            name: "main".to_string(),
            primary: true,
            enums: vec![shape],
            ..Module::default()
        };
        Program {
            modules: vec![stats, main],
        }
    }

    fn lower(expr: &Expr) -> Result<String> {
        let p = program();
        let symbols = SymbolTable::build(&p);
        let ctx = LowerCtx::new(&symbols, "main").with_result("__result");
        lower_condition(expr, &ctx)
    }

    #[test]
    fn test_implies_lowers_to_disjunction() {
        let e = Expr::binary(
            Expr::binary(Expr::var("x"), BinOp::Gt, Expr::int(0)),
            BinOp::Implies,
            Expr::binary(Expr::Result, BinOp::Gt, Expr::int(0)),
        );
        assert_eq!(lower(&e).unwrap(), "!(x > 0) || (__result > 0)");
    }

    #[test]
    fn test_forall_lowers_to_accumulator_loop() {
        let e = Expr::forall(
            "i",
            Expr::int(0),
            Expr::len(Expr::Result),
            Expr::binary(Expr::index(Expr::Result, Expr::var("i")), BinOp::Gt, Expr::int(0)),
        );
        insta::assert_snapshot!(
            lower(&e).unwrap(),
            @"{ let mut __forall_i = true; for i in 0..(__result.len() as i64) { if !(__result[i as usize] > 0) { __forall_i = false; break; } } __forall_i }"
        );
    }

    #[test]
    fn test_exists_is_dual() {
        let e = Expr::exists(
            "k",
            Expr::int(0),
            Expr::var("n"),
            Expr::binary(Expr::var("k"), BinOp::Eq, Expr::int(3)),
        );
        let text = lower(&e).unwrap();
        assert!(text.starts_with("{ let mut __exists_k = false;"));
        assert!(text.contains("if k == 3 { __exists_k = true; break; }"));
        assert!(text.ends_with("__exists_k }"));
    }

    #[test]
    fn test_string_concat_with_literal_operand() {
        let e = Expr::binary(Expr::StringLit("id-".to_string()), BinOp::Add, Expr::var("name"));
        assert_eq!(
            lower(&e).unwrap(),
            "format!(\"{}{}\", String::from(\"id-\"), name)"
        );
    }

    #[test]
    fn test_plus_without_literal_is_numeric() {
        let e = Expr::binary(Expr::var("a"), BinOp::Add, Expr::var("b"));
        assert_eq!(lower(&e).unwrap(), "a + b");
    }

    #[test]
    fn test_match_resolves_variants_positionally() {
        let e = Expr::Match {
            expr: Box::new(Expr::var("s")),
            arms: vec![
                MatchArm {
                    pattern: Pattern::Variant {
                        name: "Rect".to_string(),
                        bindings: vec!["a".to_string(), "b".to_string()],
                    },
                    body: Expr::binary(Expr::var("a"), BinOp::Mul, Expr::var("b")),
                },
                MatchArm {
                    pattern: Pattern::Variant {
                        name: "Empty".to_string(),
                        bindings: vec![],
                    },
                    body: Expr::int(0),
                },
                MatchArm {
                    pattern: Pattern::Wildcard,
                    body: Expr::int(1),
                },
            ],
        };
        assert_eq!(
            lower(&e).unwrap(),
            "match s.clone() { Shape::Rect { w: a, h: b } => a * b, Shape::Empty => 0, _ => 1, }"
        );
    }

    #[test]
    fn test_unknown_variant_is_an_error() {
        let e = Expr::Match {
            expr: Box::new(Expr::var("s")),
            arms: vec![MatchArm {
                pattern: Pattern::Variant {
                    name: "Triangle".to_string(),
                    bindings: vec![],
                },
                body: Expr::int(0),
            }],
        };
        assert!(matches!(lower(&e), Err(CompileError::Resolve { .. })));
    }

    #[test]
    fn test_variant_construction_uses_field_names() {
        let e = Expr::call("Circle", vec![Expr::int(2)]);
        assert_eq!(lower(&e).unwrap(), "Shape::Circle { radius: 2 }");
        assert_eq!(lower(&Expr::var("Empty")).unwrap(), "Shape::Empty");
    }

    #[test]
    fn test_qualified_call_mangles_and_borrows_sequences() {
        let e = Expr::QualifiedCall {
            module: "stats".to_string(),
            func: "total".to_string(),
            args: vec![Expr::var("xs")],
        };
        assert_eq!(lower(&e).unwrap(), "stats_total(&xs)");
    }

    #[test]
    fn test_unknown_qualified_call_suggests_name() {
        let e = Expr::QualifiedCall {
            module: "stats".to_string(),
            func: "totl".to_string(),
            args: vec![],
        };
        let err = lower(&e).unwrap_err();
        assert!(err.message().contains("did you mean `total`?"));
    }

    #[test]
    fn test_index_and_len_convert_numeric_types() {
        let e = Expr::binary(
            Expr::index(Expr::var("xs"), Expr::binary(Expr::var("i"), BinOp::Add, Expr::int(1))),
            BinOp::Lt,
            Expr::len(Expr::var("xs")),
        );
        assert_eq!(lower(&e).unwrap(), "xs[(i + 1) as usize] < (xs.len() as i64)");
    }

    #[test]
    fn test_try_passes_through() {
        let e = Expr::Try(Box::new(Expr::call("parse", vec![Expr::var("s")])));
        assert_eq!(lower(&e).unwrap(), "parse(s)?");
    }

    #[test]
    fn test_result_outside_postcondition_is_an_error() {
        let p = program();
        let symbols = SymbolTable::build(&p);
        let ctx = LowerCtx::new(&symbols, "main");
        assert!(lower_expr(&Expr::Result, &ctx).is_err());
    }

    #[test]
    fn test_old_uses_snapshot_binding() {
        let p = program();
        let symbols = SymbolTable::build(&p);
        let mut olds = OldCaptures::new();
        olds.insert(&Expr::self_field("balance"));
        let ctx = LowerCtx::new(&symbols, "main").with_olds(&olds);
        let e = Expr::binary(
            Expr::self_field("balance"),
            BinOp::Ge,
            Expr::old(Expr::self_field("balance")),
        );
        assert_eq!(lower_condition(&e, &ctx).unwrap(), "self.balance >= __old_self_balance");
    }

    #[test]
    fn test_negative_literals_are_parenthesized() {
        let e = Expr::binary(Expr::var("x"), BinOp::Sub, Expr::int(-5));
        assert_eq!(lower(&e).unwrap(), "x - (-5)");
    }

    #[test]
    fn test_strip_outer_parens_only_when_enclosing() {
        assert_eq!(strip_outer_parens("(a + b)"), "a + b");
        assert_eq!(strip_outer_parens("(a) + (b)"), "(a) + (b)");
        assert_eq!(strip_outer_parens("(\")\")"), "\")\"");
    }
}
