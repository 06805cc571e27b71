//! Expression nodes of the checked tree

use serde::{Deserialize, Serialize};

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal
    IntLit(i64),
    /// Float literal
    FloatLit(f64),
    /// Boolean literal
    BoolLit(bool),
    /// String literal
    StringLit(String),
    /// Unit value
    Unit,

    /// Variable reference (local, parameter, or bare unit variant)
    Var(String),

    /// The receiver of a method or the entity under construction
    SelfRef,

    /// The value returned by the unit (postconditions only)
    Result,

    /// Entry-time value of an expression (postconditions and invariants only)
    Old(Box<Expr>),

    /// Binary operation
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },

    /// Unary operation
    Unary { op: UnOp, expr: Box<Expr> },

    /// Conditional expression
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Call of a free function, entity constructor or enum variant
    Call { func: String, args: Vec<Expr> },

    /// Call of a function declared in another module: module.func(args)
    QualifiedCall {
        module: String,
        func: String,
        args: Vec<Expr>,
    },

    /// Method call: receiver.method(args)
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },

    /// Field access: expr.field
    FieldAccess { expr: Box<Expr>, field: String },

    /// Sequence indexing: base[index]
    Index { base: Box<Expr>, index: Box<Expr> },

    /// Sequence length: len(expr)
    Len(Box<Expr>),

    /// Sequence literal: [a, b, c]
    SeqLit(Vec<Expr>),

    /// Bounded quantifier: forall/exists var in [start, end): body
    Quantifier {
        kind: QuantKind,
        var: String,
        start: Box<Expr>,
        end: Box<Expr>,
        body: Box<Expr>,
    },

    /// Match expression
    Match { expr: Box<Expr>, arms: Vec<MatchArm> },

    /// Fallible chaining: expr?
    Try(Box<Expr>),
}

impl Expr {
    pub fn int(n: i64) -> Self {
        Expr::IntLit(n)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn not(expr: Expr) -> Self {
        Expr::Unary {
            op: UnOp::Not,
            expr: Box::new(expr),
        }
    }

    pub fn field(expr: Expr, field: impl Into<String>) -> Self {
        Expr::FieldAccess {
            expr: Box::new(expr),
            field: field.into(),
        }
    }

    /// `self.field`
    pub fn self_field(field: impl Into<String>) -> Self {
        Expr::field(Expr::SelfRef, field)
    }

    pub fn old(expr: Expr) -> Self {
        Expr::Old(Box::new(expr))
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Expr::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn len(expr: Expr) -> Self {
        Expr::Len(Box::new(expr))
    }

    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: func.into(),
            args,
        }
    }

    pub fn forall(var: impl Into<String>, start: Expr, end: Expr, body: Expr) -> Self {
        Expr::Quantifier {
            kind: QuantKind::Forall,
            var: var.into(),
            start: Box::new(start),
            end: Box::new(end),
            body: Box::new(body),
        }
    }

    pub fn exists(var: impl Into<String>, start: Expr, end: Expr, body: Expr) -> Self {
        Expr::Quantifier {
            kind: QuantKind::Exists,
            var: var.into(),
            start: Box::new(start),
            end: Box::new(end),
            body: Box::new(body),
        }
    }

    /// Direct sub-expressions, in source order
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::IntLit(_)
            | Expr::FloatLit(_)
            | Expr::BoolLit(_)
            | Expr::StringLit(_)
            | Expr::Unit
            | Expr::Var(_)
            | Expr::SelfRef
            | Expr::Result => Vec::new(),
            Expr::Old(inner) | Expr::Len(inner) | Expr::Try(inner) => vec![inner.as_ref()],
            Expr::Unary { expr, .. } | Expr::FieldAccess { expr, .. } => vec![expr.as_ref()],
            Expr::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => vec![cond.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
            Expr::Call { args, .. } | Expr::QualifiedCall { args, .. } | Expr::SeqLit(args) => {
                args.iter().collect()
            }
            Expr::MethodCall { receiver, args, .. } => {
                std::iter::once(receiver.as_ref()).chain(args).collect()
            }
            Expr::Index { base, index } => vec![base.as_ref(), index.as_ref()],
            Expr::Quantifier {
                start, end, body, ..
            } => vec![start.as_ref(), end.as_ref(), body.as_ref()],
            Expr::Match { expr, arms } => std::iter::once(expr.as_ref())
                .chain(arms.iter().map(|arm| &arm.body))
                .collect(),
        }
    }

    /// Visit this node and every sub-expression, pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// Whether this is a place (something a value can be cloned out of)
    pub fn is_place(&self) -> bool {
        match self {
            Expr::Var(_) | Expr::SelfRef => true,
            Expr::FieldAccess { expr, .. } => expr.is_place(),
            Expr::Index { base, .. } => base.is_place(),
            _ => false,
        }
    }
}

/// Quantifier flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantKind {
    Forall,
    Exists,
}

impl std::fmt::Display for QuantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantKind::Forall => write!(f, "forall"),
            QuantKind::Exists => write!(f, "exists"),
        }
    }
}

/// A single arm in a match expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
}

/// Pattern for match expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Wildcard pattern: _
    Wildcard,
    /// Variable binding: name
    Binding(String),
    /// Literal pattern: 42, true, "text"
    Literal(LiteralPattern),
    /// Enum variant: Variant or Variant(a, b); bindings follow the declared field order
    Variant {
        name: String,
        bindings: Vec<String>,
    },
}

/// Literal patterns for match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralPattern {
    Int(i64),
    Bool(bool),
    Str(String),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,
    Implies,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    /// Operator with swapped operands: `a < b` holds iff `b > a`
    pub fn flip(self) -> BinOp {
        match self {
            BinOp::Lt => BinOp::Gt,
            BinOp::Le => BinOp::Ge,
            BinOp::Gt => BinOp::Lt,
            BinOp::Ge => BinOp::Le,
            other => other,
        }
    }

    /// Spelling in generated Rust
    pub fn rust_op(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            // lowered structurally, never printed
            BinOp::Implies => "||",
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
            BinOp::Mod => write!(f, "%"),
            BinOp::Eq => write!(f, "=="),
            BinOp::Ne => write!(f, "!="),
            BinOp::Lt => write!(f, "<"),
            BinOp::Gt => write!(f, ">"),
            BinOp::Le => write!(f, "<="),
            BinOp::Ge => write!(f, ">="),
            BinOp::And => write!(f, "and"),
            BinOp::Or => write!(f, "or"),
            BinOp::Implies => write!(f, "implies"),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Logical not
    Not,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "not "),
        }
    }
}

/// Source-level rendering, used for canonical `old()` keys and diagnostics.
impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::IntLit(n) => write!(f, "{n}"),
            Expr::FloatLit(x) => write!(f, "{x:?}"),
            Expr::BoolLit(b) => write!(f, "{b}"),
            Expr::StringLit(s) => write!(f, "{s:?}"),
            Expr::Unit => write!(f, "()"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::SelfRef => write!(f, "self"),
            Expr::Result => write!(f, "result"),
            Expr::Old(inner) => write!(f, "old({inner})"),
            Expr::Binary { left, op, right } => write!(f, "({left} {op} {right})"),
            Expr::Unary { op, expr } => write!(f, "{op}{expr}"),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "if {cond} then {then_branch} else {else_branch}"),
            Expr::Call { func, args } => write!(f, "{func}({})", join(args)),
            Expr::QualifiedCall { module, func, args } => {
                write!(f, "{module}.{func}({})", join(args))
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => write!(f, "{receiver}.{method}({})", join(args)),
            Expr::FieldAccess { expr, field } => write!(f, "{expr}.{field}"),
            Expr::Index { base, index } => write!(f, "{base}[{index}]"),
            Expr::Len(inner) => write!(f, "len({inner})"),
            Expr::SeqLit(items) => write!(f, "[{}]", join(items)),
            Expr::Quantifier {
                kind,
                var,
                start,
                end,
                body,
            } => write!(f, "{kind} {var} in [{start}, {end}): {body}"),
            Expr::Match { expr, arms } => write!(f, "match {expr} {{ {} arms }}", arms.len()),
            Expr::Try(inner) => write!(f, "{inner}?"),
        }
    }
}

fn join(exprs: &[Expr]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
