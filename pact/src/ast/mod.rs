//! Checked semantic tree consumed by the contract compiler
//!
//! The tree arrives already resolved and type-checked; nothing in this crate
//! re-validates it beyond what lowering needs.

mod expr;
mod span;
mod stmt;
mod types;

pub use expr::*;
pub use span::*;
pub use stmt::*;
pub use types::*;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// A program is an ordered list of modules (dependencies first)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub modules: Vec<Module>,
}

impl Program {
    /// Decode a checked tree handed over as JSON by the front end.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CompileError::input(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CompileError::input(e.to_string()))
    }
}

/// One source module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// The primary module keeps unmangled names
    pub primary: bool,
    pub functions: Vec<FnDef>,
    pub entities: Vec<EntityDef>,
    pub enums: Vec<EnumDef>,
}

/// Kind of a contract clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClauseKind {
    Precondition,
    Postcondition,
    Invariant,
    LoopInvariant,
    Decreases,
}

impl ClauseKind {
    /// Label used in runtime failure messages
    pub fn label(self) -> &'static str {
        match self {
            ClauseKind::Precondition => "precondition",
            ClauseKind::Postcondition => "postcondition",
            ClauseKind::Invariant => "invariant",
            ClauseKind::LoopInvariant => "loop invariant",
            ClauseKind::Decreases => "decreases",
        }
    }
}

/// A contract clause: condition (or metric) plus its original text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractClause {
    pub kind: ClauseKind,
    pub expr: Expr,
    /// Source text exactly as written, for diagnostics
    pub source: String,
    pub span: Span,
}

impl ContractClause {
    pub fn new(kind: ClauseKind, expr: Expr, source: impl Into<String>) -> Self {
        Self {
            kind,
            expr,
            source: source.into(),
            span: Span::unknown(),
        }
    }

    pub fn requires(expr: Expr, source: impl Into<String>) -> Self {
        Self::new(ClauseKind::Precondition, expr, source)
    }

    pub fn ensures(expr: Expr, source: impl Into<String>) -> Self {
        Self::new(ClauseKind::Postcondition, expr, source)
    }

    pub fn invariant(expr: Expr, source: impl Into<String>) -> Self {
        Self::new(ClauseKind::Invariant, expr, source)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Documentation attached to a declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocBlock {
    /// Free-form documentation
    Doc(String),
    /// Stated intent of the declaration
    Intent(String),
}

/// Function, constructor, or method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A contract-bearing unit: free function, constructor or method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    pub ret_ty: Type,
    pub requires: Vec<ContractClause>,
    pub ensures: Vec<ContractClause>,
    pub body: Vec<Stmt>,
    /// Entry points are compiled but never get generated tests
    #[serde(default)]
    pub is_entry: bool,
    #[serde(default)]
    pub docs: Vec<DocBlock>,
    #[serde(default)]
    pub span: Span,
}

impl FnDef {
    pub fn new(name: impl Into<String>, params: Vec<Param>, ret_ty: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret_ty,
            requires: Vec::new(),
            ensures: Vec::new(),
            body: Vec::new(),
            is_entry: false,
            docs: Vec::new(),
            span: Span::unknown(),
        }
    }

    pub fn has_contracts(&self) -> bool {
        !self.requires.is_empty() || !self.ensures.is_empty()
    }
}

/// Entity field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Entity: record type owning its invariants, constructor and methods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub fields: Vec<Field>,
    pub invariants: Vec<ContractClause>,
    pub constructor: Option<FnDef>,
    pub methods: Vec<FnDef>,
    #[serde(default)]
    pub docs: Vec<DocBlock>,
    #[serde(default)]
    pub span: Span,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            invariants: Vec::new(),
            constructor: None,
            methods: Vec::new(),
            docs: Vec::new(),
            span: Span::unknown(),
        }
    }
}

/// Enum definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub variants: Vec<EnumVariant>,
    #[serde(default)]
    pub docs: Vec<DocBlock>,
    #[serde(default)]
    pub span: Span,
}

/// Enum variant; fields are empty for unit variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: String,
    pub fields: Vec<Field>,
}
