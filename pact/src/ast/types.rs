//! Semantic type nodes

use serde::{Deserialize, Serialize};

/// Resolved type of a parameter, field, local or return value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Boolean
    Bool,
    /// Owned string
    Str,
    /// Unit / no value
    Unit,
    /// Growable sequence
    Seq(Box<Type>),
    /// Fallible value: ok type, error type
    Result(Box<Type>, Box<Type>),
    /// Optional value
    Option(Box<Type>),
    /// Entity or enum declared in the current module
    Named(String),
    /// Entity or enum declared in another module
    Qualified { module: String, name: String },
}

impl Type {
    pub fn seq(elem: Type) -> Self {
        Type::Seq(Box::new(elem))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Unit)
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Type::Seq(_))
    }

    /// Whether a value of this type is `Copy` in the generated code.
    pub fn is_copy(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Bool | Type::Unit)
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Bool => write!(f, "Bool"),
            Type::Str => write!(f, "String"),
            Type::Unit => write!(f, "Unit"),
            Type::Seq(elem) => write!(f, "[{elem}]"),
            Type::Result(ok, err) => write!(f, "Result<{ok}, {err}>"),
            Type::Option(inner) => write!(f, "{inner}?"),
            Type::Named(name) => write!(f, "{name}"),
            Type::Qualified { module, name } => write!(f, "{module}.{name}"),
        }
    }
}
