//! Statement nodes of the checked tree

use super::{ContractClause, Expr, Type};
use serde::{Deserialize, Serialize};

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Local binding: let [mut] name [: ty] = value
    Let {
        name: String,
        mutable: bool,
        ty: Option<Type>,
        value: Expr,
    },

    /// Assignment to a local, field path, or sequence element
    Assign { target: Expr, value: Expr },

    /// Expression evaluated for its effect
    Expr(Expr),

    /// Return from the unit
    Return(Option<Expr>),

    /// Conditional statement
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },

    /// while cond { body }
    While {
        cond: Expr,
        invariants: Vec<ContractClause>,
        decreases: Option<ContractClause>,
        body: Vec<Stmt>,
    },

    /// for var in [start, end) { body }
    For {
        var: String,
        start: Expr,
        end: Expr,
        invariants: Vec<ContractClause>,
        decreases: Option<ContractClause>,
        body: Vec<Stmt>,
    },

    Break,
    Continue,
}

impl Stmt {
    /// Whether a `return` occurs anywhere in this statement.
    pub fn contains_return(&self) -> bool {
        match self {
            Stmt::Return(_) => true,
            Stmt::If {
                then_body,
                else_body,
                ..
            } => then_body.iter().chain(else_body).any(Stmt::contains_return),
            Stmt::While { body, .. } | Stmt::For { body, .. } => {
                body.iter().any(Stmt::contains_return)
            }
            _ => false,
        }
    }
}
