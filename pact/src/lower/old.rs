//! Old-value capture table
//!
//! One table per unit for its postconditions and entity invariants, taken
//! before the body runs, and one per checked loop for its invariants, taken
//! at loop entry. Every `old(E)` is keyed by the source rendering of `E`;
//! equal keys share one snapshot binding.

use std::collections::HashMap;

use crate::ast::{ContractClause, Expr};
use crate::error::Result;
use crate::util::sanitize_ident;

use super::{LowerCtx, lower_expr};

/// Reserved prefix of snapshot bindings
pub const OLD_PREFIX: &str = "__old_";

/// One captured sub-expression
#[derive(Debug, Clone)]
pub struct OldCapture {
    /// Canonical key (source rendering of the captured expression)
    pub key: String,
    /// Snapshot binding name
    pub ident: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, Default)]
pub struct OldCaptures {
    entries: Vec<OldCapture>,
    by_key: HashMap<String, usize>,
}

impl OldCaptures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every `old()` reachable from the given clauses.
    pub fn collect<'c>(clauses: impl IntoIterator<Item = &'c ContractClause>) -> Self {
        let mut table = Self::new();
        for clause in clauses {
            table.collect_expr(&clause.expr);
        }
        table
    }

    fn collect_expr(&mut self, expr: &Expr) {
        if let Expr::Old(inner) = expr {
            // the snapshot covers everything beneath it
            self.insert(inner);
            return;
        }
        for child in expr.children() {
            self.collect_expr(child);
        }
    }

    /// Register `expr`, returning its snapshot binding.
    pub fn insert(&mut self, expr: &Expr) -> &str {
        let key = canonical_key(expr);
        let idx = match self.by_key.get(&key) {
            Some(&idx) => idx,
            None => {
                let ident = self.fresh_ident(&key);
                self.entries.push(OldCapture {
                    key: key.clone(),
                    ident,
                    expr: expr.clone(),
                });
                self.by_key.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &self.entries[idx].ident
    }

    fn fresh_ident(&self, key: &str) -> String {
        let base = format!("{OLD_PREFIX}{}", sanitize_ident(key));
        let taken = |name: &str| self.entries.iter().any(|e| e.ident == name);
        if !taken(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or(base)
    }

    /// Snapshot binding for `expr`, if it was captured
    pub fn ident_for(&self, expr: &Expr) -> Option<&str> {
        self.by_key
            .get(&canonical_key(expr))
            .map(|&idx| self.entries[idx].ident.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &OldCapture> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `let __old_x = (x).clone();` per capture, in first-seen order.
    ///
    /// `ctx` describes entry-time state: the same receiver as the unit, no
    /// result binding and no old substitution.
    pub fn snapshot_stmts(&self, ctx: &LowerCtx<'_, '_>) -> Result<Vec<String>> {
        self.entries
            .iter()
            .map(|capture| {
                let value = lower_expr(&capture.expr, ctx)?;
                Ok(format!("let {} = {}.clone();", capture.ident, value))
            })
            .collect()
    }
}

/// Canonical textual encoding of a captured expression
pub fn canonical_key(expr: &Expr) -> String {
    expr.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinOp;

    fn deposit_post() -> ContractClause {
        ContractClause::ensures(
            Expr::binary(
                Expr::self_field("balance"),
                BinOp::Eq,
                Expr::binary(Expr::old(Expr::self_field("balance")), BinOp::Add, Expr::var("amount")),
            ),
            "balance == old(balance) + amount",
        )
    }

    #[test]
    fn test_repeated_old_shares_one_snapshot() {
        let twice = ContractClause::ensures(
            Expr::binary(
                Expr::old(Expr::self_field("balance")),
                BinOp::Le,
                Expr::old(Expr::self_field("balance")),
            ),
            "old(balance) <= old(balance)",
        );
        let table = OldCaptures::collect([&deposit_post(), &twice]);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.ident_for(&Expr::self_field("balance")),
            Some("__old_self_balance")
        );
    }

    #[test]
    fn test_distinct_paths_get_distinct_snapshots() {
        let clause = ContractClause::ensures(
            Expr::binary(
                Expr::old(Expr::self_field("a")),
                BinOp::Lt,
                Expr::old(Expr::len(Expr::self_field("items"))),
            ),
            "old(a) < old(len(items))",
        );
        let table = OldCaptures::collect([&clause]);
        let idents: Vec<_> = table.iter().map(|c| c.ident.as_str()).collect();
        assert_eq!(idents, vec!["__old_self_a", "__old_len_self_items"]);
    }

    #[test]
    fn test_sanitized_collision_gets_suffix() {
        let mut table = OldCaptures::new();
        let a = table.insert(&Expr::field(Expr::var("a"), "b_c")).to_string();
        let b = table.insert(&Expr::field(Expr::var("a_b"), "c")).to_string();
        assert_eq!(a, "__old_a_b_c");
        assert_eq!(b, "__old_a_b_c_2");
    }

    #[test]
    fn test_nested_old_is_not_collected_separately() {
        let clause = ContractClause::ensures(
            Expr::old(Expr::binary(Expr::old(Expr::var("x")), BinOp::Add, Expr::int(1))),
            "old(old(x) + 1)",
        );
        assert_eq!(OldCaptures::collect([&clause]).len(), 1);
    }
}
