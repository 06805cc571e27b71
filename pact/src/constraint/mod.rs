//! Constraint Analysis
//!
//! Mines per-parameter bounds out of a unit's preconditions so the value
//! synthesizer can aim generated inputs at the accepted domain.
//!
//! Only a fixed set of clause shapes is recognized (conjunctions are split
//! first):
//!
//! ```text
//! x CMP lit            lit CMP x            len(xs) CMP lit
//! forall i in [0, len(xs)): xs[i] CMP lit
//! ```
//!
//! Anything else is skipped. A skipped clause leaves its parameter at the
//! default range; it is never an error and never produces a guessed bound.
//! Clauses that do match are combined by intersection.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{BinOp, ContractClause, Expr, Param, QuantKind, Type, UnOp};

/// A bound literal, typed as written
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Bound {
    Int(i64),
    Float(f64),
}

impl Bound {
    pub fn as_i64(self) -> i64 {
        match self {
            Bound::Int(n) => n,
            Bound::Float(x) => x as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Bound::Int(n) => n as f64,
            Bound::Float(x) => x,
        }
    }
}

/// Bounds derived for one parameter; all bounds are inclusive
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParamConstraint {
    pub param: String,
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
    pub excluded: Vec<Bound>,
    /// Minimum sequence length
    pub min_len: Option<usize>,
    /// Per-element bounds for sequences of integers
    pub elem_lower: Option<i64>,
    pub elem_upper: Option<i64>,
}

impl ParamConstraint {
    pub fn unconstrained(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            ..Self::default()
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.lower.is_none()
            && self.upper.is_none()
            && self.excluded.is_empty()
            && self.min_len.is_none()
            && self.elem_lower.is_none()
            && self.elem_upper.is_none()
    }

    fn tighten_lower(&mut self, b: Bound) {
        self.lower = Some(match self.lower {
            Some(old) if old.as_f64() >= b.as_f64() => old,
            _ => b,
        });
    }

    fn tighten_upper(&mut self, b: Bound) {
        self.upper = Some(match self.upper {
            Some(old) if old.as_f64() <= b.as_f64() => old,
            _ => b,
        });
    }

    fn exclude(&mut self, b: Bound) {
        if !self.excluded.contains(&b) {
            self.excluded.push(b);
        }
    }

    fn tighten_min_len(&mut self, n: usize) {
        self.min_len = Some(self.min_len.map_or(n, |old| old.max(n)));
    }

    fn tighten_elem_lower(&mut self, n: i64) {
        self.elem_lower = Some(self.elem_lower.map_or(n, |old| old.max(n)));
    }

    fn tighten_elem_upper(&mut self, n: i64) {
        self.elem_upper = Some(self.elem_upper.map_or(n, |old| old.min(n)));
    }
}

/// Derive one bound record per parameter, in parameter order.
pub fn analyze_constraints(params: &[Param], preconditions: &[ContractClause]) -> Vec<ParamConstraint> {
    let mut records: Vec<ParamConstraint> = params
        .iter()
        .map(|p| ParamConstraint::unconstrained(&p.name))
        .collect();
    let mut analyzer = Analyzer {
        params,
        records: &mut records,
    };
    for clause in preconditions {
        analyzer.clause(&clause.expr, &clause.source);
    }
    records
}

struct Analyzer<'a> {
    params: &'a [Param],
    records: &'a mut Vec<ParamConstraint>,
}

impl Analyzer<'_> {
    fn clause(&mut self, expr: &Expr, source: &str) {
        if let Expr::Binary {
            left,
            op: BinOp::And,
            right,
        } = expr
        {
            self.clause(left, source);
            self.clause(right, source);
            return;
        }
        if !self.recognize(expr) {
            debug!(clause = source, part = %expr, "precondition shape not recognized, leaving default range");
        }
    }

    fn recognize(&mut self, expr: &Expr) -> bool {
        match expr {
            Expr::Binary { left, op, right } if op.is_comparison() => {
                if let Some(idx) = self.param_index(left)
                    && let Some(lit) = literal(right)
                {
                    return self.scalar(idx, *op, lit);
                }
                if let Some(lit) = literal(left)
                    && let Some(idx) = self.param_index(right)
                {
                    return self.scalar(idx, op.flip(), lit);
                }
                if let Expr::Len(seq) = left.as_ref()
                    && let Some(idx) = self.param_index(seq)
                    && let Some(Bound::Int(n)) = literal(right)
                {
                    return self.length(idx, *op, n);
                }
                false
            }
            Expr::Quantifier {
                kind: QuantKind::Forall,
                var,
                start,
                end,
                body,
            } => self.element(var, start, end, body),
            _ => false,
        }
    }

    fn param_index(&self, expr: &Expr) -> Option<usize> {
        match expr {
            Expr::Var(name) => self.params.iter().position(|p| &p.name == name),
            _ => None,
        }
    }

    /// `x CMP lit`
    fn scalar(&mut self, idx: usize, op: BinOp, lit: Bound) -> bool {
        let lit = match (&self.params[idx].ty, lit) {
            (Type::Int, Bound::Int(_)) => lit,
            (Type::Float, _) => Bound::Float(lit.as_f64()),
            _ => return false,
        };
        let record = &mut self.records[idx];
        match (op, lit) {
            (BinOp::Gt, Bound::Int(n)) => record.tighten_lower(Bound::Int(n.saturating_add(1))),
            (BinOp::Lt, Bound::Int(n)) => record.tighten_upper(Bound::Int(n.saturating_sub(1))),
            // no successor step for floats; the recorded bound stays inclusive
            (BinOp::Gt | BinOp::Ge, _) => record.tighten_lower(lit),
            (BinOp::Lt | BinOp::Le, _) => record.tighten_upper(lit),
            (BinOp::Eq, _) => {
                record.tighten_lower(lit);
                record.tighten_upper(lit);
            }
            (BinOp::Ne, _) => record.exclude(lit),
            _ => return false,
        }
        true
    }

    /// `len(xs) CMP lit`
    fn length(&mut self, idx: usize, op: BinOp, n: i64) -> bool {
        if !self.params[idx].ty.is_seq() {
            return false;
        }
        let min = match op {
            BinOp::Gt => n.saturating_add(1),
            BinOp::Ge | BinOp::Eq => n,
            _ => return false,
        };
        self.records[idx].tighten_min_len(usize::try_from(min).unwrap_or(0));
        true
    }

    /// `forall i in [0, len(xs)): xs[i] CMP lit`
    fn element(&mut self, var: &str, start: &Expr, end: &Expr, body: &Expr) -> bool {
        if literal(start) != Some(Bound::Int(0)) {
            return false;
        }
        let Expr::Len(seq) = end else {
            return false;
        };
        let Some(idx) = self.param_index(seq) else {
            return false;
        };
        if self.params[idx].ty != Type::seq(Type::Int) {
            return false;
        }
        let Expr::Binary { left, op, right } = body else {
            return false;
        };
        let Expr::Index { base, index } = left.as_ref() else {
            return false;
        };
        if base != seq || !matches!(index.as_ref(), Expr::Var(v) if v == var) {
            return false;
        }
        let Some(Bound::Int(n)) = literal(right) else {
            return false;
        };

        let record = &mut self.records[idx];
        match op {
            BinOp::Gt => record.tighten_elem_lower(n.saturating_add(1)),
            BinOp::Ge => record.tighten_elem_lower(n),
            BinOp::Lt => record.tighten_elem_upper(n.saturating_sub(1)),
            BinOp::Le => record.tighten_elem_upper(n),
            BinOp::Eq => {
                record.tighten_elem_lower(n);
                record.tighten_elem_upper(n);
            }
            _ => return false,
        }
        true
    }
}

/// Numeric literal, including a negated one
fn literal(expr: &Expr) -> Option<Bound> {
    match expr {
        Expr::IntLit(n) => Some(Bound::Int(*n)),
        Expr::FloatLit(x) => Some(Bound::Float(*x)),
        Expr::Unary {
            op: UnOp::Neg,
            expr,
        } => match expr.as_ref() {
            Expr::IntLit(n) => n.checked_neg().map(Bound::Int),
            Expr::FloatLit(x) => Some(Bound::Float(-x)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn int_params(names: &[&str]) -> Vec<Param> {
        names.iter().map(|n| Param::new(*n, Type::Int)).collect()
    }

    fn cmp(l: Expr, op: BinOp, r: Expr) -> Expr {
        Expr::binary(l, op, r)
    }

    fn pre(expr: Expr) -> ContractClause {
        let source = expr.to_string();
        ContractClause::requires(expr, source)
    }

    #[test]
    fn test_ident_cmp_literal() {
        let params = int_params(&["x"]);
        let c = analyze_constraints(
            &params,
            &[pre(cmp(Expr::var("x"), BinOp::Gt, Expr::int(0)))],
        );
        assert_eq!(c[0].lower, Some(Bound::Int(1)));
        assert_eq!(c[0].upper, None);
    }

    #[test]
    fn test_literal_cmp_ident_is_flipped() {
        let params = int_params(&["x"]);
        let c = analyze_constraints(
            &params,
            &[pre(cmp(Expr::int(10), BinOp::Ge, Expr::var("x")))],
        );
        assert_eq!(c[0].upper, Some(Bound::Int(10)));
        assert_eq!(c[0].lower, None);
    }

    #[test]
    fn test_conjunction_is_split() {
        let params = int_params(&["x", "y"]);
        let clause = pre(cmp(
            cmp(Expr::var("x"), BinOp::Ge, Expr::int(0)),
            BinOp::And,
            cmp(
                cmp(Expr::var("x"), BinOp::Le, Expr::int(10)),
                BinOp::And,
                cmp(Expr::var("y"), BinOp::Ne, Expr::int(5)),
            ),
        ));
        let c = analyze_constraints(&params, &[clause]);
        assert_eq!(c[0].lower, Some(Bound::Int(0)));
        assert_eq!(c[0].upper, Some(Bound::Int(10)));
        assert_eq!(c[1].excluded, vec![Bound::Int(5)]);
    }

    #[test]
    fn test_negative_literal() {
        let params = int_params(&["t"]);
        let neg = Expr::Unary {
            op: UnOp::Neg,
            expr: Box::new(Expr::int(40)),
        };
        let c = analyze_constraints(&params, &[pre(cmp(Expr::var("t"), BinOp::Ge, neg))]);
        assert_eq!(c[0].lower, Some(Bound::Int(-40)));
    }

    #[test]
    fn test_length_bound() {
        let params = vec![Param::new("xs", Type::seq(Type::Int))];
        let c = analyze_constraints(
            &params,
            &[pre(cmp(Expr::len(Expr::var("xs")), BinOp::Gt, Expr::int(2)))],
        );
        assert_eq!(c[0].min_len, Some(3));
    }

    #[test]
    fn test_element_bound_through_forall() {
        let params = vec![Param::new("xs", Type::seq(Type::Int))];
        let clause = pre(Expr::forall(
            "i",
            Expr::int(0),
            Expr::len(Expr::var("xs")),
            cmp(Expr::index(Expr::var("xs"), Expr::var("i")), BinOp::Le, Expr::int(50)),
        ));
        let c = analyze_constraints(&params, &[clause]);
        assert_eq!(c[0].elem_upper, Some(50));
        assert_eq!(c[0].elem_lower, None);
    }

    #[test]
    fn test_forall_over_other_index_is_ignored() {
        let params = vec![Param::new("xs", Type::seq(Type::Int))];
        let clause = pre(Expr::forall(
            "i",
            Expr::int(0),
            Expr::len(Expr::var("xs")),
            cmp(Expr::index(Expr::var("xs"), Expr::int(0)), BinOp::Gt, Expr::int(0)),
        ));
        let c = analyze_constraints(&params, &[clause]);
        assert!(c[0].is_unconstrained());
    }

    #[test]
    fn test_unrecognized_shapes_leave_defaults() {
        let params = int_params(&["a", "b"]);
        let clauses = [
            pre(cmp(Expr::var("a"), BinOp::Lt, Expr::var("b"))),
            pre(cmp(
                cmp(Expr::var("a"), BinOp::Gt, Expr::int(0)),
                BinOp::Or,
                cmp(Expr::var("b"), BinOp::Gt, Expr::int(0)),
            )),
            pre(cmp(Expr::var("unknown"), BinOp::Gt, Expr::int(3))),
        ];
        let c = analyze_constraints(&params, &clauses);
        assert!(c.iter().all(ParamConstraint::is_unconstrained));
    }

    #[test]
    fn test_multiple_clauses_intersect() {
        let params = int_params(&["x"]);
        let clauses = [
            pre(cmp(Expr::var("x"), BinOp::Ge, Expr::int(5))),
            pre(cmp(Expr::var("x"), BinOp::Ge, Expr::int(0))),
            pre(cmp(Expr::var("x"), BinOp::Le, Expr::int(20))),
            pre(cmp(Expr::var("x"), BinOp::Lt, Expr::int(50))),
        ];
        let c = analyze_constraints(&params, &clauses);
        assert_eq!(c[0].lower, Some(Bound::Int(5)));
        assert_eq!(c[0].upper, Some(Bound::Int(20)));
    }

    #[test]
    fn test_float_strict_bound_is_recorded_inclusive() {
        let params = vec![Param::new("r", Type::Float)];
        let c = analyze_constraints(
            &params,
            &[pre(cmp(Expr::var("r"), BinOp::Gt, Expr::FloatLit(0.5)))],
        );
        assert_eq!(c[0].lower, Some(Bound::Float(0.5)));
    }

    #[test]
    fn test_bool_param_comparison_is_ignored() {
        let params = vec![Param::new("flag", Type::Bool)];
        let c = analyze_constraints(
            &params,
            &[pre(cmp(Expr::var("flag"), BinOp::Eq, Expr::int(1)))],
        );
        assert!(c[0].is_unconstrained());
    }

    fn arb_op() -> impl Strategy<Value = BinOp> {
        prop_oneof![
            Just(BinOp::Lt),
            Just(BinOp::Le),
            Just(BinOp::Gt),
            Just(BinOp::Ge),
            Just(BinOp::Eq),
            Just(BinOp::Ne),
        ]
    }

    proptest! {
        /// Equal inputs always give equal bound records.
        #[test]
        fn analysis_is_idempotent(
            ops in prop::collection::vec(arb_op(), 0..6),
            lits in prop::collection::vec(-1000i64..1000, 6),
            flip in any::<bool>(),
        ) {
            let params = int_params(&["x"]);
            let clauses: Vec<ContractClause> = ops
                .iter()
                .zip(&lits)
                .map(|(op, n)| {
                    if flip {
                        pre(cmp(Expr::int(*n), *op, Expr::var("x")))
                    } else {
                        pre(cmp(Expr::var("x"), *op, Expr::int(*n)))
                    }
                })
                .collect();
            let first = analyze_constraints(&params, &clauses);
            let second = analyze_constraints(&params, &clauses);
            prop_assert_eq!(first, second);
        }
    }
}
