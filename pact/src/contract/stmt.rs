//! Statement lowering
//!
//! Loops carrying invariants or a decreases metric are wrapped so the
//! checks run at entry and after every iteration:
//!
//! ```text
//! {
//!     let __old_k = (E).clone();   // one per old() in the invariants
//!     assert!(inv, "loop invariant violated at entry: ..");
//!     let mut __decreases_prev: i64 = m;
//!     '__loop_1: while cond {
//!         '__iter_1: { body }
//!         assert!(inv, "loop invariant violated after iteration: ..");
//!         let __decreases_next: i64 = m;
//!         ..
//!         __decreases_prev = __decreases_next;
//!     }
//! }
//! ```
//!
//! Inside such a loop, `continue` leaves the iteration block and `break`
//! leaves the labeled loop, so a `continue` never skips the checks.

use crate::ast::{ContractClause, Expr, Stmt, Type};
use crate::error::{CompileError, Result};
use crate::lower::{OldCaptures, lower_condition, lower_expr};

use super::buffer::CodeBuffer;
use super::unit::{CONTRACT_LABEL, UnitCompiler, UnitKind};
use super::{assert_line, clause_text};

/// How a `return` leaves the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Plain `return`
    Return,
    /// `break '__contract;` out of a void funnel
    Break,
    /// `break '__contract value;` out of a value funnel
    BreakValue,
}

/// Labels of the innermost checked loop
#[derive(Debug, Clone)]
struct LoopLabels {
    iter: String,
    exit: String,
}

#[derive(Debug, Default)]
pub struct LoopState {
    next_id: usize,
    depth: usize,
    /// `None` inside an unchecked loop
    labels: Option<LoopLabels>,
}

/// A `while` or `for` loop, viewed uniformly
struct LoopParts<'s> {
    /// Loop header without the label, e.g. `while x > 0`
    header: String,
    invariants: &'s [ContractClause],
    decreases: Option<&'s ContractClause>,
    body: &'s [Stmt],
}

impl UnitCompiler<'_, '_> {
    pub(super) fn lower_block(
        &self,
        stmts: &[Stmt],
        exit: Exit,
        loops: &mut LoopState,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        for stmt in stmts {
            self.lower_stmt(stmt, exit, loops, buf)?;
        }
        Ok(())
    }

    fn lower_stmt(&self, stmt: &Stmt, exit: Exit, loops: &mut LoopState, buf: &mut CodeBuffer) -> Result<()> {
        let ctx = self.body_ctx();
        match stmt {
            Stmt::Let {
                name,
                mutable,
                ty,
                value,
            } => {
                let kw = if *mutable { "let mut" } else { "let" };
                let value = self.owned_value(value, ty.as_ref())?;
                match ty {
                    Some(ty) => buf.line(format!(
                        "{kw} {name}: {} = {value};",
                        self.symbols.rust_type(self.module, ty)
                    )),
                    None => buf.line(format!("{kw} {name} = {value};")),
                }
            }

            Stmt::Assign { target, value } => {
                let target = lower_expr(target, &ctx)?;
                let value = self.owned_value(value, None)?;
                buf.line(format!("{target} = {value};"))
            }

            Stmt::Expr(expr) => buf.line(format!("{};", statement_expr(lower_condition(expr, &ctx)?))),

            Stmt::Return(value) => self.lower_return(value.as_ref(), exit, buf),

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                buf.open(format!("if {} {{", lower_condition(cond, &ctx)?))?;
                self.lower_block(then_body, exit, loops, buf)?;
                if else_body.is_empty() {
                    buf.close("}")
                } else {
                    buf.reopen("} else {")?;
                    self.lower_block(else_body, exit, loops, buf)?;
                    buf.close("}")
                }
            }

            Stmt::While {
                cond,
                invariants,
                decreases,
                body,
            } => {
                let parts = LoopParts {
                    header: format!("while {}", lower_condition(cond, &ctx)?),
                    invariants,
                    decreases: decreases.as_ref(),
                    body,
                };
                self.lower_loop(parts, exit, loops, buf)
            }

            Stmt::For {
                var,
                start,
                end,
                invariants,
                decreases,
                body,
            } => {
                let parts = LoopParts {
                    header: format!(
                        "for {var} in {}..{}",
                        lower_expr(start, &ctx)?,
                        lower_expr(end, &ctx)?
                    ),
                    invariants,
                    decreases: decreases.as_ref(),
                    body,
                };
                self.lower_loop(parts, exit, loops, buf)
            }

            Stmt::Break => {
                if loops.depth == 0 {
                    return Err(CompileError::lowering("`break` outside of a loop", Default::default()));
                }
                match &loops.labels {
                    Some(labels) => buf.line(format!("break {};", labels.exit)),
                    None => buf.line("break;"),
                }
            }

            Stmt::Continue => {
                if loops.depth == 0 {
                    return Err(CompileError::lowering("`continue` outside of a loop", Default::default()));
                }
                match &loops.labels {
                    Some(labels) => buf.line(format!("break {};", labels.iter)),
                    None => buf.line("continue;"),
                }
            }
        }
    }

    fn lower_return(&self, value: Option<&Expr>, exit: Exit, buf: &mut CodeBuffer) -> Result<()> {
        let value = match value {
            Some(Expr::Unit) | None => None,
            Some(expr) => Some(expr),
        };
        match (exit, value) {
            (Exit::Return, None) if self.is_void() => buf.line("return;"),
            (Exit::Return, Some(expr)) => buf.line(format!("return {};", self.owned_value(expr, None)?)),
            (Exit::Break, None) => buf.line(format!("break {CONTRACT_LABEL};")),
            (Exit::BreakValue, Some(expr)) => buf.line(format!(
                "break {CONTRACT_LABEL} {};",
                self.owned_value(expr, None)?
            )),
            (Exit::Break, Some(_)) => Err(CompileError::lowering(
                format!("`{}` does not return a value", self.unit.name),
                Default::default(),
            )),
            (Exit::Return | Exit::BreakValue, None) => Err(self.missing_value()),
        }
    }

    /// Lower a value that is being moved into a new owner. By-reference
    /// parameters, parameters of non-`Copy` type, and field or element
    /// places not known to be `Copy` are cloned.
    fn owned_value(&self, expr: &Expr, ty: Option<&Type>) -> Result<String> {
        let text = lower_condition(expr, &self.body_ctx())?;
        let clone = match expr {
            Expr::Var(name) if self.ref_params.contains(name.as_str()) => true,
            Expr::Var(_) => self.place_type(expr).is_some_and(|t| !t.is_copy()),
            Expr::FieldAccess { .. } | Expr::Index { .. } => {
                !ty.or_else(|| self.place_type(expr)).is_some_and(Type::is_copy)
            }
            _ => false,
        };
        Ok(if clone { format!("{text}.clone()") } else { text })
    }

    /// Declared type of a parameter or of a receiver field
    fn place_type(&self, expr: &Expr) -> Option<&Type> {
        match expr {
            Expr::Var(name) => self.unit.params.iter().find(|p| &p.name == name).map(|p| &p.ty),
            Expr::FieldAccess { expr, field } if **expr == Expr::SelfRef => {
                let (UnitKind::Method(entity) | UnitKind::Constructor(entity)) = self.kind else {
                    return None;
                };
                entity.fields.iter().find(|f| &f.name == field).map(|f| &f.ty)
            }
            _ => None,
        }
    }

    fn lower_loop(&self, parts: LoopParts<'_>, exit: Exit, loops: &mut LoopState, buf: &mut CodeBuffer) -> Result<()> {
        loops.depth += 1;
        let result = if parts.invariants.is_empty() && parts.decreases.is_none() {
            // user break/continue target this loop directly
            let saved = loops.labels.take();
            let result = self.lower_plain_loop(&parts, exit, loops, buf);
            loops.labels = saved;
            result
        } else {
            self.lower_checked_loop(parts, exit, loops, buf)
        };
        loops.depth -= 1;
        result
    }

    fn lower_plain_loop(
        &self,
        parts: &LoopParts<'_>,
        exit: Exit,
        loops: &mut LoopState,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        buf.open(format!("{} {{", parts.header))?;
        self.lower_block(parts.body, exit, loops, buf)?;
        buf.close("}")
    }

    fn lower_checked_loop(
        &self,
        parts: LoopParts<'_>,
        exit: Exit,
        loops: &mut LoopState,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        loops.next_id += 1;
        let labels = LoopLabels {
            iter: format!("'__iter_{}", loops.next_id),
            exit: format!("'__loop_{}", loops.next_id),
        };
        let olds = OldCaptures::collect(parts.invariants);
        let ctx = self.body_ctx().with_olds(&olds);

        let metric = match parts.decreases {
            Some(clause) => Some((
                lower_condition(&clause.expr, &ctx).map_err(|e| e.at(clause.span))?,
                clause_text(clause),
            )),
            None => None,
        };

        buf.open("{")?;
        buf.lines(olds.snapshot_stmts(&self.body_ctx())?)?;
        for clause in parts.invariants {
            self.emit_check(clause, "loop invariant violated at entry", &ctx, buf)?;
        }
        if let Some((m, text)) = &metric {
            buf.line(format!("let mut __decreases_prev: i64 = {m};"))?;
            buf.line(assert_line(
                "__decreases_prev >= 0",
                &format!("decreases metric negative at entry: {text}"),
            ))?;
        }

        let exit_label = if has_direct(parts.body, &Stmt::Break) {
            format!("{}: ", labels.exit)
        } else {
            String::new()
        };
        buf.open(format!("{exit_label}{} {{", parts.header))?;

        let iter_block = has_direct(parts.body, &Stmt::Continue);
        if iter_block {
            buf.open(format!("{}: {{", labels.iter))?;
        }
        let saved = loops.labels.replace(labels);
        let body = self.lower_block(parts.body, exit, loops, buf);
        loops.labels = saved;
        body?;
        if iter_block {
            buf.close("}")?;
        }

        for clause in parts.invariants {
            self.emit_check(clause, "loop invariant violated after iteration", &ctx, buf)?;
        }
        if let Some((m, text)) = &metric {
            buf.line(format!("let __decreases_next: i64 = {m};"))?;
            buf.line(assert_line(
                "__decreases_next < __decreases_prev",
                &format!("decreases metric did not decrease after iteration: {text}"),
            ))?;
            buf.line(assert_line(
                "__decreases_next >= 0",
                &format!("decreases metric negative after iteration: {text}"),
            ))?;
            buf.line("__decreases_prev = __decreases_next;")?;
        }
        buf.close("}")?;
        buf.close("}")
    }
}

/// Whether `target` (`break` or `continue`) occurs in `stmts` outside any
/// nested loop
fn has_direct(stmts: &[Stmt], target: &Stmt) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::If {
            then_body,
            else_body,
            ..
        } => has_direct(then_body, target) || has_direct(else_body, target),
        other => other == target,
    })
}

/// Parenthesize text that would otherwise parse as a block or control-flow
/// statement rather than the start of an expression
fn statement_expr(text: String) -> String {
    let block_like = text.starts_with('{')
        || ["if ", "match ", "loop ", "while ", "for "]
            .iter()
            .any(|kw| text.starts_with(kw));
    if block_like { format!("({text})") } else { text }
}
