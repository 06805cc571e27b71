//! Contract-bearing unit lowering
//!
//! A unit is a free function, an entity constructor, or an entity method.
//! The emitted shape is:
//!
//! ```text
//! fn f(..) -> T {
//!     assert!(pre, ..);            // one per precondition
//!     let __old_k = (E).clone();   // one per distinct old() key
//!     let __result: T = '__contract: { body };
//!     assert!(post, ..);           // postconditions, then invariants
//!     __result
//! }
//! ```
//!
//! Every `return e` in the body becomes `break '__contract e`, so the
//! trailing checks run on every exit path.

use std::collections::HashSet;

use tracing::debug;

use crate::ast::{ContractClause, EntityDef, FnDef, Type};
use crate::error::{CompileError, Result};
use crate::lower::{LowerCtx, OldCaptures, lower_condition};
use crate::symbols::SymbolTable;

use super::buffer::CodeBuffer;
use super::stmt::{Exit, LoopState};
use super::{assert_line, clause_text};

/// Label of the postcondition funnel
pub const CONTRACT_LABEL: &str = "'__contract";
/// Funnel result binding
pub const RESULT_VAR: &str = "__result";
/// Receiver inside constructors
pub const CTOR_SELF: &str = "__self";

#[derive(Debug, Clone, Copy)]
pub enum UnitKind<'u> {
    Function,
    Constructor(&'u EntityDef),
    Method(&'u EntityDef),
}

/// Per-unit lowering state; dropped once the unit is emitted
pub struct UnitCompiler<'a, 'p> {
    pub(super) symbols: &'a SymbolTable<'p>,
    pub(super) module: &'a str,
    pub(super) unit: &'a FnDef,
    pub(super) kind: UnitKind<'a>,
    pub(super) receiver: &'static str,
    /// Parameters received by reference
    pub(super) ref_params: HashSet<&'a str>,
    pub(super) olds: OldCaptures,
}

impl<'a, 'p> UnitCompiler<'a, 'p> {
    pub fn new(symbols: &'a SymbolTable<'p>, module: &'a str, unit: &'a FnDef, kind: UnitKind<'a>) -> Self {
        let receiver = match kind {
            UnitKind::Constructor(_) => CTOR_SELF,
            _ => "self",
        };
        let ref_params = if matches!(kind, UnitKind::Function) && !symbols.is_primary(module) {
            unit.params
                .iter()
                .filter(|p| p.ty.is_seq())
                .map(|p| p.name.as_str())
                .collect()
        } else {
            HashSet::new()
        };

        // loop invariants capture at loop entry, see `lower_checked_loop`
        let olds = OldCaptures::collect(unit.ensures.iter().chain(invariants(kind)));

        Self {
            symbols,
            module,
            unit,
            kind,
            receiver,
            ref_params,
            olds,
        }
    }

    /// Context for body statements: no result, no old()
    pub(super) fn body_ctx(&self) -> LowerCtx<'_, 'p> {
        LowerCtx::new(self.symbols, self.module).with_receiver(self.receiver)
    }

    /// Context for trailing checks and loop invariants
    pub(super) fn check_ctx(&self) -> LowerCtx<'_, 'p> {
        let ctx = self.body_ctx().with_olds(&self.olds);
        match self.kind {
            UnitKind::Constructor(_) => ctx.with_result(CTOR_SELF),
            _ if self.unit.ret_ty.is_unit() => ctx,
            _ => ctx.with_result(RESULT_VAR),
        }
    }

    fn has_trailing_checks(&self) -> bool {
        !self.unit.ensures.is_empty() || invariants(self.kind).next().is_some()
    }

    pub fn emit(&self, buf: &mut CodeBuffer) -> Result<()> {
        debug!(
            module = self.module,
            unit = %self.unit.name,
            preconditions = self.unit.requires.len(),
            postconditions = self.unit.ensures.len(),
            snapshots = self.olds.len(),
            "lowering unit"
        );
        buf.open(format!("{} {{", self.signature()))?;
        self.emit_body(buf).map_err(|e| e.at(self.unit.span))?;
        buf.close("}")
    }

    fn signature(&self) -> String {
        let mut params: Vec<String> = Vec::new();
        if matches!(self.kind, UnitKind::Method(_)) {
            params.push("&mut self".to_string());
        }
        for p in &self.unit.params {
            let ty = self.symbols.rust_type(self.module, &p.ty);
            if self.ref_params.contains(p.name.as_str()) {
                params.push(format!("{}: &{ty}", p.name));
            } else {
                params.push(format!("{}: {ty}", p.name));
            }
        }
        let params = params.join(", ");

        match self.kind {
            UnitKind::Constructor(entity) => format!(
                "pub fn new({params}) -> {}",
                self.symbols.type_name(self.module, &entity.name)
            ),
            UnitKind::Function if self.unit.is_entry => format!("fn {}({params})", self.unit.name),
            _ => {
                let name = match self.kind {
                    UnitKind::Function => self.symbols.fn_name(self.module, &self.unit.name),
                    _ => self.unit.name.clone(),
                };
                if self.unit.ret_ty.is_unit() {
                    format!("pub fn {name}({params})")
                } else {
                    format!(
                        "pub fn {name}({params}) -> {}",
                        self.symbols.rust_type(self.module, &self.unit.ret_ty)
                    )
                }
            }
        }
    }

    fn emit_body(&self, buf: &mut CodeBuffer) -> Result<()> {
        if let UnitKind::Constructor(entity) = self.kind {
            self.emit_default_instance(entity, buf)?;
        }

        for clause in &self.unit.requires {
            self.emit_check(clause, "precondition violated", &self.body_ctx(), buf)?;
        }
        let entry_ctx = self.body_ctx();
        buf.lines(self.olds.snapshot_stmts(&entry_ctx)?)?;

        let body_has_return = self.unit.body.iter().any(|s| s.contains_return());
        let mut loops = LoopState::default();

        match self.kind {
            UnitKind::Constructor(_) => {
                self.emit_void_body(body_has_return, &mut loops, buf)?;
                self.emit_trailing_checks(buf)?;
                buf.line(CTOR_SELF)
            }
            _ if self.unit.ret_ty.is_unit() => {
                if self.has_trailing_checks() {
                    self.emit_void_body(body_has_return, &mut loops, buf)?;
                    self.emit_trailing_checks(buf)
                } else {
                    self.lower_block(&self.unit.body, Exit::Return, &mut loops, buf)
                }
            }
            _ if self.has_trailing_checks() => {
                let ty = self.symbols.rust_type(self.module, &self.unit.ret_ty);
                buf.line("#[allow(unreachable_code)]")?;
                buf.open(format!("let {RESULT_VAR}: {ty} = {CONTRACT_LABEL}: {{"))?;
                self.lower_block(&self.unit.body, Exit::BreakValue, &mut loops, buf)?;
                buf.line("unreachable!()")?;
                buf.close("};")?;
                self.emit_trailing_checks(buf)?;
                buf.line(RESULT_VAR)
            }
            _ => self.lower_block(&self.unit.body, Exit::Return, &mut loops, buf),
        }
    }

    /// A void body; wrapped in the funnel label only if it can return early
    fn emit_void_body(&self, body_has_return: bool, loops: &mut LoopState, buf: &mut CodeBuffer) -> Result<()> {
        if body_has_return {
            buf.open(format!("{CONTRACT_LABEL}: {{"))?;
            self.lower_block(&self.unit.body, Exit::Break, loops, buf)?;
            buf.close("}")
        } else {
            self.lower_block(&self.unit.body, Exit::Break, loops, buf)
        }
    }

    fn emit_default_instance(&self, entity: &EntityDef, buf: &mut CodeBuffer) -> Result<()> {
        let name = self.symbols.type_name(self.module, &entity.name);
        if entity.fields.is_empty() {
            return buf.line(format!("let mut {CTOR_SELF} = {name} {{}};"));
        }
        buf.open(format!("let mut {CTOR_SELF} = {name} {{"))?;
        for field in &entity.fields {
            buf.line(format!(
                "{}: {},",
                field.name,
                self.symbols.default_value(self.module, &field.ty)
            ))?;
        }
        buf.close("};")
    }

    fn emit_trailing_checks(&self, buf: &mut CodeBuffer) -> Result<()> {
        let ctx = self.check_ctx();
        for clause in &self.unit.ensures {
            self.emit_check(clause, "postcondition violated", &ctx, buf)?;
        }
        for clause in invariants(self.kind) {
            self.emit_check(clause, "invariant violated", &ctx, buf)?;
        }
        Ok(())
    }

    pub(super) fn emit_check(
        &self,
        clause: &ContractClause,
        what: &str,
        ctx: &LowerCtx<'_, '_>,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        let cond = lower_condition(&clause.expr, ctx).map_err(|e| e.at(clause.span))?;
        buf.line(assert_line(&cond, &format!("{what}: {}", clause_text(clause))))
    }

    /// Unit declared to return nothing
    pub(super) fn is_void(&self) -> bool {
        matches!(self.kind, UnitKind::Constructor(_)) || self.unit.ret_ty == Type::Unit
    }

    pub(super) fn missing_value(&self) -> CompileError {
        CompileError::lowering(
            format!("`return` without a value in `{}`, which returns a value", self.unit.name),
            Default::default(),
        )
    }
}

fn invariants<'u>(kind: UnitKind<'u>) -> impl Iterator<Item = &'u ContractClause> {
    let clauses: &'u [ContractClause] = match kind {
        UnitKind::Constructor(entity) | UnitKind::Method(entity) => &entity.invariants,
        UnitKind::Function => &[],
    };
    clauses.iter()
}
