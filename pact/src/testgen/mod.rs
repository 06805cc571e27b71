//! Test Assembly
//!
//! Appends a `#[cfg(test)]` module to a compiled module. Every
//! contract-bearing unit gets a property test driven by synthesized inputs:
//!
//! - free functions with any contract (entry points excluded)
//! - entity constructors
//! - entity methods with contracts, or on an entity with invariants
//! - one workflow test per entity with a constructor and methods
//!
//! Inputs come from the constraint analyzer and the value synthesizer, so the
//! generated tests are fully deterministic.

use tracing::debug;

use crate::ast::{ContractClause, EntityDef, FnDef, Module, Param, Type};
use crate::config::GenConfig;
use crate::constraint::{ParamConstraint, analyze_constraints};
use crate::contract::{CodeBuffer, assert_line, clause_text};
use crate::error::Result;
use crate::lower::{LowerCtx, OldCaptures, lower_condition};
use crate::symbols::SymbolTable;
use crate::synth::{SynthValue, Synthesizer};
use crate::util::to_snake_case;

/// Receiver of entity tests
pub const INSTANCE: &str = "__instance";
/// Result binding of generated calls
pub const RESULT: &str = "result";

/// Pseudo-random helpers behind the runtime integer draws. Modules without
/// integer parameters leave them unused.
const HELPERS: &str = "\
#[allow(dead_code)]
fn __xorshift64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

#[allow(dead_code)]
fn __draw_range(state: &mut u64, lo: i64, hi: i64) -> i64 {
    let span = (hi as i128 - lo as i128 + 1) as u128;
    (lo as i128 + (__xorshift64(state) as u128 % span) as i128) as i64
}";

/// One parameter with its synthesized inputs
struct Input<'u> {
    param: &'u Param,
    /// Literal values
    values: Vec<SynthValue>,
    /// Integer draws appended when the test runs
    draws: Option<Draws>,
}

/// `count` draws from `[lo, hi]` seeded with `seed`, minus the excluded values
struct Draws {
    lo: i64,
    hi: i64,
    seed: u64,
    count: usize,
    excluded: Vec<i64>,
}

pub struct TestAssembler<'a, 'p> {
    symbols: &'a SymbolTable<'p>,
    config: &'a GenConfig,
}

impl<'a, 'p> TestAssembler<'a, 'p> {
    pub fn new(symbols: &'a SymbolTable<'p>, config: &'a GenConfig) -> Self {
        Self { symbols, config }
    }

    /// Name of the generated test module
    pub fn module_name(&self, module: &Module) -> String {
        if module.primary {
            self.config.test_module.clone()
        } else {
            format!("{}_{}", to_snake_case(&module.name), self.config.test_module)
        }
    }

    pub fn assemble_module(&self, module: &Module) -> Result<String> {
        let mut buf = CodeBuffer::new();
        buf.line("#[cfg(test)]")?;
        buf.open(format!("mod {} {{", self.module_name(module)))?;
        buf.line("use super::*;")?;
        buf.blank()?;
        buf.lines(HELPERS.lines())?;

        for func in &module.functions {
            if func.is_entry || !func.has_contracts() {
                continue;
            }
            buf.blank()?;
            self.function_test(module, func, &mut buf)?;
        }
        for entity in &module.entities {
            self.entity_tests(module, entity, &mut buf)?;
        }

        buf.close("}")?;
        Ok(buf.finish())
    }

    fn synth(&self) -> Synthesizer<'a> {
        Synthesizer::new(self.config)
    }

    /// Input lists for every parameter, or `None` (with a skip comment) if
    /// some parameter cannot be generated
    fn inputs<'u>(&self, unit: &'u FnDef, test: &str, buf: &mut CodeBuffer) -> Result<Option<Vec<Input<'u>>>> {
        let constraints = analyze_constraints(&unit.params, &unit.requires);
        let synth = self.synth();
        let mut inputs = Vec::with_capacity(unit.params.len());
        for (param, c) in unit.params.iter().zip(&constraints) {
            let reason = match synth.values(&param.ty, c) {
                Some(values) if !values.is_empty() => {
                    inputs.push(self.split_draws(param, c, values));
                    continue;
                }
                Some(_) => format!("no value of `{}` satisfies its bounds", param.name),
                None => format!("parameter `{}` of type `{}` has no generator", param.name, param.ty),
            };
            debug!(test, reason = %reason, "skipping generated test");
            buf.line(format!("// skipped: {test}: {reason}"))?;
            return Ok(None);
        }
        Ok(Some(inputs))
    }

    /// Integer inputs keep their boundary values as literals and draw the
    /// rest at run time through `__draw_range`, with the same seed and
    /// mapping the synthesizer uses
    fn split_draws<'u>(&self, param: &'u Param, c: &ParamConstraint, values: Vec<SynthValue>) -> Input<'u> {
        let synth = self.synth();
        let range = synth.int_range(c);
        match range {
            Some((lo, hi)) if param.ty == Type::Int && self.config.random_samples > 0 => Input {
                param,
                values: synth
                    .int_boundaries(c)
                    .into_iter()
                    .map(SynthValue::Int)
                    .collect(),
                draws: Some(Draws {
                    lo,
                    hi,
                    seed: self.config.int_seed,
                    count: self.config.random_samples,
                    excluded: c.excluded.iter().map(|b| b.as_i64()).collect(),
                }),
            },
            _ => Input {
                param,
                values,
                draws: None,
            },
        }
    }

    /// One bound-satisfying argument per parameter; `Err` names the first
    /// parameter without one
    fn default_args(&self, unit: &FnDef) -> std::result::Result<Vec<SynthValue>, String> {
        let constraints = analyze_constraints(&unit.params, &unit.requires);
        let synth = self.synth();
        unit.params
            .iter()
            .zip(&constraints)
            .map(|(param, c)| {
                synth
                    .default_value(&param.ty, c)
                    .ok_or_else(|| format!("parameter `{}` has no default value", param.name))
            })
            .collect()
    }

    /// Value lists, the case loop and per-case bindings. Returns the
    /// statement that skips a rejected case.
    fn open_cases(&self, module: &str, inputs: &[Input<'_>], buf: &mut CodeBuffer) -> Result<&'static str> {
        if inputs.is_empty() {
            return Ok("return;");
        }
        for input in inputs {
            let name = &input.param.name;
            let values: Vec<String> = input.values.iter().map(ToString::to_string).collect();
            let kw = if input.draws.is_some() { "let mut" } else { "let" };
            buf.line(format!(
                "{kw} {name}_values: Vec<{}> = vec![{}];",
                self.symbols.rust_type(module, &input.param.ty),
                values.join(", ")
            ))?;
            if let Some(draws) = &input.draws {
                self.emit_draws(name, draws, buf)?;
            }
        }
        let lens: Vec<String> = inputs
            .iter()
            .map(|i| format!("{}_values.len()", i.param.name))
            .collect();
        buf.line(format!("let __cases = {};", lens.join(".max(") + &")".repeat(lens.len() - 1)))?;
        Ok("continue;")
    }

    fn emit_draws(&self, name: &str, draws: &Draws, buf: &mut CodeBuffer) -> Result<()> {
        buf.line(format!("let mut __state: u64 = {:#X};", draws.seed))?;
        buf.open(format!("for _ in 0..{} {{", draws.count))?;
        buf.line(format!(
            "let __draw = __draw_range(&mut __state, {}, {});",
            SynthValue::Int(draws.lo),
            SynthValue::Int(draws.hi)
        ))?;
        if draws.excluded.is_empty() {
            buf.line(format!("{name}_values.push(__draw);"))?;
        } else {
            let keep: Vec<String> = draws
                .excluded
                .iter()
                .map(|v| format!("__draw != {}", SynthValue::Int(*v)))
                .collect();
            buf.open(format!("if {} {{", keep.join(" && ")))?;
            buf.line(format!("{name}_values.push(__draw);"))?;
            buf.close("}")?;
        }
        buf.close("}")
    }

    fn open_loop(&self, inputs: &[Input<'_>], buf: &mut CodeBuffer) -> Result<()> {
        if inputs.is_empty() {
            return Ok(());
        }
        buf.open("for __i in 0..__cases {")?;
        for input in inputs {
            let name = &input.param.name;
            let clone = if input.param.ty.is_copy() { "" } else { ".clone()" };
            buf.line(format!("let {name} = {name}_values[__i % {name}_values.len()]{clone};"))?;
        }
        Ok(())
    }

    fn close_loop(&self, inputs: &[Input<'_>], buf: &mut CodeBuffer) -> Result<()> {
        if inputs.is_empty() {
            return Ok(());
        }
        buf.close("}")
    }

    fn emit_filters(
        &self,
        requires: &[ContractClause],
        ctx: &LowerCtx<'_, '_>,
        skip: &str,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        for clause in requires {
            let cond = lower_condition(&clause.expr, ctx).map_err(|e| e.at(clause.span))?;
            buf.open(format!("if !({cond}) {{"))?;
            buf.line(skip)?;
            buf.close("}")?;
        }
        Ok(())
    }

    fn emit_asserts(
        &self,
        clauses: &[ContractClause],
        what: &str,
        ctx: &LowerCtx<'_, '_>,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        for clause in clauses {
            let cond = lower_condition(&clause.expr, ctx).map_err(|e| e.at(clause.span))?;
            buf.line(assert_line(&cond, &format!("{what}: {}", clause_text(clause))))?;
        }
        Ok(())
    }

    /// Arguments for a call with the case bindings in scope
    fn call_args(&self, params: &[Param], by_ref: bool) -> String {
        params
            .iter()
            .map(|p| {
                if by_ref && p.ty.is_seq() {
                    format!("&{}", p.name)
                } else if p.ty.is_copy() {
                    p.name.clone()
                } else {
                    format!("{}.clone()", p.name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn function_test(&self, module: &Module, func: &FnDef, buf: &mut CodeBuffer) -> Result<()> {
        let name = self.symbols.fn_name(&module.name, &func.name);
        let test = format!("contract_{name}");
        let Some(inputs) = self.inputs(func, &test, buf)? else {
            return Ok(());
        };
        debug!(module = %module.name, test = %test, "generating test");

        let olds = OldCaptures::collect(&func.ensures);
        let pre_ctx = LowerCtx::new(self.symbols, &module.name).with_receiver(INSTANCE);
        let post_ctx = if func.ret_ty.is_unit() {
            pre_ctx.with_olds(&olds)
        } else {
            pre_ctx.with_olds(&olds).with_result(RESULT)
        };

        buf.line("#[test]")?;
        buf.open(format!("fn {test}() {{"))?;
        let skip = self.open_cases(&module.name, &inputs, buf)?;
        self.open_loop(&inputs, buf)?;
        self.emit_filters(&func.requires, &pre_ctx, skip, buf)?;
        buf.lines(olds.snapshot_stmts(&pre_ctx)?)?;

        let by_ref = !self.symbols.is_primary(&module.name);
        let call = format!("{name}({})", self.call_args(&func.params, by_ref));
        if func.ret_ty.is_unit() {
            buf.line(format!("{call};"))?;
        } else if func.ensures.is_empty() {
            buf.line(format!("let _ = {call};"))?;
        } else {
            buf.line(format!("let {RESULT} = {call};"))?;
        }
        self.emit_asserts(&func.ensures, "postcondition violated", &post_ctx, buf)?;

        self.close_loop(&inputs, buf)?;
        buf.close("}")
    }

    fn entity_tests(&self, module: &Module, entity: &EntityDef, buf: &mut CodeBuffer) -> Result<()> {
        let type_name = self.symbols.type_name(&module.name, &entity.name);
        let stem = to_snake_case(&type_name);

        if let Some(ctor) = &entity.constructor {
            buf.blank()?;
            self.constructor_test(module, entity, ctor, &type_name, &stem, buf)?;
        }

        let base = match &entity.constructor {
            Some(ctor) => self.default_args(ctor).map(|args| {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                format!("{type_name}::new({})", args.join(", "))
            }),
            None => Ok(format!("{type_name}::default()")),
        };

        for method in &entity.methods {
            if !method.has_contracts() && entity.invariants.is_empty() {
                continue;
            }
            buf.blank()?;
            let test = format!("contract_{stem}_{}", method.name);
            match &base {
                Ok(base) => self.method_test(module, entity, method, &test, base, buf)?,
                Err(reason) => {
                    debug!(test = %test, reason = %reason, "skipping generated test");
                    buf.line(format!("// skipped: {test}: constructor {reason}"))?;
                }
            }
        }

        if entity.constructor.is_some() && !entity.methods.is_empty() {
            buf.blank()?;
            let test = format!("contract_{stem}_workflow");
            match &base {
                Ok(base) => self.workflow_test(module, entity, &test, base, buf)?,
                Err(reason) => {
                    debug!(test = %test, reason = %reason, "skipping generated test");
                    buf.line(format!("// skipped: {test}: constructor {reason}"))?;
                }
            }
        }
        Ok(())
    }

    fn constructor_test(
        &self,
        module: &Module,
        entity: &EntityDef,
        ctor: &FnDef,
        type_name: &str,
        stem: &str,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        let test = format!("contract_{stem}_new");
        let Some(inputs) = self.inputs(ctor, &test, buf)? else {
            return Ok(());
        };
        debug!(module = %module.name, test = %test, "generating test");

        // old() in a constructor postcondition observes the declared defaults
        let olds = OldCaptures::collect(ctor.ensures.iter().chain(&entity.invariants));
        let base_ctx = LowerCtx::new(self.symbols, &module.name);
        let defaults_ctx = base_ctx.with_receiver("__defaults");
        let post_ctx = base_ctx
            .with_receiver(INSTANCE)
            .with_olds(&olds)
            .with_result(INSTANCE);

        buf.line("#[test]")?;
        buf.open(format!("fn {test}() {{"))?;
        let skip = self.open_cases(&module.name, &inputs, buf)?;
        self.open_loop(&inputs, buf)?;
        self.emit_filters(&ctor.requires, &base_ctx.with_receiver(INSTANCE), skip, buf)?;
        if !olds.is_empty() {
            buf.line(format!("let __defaults = {type_name}::default();"))?;
            buf.lines(olds.snapshot_stmts(&defaults_ctx)?)?;
        }
        buf.line(format!(
            "let {INSTANCE} = {type_name}::new({});",
            self.call_args(&ctor.params, false)
        ))?;
        self.emit_asserts(&ctor.ensures, "postcondition violated", &post_ctx, buf)?;
        self.emit_asserts(&entity.invariants, "invariant violated", &post_ctx, buf)?;
        self.close_loop(&inputs, buf)?;
        buf.close("}")
    }

    fn method_test(
        &self,
        module: &Module,
        entity: &EntityDef,
        method: &FnDef,
        test: &str,
        base: &str,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        let Some(inputs) = self.inputs(method, test, buf)? else {
            return Ok(());
        };
        debug!(module = %module.name, test, "generating test");

        let olds = OldCaptures::collect(method.ensures.iter().chain(&entity.invariants));
        let pre_ctx = LowerCtx::new(self.symbols, &module.name).with_receiver(INSTANCE);
        let post_ctx = if method.ret_ty.is_unit() {
            pre_ctx.with_olds(&olds)
        } else {
            pre_ctx.with_olds(&olds).with_result(RESULT)
        };

        buf.line("#[test]")?;
        buf.open(format!("fn {test}() {{"))?;
        let skip = self.open_cases(&module.name, &inputs, buf)?;
        buf.line(format!("let mut {INSTANCE} = {base};"))?;
        self.open_loop(&inputs, buf)?;
        self.emit_filters(&method.requires, &pre_ctx, skip, buf)?;
        buf.lines(olds.snapshot_stmts(&pre_ctx)?)?;

        let call = format!("{INSTANCE}.{}({})", method.name, self.call_args(&method.params, false));
        if method.ret_ty.is_unit() {
            buf.line(format!("{call};"))?;
        } else if method.ensures.is_empty() {
            buf.line(format!("let _ = {call};"))?;
        } else {
            buf.line(format!("let {RESULT} = {call};"))?;
        }
        self.emit_asserts(&method.ensures, "postcondition violated", &post_ctx, buf)?;
        self.emit_asserts(&entity.invariants, "invariant violated", &post_ctx, buf)?;
        if !inputs.is_empty() {
            buf.line(format!("{INSTANCE} = {base};"))?;
        }
        self.close_loop(&inputs, buf)?;
        buf.close("}")
    }

    fn workflow_test(
        &self,
        module: &Module,
        entity: &EntityDef,
        test: &str,
        base: &str,
        buf: &mut CodeBuffer,
    ) -> Result<()> {
        debug!(module = %module.name, test, "generating test");
        let ctx = LowerCtx::new(self.symbols, &module.name).with_receiver(INSTANCE);

        buf.line("#[test]")?;
        buf.open(format!("fn {test}() {{"))?;
        buf.line(format!("let mut {INSTANCE} = {base};"))?;
        self.emit_asserts(&entity.invariants, "invariant violated after construction", &ctx, buf)?;

        for method in &entity.methods {
            let args = match self.default_args(method) {
                Ok(args) => args,
                Err(reason) => {
                    buf.line(format!("// skipped call: {}: {reason}", method.name))?;
                    continue;
                }
            };
            buf.open("{")?;
            for (param, value) in method.params.iter().zip(&args) {
                buf.line(format!(
                    "let {}: {} = {value};",
                    param.name,
                    self.symbols.rust_type(&module.name, &param.ty)
                ))?;
            }

            let guard = method
                .requires
                .iter()
                .map(|c| lower_condition(&c.expr, &ctx).map_err(|e| e.at(c.span)))
                .collect::<Result<Vec<_>>>()?;
            if !guard.is_empty() {
                let guard = if guard.len() == 1 {
                    guard.join("")
                } else {
                    guard.iter().map(|g| format!("({g})")).collect::<Vec<_>>().join(" && ")
                };
                buf.open(format!("if {guard} {{"))?;
            }

            let call = format!("{INSTANCE}.{}({})", method.name, self.call_args(&method.params, false));
            if method.ret_ty.is_unit() {
                buf.line(format!("{call};"))?;
            } else {
                buf.line(format!("let _ = {call};"))?;
            }
            let what = format!("invariant violated after `{}`", method.name);
            self.emit_asserts(&entity.invariants, &what, &ctx, buf)?;

            if !method.requires.is_empty() {
                buf.close("}")?;
            }
            buf.close("}")?;
        }
        buf.close("}")
    }
}
