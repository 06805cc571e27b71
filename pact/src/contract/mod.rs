//! Contract Compilation
//!
//! Emits Rust source for a checked program: type declarations, then every
//! contract-bearing unit with its preconditions, postconditions, invariants
//! and loop checks turned into runtime assertions.
//!
//! Modules are emitted in input order. Declarations of non-primary modules
//! are mangled (`<module>_<fn>`, `<Module><Type>`) so all modules can share
//! one output file.

mod buffer;
mod stmt;
mod unit;

pub use buffer::CodeBuffer;
pub use unit::{CONTRACT_LABEL, CTOR_SELF, RESULT_VAR, UnitCompiler, UnitKind};

use tracing::debug;

use crate::ast::{ContractClause, DocBlock, EntityDef, EnumDef, Module, Program};
use crate::error::Result;
use crate::symbols::SymbolTable;
use crate::util::format_str_literal;

/// Source-level compiler over a read-only symbol table
pub struct ContractCompiler<'a, 'p> {
    symbols: &'a SymbolTable<'p>,
}

impl<'a, 'p> ContractCompiler<'a, 'p> {
    pub fn new(symbols: &'a SymbolTable<'p>) -> Self {
        Self { symbols }
    }

    /// Compile every module, in input order
    pub fn compile_program(&self, program: &Program) -> Result<String> {
        let mut out = String::new();
        for module in &program.modules {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.compile_module(module)?);
        }
        Ok(out)
    }

    pub fn compile_module(&self, module: &Module) -> Result<String> {
        debug!(
            module = %module.name,
            primary = module.primary,
            functions = module.functions.len(),
            entities = module.entities.len(),
            "compiling module"
        );
        let mut buf = CodeBuffer::new();
        let role = if module.primary { "primary" } else { "imported" };
        buf.line(format!("// ===== module `{}` ({role}) =====", module.name))?;

        for enum_def in &module.enums {
            buf.blank()?;
            self.emit_enum(&module.name, enum_def, &mut buf)?;
        }
        for entity in &module.entities {
            buf.blank()?;
            self.emit_entity(&module.name, entity, &mut buf)?;
        }
        for func in &module.functions {
            buf.blank()?;
            emit_docs(&func.docs, &mut buf)?;
            UnitCompiler::new(self.symbols, &module.name, func, UnitKind::Function).emit(&mut buf)?;
        }
        Ok(buf.finish())
    }

    fn emit_enum(&self, module: &str, enum_def: &EnumDef, buf: &mut CodeBuffer) -> Result<()> {
        let name = self.symbols.type_name(module, &enum_def.name);
        emit_docs(&enum_def.docs, buf)?;
        buf.line("#[derive(Debug, Clone, PartialEq)]")?;
        buf.open(format!("pub enum {name} {{"))?;
        for variant in &enum_def.variants {
            if variant.fields.is_empty() {
                buf.line(format!("{},", variant.name))?;
            } else {
                let fields: Vec<String> = variant
                    .fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, self.symbols.rust_type(module, &f.ty)))
                    .collect();
                buf.line(format!("{} {{ {} }},", variant.name, fields.join(", ")))?;
            }
        }
        buf.close("}")?;

        let Some(first) = enum_def.variants.first() else {
            return Ok(());
        };
        let value = if first.fields.is_empty() {
            format!("{name}::{}", first.name)
        } else {
            let fields: Vec<String> = first
                .fields
                .iter()
                .map(|f| format!("{}: {}", f.name, self.symbols.default_value(module, &f.ty)))
                .collect();
            format!("{name}::{} {{ {} }}", first.name, fields.join(", "))
        };
        buf.blank()?;
        buf.open(format!("impl Default for {name} {{"))?;
        buf.open("fn default() -> Self {")?;
        buf.line(value)?;
        buf.close("}")?;
        buf.close("}")
    }

    fn emit_entity(&self, module: &str, entity: &EntityDef, buf: &mut CodeBuffer) -> Result<()> {
        let name = self.symbols.type_name(module, &entity.name);
        emit_docs(&entity.docs, buf)?;
        for inv in &entity.invariants {
            buf.line(format!("/// Invariant: {}", clause_text(inv)))?;
        }
        buf.line("#[derive(Debug, Clone, PartialEq, Default)]")?;
        if entity.fields.is_empty() {
            buf.line(format!("pub struct {name} {{}}"))?;
        } else {
            buf.open(format!("pub struct {name} {{"))?;
            for field in &entity.fields {
                buf.line(format!(
                    "pub {}: {},",
                    field.name,
                    self.symbols.rust_type(module, &field.ty)
                ))?;
            }
            buf.close("}")?;
        }

        if entity.constructor.is_none() && entity.methods.is_empty() {
            return Ok(());
        }
        buf.blank()?;
        buf.open(format!("impl {name} {{"))?;
        let mut first = true;
        if let Some(ctor) = &entity.constructor {
            emit_docs(&ctor.docs, buf)?;
            UnitCompiler::new(self.symbols, module, ctor, UnitKind::Constructor(entity)).emit(buf)?;
            first = false;
        }
        for method in &entity.methods {
            if !first {
                buf.blank()?;
            }
            first = false;
            emit_docs(&method.docs, buf)?;
            UnitCompiler::new(self.symbols, module, method, UnitKind::Method(entity)).emit(buf)?;
        }
        buf.close("}")
    }
}

/// `///` lines for documentation and intent blocks
fn emit_docs(docs: &[DocBlock], buf: &mut CodeBuffer) -> Result<()> {
    for doc in docs {
        let (prefix, text) = match doc {
            DocBlock::Doc(text) => ("", text),
            DocBlock::Intent(text) => ("Intent: ", text),
        };
        for (i, line) in text.lines().enumerate() {
            let lead = if i == 0 { prefix } else { "" };
            let line = line.trim_end();
            if line.is_empty() && lead.is_empty() {
                buf.line("///")?;
            } else {
                buf.line(format!("/// {lead}{line}"))?;
            }
        }
    }
    Ok(())
}

/// Source text of a clause, falling back to its rendering
pub fn clause_text(clause: &ContractClause) -> String {
    let source = clause.source.trim();
    if source.is_empty() {
        clause.expr.to_string()
    } else {
        source.to_string()
    }
}

/// `assert!(cond, "message");`
pub fn assert_line(cond: &str, message: &str) -> String {
    format!("assert!({cond}, {});", format_str_literal(message))
}
