//! Pact Contract Compiler Library
//!
//! Lowers a checked, contract-annotated program to Rust source with runtime
//! contract checks, and synthesizes deterministic property tests for every
//! contract-bearing unit.

pub mod ast;
pub mod config;
pub mod constraint;
pub mod contract;
pub mod error;
pub mod lower;
pub mod symbols;
pub mod synth;
pub mod testgen;
pub mod util;

pub use ast::{Program, Span};
pub use config::GenConfig;
pub use contract::ContractCompiler;
pub use error::{CompileError, Result};
pub use testgen::TestAssembler;

use symbols::SymbolTable;

/// Compile every module and append its generated test module
pub fn compile_with_tests(program: &Program, config: &GenConfig) -> Result<String> {
    let symbols = SymbolTable::build(program);
    let compiler = ContractCompiler::new(&symbols);
    let assembler = TestAssembler::new(&symbols, config);

    let mut out = String::new();
    for module in &program.modules {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&compiler.compile_module(module)?);
        out.push('\n');
        out.push_str(&assembler.assemble_module(module)?);
    }
    Ok(out)
}

/// `compile_with_tests` over a checked tree handed over as JSON
pub fn compile_json(json: &str, config: &GenConfig) -> Result<String> {
    compile_with_tests(&Program::from_json(json)?, config)
}
