//! Crate root: wires together the compile-then-execute pipeline.
//!
//! - `lexer` turns source text into positioned tokens.
//! - `validate` checks grouping balance before translation starts.
//! - `parser` translates tokens into quadruples in one pass, driving the
//!   emitter in `codegen`.
//! - `ir` holds the program model and its text form.
//! - `vm` executes a finished program.

pub mod codegen;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod validate;
pub mod vm;

use std::io::Write;

pub use codegen::{CompileOptions, SymbolTable};
pub use error::{Error, Result, RuntimeFault};
pub use ir::{Op, Operand, Program, Quad};
pub use parser::Translation;
pub use vm::{Value, VmOptions, VM};

/// Translate source text into a program with default options.
pub fn compile(source: &str) -> Result<Translation> {
    compile_with(source, CompileOptions::default())
}

pub fn compile_with(source: &str, options: CompileOptions) -> Result<Translation> {
    let tokens = lexer::Lexer::new(source).lex()?;
    validate::validate_braces(&tokens)?;
    parser::Parser::new(tokens, options).translate()
}

/// Execute a finished program, writing `print` output to `out`.
pub fn execute<W: Write>(program: &Program, out: W, options: VmOptions) -> Result<()> {
    VM::new(out, options).run(program)
}

/// Compile and execute in one go. Nothing runs unless translation succeeds.
pub fn run<W: Write>(source: &str, out: W) -> Result<()> {
    let translation = compile(source)?;
    execute(&translation.program, out, VmOptions::default())
}
