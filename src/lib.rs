//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge, resolves names through lexical
//!   scopes and returns the program's globals and functions.
//! - `typecheck` annotates expressions with their types; the parser drives it.
//! - `codegen` lays out stack frames and lowers the program into x86-64
//!   Intel-syntax assembly.
//! - `error` centralises reporting utilities shared by the other modules.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod tokenizer;
pub mod ty;
pub mod typecheck;

pub use error::{CompileError, CompileResult, SourceFile};

/// Compile a source string into assembly. `filename` only appears in
/// diagnostics.
pub fn generate_assembly(filename: &str, source: &str) -> CompileResult<String> {
  let file = SourceFile::new(filename, source);
  let tokens = tokenizer::tokenize(file)?;
  let mut program = parser::parse(tokens, file)?;
  Ok(codegen::generate(&mut program))
}
