//! Stage-0 compiler for a small statically-typed object language, lowering
//! whole multi-module programs to x86-64 assembly for a SysV-ABI host
//! linking against an external C runtime.
//!
//! The pipeline is a straight line: [`lexer`] -> [`parser`] -> [`resolver`]
//! -> [`typecheck`] -> [`reachability`] -> [`linker`] -> [`codegen`].
//! [`options::CompileOptions`] drives how far [`compile`] carries a program
//! through that pipeline and what it prints along the way.

pub mod ast;
pub mod ast_dump;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod linker;
pub mod options;
pub mod parser;
pub mod reachability;
pub mod resolver;
pub mod span;
pub mod tokens;
pub mod typecheck;

use std::fs;

use error::NifcError;
use options::{CompileOptions, StopAfter};

/// Artifacts produced by [`compile`], populated as far as the pipeline got.
/// `tokens`/`ast` are filled in as soon as lexing/parsing finishes and stay
/// set no matter how much further `--stop-after` lets the pipeline run, so
/// `--print-tokens`/`--print-ast` work independently of where compilation
/// actually stops.
#[derive(Default)]
pub struct CompileArtifacts {
  pub tokens: Option<Vec<tokens::TokenKind>>,
  pub ast: Option<ast::ModuleAst>,
  pub asm: Option<String>,
}

/// Runs the pipeline according to `options`, stopping early at
/// `options.stop_after` but always returning every artifact produced up to
/// that point.
pub fn compile(options: &CompileOptions) -> Result<CompileArtifacts, NifcError> {
  let mut artifacts = CompileArtifacts::default();

  let source = fs::read_to_string(&options.input)
    .map_err(|e| NifcError::Io(format!("Failed to read '{}': {e}", options.input.display())))?;
  let path_str = options.input.to_string_lossy().into_owned();

  let tokens = lexer::lex(&source, &path_str)?;
  artifacts.tokens = Some(tokens.iter().map(|t| t.kind).collect());
  if options.stop_after == StopAfter::Lex {
    return Ok(artifacts);
  }

  let program = resolver::resolve_program(&options.input, options.project_root.as_deref())?;
  artifacts.ast = Some(program.modules[&program.entry_module].ast.clone());
  if options.stop_after == StopAfter::Parse {
    return Ok(artifacts);
  }

  if !options.skip_check {
    typecheck::typecheck_program(&program)?;
  }
  if options.stop_after == StopAfter::Check {
    return Ok(artifacts);
  }

  let pruned = reachability::prune_unreachable(program);
  let merged = linker::build_codegen_module(&pruned)?;
  linker::require_main_function(&merged)?;

  artifacts.asm = Some(codegen::emit_asm(&merged));
  Ok(artifacts)
}
