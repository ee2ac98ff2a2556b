//! Compiler configuration shared by the CLI and any embedder of the
//! library (tests drive this directly without going through `clap`).

use std::path::PathBuf;

/// Which phase to stop after, for tooling that only wants partial output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAfter {
  Lex,
  Parse,
  Check,
  Codegen,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
  pub input: PathBuf,
  pub output: Option<PathBuf>,
  pub project_root: Option<PathBuf>,
  pub stop_after: StopAfter,
  pub skip_check: bool,
  pub print_tokens: bool,
  pub print_ast: bool,
  pub print_ast_spans: bool,
  pub print_asm: bool,
}

impl Default for CompileOptions {
  fn default() -> Self {
    Self {
      input: PathBuf::new(),
      output: None,
      project_root: None,
      stop_after: StopAfter::Codegen,
      skip_check: false,
      print_tokens: false,
      print_ast: false,
      print_ast_spans: false,
      print_asm: false,
    }
  }
}
