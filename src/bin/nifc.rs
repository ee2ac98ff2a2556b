//! Command-line entry point. Wraps `nifc_core::compile` with argument
//! parsing, logging setup and the `nifc: <message>` error convention.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use nifc_core::options::{CompileOptions, StopAfter};
use nifc_core::{ast_dump, compile, CompileArtifacts};

#[derive(Parser, Debug)]
#[command(name = "nifc", about = "Stage-0 compiler: lowers a module graph to x86-64 assembly")]
struct Cli {
  /// Entry module source file.
  input: PathBuf,

  /// Where to write the generated assembly (defaults to stdout).
  #[arg(short = 'o', long)]
  output: Option<PathBuf>,

  /// Project root used to resolve `import` statements (defaults to the
  /// entry file's directory).
  #[arg(long)]
  project_root: Option<PathBuf>,

  /// Stop the pipeline after the named phase.
  #[arg(long, value_enum)]
  stop_after: Option<StopAfterArg>,

  /// Skip the whole-program type checker.
  #[arg(long)]
  skip_check: bool,

  #[arg(long)]
  print_tokens: bool,
  #[arg(long)]
  print_ast: bool,
  #[arg(long)]
  print_ast_spans: bool,
  #[arg(long)]
  print_asm: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StopAfterArg { Lex, Parse, Check, Codegen }

impl From<StopAfterArg> for StopAfter {
  fn from(v: StopAfterArg) -> Self {
    match v {
      StopAfterArg::Lex => StopAfter::Lex,
      StopAfterArg::Parse => StopAfter::Parse,
      StopAfterArg::Check => StopAfter::Check,
      StopAfterArg::Codegen => StopAfter::Codegen,
    }
  }
}

fn main() -> ExitCode {
  env_logger::init();
  let cli = Cli::parse();

  let options = CompileOptions {
    input: cli.input,
    output: cli.output.clone(),
    project_root: cli.project_root,
    stop_after: cli.stop_after.map(Into::into).unwrap_or(StopAfter::Codegen),
    skip_check: cli.skip_check,
    print_tokens: cli.print_tokens,
    print_ast: cli.print_ast,
    print_ast_spans: cli.print_ast_spans,
    print_asm: cli.print_asm,
  };

  match compile(&options) {
    Ok(output) => {
      report(&options, output);
      ExitCode::SUCCESS
    }
    Err(e) => {
      eprintln!("nifc: {}", e.message());
      ExitCode::FAILURE
    }
  }
}

fn report(options: &CompileOptions, artifacts: CompileArtifacts) {
  if options.print_tokens {
    if let Some(tokens) = &artifacts.tokens {
      for kind in tokens { println!("{kind:?}"); }
    }
  }
  if options.print_ast || options.print_ast_spans {
    if let Some(module) = &artifacts.ast {
      match ast_dump::dump_module(module, options.print_ast_spans) {
        Ok(json) => println!("{json}"),
        Err(e) => log::warn!("failed to dump AST: {e}"),
      }
    }
  }
  match &artifacts.asm {
    Some(asm) => {
      if options.print_asm { println!("{asm}"); }
      match &options.output {
        Some(path) => {
          if let Err(e) = std::fs::write(path, asm) {
            eprintln!("nifc: Failed to write '{}': {e}", path.display());
          }
        }
        None => {
          if !options.print_asm { print!("{asm}"); }
        }
      }
    }
    None => {
      if options.stop_after == StopAfter::Check {
        log::info!("type check passed");
      }
    }
  }
}
