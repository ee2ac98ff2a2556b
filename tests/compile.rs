//! End-to-end tests driving the full pipeline through `nifc_core::compile`
//! against real files on disk, the way a user invokes the CLI.

use std::fs;
use std::path::Path;

use nifc_core::options::{CompileOptions, StopAfter};
use nifc_core::compile;

fn write_file(dir: &Path, name: &str, contents: &str) {
  fs::write(dir.join(name), contents).unwrap();
}

fn asm_for(dir: &Path, entry: &str) -> String {
  let options = CompileOptions { input: dir.join(entry), ..Default::default() };
  compile(&options).unwrap().asm.expect("expected asm output")
}

#[test]
fn simple_program_compiles_to_asm() {
  let dir = tempfile::tempdir().unwrap();
  write_file(dir.path(), "main.nif", "fn main() -> i64 { return 0; }");
  let asm = asm_for(dir.path(), "main.nif");
  assert!(asm.contains(".intel_syntax noprefix"));
  assert!(asm.contains(".globl main"));
  assert!(asm.contains(".extern rt_thread_state"));
}

#[test]
fn unused_function_is_pruned_from_output() {
  let dir = tempfile::tempdir().unwrap();
  write_file(
    dir.path(),
    "main.nif",
    "fn unused() -> i64 { return 1; }\nfn main() -> i64 { return 0; }",
  );
  let asm = asm_for(dir.path(), "main.nif");
  assert!(asm.contains("main:"));
  assert!(!asm.contains("unused:"));
}

#[test]
fn multi_module_program_merges_and_compiles() {
  let dir = tempfile::tempdir().unwrap();
  write_file(dir.path(), "util.nif", "export fn double(x: i64) -> i64 { return x + x; }");
  write_file(
    dir.path(),
    "main.nif",
    "import util;\nfn main() -> i64 { return util.double(21); }",
  );
  let asm = asm_for(dir.path(), "main.nif");
  assert!(asm.contains("double:"));
  assert!(asm.contains("call double"));
  assert!(asm.contains("main:"));
}

#[test]
fn class_constructor_and_field_access_compiles() {
  let dir = tempfile::tempdir().unwrap();
  write_file(
    dir.path(),
    "main.nif",
    "class Box { value: i64; }\nfn main() -> i64 { var b: Box = Box(5); return b.value; }",
  );
  let asm = asm_for(dir.path(), "main.nif");
  assert!(asm.contains("__nif_ctor_Box"));
  assert!(asm.contains("__nif_type_Box"));
}

#[test]
fn missing_main_is_reported_with_nifc_message() {
  let dir = tempfile::tempdir().unwrap();
  write_file(dir.path(), "main.nif", "fn helper() -> i64 { return 0; }");
  let options = CompileOptions { input: dir.path().join("main.nif"), ..Default::default() };
  let err = compile(&options).unwrap_err();
  assert!(err.message().contains("Program entrypoint missing"));
}

#[test]
fn type_error_is_reported() {
  let dir = tempfile::tempdir().unwrap();
  write_file(
    dir.path(),
    "main.nif",
    "fn main() -> i64 { var x: i64 = true; return 0; }",
  );
  let options = CompileOptions { input: dir.path().join("main.nif"), ..Default::default() };
  let err = compile(&options).unwrap_err();
  assert!(!err.message().is_empty());
}

#[test]
fn stop_after_check_skips_codegen() {
  let dir = tempfile::tempdir().unwrap();
  write_file(dir.path(), "main.nif", "fn main() -> i64 { return 0; }");
  let options = CompileOptions {
    input: dir.path().join("main.nif"),
    stop_after: StopAfter::Check,
    ..Default::default()
  };
  let artifacts = compile(&options).unwrap();
  assert!(artifacts.asm.is_none());
}

#[test]
fn skip_check_lets_type_errors_through_to_codegen() {
  let dir = tempfile::tempdir().unwrap();
  write_file(
    dir.path(),
    "main.nif",
    "fn main() -> i64 { var x: i64 = true; return 0; }",
  );
  let options = CompileOptions {
    input: dir.path().join("main.nif"),
    skip_check: true,
    ..Default::default()
  };
  // Codegen has no type validation of its own, so with the whole-program
  // checker skipped this bad assignment compiles clean instead of erroring.
  let artifacts = compile(&options).unwrap();
  assert!(artifacts.asm.is_some());
}

#[test]
fn break_outside_loop_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  write_file(dir.path(), "main.nif", "fn main() -> i64 { break; return 0; }");
  let options = CompileOptions { input: dir.path().join("main.nif"), ..Default::default() };
  let err = compile(&options).unwrap_err();
  assert!(err.message().to_lowercase().contains("break"));
}

#[test]
fn duplicate_function_symbol_across_modules_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  write_file(dir.path(), "a.nif", "export fn shared() -> i64 { return 1; }");
  write_file(
    dir.path(),
    "main.nif",
    "import a;\nfn shared() -> i64 { return 2; }\nfn main() -> i64 { return a.shared(); }",
  );
  let options = CompileOptions { input: dir.path().join("main.nif"), ..Default::default() };
  let err = compile(&options).unwrap_err();
  assert!(err.message().contains("Duplicate function symbol"));
}
