//! Module linker: merges per-module ASTs into a single flat module the
//! code generator can walk, and validates the program entry point.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::LinkError;
use crate::resolver::{ModulePath, ProgramInfo};

fn type_ref_name(type_ref: &TypeRef) -> String { type_ref.display_name() }

/// Validates that `main` exists with the exact signature `fn main() -> i64`.
pub fn require_main_function(module_ast: &ModuleAst) -> Result<(), LinkError> {
  let main_decl = module_ast.functions.iter().find(|f| f.name == "main")
    .ok_or_else(|| LinkError::new("Program entrypoint missing: expected 'fn main() -> i64'"))?;

  if main_decl.is_extern || main_decl.body.is_none() {
    return Err(LinkError::new("Invalid main signature: expected concrete definition 'fn main() -> i64'"));
  }
  if !main_decl.params.is_empty() {
    return Err(LinkError::new("Invalid main signature: expected 'fn main() -> i64' (no parameters)"));
  }
  if type_ref_name(&main_decl.return_type) != "i64" {
    return Err(LinkError::new("Invalid main signature: expected return type 'i64'"));
  }
  Ok(())
}

/// Merges every module's classes and functions into one `ModuleAst`, in
/// sorted module-path order with the entry module last so its definitions
/// win ties against `extern` declarations seen earlier.
pub fn build_codegen_module(program: &ProgramInfo) -> Result<ModuleAst, LinkError> {
  let entry_module = &program.modules[&program.entry_module];

  let mut ordered_module_paths: Vec<&ModulePath> = program.modules.keys()
    .filter(|p| **p != program.entry_module).collect();
  ordered_module_paths.sort();
  ordered_module_paths.push(&program.entry_module);

  let mut merged_functions: Vec<FunctionDecl> = Vec::new();
  let mut merged_classes: Vec<ClassDecl> = Vec::new();
  let mut function_index_by_name: HashMap<String, usize> = HashMap::new();
  let mut function_has_body: HashMap<String, bool> = HashMap::new();
  let mut function_owner_by_name: HashMap<String, ModulePath> = HashMap::new();
  let mut class_owner_by_name: HashMap<String, ModulePath> = HashMap::new();

  for module_path in ordered_module_paths {
    let module_info = &program.modules[module_path];

    for class_decl in &module_info.ast.classes {
      if let Some(existing_owner) = class_owner_by_name.get(&class_decl.name) {
        return Err(LinkError::new(format!(
          "Duplicate class symbol '{}' across modules ({}, {})",
          class_decl.name, existing_owner.join("."), module_path.join(".")
        )));
      }
      class_owner_by_name.insert(class_decl.name.clone(), module_path.clone());
      merged_classes.push(class_decl.clone());
    }

    for fn_decl in &module_info.ast.functions {
      let has_body = fn_decl.body.is_some();

      match function_index_by_name.get(&fn_decl.name) {
        None => {
          function_index_by_name.insert(fn_decl.name.clone(), merged_functions.len());
          function_has_body.insert(fn_decl.name.clone(), has_body);
          function_owner_by_name.insert(fn_decl.name.clone(), module_path.clone());
          merged_functions.push(fn_decl.clone());
        }
        Some(&existing_index) => {
          let already_has_body = function_has_body[&fn_decl.name];
          if already_has_body && has_body {
            return Err(LinkError::new(format!(
              "Duplicate function symbol '{}' across modules ({}, {})",
              fn_decl.name, function_owner_by_name[&fn_decl.name].join("."), module_path.join(".")
            )));
          }
          if !already_has_body && has_body {
            merged_functions[existing_index] = fn_decl.clone();
            function_has_body.insert(fn_decl.name.clone(), true);
            function_owner_by_name.insert(fn_decl.name.clone(), module_path.clone());
          }
        }
      }
    }
  }

  Ok(ModuleAst {
    imports: entry_module.ast.imports.clone(),
    classes: merged_classes,
    functions: merged_functions,
    span: entry_module.ast.span.clone(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;
  use crate::parser::parse;
  use crate::resolver::ModuleInfo;
  use std::collections::HashMap as Map;

  fn program_from(modules: Vec<(&str, &str)>, entry: &str) -> ProgramInfo {
    let mut map = Map::new();
    for (name, src) in modules {
      let ast = parse(lex(src, name).unwrap()).unwrap();
      let path = vec![name.to_string()];
      map.insert(path.clone(), ModuleInfo {
        module_path: path,
        file_path: name.into(),
        ast,
        symbols: Map::new(),
        exported_symbols: Map::new(),
        imports: Map::new(),
        exported_modules: Map::new(),
      });
    }
    ProgramInfo { entry_module: vec![entry.to_string()], modules: map }
  }

  #[test]
  fn valid_main_passes() {
    let ast = parse(lex("fn main() -> i64 { return 0; }", "<t>").unwrap()).unwrap();
    require_main_function(&ast).unwrap();
  }

  #[test]
  fn missing_main_is_error() {
    let ast = parse(lex("fn other() -> i64 { return 0; }", "<t>").unwrap()).unwrap();
    let err = require_main_function(&ast).unwrap_err();
    assert_eq!(err.0, "Program entrypoint missing: expected 'fn main() -> i64'");
  }

  #[test]
  fn main_with_params_is_error() {
    let ast = parse(lex("fn main(x: i64) -> i64 { return 0; }", "<t>").unwrap()).unwrap();
    let err = require_main_function(&ast).unwrap_err();
    assert!(err.0.contains("no parameters"));
  }

  #[test]
  fn extern_replaced_by_definition() {
    let program = program_from(
      vec![
        ("a", "export extern fn helper() -> i64;"),
        ("main", "import a;\nexport fn helper() -> i64 { return 1; } fn main() -> i64 { return 0; }"),
      ],
      "main",
    );
    let merged = build_codegen_module(&program).unwrap();
    let helpers: Vec<&FunctionDecl> = merged.functions.iter().filter(|f| f.name == "helper").collect();
    assert_eq!(helpers.len(), 1);
    assert!(helpers[0].body.is_some());
  }

  #[test]
  fn duplicate_function_definitions_is_error() {
    let program = program_from(
      vec![
        ("a", "export fn helper() -> i64 { return 1; }"),
        ("main", "import a;\nfn helper() -> i64 { return 2; } fn main() -> i64 { return 0; }"),
      ],
      "main",
    );
    let err = build_codegen_module(&program).unwrap_err();
    assert!(err.0.contains("Duplicate function symbol 'helper'"));
  }
}
