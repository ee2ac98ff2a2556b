//! Module resolver: loads every reachable module from the filesystem and
//! builds per-module symbol/import tables, enforcing export visibility.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::*;
use crate::error::ResolveError;
use crate::lexer::lex;
use crate::parser::parse;
use crate::span::SourceSpan;

pub type ModulePath = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind { Class, Function }

#[derive(Debug, Clone)]
pub struct SymbolInfo {
  pub name: String,
  pub kind: SymbolKind,
  pub is_export: bool,
  pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct ImportInfo {
  pub alias: String,
  pub module_path: ModulePath,
  pub is_export: bool,
  pub span: SourceSpan,
}

#[derive(Debug)]
pub struct ModuleInfo {
  pub module_path: ModulePath,
  pub file_path: PathBuf,
  pub ast: ModuleAst,
  pub symbols: HashMap<String, SymbolInfo>,
  pub exported_symbols: HashMap<String, SymbolInfo>,
  pub imports: HashMap<String, ImportInfo>,
  pub exported_modules: HashMap<String, ModulePath>,
}

#[derive(Debug)]
pub struct ProgramInfo {
  pub entry_module: ModulePath,
  pub modules: HashMap<ModulePath, ModuleInfo>,
}

fn dotted(path: &[String]) -> String { path.join(".") }

fn file_path_to_module_path(file_path: &Path, root: &Path) -> Result<ModulePath, ResolveError> {
  let rel = file_path.strip_prefix(root).map_err(|_| {
    ResolveError::at_path("File is not inside the project root", file_path.to_path_buf())
  })?;
  if rel.extension().and_then(|e| e.to_str()) != Some("nif") {
    return Err(ResolveError::at_path("Expected .nif source file", file_path.to_path_buf()));
  }
  let parts: Vec<String> = rel
    .with_extension("")
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();
  if parts.is_empty() {
    return Err(ResolveError::at_path("Invalid module path", file_path.to_path_buf()));
  }
  Ok(parts)
}

fn module_path_to_file_path(module_path: &[String], root: &Path) -> PathBuf {
  let mut p = root.to_path_buf();
  for seg in module_path { p.push(seg); }
  p.set_extension("nif");
  p
}

fn build_symbol_tables(
  module_ast: &ModuleAst,
) -> Result<(HashMap<String, SymbolInfo>, HashMap<String, SymbolInfo>), ResolveError> {
  let mut symbols = HashMap::new();
  let mut exported = HashMap::new();

  let mut add = |name: String, kind: SymbolKind, is_export: bool, span: SourceSpan| -> Result<(), ResolveError> {
    if symbols.contains_key(&name) {
      return Err(ResolveError::spanned(format!("Duplicate declaration '{name}'"), span));
    }
    let info = SymbolInfo { name: name.clone(), kind, is_export, span };
    if is_export { exported.insert(name.clone(), info.clone()); }
    symbols.insert(name, info);
    Ok(())
  };

  for c in &module_ast.classes {
    add(c.name.clone(), SymbolKind::Class, c.is_export, c.span.clone())?;
  }
  for f in &module_ast.functions {
    add(f.name.clone(), SymbolKind::Function, f.is_export, f.span.clone())?;
  }
  Ok((symbols, exported))
}

fn build_import_tables(
  module_ast: &ModuleAst,
) -> Result<(HashMap<String, ImportInfo>, HashMap<String, ModulePath>), ResolveError> {
  let mut imports = HashMap::new();
  let mut exported_modules = HashMap::new();

  for import in &module_ast.imports {
    let module_path = import.module_path.clone();
    let alias = module_path.last().expect("parser guarantees >= 1 segment").clone();
    if imports.contains_key(&alias) {
      return Err(ResolveError::spanned(format!("Duplicate import alias '{alias}'"), import.span.clone()));
    }
    if import.is_export {
      exported_modules.insert(alias.clone(), module_path.clone());
    }
    imports.insert(alias.clone(), ImportInfo {
      alias, module_path, is_export: import.is_export, span: import.span.clone(),
    });
  }
  Ok((imports, exported_modules))
}

/// Resolve an entire program graph starting from `entry_file`. The project
/// root defaults to the entry file's parent directory.
pub fn resolve_program(entry_file: &Path, project_root: Option<&Path>) -> Result<ProgramInfo, ResolveError> {
  let entry_path = entry_file.canonicalize().map_err(|_| {
    ResolveError::at_path("Entry file does not exist", entry_file.to_path_buf())
  })?;
  let root_path = match project_root {
    Some(r) => r.canonicalize().map_err(|_| ResolveError::at_path("Project root does not exist", r.to_path_buf()))?,
    None => entry_path.parent().expect("canonical path has a parent").to_path_buf(),
  };

  let entry_module = file_path_to_module_path(&entry_path, &root_path)?;
  let mut modules: HashMap<ModulePath, ModuleInfo> = HashMap::new();
  let mut visiting: HashSet<ModulePath> = HashSet::new();

  load_module(&entry_module, &root_path, &mut modules, &mut visiting)?;

  for module_info in modules.values() {
    validate_module_visibility(module_info, &modules)?;
  }

  Ok(ProgramInfo { entry_module, modules })
}

fn load_module(
  module_path: &ModulePath,
  root: &Path,
  modules: &mut HashMap<ModulePath, ModuleInfo>,
  visiting: &mut HashSet<ModulePath>,
) -> Result<(), ResolveError> {
  if modules.contains_key(module_path) { return Ok(()); }

  if visiting.contains(module_path) {
    return Err(ResolveError::bare(format!("Import cycle detected at module '{}'", dotted(module_path))));
  }
  visiting.insert(module_path.clone());

  let file_path = module_path_to_file_path(module_path, root);
  if !file_path.exists() {
    return Err(ResolveError::at_path(format!("Module '{}' not found", dotted(module_path)), file_path));
  }

  let source_text = fs::read_to_string(&file_path)
    .map_err(|e| ResolveError::at_path(format!("Failed to read module: {e}"), file_path.clone()))?;
  let source_path_str = file_path.to_string_lossy().into_owned();
  let tokens = lex(&source_text, &source_path_str).map_err(|e| {
    ResolveError::spanned(e.message, e.span)
  })?;
  let module_ast = parse(tokens).map_err(|e| ResolveError::spanned(e.message, e.span))?;

  let (symbols, exported_symbols) = build_symbol_tables(&module_ast)?;
  let (imports, exported_modules) = build_import_tables(&module_ast)?;

  let import_targets: Vec<ModulePath> = imports.values().map(|i| i.module_path.clone()).collect();

  modules.insert(module_path.clone(), ModuleInfo {
    module_path: module_path.clone(),
    file_path,
    ast: module_ast,
    symbols,
    exported_symbols,
    imports,
    exported_modules,
  });

  for target in import_targets {
    load_module(&target, root, modules, visiting)?;
  }

  visiting.remove(module_path);
  Ok(())
}

fn validate_module_visibility(
  module_info: &ModuleInfo,
  modules: &HashMap<ModulePath, ModuleInfo>,
) -> Result<(), ResolveError> {
  for f in &module_info.ast.functions {
    if let Some(body) = &f.body { validate_block(body, module_info, modules)?; }
  }
  for c in &module_info.ast.classes {
    for m in &c.methods { validate_block(&m.body, module_info, modules)?; }
  }
  Ok(())
}

fn validate_block(block: &BlockStmt, mi: &ModuleInfo, modules: &HashMap<ModulePath, ModuleInfo>) -> Result<(), ResolveError> {
  for s in &block.statements { validate_stmt(s, mi, modules)?; }
  Ok(())
}

fn validate_stmt(stmt: &Statement, mi: &ModuleInfo, modules: &HashMap<ModulePath, ModuleInfo>) -> Result<(), ResolveError> {
  match stmt {
    Statement::Block(b) => validate_block(b, mi, modules),
    Statement::VarDecl { init, .. } => {
      if let Some(e) = init { validate_expr(e, mi, modules)?; }
      Ok(())
    }
    Statement::If(s) => {
      validate_expr(&s.condition, mi, modules)?;
      validate_block(&s.then_branch, mi, modules)?;
      match &s.else_branch {
        ElseBranch::Block(b) => validate_block(b, mi, modules),
        ElseBranch::If(i) => validate_stmt(&Statement::If((**i).clone()), mi, modules),
        ElseBranch::None => Ok(()),
      }
    }
    Statement::While(w) => {
      validate_expr(&w.condition, mi, modules)?;
      validate_block(&w.body, mi, modules)
    }
    Statement::Return { value, .. } => {
      if let Some(v) = value { validate_expr(v, mi, modules)?; }
      Ok(())
    }
    Statement::Assign { target, value, .. } => {
      validate_expr(target, mi, modules)?;
      validate_expr(value, mi, modules)
    }
    Statement::ExprStmt { expr, .. } => validate_expr(expr, mi, modules),
    Statement::Break { .. } | Statement::Continue { .. } => Ok(()),
  }
}

fn validate_expr(expr: &Expression, mi: &ModuleInfo, modules: &HashMap<ModulePath, ModuleInfo>) -> Result<(), ResolveError> {
  match expr {
    Expression::Binary { left, right, .. } => {
      validate_expr(left, mi, modules)?;
      validate_expr(right, mi, modules)
    }
    Expression::Unary { operand, .. } => validate_expr(operand, mi, modules),
    Expression::Cast { operand, .. } => validate_expr(operand, mi, modules),
    Expression::Call { callee, args, .. } => {
      validate_expr(callee, mi, modules)?;
      for a in args { validate_expr(a, mi, modules)?; }
      Ok(())
    }
    Expression::FieldAccess { object, .. } => {
      validate_expr(object, mi, modules)?;
      resolve_module_chain(expr, mi, modules)?;
      Ok(())
    }
    Expression::Index { object, index, .. } => {
      validate_expr(object, mi, modules)?;
      validate_expr(index, mi, modules)
    }
    Expression::ArrayCtor { length, .. } => validate_expr(length, mi, modules),
    Expression::Identifier { .. } | Expression::Literal { .. } | Expression::Null { .. } => Ok(()),
  }
}

/// Walks a `a.b.c` chain; only `FieldAccess` whose base resolves to a
/// module alias is a "module chain" subject to visibility checks.
fn resolve_module_chain<'m>(
  expr: &Expression,
  mi: &ModuleInfo,
  modules: &'m HashMap<ModulePath, ModuleInfo>,
) -> Result<Option<&'m ModuleInfo>, ResolveError> {
  let Expression::FieldAccess { object, name, span } = expr else { return Ok(None) };

  match object.as_ref() {
    Expression::Identifier { name: base_name, .. } => {
      let Some(import_info) = mi.imports.get(base_name) else { return Ok(None) };
      let target = &modules[&import_info.module_path];
      resolve_exported_member(target, name, span, modules)
    }
    Expression::FieldAccess { .. } => {
      let Some(base_module) = resolve_module_chain(object, mi, modules)? else { return Ok(None) };
      resolve_exported_member(base_module, name, span, modules)
    }
    _ => Ok(None),
  }
}

fn resolve_exported_member<'m>(
  target: &'m ModuleInfo,
  member_name: &str,
  span: &SourceSpan,
  modules: &'m HashMap<ModulePath, ModuleInfo>,
) -> Result<Option<&'m ModuleInfo>, ResolveError> {
  if target.exported_symbols.contains_key(member_name) { return Ok(None); }
  if let Some(module_path) = target.exported_modules.get(member_name) {
    return Ok(Some(&modules[module_path]));
  }
  Err(ResolveError::spanned(
    format!("Module '{}' has no exported member '{member_name}'", dotted(&target.module_path)),
    span.clone(),
  ))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_file(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
        if let Some(parent) = path.parent() { fs::create_dir_all(parent).unwrap(); }
    let mut f = fs::File::create(path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
  }

  #[test]
  fn multi_module_resolution() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "util.nif", "export class Box { value: i64; }");
    write_file(dir.path(), "main.nif", "import util;\nfn main() -> i64 { return 0; }");
    let program = resolve_program(&dir.path().join("main.nif"), None).unwrap();
    assert_eq!(program.modules.len(), 2);
    assert!(program.modules.contains_key(&vec!["util".to_string()]));
  }

  #[test]
  fn missing_module_is_error() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "main.nif", "import missing;\nfn main() -> i64 { return 0; }");
    let err = resolve_program(&dir.path().join("main.nif"), None).unwrap_err();
    assert!(err.to_string().contains("Module 'missing' not found"));
  }

  #[test]
  fn import_cycle_is_error() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.nif", "import b;\nfn main() -> i64 { return 0; }");
    write_file(dir.path(), "b.nif", "import a;\n");
    let err = resolve_program(&dir.path().join("a.nif"), None).unwrap_err();
    assert!(err.to_string().contains("Import cycle detected"));
  }

  #[test]
  fn unexported_member_is_error() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "util.nif", "class Hidden { value: i64; }");
    write_file(dir.path(), "main.nif", "import util;\nfn main() -> i64 { var x: util.Hidden = util.Hidden(1); return 0; }");
    let err = resolve_program(&dir.path().join("main.nif"), None).unwrap_err();
    assert!(err.to_string().contains("has no exported member"));
  }
}
