//! Dead-code elimination: prunes functions and classes unreachable from
//! `main` before module linking, so the code generator only ever sees
//! declarations that are actually used.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ast::*;
use crate::resolver::ProgramInfo;

fn is_reference_type_name(name: &str) -> bool {
  name.chars().next().is_some_and(|c| c.is_uppercase())
}

fn flatten_field_chain(expr: &Expression) -> Option<Vec<String>> {
  match expr {
    Expression::Identifier { name, .. } => Some(vec![name.clone()]),
    Expression::FieldAccess { object, name, .. } => {
      let mut chain = flatten_field_chain(object)?;
      chain.push(name.clone());
      Some(chain)
    }
    _ => None,
  }
}

struct Walker<'a> {
  known_functions: HashMap<String, Vec<&'a FunctionDecl>>,
  known_classes: HashMap<String, &'a ClassDecl>,
  known_function_names: HashSet<String>,
  known_class_names: HashSet<String>,
  reachable_functions: HashSet<String>,
  reachable_classes: HashSet<String>,
  function_queue: VecDeque<String>,
  class_queue: VecDeque<String>,
}

impl<'a> Walker<'a> {
  fn new(program: &'a ProgramInfo) -> Self {
    let mut known_functions: HashMap<String, Vec<&FunctionDecl>> = HashMap::new();
    let mut known_classes: HashMap<String, &ClassDecl> = HashMap::new();

    for module_info in program.modules.values() {
      for fn_decl in &module_info.ast.functions {
        known_functions.entry(fn_decl.name.clone()).or_default().push(fn_decl);
      }
      for cls_decl in &module_info.ast.classes {
        known_classes.entry(cls_decl.name.clone()).or_insert(cls_decl);
      }
    }

    let known_function_names: HashSet<String> = known_functions.keys().cloned().collect();
    let known_class_names: HashSet<String> = known_classes.keys().cloned().collect();

    Self {
      known_functions,
      known_classes,
      known_function_names,
      known_class_names,
      reachable_functions: HashSet::new(),
      reachable_classes: HashSet::new(),
      function_queue: VecDeque::new(),
      class_queue: VecDeque::new(),
    }
  }

  fn enqueue_class(&mut self, type_name: &str) {
    if !self.known_class_names.contains(type_name) || self.reachable_classes.contains(type_name) { return; }
    self.reachable_classes.insert(type_name.to_string());
    self.class_queue.push_back(type_name.to_string());
  }

  fn enqueue_type_ref(&mut self, type_ref: &TypeRef) {
    match type_ref {
      TypeRef::Named { name, .. } => self.enqueue_class(name),
      TypeRef::Array { element, .. } => self.enqueue_type_ref(element),
    }
  }

  fn enqueue_function(&mut self, function_name: &str) {
    if !self.known_function_names.contains(function_name) || self.reachable_functions.contains(function_name) { return; }
    self.reachable_functions.insert(function_name.to_string());
    self.function_queue.push_back(function_name.to_string());
  }

  fn walk_expr(&self, expr: &Expression, local_types: &HashMap<String, String>, found_functions: &mut HashSet<String>, found_classes: &mut HashSet<String>) {
    match expr {
      Expression::Identifier { .. } => {}
      Expression::Null { .. } | Expression::Literal { .. } => {}
      Expression::Cast { type_ref, operand, .. } => {
        let name = type_ref.display_name();
        if self.known_class_names.contains(&name) || is_reference_type_name(&name) {
          found_classes.insert(name);
        }
        self.walk_expr(operand, local_types, found_functions, found_classes);
      }
      Expression::Unary { operand, .. } => self.walk_expr(operand, local_types, found_functions, found_classes),
      Expression::Binary { left, right, .. } => {
        self.walk_expr(left, local_types, found_functions, found_classes);
        self.walk_expr(right, local_types, found_functions, found_classes);
      }
      Expression::FieldAccess { object, .. } => {
        if let Expression::Literal { text, .. } = object.as_ref() {
          if text.starts_with('"') { found_classes.insert("Str".to_string()); }
        }
        self.walk_expr(object, local_types, found_functions, found_classes);
      }
      Expression::Index { object, index, .. } => {
        self.walk_expr(object, local_types, found_functions, found_classes);
        self.walk_expr(index, local_types, found_functions, found_classes);
      }
      Expression::ArrayCtor { element_type, length, .. } => {
        let name = element_type.display_name();
        if self.known_class_names.contains(&name) || is_reference_type_name(&name) {
          found_classes.insert(name);
        }
        self.walk_expr(length, local_types, found_functions, found_classes);
      }
      Expression::Call { callee, args, .. } => {
        for arg in args { self.walk_expr(arg, local_types, found_functions, found_classes); }

        if let Expression::Identifier { name, .. } = callee.as_ref() {
          if self.known_class_names.contains(name) {
            found_classes.insert(name.clone());
          } else if self.known_function_names.contains(name) {
            found_functions.insert(name.clone());
          }
          return;
        }

        let Some(chain) = flatten_field_chain(callee) else {
          self.walk_expr(callee, local_types, found_functions, found_classes);
          return;
        };
        if chain.len() < 2 {
          self.walk_expr(callee, local_types, found_functions, found_classes);
          return;
        }

        let first = &chain[0];
        let last = chain.last().unwrap();
        if let Some(receiver_type) = local_types.get(first) {
          found_classes.insert(receiver_type.clone());
          return;
        }
        if self.known_class_names.contains(last) {
          found_classes.insert(last.clone());
        } else if self.known_function_names.contains(last) {
          found_functions.insert(last.clone());
        }
      }
    }
  }

  fn walk_stmt(&self, stmt: &Statement, local_types: &mut HashMap<String, String>, found_functions: &mut HashSet<String>, found_classes: &mut HashSet<String>) {
    match stmt {
      Statement::VarDecl { name, type_ref, init, .. } => {
        let type_name = type_ref.display_name();
        local_types.insert(name.clone(), type_name.clone());
        if self.known_class_names.contains(&type_name) || is_reference_type_name(&type_name) {
          found_classes.insert(type_name);
        }
        if let Some(e) = init { self.walk_expr(e, local_types, found_functions, found_classes); }
      }
      Statement::Assign { target, value, .. } => {
        self.walk_expr(target, local_types, found_functions, found_classes);
        self.walk_expr(value, local_types, found_functions, found_classes);
      }
      Statement::ExprStmt { expr, .. } => self.walk_expr(expr, local_types, found_functions, found_classes),
      Statement::Return { value, .. } => {
        if let Some(v) = value { self.walk_expr(v, local_types, found_functions, found_classes); }
      }
      Statement::Block(b) => {
        let mut child = local_types.clone();
        self.walk_block(b, &mut child, found_functions, found_classes);
      }
      Statement::If(s) => {
        self.walk_expr(&s.condition, local_types, found_functions, found_classes);
        let mut then_scope = local_types.clone();
        self.walk_block(&s.then_branch, &mut then_scope, found_functions, found_classes);
        match &s.else_branch {
          ElseBranch::Block(b) => {
            let mut else_scope = local_types.clone();
            self.walk_block(b, &mut else_scope, found_functions, found_classes);
          }
          ElseBranch::If(i) => {
            let mut else_scope = local_types.clone();
            self.walk_stmt(&Statement::If((**i).clone()), &mut else_scope, found_functions, found_classes);
          }
          ElseBranch::None => {}
        }
      }
      Statement::While(w) => {
        self.walk_expr(&w.condition, local_types, found_functions, found_classes);
        let mut body_scope = local_types.clone();
        self.walk_block(&w.body, &mut body_scope, found_functions, found_classes);
      }
      Statement::Break { .. } | Statement::Continue { .. } => {}
    }
  }

  fn walk_block(&self, block: &BlockStmt, local_types: &mut HashMap<String, String>, found_functions: &mut HashSet<String>, found_classes: &mut HashSet<String>) {
    for s in &block.statements { self.walk_stmt(s, local_types, found_functions, found_classes); }
  }

  fn visit_function_decl(&mut self, fn_decl: &FunctionDecl) {
    for param in &fn_decl.params { self.enqueue_type_ref(&param.type_ref); }
    self.enqueue_type_ref(&fn_decl.return_type);

    let Some(body) = &fn_decl.body else { return };

    let mut local_types: HashMap<String, String> =
      fn_decl.params.iter().map(|p| (p.name.clone(), p.type_ref.display_name())).collect();
    let mut found_functions = HashSet::new();
    let mut found_classes = HashSet::new();
    self.walk_block(body, &mut local_types, &mut found_functions, &mut found_classes);

    for name in found_functions { self.enqueue_function(&name); }
    for name in found_classes { self.enqueue_class(&name); }
  }

  fn visit_class_decl(&mut self, cls_decl: &ClassDecl) {
    for field in &cls_decl.fields { self.enqueue_type_ref(&field.type_ref); }

    for method in &cls_decl.methods {
      for param in &method.params { self.enqueue_type_ref(&param.type_ref); }
      self.enqueue_type_ref(&method.return_type);

      let mut local_types: HashMap<String, String> =
        method.params.iter().map(|p| (p.name.clone(), p.type_ref.display_name())).collect();
      let mut found_functions = HashSet::new();
      let mut found_classes = HashSet::new();
      self.walk_block(&method.body, &mut local_types, &mut found_functions, &mut found_classes);

      for name in found_functions { self.enqueue_function(&name); }
      for name in found_classes { self.enqueue_class(&name); }
    }
  }

  fn walk(&mut self) -> (HashSet<String>, HashSet<String>) {
    self.enqueue_function("main");

    while !self.function_queue.is_empty() || !self.class_queue.is_empty() {
      while let Some(function_name) = self.function_queue.pop_front() {
        if let Some(decls) = self.known_functions.get(&function_name) {
          let decls = decls.clone();
          for fn_decl in decls { self.visit_function_decl(fn_decl); }
        }
      }
      while let Some(class_name) = self.class_queue.pop_front() {
        if let Some(cls_decl) = self.known_classes.get(&class_name).copied() {
          self.visit_class_decl(cls_decl);
        }
      }
    }

    (std::mem::take(&mut self.reachable_functions), std::mem::take(&mut self.reachable_classes))
  }
}

/// Removes every function and class not transitively reachable from `main`.
pub fn prune_unreachable(mut program: ProgramInfo) -> ProgramInfo {
  let (reachable_functions, reachable_classes) = Walker::new(&program).walk();

  for module_info in program.modules.values_mut() {
    let filtered_functions: Vec<FunctionDecl> = module_info.ast.functions.iter()
      .filter(|f| reachable_functions.contains(&f.name)).cloned().collect();
    let filtered_classes: Vec<ClassDecl> = module_info.ast.classes.iter()
      .filter(|c| reachable_classes.contains(&c.name)).cloned().collect();
    module_info.ast.functions = filtered_functions;
    module_info.ast.classes = filtered_classes;
  }

  program
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;
  use crate::parser::parse;
  use crate::resolver::ModuleInfo;
  use std::collections::HashMap as Map;

  fn single_module_program(src: &str) -> ProgramInfo {
    let ast = parse(lex(src, "<t>").unwrap()).unwrap();
    let mut modules = Map::new();
    let path = vec!["main".to_string()];
    modules.insert(path.clone(), ModuleInfo {
      module_path: path.clone(),
      file_path: "<t>".into(),
      ast,
      symbols: Map::new(),
      exported_symbols: Map::new(),
      imports: Map::new(),
      exported_modules: Map::new(),
    });
    ProgramInfo { entry_module: path, modules }
  }

  #[test]
  fn unused_function_is_pruned() {
    let program = single_module_program(
      "fn unused() -> unit { } fn main() -> i64 { return 0; }"
    );
    let pruned = prune_unreachable(program);
    let names: Vec<&str> = pruned.modules.values().next().unwrap().ast.functions.iter()
      .map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["main"]);
  }

  #[test]
  fn class_reachable_via_var_decl_kept() {
    let program = single_module_program(
      "class Box { value: i64; } class Unused { value: i64; }\n\
       fn main() -> i64 { var b: Box = Box(1); return b.value; }"
    );
    let pruned = prune_unreachable(program);
    let names: Vec<&str> = pruned.modules.values().next().unwrap().ast.classes.iter()
      .map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Box"]);
  }

  #[test]
  fn transitively_called_function_kept() {
    let program = single_module_program(
      "fn helper() -> i64 { return 1; } fn main() -> i64 { return helper(); }"
    );
    let pruned = prune_unreachable(program);
    let names: HashSet<&str> = pruned.modules.values().next().unwrap().ast.functions.iter()
      .map(|f| f.name.as_str()).collect();
    assert!(names.contains("helper"));
    assert!(names.contains("main"));
  }
}
