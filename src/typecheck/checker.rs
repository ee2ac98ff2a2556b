//! Whole-program nominal type checker.
//!
//! Runs in two phases per `spec.md` §4.4: first every module's classes and
//! functions are collected into global signature tables, then every
//! function and method body is checked against those tables.

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::error::TypeCheckError;
use crate::resolver::{ModulePath, ProgramInfo, SymbolKind};
use crate::span::SourceSpan;

use super::model::*;

/// The primitive type a `Box*` type's `.value` field holds, or `None` if
/// `type_name` isn't one of the builtin box types.
fn boxed_value_type(type_name: &str) -> Option<&'static str> {
  match type_name {
    "BoxI64" => Some("i64"),
    "BoxU64" => Some("u64"),
    "BoxU8" => Some("u8"),
    "BoxBool" => Some("bool"),
    "BoxDouble" => Some("double"),
    _ => None,
  }
}

fn collect_module(module_ast: &ModuleAst) -> Result<(HashMap<String, FunctionSig>, HashMap<String, ClassInfo>), TypeCheckError> {
  let mut classes = HashMap::new();
  let mut functions: HashMap<String, FunctionSig> = HashMap::new();

  for c in &module_ast.classes {
    if classes.contains_key(&c.name) || functions.contains_key(&c.name) {
      return Err(TypeCheckError::new(format!("Duplicate declaration '{}'", c.name), c.span.clone()));
    }
    let mut fields = HashMap::new();
    let mut field_order = Vec::new();
    let mut private_fields = HashSet::new();
    for f in &c.fields {
      if fields.contains_key(&f.name) {
        return Err(TypeCheckError::new(format!("Duplicate field '{}'", f.name), f.span.clone()));
      }
      fields.insert(f.name.clone(), resolve_type_ref_bare(&f.type_ref));
      field_order.push(f.name.clone());
      if f.is_private { private_fields.insert(f.name.clone()); }
    }
    let mut methods = HashMap::new();
    let mut private_methods = HashSet::new();
    for m in &c.methods {
      if methods.contains_key(&m.name) {
        return Err(TypeCheckError::new(format!("Duplicate method '{}'", m.name), m.span.clone()));
      }
      let sig = FunctionSig {
        name: m.name.clone(),
        params: m.params.iter().map(|p| resolve_type_ref_bare(&p.type_ref)).collect(),
        return_type: resolve_type_ref_bare(&m.return_type),
        is_static: m.is_static,
        is_private: m.is_private,
      };
      if m.is_private { private_methods.insert(m.name.clone()); }
      methods.insert(m.name.clone(), sig);
    }
    classes.insert(c.name.clone(), ClassInfo {
      name: c.name.clone(), fields, field_order, methods, private_fields, private_methods, span: c.span.clone(),
    });
  }

  for f in &module_ast.functions {
    if functions.contains_key(&f.name) || classes.contains_key(&f.name) {
      return Err(TypeCheckError::new(format!("Duplicate declaration '{}'", f.name), f.span.clone()));
    }
    if f.is_extern && f.body.is_some() {
      return Err(TypeCheckError::new("Extern function must not have a body", f.span.clone()));
    }
    if !f.is_extern && f.body.is_none() {
      return Err(TypeCheckError::new("Function declaration missing body", f.span.clone()));
    }
    functions.insert(f.name.clone(), FunctionSig {
      name: f.name.clone(),
      params: f.params.iter().map(|p| resolve_type_ref_bare(&p.type_ref)).collect(),
      return_type: resolve_type_ref_bare(&f.return_type),
      is_static: false,
      is_private: false,
    });
  }

  Ok((functions, classes))
}

/// A plain name -> type-info resolution ignoring module qualification, used
/// while collecting signatures (qualification is only meaningful when
/// checking bodies against the full program).
fn resolve_type_ref_bare(type_ref: &TypeRef) -> TypeInfo {
  match type_ref {
    TypeRef::Named { name, .. } => {
      if is_primitive(name) { TypeInfo::primitive(name.clone()) } else { TypeInfo::reference(name.clone()) }
    }
    TypeRef::Array { element, .. } => TypeInfo::array(resolve_type_ref_bare(element)),
  }
}

/// Type-check a single module in isolation (used by tests and tooling that
/// don't need cross-module resolution).
pub fn typecheck(module_ast: &ModuleAst) -> Result<(), TypeCheckError> {
  let (functions, classes) = collect_module(module_ast)?;
  let mut checker = Checker {
    functions: &functions,
    classes: &classes,
    module_classes: None,
    module_info: None,
    program: None,
    scopes: Vec::new(),
    loop_depth: 0,
    current_class: None,
  };
  checker.check_module(module_ast)
}

/// Type-check every module of a resolved program.
pub fn typecheck_program(program: &ProgramInfo) -> Result<(), TypeCheckError> {
  let mut functions = HashMap::new();
  let mut classes = HashMap::new();
  for (path, info) in &program.modules {
    let (f, c) = collect_module(&info.ast)?;
    functions.insert(path.clone(), f);
    classes.insert(path.clone(), c);
  }

  for (path, info) in &program.modules {
    let mut checker = Checker {
      functions: &functions[path],
      classes: &classes[path],
      module_classes: Some(&classes),
      module_info: Some(info),
      program: Some(program),
      scopes: Vec::new(),
      loop_depth: 0,
      current_class: None,
    };
    checker.check_module(&info.ast)?;
  }
  Ok(())
}

struct Checker<'a> {
  functions: &'a HashMap<String, FunctionSig>,
  classes: &'a HashMap<String, ClassInfo>,
  module_classes: Option<&'a HashMap<ModulePath, HashMap<String, ClassInfo>>>,
  module_info: Option<&'a crate::resolver::ModuleInfo>,
  program: Option<&'a ProgramInfo>,
  scopes: Vec<HashMap<String, TypeInfo>>,
  loop_depth: u32,
  current_class: Option<String>,
}

impl<'a> Checker<'a> {
  fn check_module(&mut self, module_ast: &ModuleAst) -> Result<(), TypeCheckError> {
    for f in &module_ast.functions {
      if f.is_extern { continue; }
      let sig = self.functions[&f.name].clone();
      self.check_function_like(&f.params, f.body.as_ref().unwrap(), &sig.return_type)?;
    }
    for c in &module_ast.classes {
      let class_info = self.classes[&c.name].clone();
      self.current_class = Some(c.name.clone());
      for m in &c.methods {
        let sig = class_info.methods[&m.name].clone();
        self.check_function_like(&m.params, &m.body, &sig.return_type)?;
      }
      self.current_class = None;
    }
    Ok(())
  }

  fn push_scope(&mut self) { self.scopes.push(HashMap::new()); }
  fn pop_scope(&mut self) { self.scopes.pop(); }

  fn declare_variable(&mut self, name: &str, ty: TypeInfo, span: &SourceSpan) -> Result<(), TypeCheckError> {
    let scope = self.scopes.last_mut().expect("scope stack is non-empty while checking a body");
    if scope.contains_key(name) {
      return Err(TypeCheckError::new(format!("Duplicate local variable '{name}'"), span.clone()));
    }
    scope.insert(name.to_string(), ty);
    Ok(())
  }

  fn lookup_variable(&self, name: &str) -> Option<TypeInfo> {
    for scope in self.scopes.iter().rev() {
      if let Some(t) = scope.get(name) { return Some(t.clone()); }
    }
    None
  }

  fn check_function_like(
    &mut self,
    params: &[ParamDecl],
    body: &BlockStmt,
    return_type: &TypeInfo,
  ) -> Result<(), TypeCheckError> {
    self.push_scope();
    for p in params {
      let t = self.resolve_type_ref(&p.type_ref)?;
      self.declare_variable(&p.name, t, &p.span)?;
    }
    self.check_block(body, return_type)?;
    if return_type.name != "unit" && !block_guarantees_return(body) {
      return Err(TypeCheckError::new("Non-unit function must return on all paths", body.span.clone()));
    }
    self.pop_scope();
    Ok(())
  }

  fn check_block(&mut self, block: &BlockStmt, return_type: &TypeInfo) -> Result<(), TypeCheckError> {
    self.push_scope();
    for s in &block.statements { self.check_statement(s, return_type)?; }
    self.pop_scope();
    Ok(())
  }

  fn check_statement(&mut self, stmt: &Statement, return_type: &TypeInfo) -> Result<(), TypeCheckError> {
    match stmt {
      Statement::Block(b) => self.check_block(b, return_type),
      Statement::VarDecl { name, type_ref, init, span } => {
        let var_type = self.resolve_type_ref(type_ref)?;
        if let Some(e) = init {
          let init_type = self.infer_expr(e)?;
          self.require_assignable(&var_type, &init_type, e.span())?;
        }
        self.declare_variable(name, var_type, span)
      }
      Statement::If(s) => {
        let cond = self.infer_expr(&s.condition)?;
        self.require_type_name(&cond, "bool", s.condition.span())?;
        self.check_block(&s.then_branch, return_type)?;
        match &s.else_branch {
          ElseBranch::Block(b) => self.check_block(b, return_type),
          ElseBranch::If(i) => self.check_statement(&Statement::If((**i).clone()), return_type),
          ElseBranch::None => Ok(()),
        }
      }
      Statement::While(w) => {
        let cond = self.infer_expr(&w.condition)?;
        self.require_type_name(&cond, "bool", w.condition.span())?;
        self.loop_depth += 1;
        let result = self.check_block(&w.body, return_type);
        self.loop_depth -= 1;
        result
      }
      Statement::Return { value, span } => {
        match value {
          None => {
            if return_type.name != "unit" {
              return Err(TypeCheckError::new("Non-unit function must return a value", span.clone()));
            }
            Ok(())
          }
          Some(v) => {
            let vt = self.infer_expr(v)?;
            self.require_assignable(return_type, &vt, v.span())
          }
        }
      }
      Statement::Break { span } => {
        if self.loop_depth == 0 {
          return Err(TypeCheckError::new("'break' is only allowed inside while loops", span.clone()));
        }
        Ok(())
      }
      Statement::Continue { span } => {
        if self.loop_depth == 0 {
          return Err(TypeCheckError::new("'continue' is only allowed inside while loops", span.clone()));
        }
        Ok(())
      }
      Statement::Assign { target, value, span: _ } => {
        self.ensure_assignable_target(target)?;
        let tt = self.infer_expr(target)?;
        let vt = self.infer_expr(value)?;
        self.check_assignment_legality(target, &tt)?;
        self.require_assignable(&tt, &vt, value.span())
      }
      Statement::ExprStmt { expr, .. } => { self.infer_expr(expr)?; Ok(()) }
    }
  }

  fn ensure_assignable_target(&self, expr: &Expression) -> Result<(), TypeCheckError> {
    match expr {
      Expression::Identifier { name, span } => {
        if self.lookup_variable(name).is_none() && self.current_class_field(name).is_none() {
          return Err(TypeCheckError::new("Invalid assignment target", span.clone()));
        }
        Ok(())
      }
      Expression::FieldAccess { .. } | Expression::Index { .. } => Ok(()),
      _ => Err(TypeCheckError::new("Invalid assignment target", expr.span().clone())),
    }
  }

  /// Rejects assignment into read-only structural positions (`Str` index,
  /// box `value` fields) that type perfectly well but are immutable, and
  /// confirms a user class indexed by assignment (`obj[i] = v`) actually
  /// exposes a `set(i64, T) -> unit` matching its `get(i64) -> T`.
  fn check_assignment_legality(&self, target: &Expression, _target_type: &TypeInfo) -> Result<(), TypeCheckError> {
    match target {
      Expression::Index { object, span, .. } => {
        let obj_type = self.infer_expr(object)?;
        if obj_type.element_type.is_some() || obj_type.name == "Map" { return Ok(()); }
        if obj_type.name == "Str" {
          return Err(TypeCheckError::new("Str is immutable", span.clone()));
        }
        if obj_type.name == "Vec" {
          return Err(TypeCheckError::new("Vec is not assignable by index; use .set(i64, Obj)", span.clone()));
        }
        if let Some(class_info) = self.lookup_class_by_type_name(&obj_type.name) {
          let get_type = self.structural_get_result_type(class_info, span)?;
          self.require_structural_set(class_info, &get_type, span)?;
        }
        Ok(())
      }
      Expression::FieldAccess { object, name, span } => {
        if name == "value" {
          let obj_type = self.infer_expr(object)?;
          if obj_type.name.starts_with("Box") {
            return Err(TypeCheckError::new("Box instances are immutable", span.clone()));
          }
        }
        Ok(())
      }
      _ => Ok(()),
    }
  }

  fn require_type_name(&self, actual: &TypeInfo, expected: &str, span: &SourceSpan) -> Result<(), TypeCheckError> {
    if actual.name != expected {
      return Err(TypeCheckError::new(format!("Expected '{expected}', got '{}'", actual.name), span.clone()));
    }
    Ok(())
  }

  fn require_assignable(&self, target: &TypeInfo, value: &TypeInfo, span: &SourceSpan) -> Result<(), TypeCheckError> {
    if target.name == value.name { return Ok(()); }
    if target.is_reference() && value.kind == TypeKind::Null { return Ok(()); }
    if target.name == "Obj" && value.is_reference() { return Ok(()); }
    Err(TypeCheckError::new(format!("Cannot assign '{}' to '{}'", value.name, target.name), span.clone()))
  }

  fn resolve_type_ref(&self, type_ref: &TypeRef) -> Result<TypeInfo, TypeCheckError> {
    match type_ref {
      TypeRef::Named { name, span } => self.resolve_named_type(name, span),
      TypeRef::Array { element, .. } => Ok(TypeInfo::array(self.resolve_type_ref(element)?)),
    }
  }

  /// Named-type resolution order: locals' own dotted-qualified import
  /// reference, same-module class, unique unqualified imported class,
  /// then the fixed set of builtin reference types.
  fn resolve_named_type(&self, name: &str, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    if is_primitive(name) { return Ok(TypeInfo::primitive(name.to_string())); }
    if name == "Obj" { return Ok(TypeInfo::reference("Obj")); }

    if let Some((alias, rest)) = name.split_once('.') {
      if let Some(mi) = self.module_info {
        if let Some(import) = mi.imports.get(alias) {
          if let Some(program) = self.program {
            if let Some(target) = program.modules.get(&import.module_path) {
              if target.exported_symbols.contains_key(rest) {
                return Ok(TypeInfo::reference(format!("{}::{rest}", import.module_path.join("."))));
              }
            }
          }
        }
      }
    }

    if self.classes.contains_key(name) { return Ok(TypeInfo::reference(name.to_string())); }
    if let Some(t) = self.resolve_imported_class_type(name, span)? { return Ok(t); }
    if REFERENCE_BUILTIN_TYPE_NAMES.contains(&name) { return Ok(TypeInfo::reference(name.to_string())); }

    Err(TypeCheckError::new(format!("Unknown type '{name}'"), span.clone()))
  }

  /// `Str` resolves the same way any other named type would: a
  /// same-module class first, then the unique unqualified import, then
  /// (since `Str` need not be imported at all to be in scope) a scan of
  /// every module in the program for the one class declaring it.
  fn resolve_string_type(&self, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    if self.classes.contains_key(STR_CLASS_NAME) { return Ok(TypeInfo::reference(STR_CLASS_NAME)); }
    if let Some(t) = self.resolve_imported_class_type(STR_CLASS_NAME, span)? { return Ok(t); }
    if let Some(t) = self.resolve_unique_global_class_type(STR_CLASS_NAME, span)? { return Ok(t); }
    Err(TypeCheckError::new(format!("Unknown type '{STR_CLASS_NAME}'"), span.clone()))
  }

  /// Scans the current module's imports for modules exporting a class
  /// named `class_name`. Zero matches: `None`. Exactly one: the
  /// cross-module-qualified reference type. More than one: ambiguous.
  fn resolve_imported_class_type(&self, class_name: &str, span: &SourceSpan) -> Result<Option<TypeInfo>, TypeCheckError> {
    let Some(mi) = self.module_info else { return Ok(None) };
    let Some(program) = self.program else { return Ok(None) };
    let mut matches: Vec<ModulePath> = Vec::new();
    for import in mi.imports.values() {
      if let Some(target) = program.modules.get(&import.module_path) {
        if let Some(sym) = target.exported_symbols.get(class_name) {
          if sym.kind == SymbolKind::Class && !matches.contains(&import.module_path) {
            matches.push(import.module_path.clone());
          }
        }
      }
    }
    match matches.len() {
      0 => Ok(None),
      1 => Ok(Some(TypeInfo::reference(format!("{}::{class_name}", matches[0].join("."))))),
      _ => {
        let joined = matches.iter().map(|m| m.join(".")).collect::<Vec<_>>().join(", ");
        Err(TypeCheckError::new(format!("Ambiguous imported type '{class_name}' (matches: {joined})"), span.clone()))
      }
    }
  }

  /// Scans every module in the whole program for one declaring a class
  /// named `class_name`, whether imported or not. Only used for `Str`,
  /// since it's the one class a module may reference without importing.
  fn resolve_unique_global_class_type(&self, class_name: &str, span: &SourceSpan) -> Result<Option<TypeInfo>, TypeCheckError> {
    let Some(module_classes) = self.module_classes else { return Ok(None) };
    let mut matches: Vec<&ModulePath> = module_classes
      .iter()
      .filter(|(_, classes)| classes.contains_key(class_name))
      .map(|(path, _)| path)
      .collect();
    matches.sort();
    match matches.len() {
      0 => Ok(None),
      1 => Ok(Some(TypeInfo::reference(format!("{}::{class_name}", matches[0].join("."))))),
      _ => {
        let joined = matches.iter().map(|m| m.join(".")).collect::<Vec<_>>().join(", ");
        Err(TypeCheckError::new(format!("Ambiguous global class '{class_name}' (matches: {joined})"), span.clone()))
      }
    }
  }

  fn lookup_class_by_type_name<'b>(&'b self, name: &str) -> Option<&'b ClassInfo> {
    if let Some(c) = self.classes.get(name) { return Some(c); }
    if let Some((owner_dotted, bare)) = name.split_once("::") {
      let owner: ModulePath = owner_dotted.split('.').map(|s| s.to_string()).collect();
      if let Some(module_classes) = self.module_classes {
        if let Some(classes) = module_classes.get(&owner) {
          return classes.get(bare);
        }
      }
    }
    None
  }

  fn infer_expr(&self, expr: &Expression) -> Result<TypeInfo, TypeCheckError> {
    match expr {
      Expression::Identifier { name, span } => self.infer_identifier(name, span),
      Expression::Literal { text, span } => self.infer_literal(text, span),
      Expression::Null { .. } => Ok(TypeInfo::null()),
      Expression::Unary { op, operand, span } => self.infer_unary(*op, operand, span),
      Expression::Binary { op, left, right, span } => self.infer_binary(*op, left, right, span),
      Expression::Cast { type_ref, operand, span } => self.infer_cast(type_ref, operand, span),
      Expression::Call { callee, args, span } => self.infer_call(callee, args, span),
      Expression::FieldAccess { object, name, span } => self.infer_field_access(object, name, span),
      Expression::Index { object, index, span } => self.infer_index(object, index, span),
      Expression::ArrayCtor { element_type, length, span } => self.infer_array_ctor(element_type, length, span),
    }
  }

  fn infer_identifier(&self, name: &str, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    if let Some(t) = self.lookup_variable(name) { return Ok(t); }
    if let Some(field_type) = self.current_class_field(name) { return Ok(field_type); }
    if self.current_class_method(name).is_some() {
      return Ok(TypeInfo::callable(format!("__method__:{}:{name}", self.current_class.as_deref().unwrap_or(""))));
    }
    if self.functions.contains_key(name) { return Ok(TypeInfo::callable(format!("__fn__:{name}"))); }
    if self.classes.contains_key(name) { return Ok(TypeInfo::callable(format!("__class__:{name}"))); }
    if let Some(t) = self.resolve_imported_class_type(name, span)? {
      return Ok(TypeInfo::callable(format!("__class__:{}", t.name)));
    }
    if let Some(mi) = self.module_info {
      if mi.imports.contains_key(name) { return Ok(TypeInfo::module(format!("__module__:{name}"))); }
    }
    Err(TypeCheckError::new(format!("Unknown identifier '{name}'"), span.clone()))
  }

  /// A bare identifier inside a method body resolves to an instance field of
  /// the enclosing class (there is no `self` keyword in the language).
  fn current_class_field(&self, name: &str) -> Option<TypeInfo> {
    let class_name = self.current_class.as_deref()?;
    let class_info = self.classes.get(class_name)?;
    class_info.fields.get(name).cloned()
  }

  fn current_class_method(&self, name: &str) -> Option<FunctionSig> {
    let class_name = self.current_class.as_deref()?;
    let class_info = self.classes.get(class_name)?;
    class_info.methods.get(name).cloned()
  }

  fn infer_literal(&self, text: &str, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    if text.starts_with('"') { return self.resolve_string_type(span); }
    if text.starts_with('\'') { return Ok(TypeInfo::primitive("u8")); }
    if text == "true" || text == "false" { return Ok(TypeInfo::bool_()); }
    if text.contains('.') { return Ok(TypeInfo::primitive("double")); }
    if let Some(digits) = text.strip_suffix("u8") {
      if digits.chars().all(|c| c.is_ascii_digit()) {
        let value: i128 = digits.parse().map_err(|_| TypeCheckError::new("u8 literal out of range (expected 0..255)", span.clone()))?;
        if !(0..=255).contains(&value) {
          return Err(TypeCheckError::new("u8 literal out of range (expected 0..255)", span.clone()));
        }
        return Ok(TypeInfo::primitive("u8"));
      }
    }
    if let Some(digits) = text.strip_suffix('u') {
      if digits.chars().all(|c| c.is_ascii_digit()) {
        let value: i128 = digits.parse().map_err(|_| TypeCheckError::new("u64 literal out of range (expected 0..18446744073709551615)", span.clone()))?;
        if value > U64_MAX_LITERAL {
          return Err(TypeCheckError::new("u64 literal out of range (expected 0..18446744073709551615)", span.clone()));
        }
        return Ok(TypeInfo::primitive("u64"));
      }
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
      let value: i128 = text.parse().map_err(|_| TypeCheckError::new(
        "i64 literal out of range (expected -9223372036854775808..9223372036854775807)", span.clone()))?;
      if value > I64_MAX_LITERAL {
        return Err(TypeCheckError::new(
          "i64 literal out of range (expected -9223372036854775808..9223372036854775807)", span.clone()));
      }
    }
    Ok(TypeInfo::primitive("i64"))
  }

  fn infer_unary(&self, op: UnaryOp, operand: &Expression, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    match op {
      UnaryOp::Not => {
        let t = self.infer_expr(operand)?;
        self.require_type_name(&t, "bool", operand.span())?;
        Ok(TypeInfo::bool_())
      }
      UnaryOp::Neg => {
        if let Expression::Literal { text, .. } = operand {
          if text.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(value) = text.parse::<i128>() {
              if value == I64_MIN_MAGNITUDE_LITERAL { return Ok(TypeInfo::primitive("i64")); }
            }
          }
        }
        let t = self.infer_expr(operand)?;
        if !is_numeric(&t.name) {
          return Err(TypeCheckError::new("Unary '-' requires numeric operand", span.clone()));
        }
        Ok(t)
      }
    }
  }

  fn infer_binary(&self, op: BinaryOp, left: &Expression, right: &Expression, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let lt = self.infer_expr(left)?;
    let rt = self.infer_expr(right)?;
    use BinaryOp::*;
    match op {
      Add | Sub | Mul | Div | Mod => {
        let sym = match op { Add => "+", Sub => "-", Mul => "*", Div => "/", Mod => "%", _ => unreachable!() };
        if !is_numeric(&lt.name) || !is_numeric(&rt.name) {
          return Err(TypeCheckError::new(format!("Operator '{sym}' requires numeric operands"), span.clone()));
        }
        if lt.name != rt.name {
          return Err(TypeCheckError::new(format!("Operator '{sym}' requires matching operand types"), span.clone()));
        }
        if op == Mod && lt.name == "double" {
          return Err(TypeCheckError::new("Operator '%' is not supported for 'double'", span.clone()));
        }
        Ok(lt)
      }
      Lt | Lte | Gt | Gte => {
        let sym = match op { Lt => "<", Lte => "<=", Gt => ">", Gte => ">=", _ => unreachable!() };
        if !is_numeric(&lt.name) || !is_numeric(&rt.name) {
          return Err(TypeCheckError::new(format!("Operator '{sym}' requires numeric operands"), span.clone()));
        }
        if lt.name != rt.name {
          return Err(TypeCheckError::new(format!("Operator '{sym}' requires matching operand types"), span.clone()));
        }
        Ok(TypeInfo::bool_())
      }
      EqEq | Neq => {
        let sym = if op == EqEq { "==" } else { "!=" };
        let comparable = lt.name == rt.name
          || (lt.kind == TypeKind::Null && rt.is_reference())
          || (rt.kind == TypeKind::Null && lt.is_reference());
        if !comparable {
          return Err(TypeCheckError::new(format!("Operator '{sym}' has incompatible operand types"), span.clone()));
        }
        Ok(TypeInfo::bool_())
      }
      And | Or => {
        self.require_type_name(&lt, "bool", left.span())?;
        self.require_type_name(&rt, "bool", right.span())?;
        Ok(TypeInfo::bool_())
      }
    }
  }

  fn infer_cast(&self, type_ref: &TypeRef, operand: &Expression, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let source = self.infer_expr(operand)?;
    let target = self.resolve_type_ref(type_ref)?;
    self.check_explicit_cast(&source, &target, span)?;
    Ok(target)
  }

  fn check_explicit_cast(&self, source: &TypeInfo, target: &TypeInfo, span: &SourceSpan) -> Result<(), TypeCheckError> {
    if source.name == target.name { return Ok(()); }
    if source.kind == TypeKind::Primitive && target.kind == TypeKind::Primitive {
      if source.name == "unit" || target.name == "unit" {
        return Err(TypeCheckError::new("Casts involving 'unit' are not allowed", span.clone()));
      }
      return Ok(());
    }
    if source.is_reference() && target.name == "Obj" { return Ok(()); }
    if source.name == "Obj" && target.is_reference() { return Ok(()); }
    Err(TypeCheckError::new(format!("Invalid cast from '{}' to '{}'", source.name, target.name), span.clone()))
  }

  fn infer_array_ctor(&self, element_type: &TypeRef, length: &Expression, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let _ = span;
    let elem = self.resolve_type_ref(element_type)?;
    let len_type = self.infer_expr(length)?;
    if len_type.name != "u64" && len_type.name != "i64" {
      return Err(TypeCheckError::new(format!("Expected 'u64', got '{}'", len_type.name), length.span().clone()));
    }
    Ok(TypeInfo::array(elem))
  }

  fn infer_field_access(&self, object: &Expression, name: &str, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    if let Expression::Identifier { name: base, .. } = object {
      if let Some(mi) = self.module_info {
        if let Some(import) = mi.imports.get(base) {
          return self.resolve_module_member(&import.module_path, name, span);
        }
      }
    }

    let object_type = self.infer_expr(object)?;

    if name == "value" {
      if let Some(prim) = boxed_value_type(&object_type.name) {
        return Ok(TypeInfo::primitive(prim));
      }
    }

    if let Some(elem) = &object_type.element_type {
      return match name {
        "len" | "get" | "set" | "slice" => Ok(TypeInfo::callable(format!("__array_method__:{name}"))),
        _ => {
          let _ = elem;
          Err(TypeCheckError::new(format!("Array type '{}' has no member '{name}'", object_type.name), span.clone()))
        }
      };
    }

    if object_type.name == "Vec" {
      return match name {
        "push" | "len" | "get" | "set" => Ok(TypeInfo::callable(format!("__vec_method__:{name}"))),
        _ => Err(TypeCheckError::new(format!("Type 'Vec' has no member '{name}'"), span.clone())),
      };
    }

    let class_info = self.lookup_class_by_type_name(&object_type.name)
      .ok_or_else(|| TypeCheckError::new(format!("Type '{}' has no fields/methods", object_type.name), span.clone()))?;

    if let Some(field_type) = class_info.fields.get(name) {
      self.require_member_visible(class_info, name, true, span)?;
      return Ok(field_type.clone());
    }
    if let Some(sig) = class_info.methods.get(name) {
      self.require_member_visible(class_info, name, false, span)?;
      return Ok(TypeInfo::callable(format!("__method__:{}:{}", class_info.name, sig.name)));
    }
    Err(TypeCheckError::new(format!("Class '{}' has no member '{name}'", class_info.name), span.clone()))
  }

  fn resolve_module_member(&self, module_path: &ModulePath, member: &str, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let program = self.program.ok_or_else(|| TypeCheckError::new(format!("Unknown type '{member}'"), span.clone()))?;
    let target = &program.modules[module_path];
    if target.exported_symbols.get(member).is_some() {
      let functions_of_target = &program.modules[module_path];
      let is_fn = functions_of_target.ast.functions.iter().any(|f| f.name == member);
      let dotted = module_path.join(".");
      return Ok(if is_fn {
        TypeInfo::callable(format!("__fn__:{dotted}:{member}"))
      } else {
        TypeInfo::callable(format!("__class__:{dotted}:{member}"))
      });
    }
    if let Some(nested) = target.exported_modules.get(member) {
      let dotted = nested.join(".");
      return Ok(TypeInfo::module(format!("__module__:{dotted}")));
    }
    Err(TypeCheckError::new(
      format!("Module '{}' has no exported member '{member}'", module_path.join(".")), span.clone()))
  }

  fn require_member_visible(&self, class_info: &ClassInfo, member: &str, _is_field: bool, span: &SourceSpan) -> Result<(), TypeCheckError> {
    let private = class_info.private_fields.contains(member) || class_info.private_methods.contains(member);
    if !private { return Ok(()); }
    if self.current_class.as_deref() == Some(class_info.name.as_str()) { return Ok(()); }
    Err(TypeCheckError::new(format!("Member '{}.{member}' is private", class_info.name), span.clone()))
  }

  fn infer_index(&self, object: &Expression, index: &Expression, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let obj_type = self.infer_expr(object)?;
    let idx_type = self.infer_expr(index)?;
    if let Some(elem) = &obj_type.element_type {
      self.require_type_name(&idx_type, "i64", index.span())?;
      return Ok((**elem).clone());
    }
    if obj_type.name == "Map" { return Ok(TypeInfo::reference("Obj")); }
    if obj_type.name == "Vec" {
      self.require_type_name(&idx_type, "i64", index.span())?;
      return Ok(TypeInfo::reference("Obj"));
    }
    if obj_type.name == "Str" {
      self.require_type_name(&idx_type, "i64", index.span())?;
      return Ok(TypeInfo::primitive("u8"));
    }
    if let Some(class_info) = self.lookup_class_by_type_name(&obj_type.name) {
      self.require_type_name(&idx_type, "i64", index.span())?;
      return self.structural_get_result_type(class_info, span);
    }
    Err(TypeCheckError::new(format!("Type '{}' is not indexable", obj_type.name), span.clone()))
  }

  fn structural_get_result_type(&self, class_info: &ClassInfo, span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let get = class_info.methods.get("get").ok_or_else(|| TypeCheckError::new(
      format!("Type '{}' is not indexable (missing method 'get(i64)')", class_info.name), span.clone()))?;
    if get.is_static {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not indexable (method 'get' must be instance method)", class_info.name), span.clone()));
    }
    if get.params.len() != 1 {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not indexable (method 'get' must take exactly 1 argument)", class_info.name), span.clone()));
    }
    if get.params[0].name != "i64" {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not indexable (method 'get' first parameter must be i64)", class_info.name), span.clone()));
    }
    Ok(get.return_type.clone())
  }

  /// A class that can be read by index (`get(i64) -> T`) must also be
  /// writable by index (`set(i64, T) -> unit`) with `T` matching `get`'s
  /// return type before `obj[i] = v` is allowed to type-check.
  fn require_structural_set(&self, class_info: &ClassInfo, get_type: &TypeInfo, span: &SourceSpan) -> Result<(), TypeCheckError> {
    let set = class_info.methods.get("set").ok_or_else(|| TypeCheckError::new(
      format!("Type '{}' is not assignable by index (missing method 'set(i64, {})')", class_info.name, get_type.name), span.clone()))?;
    if set.is_static {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not assignable by index (method 'set' must be instance method)", class_info.name), span.clone()));
    }
    if set.params.len() != 2 {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not assignable by index (method 'set' must take exactly 2 arguments)", class_info.name), span.clone()));
    }
    if set.params[0].name != "i64" {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not assignable by index (method 'set' first parameter must be i64)", class_info.name), span.clone()));
    }
    if set.params[1].name != get_type.name {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not assignable by index (method 'set' second parameter must be '{}' to match 'get')", class_info.name, get_type.name),
        span.clone()));
    }
    if set.return_type.name != "unit" {
      return Err(TypeCheckError::new(
        format!("Type '{}' is not assignable by index (method 'set' must return 'unit')", class_info.name), span.clone()));
    }
    Ok(())
  }

  fn infer_call(&self, callee: &Expression, args: &[Expression], span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    for a in args { self.infer_expr(a)?; }

    if let Expression::Identifier { name, .. } = callee {
      if let Some(t) = self.check_builtin_constructor_call(name, args, span)? {
        return Ok(t);
      }
      if self.lookup_variable(name).is_none() {
        if let Some(sig) = self.current_class_method(name) {
          self.check_arity_and_types(&sig.params, args, span)?;
          return Ok(sig.return_type);
        }
      }
      if let Some(class_info) = self.classes.get(name) {
        return self.check_constructor_call(class_info, args, span);
      }
      if let Some(sig) = self.functions.get(name) {
        self.check_arity_and_types(&sig.params, args, span)?;
        return Ok(sig.return_type.clone());
      }
    }

    if let Expression::FieldAccess { object, name: method_name, .. } = callee {
      // Array pseudo-methods.
      if let Expression::Identifier { name: base, .. } = object.as_ref() {
        if self.lookup_variable(base).is_none() {
          if let Some(mi) = self.module_info {
            if let Some(import) = mi.imports.get(base) {
              return self.call_module_member(&import.module_path, method_name, args, span);
            }
          }
        }
      }

      let object_type = self.infer_expr(object)?;
      if let Some(elem) = object_type.element_type.clone() {
        return self.check_array_method_call(&elem, method_name, args, span);
      }

      if object_type.name == "Vec" {
        return self.check_vec_method_call(method_name, args, span);
      }

      if let Some(class_info) = self.lookup_class_by_type_name(&object_type.name) {
        let sig = class_info.methods.get(method_name).ok_or_else(|| TypeCheckError::new(
          format!("Class '{}' has no method '{method_name}'", class_info.name), span.clone()))?;
        if sig.is_static {
          return Err(TypeCheckError::new(
            format!("Static method '{}.{method_name}' must be called on the class", class_info.name), span.clone()));
        }
        self.require_member_visible(class_info, method_name, false, span)?;
        self.check_arity_and_types(&sig.params, args, span)?;
        return Ok(sig.return_type.clone());
      }
      return Err(TypeCheckError::new(format!("Type '{}' has no callable members", object_type.name), span.clone()));
    }

    Err(TypeCheckError::new("Expression is not callable", span.clone()))
  }

  fn call_module_member(&self, module_path: &ModulePath, member: &str, args: &[Expression], span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let program = self.program.expect("module access implies a whole-program check");
    let target = &program.modules[module_path];
    if target.ast.classes.iter().any(|c| c.name == member) {
      if !target.exported_symbols.contains_key(member) {
        return Err(TypeCheckError::new(
          format!("Module '{}' has no exported class '{member}'", module_path.join(".")), span.clone()));
      }
      let class_info = target.ast.classes.iter().find(|c| c.name == member).unwrap();
      let expected_types: Vec<TypeInfo> = class_info.fields.iter()
        .map(|f| resolve_type_ref_bare(&f.type_ref)).collect();
      self.check_arity_and_types(&expected_types, args, span)?;
      return Ok(TypeInfo::reference(format!("{}::{member}", module_path.join("."))));
    }
    if target.ast.functions.iter().any(|f| f.name == member) {
      if !target.exported_symbols.contains_key(member) {
        return Err(TypeCheckError::new(
          format!("Module '{}' has no exported member '{member}'", module_path.join(".")), span.clone()));
      }
      let fn_decl = target.ast.functions.iter().find(|f| f.name == member).unwrap();
      let params: Vec<TypeInfo> = fn_decl.params.iter().map(|p| resolve_type_ref_bare(&p.type_ref)).collect();
      self.check_arity_and_types(&params, args, span)?;
      return Ok(resolve_type_ref_bare(&fn_decl.return_type));
    }
    Err(TypeCheckError::new(
      format!("Module '{}' has no exported member '{member}'", module_path.join(".")), span.clone()))
  }

  fn check_constructor_call(&self, class_info: &ClassInfo, args: &[Expression], span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    let expected: Vec<TypeInfo> = class_info.field_order.iter().map(|n| class_info.fields[n].clone()).collect();
    self.check_arity_and_types(&expected, args, span)?;
    Ok(TypeInfo::reference(class_info.name.clone()))
  }

  /// Recognizes calls to the builtin reference-type constructors (`Vec()`,
  /// `BoxI64(7)`, ...). Returns `None` for any other callee name so the
  /// caller falls through to user-class/function dispatch. `Map` has no
  /// constructor; it has no runtime backing anywhere in this crate.
  fn check_builtin_constructor_call(&self, name: &str, args: &[Expression], span: &SourceSpan) -> Result<Option<TypeInfo>, TypeCheckError> {
    if name == "Vec" {
      if !args.is_empty() {
        return Err(TypeCheckError::new(format!("Expected 0 arguments, got {}", args.len()), span.clone()));
      }
      return Ok(Some(TypeInfo::reference("Vec")));
    }
    if let Some(expected) = boxed_value_type(name) {
      if args.len() != 1 {
        return Err(TypeCheckError::new(format!("Expected 1 arguments, got {}", args.len()), span.clone()));
      }
      let arg_type = self.infer_expr(&args[0])?;
      self.require_type_name(&arg_type, expected, args[0].span())?;
      return Ok(Some(TypeInfo::reference(name.to_string())));
    }
    Ok(None)
  }

  fn check_vec_method_call(&self, method_name: &str, args: &[Expression], span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    match method_name {
      "push" => {
        if args.len() != 1 {
          return Err(TypeCheckError::new(format!("Expected 1 arguments, got {}", args.len()), span.clone()));
        }
        let value = self.infer_expr(&args[0])?;
        self.require_assignable(&TypeInfo::reference("Obj"), &value, args[0].span())?;
        Ok(TypeInfo::primitive("unit"))
      }
      "len" => {
        if !args.is_empty() {
          return Err(TypeCheckError::new(format!("Expected 0 arguments, got {}", args.len()), span.clone()));
        }
        Ok(TypeInfo::primitive("u64"))
      }
      "get" => {
        if args.len() != 1 {
          return Err(TypeCheckError::new(format!("Expected 1 arguments, got {}", args.len()), span.clone()));
        }
        let idx = self.infer_expr(&args[0])?;
        self.require_type_name(&idx, "i64", args[0].span())?;
        Ok(TypeInfo::reference("Obj"))
      }
      "set" => {
        if args.len() != 2 {
          return Err(TypeCheckError::new(format!("Expected 2 arguments, got {}", args.len()), span.clone()));
        }
        let idx = self.infer_expr(&args[0])?;
        self.require_type_name(&idx, "i64", args[0].span())?;
        let value = self.infer_expr(&args[1])?;
        self.require_assignable(&TypeInfo::reference("Obj"), &value, args[1].span())?;
        Ok(TypeInfo::primitive("unit"))
      }
      _ => Err(TypeCheckError::new(format!("Type 'Vec' has no method '{method_name}'"), span.clone())),
    }
  }

  fn check_arity_and_types(&self, params: &[TypeInfo], args: &[Expression], span: &SourceSpan) -> Result<(), TypeCheckError> {
    if params.len() != args.len() {
      return Err(TypeCheckError::new(format!("Expected {} arguments, got {}", params.len(), args.len()), span.clone()));
    }
    for (param_type, arg) in params.iter().zip(args) {
      let arg_type = self.infer_expr(arg)?;
      self.require_assignable(param_type, &arg_type, arg.span())?;
    }
    Ok(())
  }

  fn check_array_method_call(&self, elem: &TypeInfo, method_name: &str, args: &[Expression], span: &SourceSpan) -> Result<TypeInfo, TypeCheckError> {
    match method_name {
      "len" => {
        if !args.is_empty() {
          return Err(TypeCheckError::new(format!("Expected 0 arguments, got {}", args.len()), span.clone()));
        }
        Ok(TypeInfo::primitive("u64"))
      }
      "get" => {
        if args.len() != 1 {
          return Err(TypeCheckError::new(format!("Expected 1 arguments, got {}", args.len()), span.clone()));
        }
        let idx = self.infer_expr(&args[0])?;
        self.require_type_name(&idx, "i64", args[0].span())?;
        Ok(elem.clone())
      }
      "set" => {
        if args.len() != 2 {
          return Err(TypeCheckError::new(format!("Expected 2 arguments, got {}", args.len()), span.clone()));
        }
        let idx = self.infer_expr(&args[0])?;
        self.require_type_name(&idx, "i64", args[0].span())?;
        let value = self.infer_expr(&args[1])?;
        self.require_assignable(elem, &value, args[1].span())?;
        Ok(TypeInfo::primitive("unit"))
      }
      "slice" => {
        if args.len() != 2 {
          return Err(TypeCheckError::new(format!("Expected 2 arguments, got {}", args.len()), span.clone()));
        }
        for a in args {
          let t = self.infer_expr(a)?;
          self.require_type_name(&t, "i64", a.span())?;
        }
        Ok(TypeInfo::array(elem.clone()))
      }
      _ => Err(TypeCheckError::new(format!("Array type '{}[]' has no method '{method_name}'", elem.name), span.clone())),
    }
  }
}

fn block_guarantees_return(block: &BlockStmt) -> bool {
  block.statements.iter().any(statement_guarantees_return)
}

fn statement_guarantees_return(stmt: &Statement) -> bool {
  match stmt {
    Statement::Return { .. } => true,
    Statement::Block(b) => block_guarantees_return(b),
    Statement::If(s) => match &s.else_branch {
      ElseBranch::None => false,
      ElseBranch::Block(b) => block_guarantees_return(&s.then_branch) && block_guarantees_return(b),
      ElseBranch::If(i) => block_guarantees_return(&s.then_branch) && statement_guarantees_return(&Statement::If((**i).clone())),
    },
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;
  use crate::parser::parse;

  fn check_src(src: &str) -> Result<(), TypeCheckError> {
    let module = parse(lex(src, "<t>").unwrap()).unwrap();
    typecheck(&module)
  }

  #[test]
  fn simple_function_typechecks() {
    check_src("fn main() -> i64 { var x: i64 = 1; return x; }").unwrap();
  }

  #[test]
  fn mismatched_operand_types_rejected() {
    let err = check_src("fn main() -> i64 { var x: i64 = 1; var y: u64 = 1u; return x + y; }").unwrap_err();
    assert_eq!(err.message, "Operator '+' requires matching operand types");
  }

  #[test]
  fn non_unit_must_return_on_all_paths() {
    let err = check_src("fn f(x: i64) -> i64 { if x > 0 { return 1; } }").unwrap_err();
    assert_eq!(err.message, "Non-unit function must return on all paths");
  }

  #[test]
  fn if_else_both_return_is_ok() {
    check_src("fn f(x: i64) -> i64 { if x > 0 { return 1; } else { return 0; } }").unwrap();
  }

  #[test]
  fn break_outside_loop_rejected() {
    let err = check_src("fn main() -> unit { break; }").unwrap_err();
    assert_eq!(err.message, "'break' is only allowed inside while loops");
  }

  #[test]
  fn i64_literal_boundary() {
    check_src("fn f() -> i64 { return 9223372036854775807; }").unwrap();
    let err = check_src("fn f() -> i64 { return 9223372036854775808; }").unwrap_err();
    assert!(err.message.contains("i64 literal out of range"));
  }

  #[test]
  fn i64_min_via_unary_neg_accepted() {
    check_src("fn f() -> i64 { return -9223372036854775808; }").unwrap();
  }

  #[test]
  fn u8_literal_boundary() {
    check_src("fn f() -> u8 { return 255u8; }").unwrap();
    let err = check_src("fn f() -> u8 { return 256u8; }").unwrap_err();
    assert!(err.message.contains("u8 literal out of range"));
  }

  #[test]
  fn array_ctor_and_index() {
    check_src("fn f() -> i64 { var a: i64[] = i64[](3u); return a[0]; }").unwrap();
  }

  #[test]
  fn class_field_and_constructor() {
    check_src("class Box { value: i64; } fn f() -> i64 { var b: Box = Box(5); return b.value; }").unwrap();
  }

  #[test]
  fn private_field_not_accessible_outside_class() {
    let err = check_src("class Box { private value: i64; } fn f() -> i64 { var b: Box = Box(5); return b.value; }").unwrap_err();
    assert!(err.message.contains("is private"));
  }

  #[test]
  fn static_method_cannot_be_called_on_instance() {
    let err = check_src(
      "class Counter { n: i64; static fn make() -> Counter { return Counter(0); } }\n\
       fn f() -> unit { var c: Counter = Counter(0); c.make(); }"
    ).unwrap_err();
    assert!(err.message.contains("must be called on the class"));
  }

  #[test]
  fn structural_index_assign_requires_matching_set() {
    let err = check_src(
      "class Ring { n: i64; fn get(i: i64) -> i64 { return i; } }\n\
       fn f() -> unit { var r: Ring = Ring(0); r[0] = 1; }"
    ).unwrap_err();
    assert!(err.message.contains("missing method 'set"));
  }

  #[test]
  fn structural_index_assign_rejects_mismatched_set_type() {
    let err = check_src(
      "class Ring { n: i64; fn get(i: i64) -> i64 { return i; } fn set(i: i64, v: bool) -> unit { } }\n\
       fn f() -> unit { var r: Ring = Ring(0); r[0] = 1; }"
    ).unwrap_err();
    assert!(err.message.contains("second parameter must be 'i64' to match 'get'"));
  }

  #[test]
  fn structural_index_assign_with_matching_get_set_accepted() {
    check_src(
      "class Ring { n: i64; fn get(i: i64) -> i64 { return i; } fn set(i: i64, v: i64) -> unit { } }\n\
       fn f() -> unit { var r: Ring = Ring(0); r[0] = 1; }"
    ).unwrap();
  }
}
