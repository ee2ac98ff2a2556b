//! x86-64 code generator: lowers a linked module to GNU-assembler,
//! Intel-syntax text for a SysV-ABI host. Targets correctness over
//! efficiency — everything lives on the stack, there is no register
//! allocator, and every `rt_*` call is wrapped in a GC safepoint.

pub mod model;
pub mod runtime;
pub mod strings;

use std::collections::HashMap;

use crate::ast::*;
use crate::span::SourceSpan;

use model::*;
use runtime::RUNTIME_SYMBOLS;
use strings::{decode_char_literal, decode_string_literal, StringTable};

/// Lowers a fully linked, type-checked, reachability-pruned module to
/// assembly text ready to hand to an assembler/linker.
pub fn emit_asm(module: &ModuleAst) -> String {
  let mut emitter = ModuleEmitter::new(module);
  emitter.emit_module()
}

struct ClassMeta {
  layout: ConstructorLayout,
  field_types: HashMap<String, String>,
  field_order: Vec<String>,
}

struct ModuleEmitter<'a> {
  module: &'a ModuleAst,
  classes: HashMap<String, ClassMeta>,
  function_return_types: HashMap<String, String>,
  function_param_types: HashMap<String, Vec<String>>,
  method_return_types: HashMap<(String, String), String>,
  method_param_types: HashMap<(String, String), Vec<String>>,
  method_is_static: HashMap<(String, String), bool>,
  strings: StringTable,
  labels: LabelCounter,
  text: String,
  rodata: String,
  /// Epilogue label for the function/method/constructor currently being
  /// lowered; `Return` statements jump here rather than emitting the
  /// pop-roots/trace-pop/ret sequence inline, so it appears exactly once.
  current_epilogue: String,
}

impl<'a> ModuleEmitter<'a> {
  fn new(module: &'a ModuleAst) -> Self {
    let mut classes = HashMap::new();
    let mut method_return_types = HashMap::new();
    let mut method_param_types = HashMap::new();
    let mut method_is_static = HashMap::new();

    for c in &module.classes {
      let field_order: Vec<String> = c.fields.iter().map(|f| f.name.clone()).collect();
      let field_types: HashMap<String, String> =
        c.fields.iter().map(|f| (f.name.clone(), f.type_ref.display_name())).collect();
      let layout = ConstructorLayout::build(&c.name, &field_order);
      for m in &c.methods {
        let key = (c.name.clone(), m.name.clone());
        method_return_types.insert(key.clone(), m.return_type.display_name());
        method_param_types.insert(key.clone(), m.params.iter().map(|p| p.type_ref.display_name()).collect());
        method_is_static.insert(key, m.is_static);
      }
      classes.insert(c.name.clone(), ClassMeta { layout, field_types, field_order });
    }

    let function_return_types: HashMap<String, String> =
      module.functions.iter().map(|f| (f.name.clone(), f.return_type.display_name())).collect();
    let function_param_types: HashMap<String, Vec<String>> = module.functions.iter()
      .map(|f| (f.name.clone(), f.params.iter().map(|p| p.type_ref.display_name()).collect())).collect();

    Self {
      module,
      classes,
      function_return_types,
      function_param_types,
      method_return_types,
      method_param_types,
      method_is_static,
      strings: StringTable::new(),
      labels: LabelCounter::default(),
      text: String::new(),
      rodata: String::new(),
      current_epilogue: String::new(),
    }
  }

  fn w(&mut self, line: impl AsRef<str>) {
    self.text.push_str("  ");
    self.text.push_str(line.as_ref());
    self.text.push('\n');
  }

  fn label(&mut self, name: impl AsRef<str>) {
    self.text.push_str(name.as_ref());
    self.text.push_str(":\n");
  }

  fn emit_module(&mut self) -> String {
    self.text.push_str("  .intel_syntax noprefix\n");
    for sym in RUNTIME_SYMBOLS { self.text.push_str(&format!("  .extern {sym}\n")); }
    self.text.push_str("  .text\n");

    let functions = self.module.functions.clone();
    for f in &functions {
      if f.is_extern { continue; }
      self.emit_function(f);
    }
    let classes = self.module.classes.clone();
    for c in &classes {
      self.emit_constructor(c);
      for m in &c.methods { self.emit_method(c, m); }
    }

    self.emit_type_metadata_section();
    let strings_rodata = self.strings.emit_rodata();
    self.text.push_str(".section .note.GNU-stack,\"\",@progbits\n");
    format!("{}{}{}", strings_rodata, self.rodata, self.text)
  }

  /// Every class name reachable through a reference cast or constructor
  /// call gets a type descriptor; built-in boxed types reuse fixed
  /// runtime symbols instead.
  fn emit_type_metadata_section(&mut self) {
    let class_names: Vec<String> = self.classes.keys().cloned().collect();
    if class_names.is_empty() { return; }
    let mut names = class_names;
    names.sort();
    for name in &names {
      let name_sym = mangle_type_name_symbol(name);
      let type_sym = mangle_type_symbol(name);
      self.rodata.push_str(&format!("{name_sym}:\n  .asciz \"{name}\"\n"));
      self.rodata.push_str(".data\n");
      self.rodata.push_str("  .p2align 3\n");
      self.rodata.push_str(&format!("{type_sym}:\n"));
      self.rodata.push_str("  .long 0\n  .long 0\n  .long 1\n  .long 8\n  .quad 0\n");
      self.rodata.push_str(&format!("  .quad {name_sym}\n"));
      self.rodata.push_str("  .quad 0\n  .quad 0\n");
      self.rodata.push_str(".section .rodata\n");
    }
  }

  // -- type inference over already-checked code -------------------------

  fn is_reference(&self, type_name: &str) -> bool { is_reference_type_name(type_name) }

  fn array_elem_of(&self, type_name: &str) -> Option<String> {
    type_name.strip_suffix("[]").map(|s| s.to_string())
  }

  fn static_type(&self, expr: &Expression, locals: &HashMap<String, String>, class_name: Option<&str>) -> String {
    match expr {
      Expression::Identifier { name, .. } => {
        if let Some(t) = locals.get(name) { return t.clone(); }
        if let Some(cn) = class_name {
          if let Some(meta) = self.classes.get(cn) {
            if let Some(t) = meta.field_types.get(name) { return t.clone(); }
          }
        }
        "i64".to_string()
      }
      Expression::Literal { text, .. } => {
        if text.starts_with('"') { "Str".to_string() }
        else if text.starts_with('\'') { "u8".to_string() }
        else if text == "true" || text == "false" { "bool".to_string() }
        else if text.contains('.') { "double".to_string() }
        else if text.ends_with("u8") { "u8".to_string() }
        else if text.ends_with('u') { "u64".to_string() }
        else { "i64".to_string() }
      }
      Expression::Null { .. } => "Obj".to_string(),
      Expression::Unary { operand, .. } => self.static_type(operand, locals, class_name),
      Expression::Binary { op, left, .. } => match op {
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte
        | BinaryOp::EqEq | BinaryOp::Neq | BinaryOp::And | BinaryOp::Or => "bool".to_string(),
        _ => self.static_type(left, locals, class_name),
      },
      Expression::Cast { type_ref, .. } => type_ref.display_name(),
      Expression::ArrayCtor { element_type, .. } => format!("{}[]", element_type.display_name()),
      Expression::Index { object, .. } => {
        let obj_t = self.static_type(object, locals, class_name);
        if let Some(elem) = self.array_elem_of(&obj_t) { return elem; }
        if obj_t == "Str" { return "u8".to_string(); }
        if obj_t == "Vec" { return "Obj".to_string(); }
        if let Some(meta) = self.classes.get(&obj_t) {
          if let Some(get_t) = self.method_return_types.get(&(obj_t.clone(), "get".to_string())) {
            let _ = meta;
            return get_t.clone();
          }
        }
        "Obj".to_string()
      }
      Expression::FieldAccess { object, name, .. } => {
        let obj_t = self.static_type(object, locals, class_name);
        if name == "value" {
          match obj_t.as_str() {
            "BoxI64" => return "i64".to_string(),
            "BoxU64" => return "u64".to_string(),
            "BoxU8" => return "u8".to_string(),
            "BoxBool" => return "bool".to_string(),
            "BoxDouble" => return "double".to_string(),
            _ => {}
          }
        }
        if let Some(meta) = self.classes.get(&obj_t) {
          if let Some(t) = meta.field_types.get(name) { return t.clone(); }
          if let Some(t) = self.method_return_types.get(&(obj_t.clone(), name.clone())) { return t.clone(); }
        }
        "Obj".to_string()
      }
      Expression::Call { callee, .. } => match callee.as_ref() {
        Expression::Identifier { name, .. } => {
          if builtin_constructor_runtime_call(name).is_some() { return name.clone(); }
          if let Some(t) = self.function_return_types.get(name) { return t.clone(); }
          if let Some(cn) = class_name {
            if let Some(t) = self.method_return_types.get(&(cn.to_string(), name.clone())) { return t.clone(); }
          }
          if self.classes.contains_key(name) { return name.clone(); }
          "unit".to_string()
        }
        Expression::FieldAccess { object, name, .. } => {
          if let Expression::Identifier { name: base, .. } = object.as_ref() {
            let is_receiver = locals.contains_key(base)
              || class_name.is_some_and(|cn| self.classes.get(cn).is_some_and(|m| m.field_types.contains_key(base)))
              || self.classes.contains_key(base);
            if !is_receiver {
              if let Some(t) = self.function_return_types.get(name) { return t.clone(); }
            }
          }
          let obj_t = self.static_type(object, locals, class_name);
          if let Some(elem) = self.array_elem_of(&obj_t) {
            return match name.as_str() {
              "len" => "u64".to_string(),
              "get" => elem,
              "set" => "unit".to_string(),
              "slice" => format!("{elem}[]"),
              _ => "unit".to_string(),
            };
          }
          if obj_t == "Vec" {
            return match name.as_str() {
              "len" => "u64".to_string(),
              "get" => "Obj".to_string(),
              "push" | "set" => "unit".to_string(),
              _ => "unit".to_string(),
            };
          }
          self.method_return_types.get(&(obj_t, name.clone())).cloned().unwrap_or_else(|| "unit".to_string())
        }
        _ => "unit".to_string(),
      },
    }
  }

  // -- declaration-site local collection ---------------------------------

  /// Params keep source order ahead of locals; the locals discovered by
  /// walking the body are sorted alphabetically so layout doesn't depend
  /// on declaration order within the function.
  fn collect_locals_block(&self, block: &BlockStmt, params: &[(String, String)], class_name: Option<&str>) -> Vec<(String, String)> {
    let mut types: HashMap<String, String> = params.iter().cloned().collect();
    let mut discovered: Vec<(String, String)> = Vec::new();
    self.collect_locals_stmts(&block.statements, &mut discovered, &mut types, class_name);
    discovered.sort_by(|a, b| a.0.cmp(&b.0));
    let mut locals: Vec<(String, String)> = params.to_vec();
    locals.extend(discovered);
    locals
  }

  fn collect_locals_stmts(&self, stmts: &[Statement], locals: &mut Vec<(String, String)>, types: &mut HashMap<String, String>, class_name: Option<&str>) {
    for stmt in stmts {
      match stmt {
        Statement::VarDecl { name, type_ref, .. } => {
          let t = type_ref.display_name();
          locals.push((name.clone(), t.clone()));
          types.insert(name.clone(), t);
        }
        Statement::Block(b) => self.collect_locals_stmts(&b.statements, locals, types, class_name),
        Statement::If(s) => {
          self.collect_locals_stmts(&s.then_branch.statements, locals, types, class_name);
          match &s.else_branch {
            ElseBranch::Block(b) => self.collect_locals_stmts(&b.statements, locals, types, class_name),
            ElseBranch::If(i) => self.collect_locals_stmts(std::slice::from_ref(&Statement::If((**i).clone())), locals, types, class_name),
            ElseBranch::None => {}
          }
        }
        Statement::While(w) => self.collect_locals_stmts(&w.body.statements, locals, types, class_name),
        _ => {}
      }
    }
  }

  // -- call-site scan for root-frame ABI gating ---------------------------

  /// Whether any statement in the body contains an expression that will
  /// lower to a rooted runtime call (one where `runtime_ref_arg_indices`
  /// is non-empty) needing a scratch temp root slot. Functions with no
  /// such call and no reference-typed locals skip the root-frame ABI
  /// entirely, per `FunctionLayout::build`'s `needs_temp_roots` gate.
  fn needs_temp_roots_block(&self, block: &BlockStmt, locals: &HashMap<String, String>, class_ctx: Option<&str>) -> bool {
    self.needs_temp_roots_stmts(&block.statements, locals, class_ctx)
  }

  fn needs_temp_roots_stmts(&self, stmts: &[Statement], locals: &HashMap<String, String>, class_ctx: Option<&str>) -> bool {
    stmts.iter().any(|s| self.needs_temp_roots_stmt(s, locals, class_ctx))
  }

  fn needs_temp_roots_stmt(&self, stmt: &Statement, locals: &HashMap<String, String>, class_ctx: Option<&str>) -> bool {
    match stmt {
      Statement::Block(b) => self.needs_temp_roots_stmts(&b.statements, locals, class_ctx),
      Statement::VarDecl { init, .. } => init.as_ref().is_some_and(|e| self.needs_temp_roots_expr(e, locals, class_ctx)),
      Statement::Assign { target, value, .. } =>
        self.needs_temp_roots_expr(value, locals, class_ctx) || self.assign_target_needs_temp_roots(target, locals, class_ctx),
      Statement::ExprStmt { expr, .. } => self.needs_temp_roots_expr(expr, locals, class_ctx),
      Statement::Return { value, .. } => value.as_ref().is_some_and(|e| self.needs_temp_roots_expr(e, locals, class_ctx)),
      Statement::If(s) => {
        self.needs_temp_roots_expr(&s.condition, locals, class_ctx)
          || self.needs_temp_roots_stmts(&s.then_branch.statements, locals, class_ctx)
          || match &s.else_branch {
            ElseBranch::Block(b) => self.needs_temp_roots_stmts(&b.statements, locals, class_ctx),
            ElseBranch::If(i) => self.needs_temp_roots_stmt(&Statement::If((**i).clone()), locals, class_ctx),
            ElseBranch::None => false,
          }
      }
      Statement::While(w) =>
        self.needs_temp_roots_expr(&w.condition, locals, class_ctx)
          || self.needs_temp_roots_stmts(&w.body.statements, locals, class_ctx),
      Statement::Break { .. } | Statement::Continue { .. } => false,
    }
  }

  fn assign_target_needs_temp_roots(&self, target: &Expression, locals: &HashMap<String, String>, class_ctx: Option<&str>) -> bool {
    match target {
      Expression::Index { object, .. } => {
        let obj_t = self.static_type(object, locals, class_ctx);
        self.array_elem_of(&obj_t).is_some()
      }
      Expression::FieldAccess { object, .. } => self.needs_temp_roots_expr(object, locals, class_ctx),
      _ => false,
    }
  }

  fn needs_temp_roots_expr(&self, expr: &Expression, locals: &HashMap<String, String>, class_ctx: Option<&str>) -> bool {
    match expr {
      Expression::Literal { .. } | Expression::Null { .. } | Expression::Identifier { .. } => false,
      Expression::Unary { operand, .. } => self.needs_temp_roots_expr(operand, locals, class_ctx),
      Expression::Binary { left, right, .. } =>
        self.needs_temp_roots_expr(left, locals, class_ctx) || self.needs_temp_roots_expr(right, locals, class_ctx),
      Expression::Cast { type_ref, operand, .. } => {
        let source_type = self.static_type(operand, locals, class_ctx);
        let target_type = type_ref.display_name();
        (source_type == "Obj" && is_reference_type_name(&target_type))
          || self.needs_temp_roots_expr(operand, locals, class_ctx)
      }
      Expression::FieldAccess { object, name, .. } => {
        let obj_t = self.static_type(object, locals, class_ctx);
        (name == "value" && builtin_box_get_runtime_call(&obj_t).is_some())
          || self.needs_temp_roots_expr(object, locals, class_ctx)
      }
      Expression::Index { object, index, .. } => {
        let obj_t = self.static_type(object, locals, class_ctx);
        (self.array_elem_of(&obj_t).is_some() || obj_t == "Str" || obj_t == "Vec")
          || self.needs_temp_roots_expr(object, locals, class_ctx)
          || self.needs_temp_roots_expr(index, locals, class_ctx)
      }
      Expression::ArrayCtor { length, .. } => self.needs_temp_roots_expr(length, locals, class_ctx),
      Expression::Call { callee, args, .. } => {
        let this_needs = match callee.as_ref() {
          Expression::Identifier { .. } => false,
          Expression::FieldAccess { object, name, .. } => {
            let obj_t = self.static_type(object, locals, class_ctx);
            if self.array_elem_of(&obj_t).is_some() {
              matches!(name.as_str(), "len" | "get" | "set" | "slice")
            } else {
              obj_t == "Vec" && matches!(name.as_str(), "push" | "len" | "get" | "set")
            }
          }
          _ => false,
        };
        this_needs
          || self.needs_temp_roots_expr(callee, locals, class_ctx)
          || args.iter().any(|a| self.needs_temp_roots_expr(a, locals, class_ctx))
      }
    }
  }

  // -- functions / methods / constructors --------------------------------

  fn emit_function(&mut self, f: &FunctionDecl) {
    let params: Vec<(String, String)> =
      f.params.iter().map(|p| (p.name.clone(), p.type_ref.display_name())).collect();
    let body = f.body.as_ref().expect("non-extern function always has a body");
    let locals = self.collect_locals_block(body, &params, None);
    let types: HashMap<String, String> = locals.iter().cloned().collect();
    let needs_temp_roots = self.needs_temp_roots_block(body, &types, None);
    let layout = FunctionLayout::build(&locals, needs_temp_roots);
    let symbol = function_label(&f.name);
    let global = f.is_export || f.name == "main";

    self.emit_prologue(&symbol, &symbol, &layout, &params, global, &f.span);
    self.emit_block(body, &layout, &types, None, &f.return_type.display_name());
    self.emit_epilogue(&layout, &f.return_type.display_name());
  }

  fn emit_method(&mut self, c: &ClassDecl, m: &MethodDecl) {
    let mut params: Vec<(String, String)> = Vec::new();
    if !m.is_static { params.push(("__recv".to_string(), c.name.clone())); }
    params.extend(m.params.iter().map(|p| (p.name.clone(), p.type_ref.display_name())));

    let locals = self.collect_locals_block(&m.body, &params, Some(&c.name));
    let types: HashMap<String, String> = locals.iter().cloned().collect();
    let class_ctx = if m.is_static { None } else { Some(c.name.as_str()) };
    let needs_temp_roots = self.needs_temp_roots_block(&m.body, &types, class_ctx);
    let layout = FunctionLayout::build(&locals, needs_temp_roots);
    let symbol = mangle_method_symbol(&c.name, &m.name);

    self.emit_prologue(&symbol, &format!("{}.{}", c.name, m.name), &layout, &params, false, &m.span);
    self.emit_block(&m.body, &layout, &types, class_ctx, &m.return_type.display_name());
    self.emit_epilogue(&layout, &m.return_type.display_name());
  }

  fn emit_constructor(&mut self, c: &ClassDecl) {
    let layout = self.classes[&c.name].layout.clone();
    let field_order = self.classes[&c.name].field_order.clone();
    let symbol = layout.label.clone();
    let epilogue = format!(".L{symbol}_epilogue");
    self.current_epilogue = epilogue.clone();

    self.label(&symbol);
    self.w("push rbp");
    self.w("mov rbp, rsp");
    let arg_count = field_order.len();
    let spill_bytes = ((arg_count as i32) * 8 + 15) & !15;
    if spill_bytes > 0 { self.w(format!("sub rsp, {spill_bytes}")); }
    for (i, _) in field_order.iter().enumerate().take(6) {
      self.w(format!("mov [rbp - {}], {}", (i as i32 + 1) * 8, PARAM_REGISTERS[i]));
    }

    let before = self.rt_safepoint_before_label();
    self.label(&before);
    self.w("call rt_thread_state");
    self.w("mov rdi, rax");
    self.w(format!("lea rsi, [rip + {}]", layout.type_symbol));
    self.w(format!("mov rdx, {}", layout.payload_bytes));
    self.w("call rt_alloc_obj");
    let after = self.rt_safepoint_after_label();
    self.label(&after);
    self.w("mov rbx, rax");
    for (i, field_name) in field_order.iter().enumerate() {
      let offset = layout.field_offsets[field_name];
      self.w(format!("mov rax, [rbp - {}]", (i as i32 + 1) * 8));
      self.w(format!("mov [rbx + {offset}], rax"));
    }
    self.w("mov rax, rbx");
    self.w(format!("jmp {epilogue}"));
    self.label(&epilogue);
    self.w("mov rsp, rbp");
    self.w("pop rbp");
    self.w("ret");
  }

  fn rt_safepoint_before_label(&mut self) -> String { self.labels.next("rt_safepoint_before") }
  fn rt_safepoint_after_label(&mut self) -> String { self.labels.next("rt_safepoint_after") }

  /// Safepoint "before" marker, `rt_trace_set_location`, and (if the
  /// enclosing function has any reference-typed roots) a re-spill of
  /// every named root to its slot. Must run before the call's own
  /// argument registers are loaded, since it clobbers `rdi/rsi/rdx`.
  fn rt_call_before(&mut self, span: &SourceSpan, layout: &FunctionLayout) {
    let before = self.rt_safepoint_before_label();
    self.label(&before);
    self.w(format!("mov edi, {}", span.start.line));
    self.w(format!("mov esi, {}", span.start.column));
    self.w("call rt_trace_set_location");
    self.emit_root_slot_updates(layout);
  }

  fn rt_call_after(&mut self) {
    let after = self.rt_safepoint_after_label();
    self.label(&after);
  }

  /// Emits a fully rooted call to an `rt_*` function: evaluates each
  /// operand (pushing its value), spills any reference-typed positional
  /// argument (per `runtime_ref_arg_indices`) to a scratch temp root slot
  /// so it survives a collection triggered by the call itself, pops the
  /// operands into the correct argument registers, performs the call
  /// under a safepoint, then clears the temp slots it used back to 0.
  fn emit_runtime_call(
    &mut self,
    call: &str,
    operand_exprs: &[&Expression],
    span: &SourceSpan,
    layout: &FunctionLayout,
    locals: &HashMap<String, String>,
    class_ctx: Option<&str>,
  ) {
    for e in operand_exprs {
      self.emit_expr(e, layout, locals, class_ctx);
      self.w("push rax");
    }

    let ref_indices = runtime_ref_arg_indices(call);
    let mut temp_offsets_used: Vec<i32> = Vec::new();
    if !ref_indices.is_empty() {
      for (slot_i, &arg_i) in ref_indices.iter().enumerate() {
        if slot_i >= layout.temp_root_slot_offsets.len() || arg_i >= operand_exprs.len() { continue; }
        let depth_from_top = operand_exprs.len() - 1 - arg_i;
        let temp_offset = layout.temp_root_slot_offsets[slot_i];
        self.w(format!("mov rax, [rsp + {}]", depth_from_top * 8));
        self.w(format!("mov {}, rax", slot_operand(temp_offset)));
        temp_offsets_used.push(temp_offset);
      }
    }

    self.rt_call_before(span, layout);
    for (slot_i, &temp_offset) in temp_offsets_used.iter().enumerate() {
      self.w(format!("lea rdi, [rbp - {}]", -layout.root_frame_offset));
      self.w(format!("mov esi, {}", layout.temp_root_slot_start_index + slot_i));
      self.w(format!("mov rdx, {}", slot_operand(temp_offset)));
      self.w("call rt_root_slot_store");
    }

    for i in (0..operand_exprs.len()).rev() {
      if i < PARAM_REGISTERS.len() { self.w(format!("pop {}", PARAM_REGISTERS[i])); }
    }
    self.w(format!("call {call}"));
    self.rt_call_after();

    for &temp_offset in &temp_offsets_used {
      self.w(format!("mov {}, 0", slot_operand(temp_offset)));
    }
  }

  fn emit_prologue(&mut self, symbol: &str, debug_name: &str, layout: &FunctionLayout, params: &[(String, String)], global: bool, span: &SourceSpan) {
    let epilogue = format!(".L{}_epilogue", symbol.replace(['.', ':'], "_"));
    self.current_epilogue = epilogue;

    let safe = debug_name.replace(['.', ':'], "_");
    let fn_debug_label = format!("__nif_dbg_fn_{safe}");
    let file_debug_label = format!("__nif_dbg_file_{safe}");
    self.rodata.push_str(&format!(
      "{fn_debug_label}:\n  .asciz \"{debug_name}\"\n{file_debug_label}:\n  .asciz \"{}\"\n",
      span.start.path.replace('\\', "\\\\").replace('"', "\\\"")
    ));

    if global { self.text.push_str(&format!(".globl {symbol}\n")); }
    self.label(symbol);
    self.w("push rbp");
    self.w("mov rbp, rsp");
    if layout.stack_size > 0 { self.w(format!("sub rsp, {}", layout.stack_size)); }

    for name in &layout.slot_names { self.w(format!("mov {}, 0", slot_operand(layout.slot_offsets[name]))); }
    for name in &layout.root_slot_names { self.w(format!("mov {}, 0", slot_operand(layout.root_slot_offsets[name]))); }
    for offset in &layout.temp_root_slot_offsets { self.w(format!("mov {}, 0", slot_operand(*offset))); }

    let mut int_idx = 0usize;
    let mut float_idx = 0usize;
    for (name, type_name) in params {
      let offset = layout.slot_offsets[name];
      if type_name == "double" {
        self.w(format!("movsd {}, {}", slot_operand(offset), FLOAT_PARAM_REGISTERS[float_idx]));
        float_idx += 1;
      } else {
        self.w(format!("mov {}, {}", slot_operand(offset), PARAM_REGISTERS[int_idx]));
        int_idx += 1;
      }
    }

    self.w(format!("lea rdi, [rip + {fn_debug_label}]"));
    self.w(format!("lea rsi, [rip + {file_debug_label}]"));
    self.w(format!("mov edx, {}", span.start.line));
    self.w(format!("mov ecx, {}", span.start.column));
    self.w("call rt_trace_push");

    if layout.root_slot_count > 0 {
      let first_root_offset = layout.root_slot_names.first()
        .map(|n| layout.root_slot_offsets[n])
        .unwrap_or(layout.temp_root_slot_offsets[0]);
      self.w("call rt_thread_state");
      self.w(format!("mov {}, rax", slot_operand(layout.thread_state_offset)));
      self.w(format!("lea rdi, [rbp - {}]", -layout.root_frame_offset));
      self.w(format!("lea rsi, [rbp - {}]", -first_root_offset));
      self.w(format!("mov edx, {}", layout.root_slot_count));
      self.w("call rt_root_frame_init");
      self.w(format!("mov rdi, {}", slot_operand(layout.thread_state_offset)));
      self.w(format!("lea rsi, [rbp - {}]", -layout.root_frame_offset));
      self.w("call rt_push_roots");
    }
  }

  /// Re-spills every named reference-typed local to its root slot. Called
  /// immediately before any runtime call so the shadow-stack walker sees
  /// a consistent view if that call triggers a collection.
  fn emit_root_slot_updates(&mut self, layout: &FunctionLayout) {
    if layout.root_slot_names.is_empty() { return; }
    for name in &layout.root_slot_names {
      let value_offset = layout.slot_offsets[name];
      let slot_index = layout.root_slot_indices[name];
      self.w(format!("lea rdi, [rbp - {}]", -layout.root_frame_offset));
      self.w(format!("mov rdx, {}", slot_operand(value_offset)));
      self.w(format!("mov esi, {slot_index}"));
      self.w("call rt_root_slot_store");
    }
  }

  /// Falls through here only for functions whose body has no explicit
  /// `return` on every path, i.e. `unit`-returning functions (the checker
  /// rejects a missing return for any other return type). Also the
  /// landing point every explicit `return` jumps to, so the shadow-stack
  /// pop happens exactly once per function.
  fn emit_epilogue(&mut self, layout: &FunctionLayout, return_type: &str) {
    self.label(&self.current_epilogue.clone());
    if return_type == "unit" { self.w("mov rax, 0"); }
    if return_type == "double" {
      self.w("sub rsp, 8");
      self.w("movq qword ptr [rsp], xmm0");
    } else {
      self.w("push rax");
    }
    if layout.root_slot_count > 0 {
      self.w(format!("mov rdi, {}", slot_operand(layout.thread_state_offset)));
      self.w("call rt_pop_roots");
    }
    self.w("call rt_trace_pop");
    if return_type == "double" {
      self.w("movq xmm0, qword ptr [rsp]");
      self.w("add rsp, 8");
    } else {
      self.w("pop rax");
    }
    self.w("mov rsp, rbp");
    self.w("pop rbp");
    self.w("ret");
  }

  // -- statements ---------------------------------------------------------

  fn emit_block(&mut self, block: &BlockStmt, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>, return_type: &str) {
    self.emit_stmts(&block.statements, layout, locals, class_ctx, return_type, None);
  }

  fn emit_stmts(&mut self, stmts: &[Statement], layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>, return_type: &str, loop_labels: Option<(&str, &str)>) {
    for stmt in stmts {
      self.emit_stmt(stmt, layout, locals, class_ctx, return_type, loop_labels);
    }
  }

  fn emit_stmt(&mut self, stmt: &Statement, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>, return_type: &str, loop_labels: Option<(&str, &str)>) {
    match stmt {
      Statement::Block(b) => self.emit_stmts(&b.statements, layout, locals, class_ctx, return_type, loop_labels),
      Statement::VarDecl { name, init, .. } => {
        if let Some(e) = init {
          self.emit_expr(e, layout, locals, class_ctx);
          self.store_to_slot(name, layout, locals);
        }
      }
      Statement::Assign { target, value, .. } => {
        self.emit_expr(value, layout, locals, class_ctx);
        self.emit_store_target(target, layout, locals, class_ctx);
      }
      Statement::ExprStmt { expr, .. } => self.emit_expr(expr, layout, locals, class_ctx),
      Statement::Return { value, .. } => {
        if let Some(v) = value { self.emit_expr(v, layout, locals, class_ctx); }
        self.w(format!("jmp {}", self.current_epilogue.clone()));
      }
      Statement::If(s) => {
        let else_label = self.labels.next("else");
        let end_label = self.labels.next("endif");
        self.emit_expr(&s.condition, layout, locals, class_ctx);
        self.w("cmp rax, 0");
        self.w(format!("je {else_label}"));
        self.emit_stmts(&s.then_branch.statements, layout, locals, class_ctx, return_type, loop_labels);
        self.w(format!("jmp {end_label}"));
        self.label(&else_label);
        match &s.else_branch {
          ElseBranch::Block(b) => self.emit_stmts(&b.statements, layout, locals, class_ctx, return_type, loop_labels),
          ElseBranch::If(i) => self.emit_stmt(&Statement::If((**i).clone()), layout, locals, class_ctx, return_type, loop_labels),
          ElseBranch::None => {}
        }
        self.label(&end_label);
      }
      Statement::While(w) => {
        let start_label = self.labels.next("loop");
        let end_label = self.labels.next("loopend");
        self.label(&start_label);
        self.emit_expr(&w.condition, layout, locals, class_ctx);
        self.w("cmp rax, 0");
        self.w(format!("je {end_label}"));
        self.emit_stmts(&w.body.statements, layout, locals, class_ctx, return_type, Some((&start_label, &end_label)));
        self.w(format!("jmp {start_label}"));
        self.label(&end_label);
      }
      Statement::Break { .. } => {
        let (_, end) = loop_labels.expect("checker guarantees break is inside a loop");
        self.w(format!("jmp {end}"));
      }
      Statement::Continue { .. } => {
        let (start, _) = loop_labels.expect("checker guarantees continue is inside a loop");
        self.w(format!("jmp {start}"));
      }
    }
  }

  fn store_to_slot(&mut self, name: &str, layout: &FunctionLayout, _locals: &HashMap<String, String>) {
    let offset = layout.slot_offsets[name];
    self.w(format!("mov {}, rax", slot_operand(offset)));
  }

  fn emit_store_target(&mut self, target: &Expression, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    self.w("mov rbx, rax");
    match target {
      Expression::Identifier { name, .. } => {
        if layout.slot_offsets.contains_key(name) {
          let offset = layout.slot_offsets[name];
          self.w(format!("mov {}, rbx", slot_operand(offset)));
        } else if let Some(cn) = class_ctx {
          let field_offset = self.classes[cn].layout.field_offsets[name];
          let recv_offset = layout.slot_offsets["__recv"];
          self.w(format!("mov rcx, {}", slot_operand(recv_offset)));
          self.w(format!("mov [rcx + {field_offset}], rbx"));
        }
      }
      Expression::FieldAccess { object, name, .. } => {
        self.emit_expr(object, layout, locals, class_ctx);
        let obj_t = self.static_type(object, locals, class_ctx);
        let offset = self.classes.get(&obj_t).and_then(|m| m.layout.field_offsets.get(name).copied());
        if let Some(offset) = offset {
          self.w(format!("mov [rax + {offset}], rbx"));
        }
      }
      Expression::Index { object, index, span } => {
        let obj_t = self.static_type(object, locals, class_ctx);
        self.w("push rbx"); // value to store, saved across object/index evaluation
        self.emit_expr(object, layout, locals, class_ctx);
        self.w("push rax");
        self.emit_expr(index, layout, locals, class_ctx);
        self.w("push rax");
        if let Some(elem) = self.array_elem_of(&obj_t) {
          let call = array_set_runtime_call(array_elem_kind(&elem));
          // Stack (top to bottom): index, object, value — conceptual call
          // args are (object=0, index=1, value=2); only those two arg
          // positions the runtime table marks as reference-typed get
          // spilled to a temp root slot ahead of the safepoint.
          let arg_depths = [("object", 0u32, 8i32), ("value", 2u32, 16i32)];
          let mut temp_offsets_used: Vec<i32> = Vec::new();
          for (slot_i, &arg_i) in runtime_ref_arg_indices(&call).iter().enumerate() {
            if slot_i >= layout.temp_root_slot_offsets.len() { continue; }
            let Some(&(_, _, depth)) = arg_depths.iter().find(|(_, i, _)| *i == arg_i as u32) else { continue };
            let temp_offset = layout.temp_root_slot_offsets[slot_i];
            self.w(format!("mov rax, [rsp + {depth}]"));
            self.w(format!("mov {}, rax", slot_operand(temp_offset)));
            temp_offsets_used.push(temp_offset);
          }
          self.rt_call_before(span, layout);
          for (slot_i, &temp_offset) in temp_offsets_used.iter().enumerate() {
            self.w(format!("lea rdi, [rbp - {}]", -layout.root_frame_offset));
            self.w(format!("mov esi, {}", layout.temp_root_slot_start_index + slot_i));
            self.w(format!("mov rdx, {}", slot_operand(temp_offset)));
            self.w("call rt_root_slot_store");
          }
          self.w("pop rsi");
          self.w("pop rdi");
          self.w("pop rdx");
          self.w(format!("call {call}"));
          self.rt_call_after();
          for &temp_offset in &temp_offsets_used {
            self.w(format!("mov {}, 0", slot_operand(temp_offset)));
          }
        } else if self.classes.contains_key(&obj_t) {
          self.w("pop rsi");
          self.w("pop rdi");
          self.w("pop rdx");
          self.w(format!("call {}", mangle_method_symbol(&obj_t, "set")));
        }
      }
      _ => {}
    }
  }

  // -- expressions ----------------------------------------------------------

  fn emit_expr(&mut self, expr: &Expression, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    match expr {
      Expression::Literal { text, span } => self.emit_literal(text, span, layout),
      Expression::Null { .. } => self.w("xor rax, rax"),
      Expression::Identifier { name, .. } => self.emit_identifier_load(name, layout, class_ctx),
      Expression::Unary { op, operand, .. } => {
        self.emit_expr(operand, layout, locals, class_ctx);
        match op {
          UnaryOp::Not => { self.w("cmp rax, 0"); self.w("sete al"); self.w("movzx rax, al"); self.w("xor rax, 1"); }
          UnaryOp::Neg => self.w("neg rax"),
        }
      }
      Expression::Binary { op, left, right, .. } => self.emit_binary(*op, left, right, layout, locals, class_ctx),
      Expression::Cast { type_ref, operand, span } => self.emit_cast(type_ref, operand, span, layout, locals, class_ctx),
      Expression::FieldAccess { object, name, span } => self.emit_field_access(object, name, span, layout, locals, class_ctx),
      Expression::Index { object, index, span } => self.emit_index(object, index, span, layout, locals, class_ctx),
      Expression::ArrayCtor { element_type, length, span } => self.emit_array_ctor(element_type, length, span, layout, locals, class_ctx),
      Expression::Call { callee, args, span } => self.emit_call(callee, args, span, layout, locals, class_ctx),
    }
  }

  fn emit_literal(&mut self, text: &str, span: &SourceSpan, layout: &FunctionLayout) {
    if text.starts_with('"') {
      let bytes = decode_string_literal(text);
      let len = bytes.len();
      let label = self.strings.intern(bytes);
      self.rt_call_before(span, layout);
      self.w("call rt_thread_state");
      self.w("mov rdi, rax");
      self.w(format!("lea rsi, [rip + {label}]"));
      self.w(format!("mov rdx, {len}"));
      self.w("call rt_str_from_bytes");
      self.rt_call_after();
      return;
    }
    if text.starts_with('\'') {
      self.w(format!("mov rax, {}", decode_char_literal(text)));
      return;
    }
    if text == "true" { self.w("mov rax, 1"); return; }
    if text == "false" { self.w("mov rax, 0"); return; }
    if text.contains('.') {
      let label = self.labels.next("dbl");
      self.rodata.push_str(&format!("{label}:\n  .double {text}\n"));
      self.w(format!("movsd xmm0, [rip + {label}]"));
      return;
    }
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    self.w(format!("mov rax, {digits}"));
  }

  fn emit_identifier_load(&mut self, name: &str, layout: &FunctionLayout, class_ctx: Option<&str>) {
    if let Some(&offset) = layout.slot_offsets.get(name) {
      let type_name = &layout.slot_type_names[name];
      if type_name == "double" {
        self.w(format!("movsd xmm0, {}", slot_operand(offset)));
      } else {
        self.w(format!("mov rax, {}", slot_operand(offset)));
      }
      return;
    }
    if let Some(cn) = class_ctx {
      if let Some(meta) = self.classes.get(cn) {
        if let Some(&field_offset) = meta.layout.field_offsets.get(name) {
          let recv_offset = layout.slot_offsets["__recv"];
          self.w(format!("mov rcx, {}", slot_operand(recv_offset)));
          self.w(format!("mov rax, [rcx + {field_offset}]"));
          return;
        }
      }
    }
    self.w("xor rax, rax");
  }

  fn emit_binary(&mut self, op: BinaryOp, left: &Expression, right: &Expression, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    let operand_type = self.static_type(left, locals, class_ctx);
    if operand_type == "double" {
      self.emit_double_binary(op, left, right, layout, locals, class_ctx);
      return;
    }

    match op {
      BinaryOp::And => {
        let false_label = self.labels.next("andf");
        let end_label = self.labels.next("ande");
        self.emit_expr(left, layout, locals, class_ctx);
        self.w("cmp rax, 0");
        self.w(format!("je {false_label}"));
        self.emit_expr(right, layout, locals, class_ctx);
        self.w(format!("jmp {end_label}"));
        self.label(&false_label);
        self.w("mov rax, 0");
        self.label(&end_label);
        return;
      }
      BinaryOp::Or => {
        let true_label = self.labels.next("ort");
        let end_label = self.labels.next("ore");
        self.emit_expr(left, layout, locals, class_ctx);
        self.w("cmp rax, 0");
        self.w(format!("jne {true_label}"));
        self.emit_expr(right, layout, locals, class_ctx);
        self.w(format!("jmp {end_label}"));
        self.label(&true_label);
        self.w("mov rax, 1");
        self.label(&end_label);
        return;
      }
      _ => {}
    }

    self.emit_expr(left, layout, locals, class_ctx);
    self.w("push rax");
    self.emit_expr(right, layout, locals, class_ctx);
    self.w("mov rbx, rax");
    self.w("pop rax");
    match op {
      BinaryOp::Add => self.w("add rax, rbx"),
      BinaryOp::Sub => self.w("sub rax, rbx"),
      BinaryOp::Mul => self.w("imul rax, rbx"),
      BinaryOp::Div => { self.w("cqo"); self.w("idiv rbx"); }
      BinaryOp::Mod => { self.w("cqo"); self.w("idiv rbx"); self.w("mov rax, rdx"); }
      BinaryOp::Lt => self.emit_setcc("setl"),
      BinaryOp::Lte => self.emit_setcc("setle"),
      BinaryOp::Gt => self.emit_setcc("setg"),
      BinaryOp::Gte => self.emit_setcc("setge"),
      BinaryOp::EqEq => self.emit_setcc("sete"),
      BinaryOp::Neq => self.emit_setcc("setne"),
      BinaryOp::And | BinaryOp::Or => unreachable!("handled above with short-circuit"),
    }
  }

  fn emit_setcc(&mut self, mnemonic: &str) {
    self.w("cmp rax, rbx");
    self.w(format!("{mnemonic} al"));
    self.w("movzx rax, al");
  }

  fn emit_double_binary(&mut self, op: BinaryOp, left: &Expression, right: &Expression, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    self.emit_expr(left, layout, locals, class_ctx);
    self.w("sub rsp, 8");
    self.w("movsd [rsp], xmm0");
    self.emit_expr(right, layout, locals, class_ctx);
    self.w("movsd xmm1, xmm0");
    self.w("movsd xmm0, [rsp]");
    self.w("add rsp, 8");
    match op {
      BinaryOp::Add => self.w("addsd xmm0, xmm1"),
      BinaryOp::Sub => self.w("subsd xmm0, xmm1"),
      BinaryOp::Mul => self.w("mulsd xmm0, xmm1"),
      BinaryOp::Div => self.w("divsd xmm0, xmm1"),
      BinaryOp::Lt => self.emit_double_setcc("setb"),
      BinaryOp::Lte => self.emit_double_setcc("setbe"),
      BinaryOp::Gt => self.emit_double_setcc("seta"),
      BinaryOp::Gte => self.emit_double_setcc("setae"),
      BinaryOp::EqEq => self.emit_double_setcc("sete"),
      BinaryOp::Neq => self.emit_double_setcc("setne"),
      BinaryOp::Mod | BinaryOp::And | BinaryOp::Or => unreachable!("checker rejects this for double"),
    }
  }

  fn emit_double_setcc(&mut self, mnemonic: &str) {
    self.w("ucomisd xmm0, xmm1");
    self.w(format!("{mnemonic} al"));
    self.w("movzx rax, al");
  }

  fn emit_cast(&mut self, type_ref: &TypeRef, operand: &Expression, span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    let source_type = self.static_type(operand, locals, class_ctx);
    let target_type = type_ref.display_name();
    self.emit_expr(operand, layout, locals, class_ctx);

    if source_type == target_type { return; }
    if source_type == "double" && target_type != "double" {
      self.w("cvttsd2si rax, xmm0");
      return;
    }
    if source_type != "double" && target_type == "double" {
      self.w("cvtsi2sd xmm0, rax");
      return;
    }
    if is_reference_type_name(&source_type) && target_type == "Obj" { return; }
    if source_type == "Obj" && is_reference_type_name(&target_type) {
      // rt_checked_cast's lone argument (the cast object) is ref-rooted,
      // so spill it to a temp root slot before the safepoint hook runs.
      self.w("push rax");
      if let Some(&temp_offset) = layout.temp_root_slot_offsets.first() {
        self.w("mov rax, [rsp]");
        self.w(format!("mov {}, rax", slot_operand(temp_offset)));
        self.rt_call_before(span, layout);
        self.w(format!("lea rdi, [rbp - {}]", -layout.root_frame_offset));
        self.w(format!("mov esi, {}", layout.temp_root_slot_start_index));
        self.w(format!("mov rdx, {}", slot_operand(temp_offset)));
        self.w("call rt_root_slot_store");
        self.w("pop rdi");
        self.w(format!("lea rsi, [rip + {}]", mangle_type_symbol(&target_type)));
        self.w("call rt_checked_cast");
        self.rt_call_after();
        self.w(format!("mov {}, 0", slot_operand(temp_offset)));
      } else {
        self.rt_call_before(span, layout);
        self.w("pop rdi");
        self.w(format!("lea rsi, [rip + {}]", mangle_type_symbol(&target_type)));
        self.w("call rt_checked_cast");
        self.rt_call_after();
      }
    }
  }

  fn emit_field_access(&mut self, object: &Expression, name: &str, span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    let obj_type = self.static_type(object, locals, class_ctx);
    if name == "value" {
      if let Some(call) = builtin_box_get_runtime_call(&obj_type) {
        self.emit_runtime_call(call, &[object], span, layout, locals, class_ctx);
        return;
      }
    }
    self.emit_expr(object, layout, locals, class_ctx);
    let offset = self.classes.get(&obj_type).and_then(|m| m.layout.field_offsets.get(name).copied());
    if let Some(offset) = offset {
      self.w(format!("mov rax, [rax + {offset}]"));
    }
  }

  fn emit_index(&mut self, object: &Expression, index: &Expression, span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    let obj_type = self.static_type(object, locals, class_ctx);
    if let Some(elem) = self.array_elem_of(&obj_type) {
      let call = array_get_runtime_call(array_elem_kind(&elem));
      self.emit_runtime_call(&call, &[object, index], span, layout, locals, class_ctx);
    } else if obj_type == "Str" {
      self.emit_runtime_call("rt_str_get_u8", &[object, index], span, layout, locals, class_ctx);
    } else if obj_type == "Vec" {
      self.emit_runtime_call("rt_vec_get", &[object, index], span, layout, locals, class_ctx);
    } else {
      self.emit_expr(object, layout, locals, class_ctx);
      self.w("push rax");
      self.emit_expr(index, layout, locals, class_ctx);
      self.w("push rax");
      self.w("pop rsi");
      self.w("pop rdi");
      self.w(format!("call {}", mangle_method_symbol(&obj_type, "get")));
    }
  }

  fn emit_array_ctor(&mut self, element_type: &TypeRef, length: &Expression, span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    self.emit_expr(length, layout, locals, class_ctx);
    self.w("push rax");
    self.rt_call_before(span, layout);
    self.w("pop rdi");
    let elem_name = element_type.display_name();
    let call = array_ctor_runtime_call(array_elem_kind(&elem_name));
    self.w(format!("call {call}"));
    self.rt_call_after();
  }

  fn emit_call(&mut self, callee: &Expression, args: &[Expression], span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    if let Expression::Identifier { name, .. } = callee {
      if name == "BoxDouble" {
        self.emit_box_double_ctor(&args[0], span, layout, locals, class_ctx);
        return;
      }
      if let Some(call) = builtin_constructor_runtime_call(name) {
        let operands: Vec<&Expression> = args.iter().collect();
        self.emit_runtime_call(call, &operands, span, layout, locals, class_ctx);
        return;
      }
      if self.classes.contains_key(name) {
        self.emit_args(args, layout, locals, class_ctx);
        self.w(format!("call {}", mangle_class_label(name)));
        return;
      }
      if !locals.contains_key(name) {
        if let Some(cn) = class_ctx {
          if self.classes[cn].layout.field_offsets.contains_key(name) {
            // shadowed by a field of callable type is not supported by this codegen
          } else if self.method_is_static.contains_key(&(cn.to_string(), name.clone())) || self.method_return_types.contains_key(&(cn.to_string(), name.clone())) {
            let recv_offset = layout.slot_offsets.get("__recv").copied();
            self.emit_args(args, layout, locals, class_ctx);
            if let Some(offset) = recv_offset {
              self.shift_args(args.len());
              self.w(format!("mov rdi, {}", slot_operand(offset)));
            }
            self.w(format!("call {}", mangle_method_symbol(cn, name)));
            return;
          }
        }
        self.emit_args(args, layout, locals, class_ctx);
        self.w(format!("call {}", function_label(name)));
        return;
      }
    }

    if let Expression::FieldAccess { object, name, .. } = callee {
      if let Expression::Identifier { name: base, .. } = object.as_ref() {
        let is_receiver = locals.contains_key(base)
          || class_ctx.is_some_and(|cn| self.classes[cn].field_types.contains_key(base))
          || self.classes.contains_key(base);
        if !is_receiver {
          // `module.function(...)` — the linker already merged `function`
          // in under its bare name, so this is a plain call, not a method
          // dispatch through a receiver.
          self.emit_args(args, layout, locals, class_ctx);
          self.w(format!("call {}", function_label(name)));
          return;
        }
      }
      let obj_type = self.static_type(object, locals, class_ctx);
      if let Some(elem) = self.array_elem_of(&obj_type) {
        self.emit_array_method_call(object, name, args, &elem, span, layout, locals, class_ctx);
        return;
      }
      if obj_type == "Vec" {
        self.emit_vec_method_call(object, name, args, span, layout, locals, class_ctx);
        return;
      }
      self.emit_expr(object, layout, locals, class_ctx);
      self.w("push rax");
      self.emit_args(args, layout, locals, class_ctx);
      self.shift_args(args.len());
      self.w("pop rdi");
      self.w(format!("call {}", mangle_method_symbol(&obj_type, name)));
      return;
    }

    self.emit_expr(callee, layout, locals, class_ctx);
  }

  fn emit_array_method_call(&mut self, object: &Expression, name: &str, args: &[Expression], elem: &str, span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    match name {
      "len" => {
        self.emit_runtime_call("rt_array_len", &[object], span, layout, locals, class_ctx);
      }
      "get" => {
        let call = array_get_runtime_call(array_elem_kind(elem));
        self.emit_runtime_call(&call, &[object, &args[0]], span, layout, locals, class_ctx);
      }
      "set" => {
        let call = array_set_runtime_call(array_elem_kind(elem));
        self.emit_runtime_call(&call, &[object, &args[0], &args[1]], span, layout, locals, class_ctx);
      }
      "slice" => {
        let call = array_slice_runtime_call(array_elem_kind(elem));
        self.emit_runtime_call(&call, &[object, &args[0], &args[1]], span, layout, locals, class_ctx);
      }
      _ => {}
    }
  }

  fn emit_vec_method_call(&mut self, object: &Expression, name: &str, args: &[Expression], span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    match name {
      "push" => self.emit_runtime_call("rt_vec_push", &[object, &args[0]], span, layout, locals, class_ctx),
      "len" => self.emit_runtime_call("rt_vec_len", &[object], span, layout, locals, class_ctx),
      "get" => self.emit_runtime_call("rt_vec_get", &[object, &args[0]], span, layout, locals, class_ctx),
      "set" => self.emit_runtime_call("rt_vec_set", &[object, &args[0], &args[1]], span, layout, locals, class_ctx),
      _ => {}
    }
  }

  /// `BoxDouble`'s constructor is the only runtime call taking a `double`
  /// operand; the generic `emit_runtime_call` path assumes every operand
  /// lands in `rax`, so the value is spilled/reloaded through the stack
  /// the same way `emit_double_binary` carries a pending `xmm0` across a
  /// second sub-evaluation.
  fn emit_box_double_ctor(&mut self, arg: &Expression, span: &SourceSpan, layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    self.emit_expr(arg, layout, locals, class_ctx);
    self.w("sub rsp, 8");
    self.w("movsd [rsp], xmm0");
    self.rt_call_before(span, layout);
    self.w("movsd xmm0, [rsp]");
    self.w("add rsp, 8");
    self.w("call rt_box_double_new");
    self.rt_call_after();
  }

  fn emit_args(&mut self, args: &[Expression], layout: &FunctionLayout, locals: &HashMap<String, String>, class_ctx: Option<&str>) {
    for arg in args {
      self.emit_expr(arg, layout, locals, class_ctx);
      self.w("push rax");
    }
    for i in (0..args.len()).rev() {
      if i < PARAM_REGISTERS.len() { self.w(format!("pop {}", PARAM_REGISTERS[i])); }
    }
  }

  /// After `emit_args` has already populated `rdi..` with positional
  /// arguments, frees up `rdi` for an instance receiver by moving every
  /// argument register up one slot.
  fn shift_args(&mut self, arg_count: usize) {
    let n = arg_count.min(PARAM_REGISTERS.len() - 1);
    for i in (0..n).rev() {
      self.w(format!("mov {}, {}", PARAM_REGISTERS[i + 1], PARAM_REGISTERS[i]));
    }
  }
}

/// Renders an rbp-relative slot offset (always negative, stored that way
/// in `FunctionLayout`) as an Intel-syntax memory operand.
fn slot_operand(offset: i32) -> String {
  if offset < 0 { format!("[rbp - {}]", -offset) } else { format!("[rbp + {offset}]") }
}
