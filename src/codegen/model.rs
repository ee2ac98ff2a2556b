//! Code generator data model: function/constructor layouts, resolved call
//! targets and the lookup tables the emitter consults while lowering a
//! linked module to assembly.

use std::collections::HashMap;

/// Integer-argument registers in SysV order.
pub const PARAM_REGISTERS: &[&str] = &["rdi", "rsi", "rdx", "rcx", "r8", "r9"];
/// Double-argument registers in SysV order.
pub const FLOAT_PARAM_REGISTERS: &[&str] = &["xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7"];

pub const PRIMITIVE_TYPE_NAMES: &[&str] = &["i64", "u64", "u8", "bool", "double", "unit"];

/// Number of scratch GC root slots reserved per call frame for
/// intermediate reference values that must survive a safepoint.
pub const TEMP_RUNTIME_ROOT_SLOT_COUNT: usize = 6;

fn array_runtime_calls(prefix: &str) -> HashMap<&'static str, String> {
  ["i64", "u64", "u8", "bool", "double", "ref"].iter()
    .map(|t| (*t, format!("rt_array_{prefix}_{t}")))
    .collect()
}

pub fn array_ctor_runtime_call(elem_kind: &str) -> String { array_runtime_calls("new")[elem_kind].clone() }
pub fn array_get_runtime_call(elem_kind: &str) -> String { array_runtime_calls("get")[elem_kind].clone() }
pub fn array_set_runtime_call(elem_kind: &str) -> String { array_runtime_calls("set")[elem_kind].clone() }
pub fn array_slice_runtime_call(elem_kind: &str) -> String { array_runtime_calls("slice")[elem_kind].clone() }

/// Maps a resolved element type name to the runtime-table key used by the
/// `rt_array_*` family (a primitive keeps its own name, any reference type
/// collapses to `ref`).
pub fn array_elem_kind(type_name: &str) -> &'static str {
  match type_name {
    "i64" => "i64",
    "u64" => "u64",
    "u8" => "u8",
    "bool" => "bool",
    "double" => "double",
    _ => "ref",
  }
}

/// Which positional arguments of a runtime call are GC-managed references
/// and must be rooted across the call.
pub fn runtime_ref_arg_indices(runtime_name: &str) -> &'static [usize] {
  match runtime_name {
    "rt_checked_cast" | "rt_array_len"
    | "rt_array_get_i64" | "rt_array_get_u64" | "rt_array_get_u8" | "rt_array_get_bool"
    | "rt_array_get_double" | "rt_array_get_ref"
    | "rt_array_set_i64" | "rt_array_set_u64" | "rt_array_set_u8" | "rt_array_set_bool"
    | "rt_array_set_double"
    | "rt_array_slice_i64" | "rt_array_slice_u64" | "rt_array_slice_u8" | "rt_array_slice_bool"
    | "rt_array_slice_double" | "rt_array_slice_ref"
    | "rt_str_get_u8" | "rt_str_slice"
    | "rt_vec_len" | "rt_vec_get"
    | "rt_box_i64_get" | "rt_box_u64_get" | "rt_box_u8_get" | "rt_box_bool_get" | "rt_box_double_get" => &[0],
    "rt_array_set_ref" => &[0, 2],
    "rt_vec_push" => &[0, 1],
    "rt_vec_set" => &[0, 2],
    _ => &[],
  }
}

/// Maps a `Vec`/`Box*` constructor callee name to the `rt_*_new` runtime
/// call it lowers to. `Map` has no runtime backing and is deliberately
/// absent — constructing one isn't supported.
pub fn builtin_constructor_runtime_call(type_name: &str) -> Option<&'static str> {
  match type_name {
    "Vec" => Some("rt_vec_new"),
    "BoxI64" => Some("rt_box_i64_new"),
    "BoxU64" => Some("rt_box_u64_new"),
    "BoxU8" => Some("rt_box_u8_new"),
    "BoxBool" => Some("rt_box_bool_new"),
    "BoxDouble" => Some("rt_box_double_new"),
    _ => None,
  }
}

/// Maps a `Box*` type name to the runtime call backing its `.value` field
/// read.
pub fn builtin_box_get_runtime_call(type_name: &str) -> Option<&'static str> {
  match type_name {
    "BoxI64" => Some("rt_box_i64_get"),
    "BoxU64" => Some("rt_box_u64_get"),
    "BoxU8" => Some("rt_box_u8_get"),
    "BoxBool" => Some("rt_box_bool_get"),
    "BoxDouble" => Some("rt_box_double_get"),
    _ => None,
  }
}

/// Per-call-frame slot/root bookkeeping computed before a function body is
/// lowered. `slot_offsets` gives each local's `rbp`-relative storage cell;
/// `root_slot_offsets` gives the subset of those that the shadow-stack
/// walker must scan (reference-typed locals plus scratch temporaries).
#[derive(Debug, Clone)]
pub struct FunctionLayout {
  pub slot_names: Vec<String>,
  pub slot_offsets: HashMap<String, i32>,
  pub slot_type_names: HashMap<String, String>,
  pub root_slot_names: Vec<String>,
  pub root_slot_indices: HashMap<String, usize>,
  pub root_slot_offsets: HashMap<String, i32>,
  pub temp_root_slot_offsets: Vec<i32>,
  pub temp_root_slot_start_index: usize,
  pub root_slot_count: usize,
  /// rbp-relative offset of the saved `rt_thread_state()` pointer.
  /// Only meaningful when `root_slot_count > 0`.
  pub thread_state_offset: i32,
  /// rbp-relative offset of the 24-byte shadow-stack root frame header.
  /// Only meaningful when `root_slot_count > 0`.
  pub root_frame_offset: i32,
  pub stack_size: i32,
}

impl FunctionLayout {
  /// Lays out one 8-byte slot per local. Reference-typed locals (plus,
  /// when `needs_temp_roots` is set, `TEMP_RUNTIME_ROOT_SLOT_COUNT`
  /// compiler-introduced scratch slots) are placed first, closest to
  /// `rbp`, so the whole root set is one contiguous range the shadow-stack
  /// walker can scan by base+count instead of a scattered slot list.
  /// Primitive locals follow below that, then (if there are any roots at
  /// all) the saved thread-state pointer and the 24-byte root frame
  /// header. `needs_temp_roots` should be true only when some statement in
  /// the body contains a runtime call with a reference-typed argument that
  /// must be rooted across the call; a function with no reference-typed
  /// locals and no such call skips the root-frame ABI entirely.
  pub fn build(locals: &[(String, String)], needs_temp_roots: bool) -> Self {
    let mut slot_names = Vec::new();
    let mut slot_offsets = HashMap::new();
    let mut slot_type_names = HashMap::new();
    let mut root_slot_names = Vec::new();
    let mut root_slot_indices = HashMap::new();
    let mut root_slot_offsets = HashMap::new();

    let (ref_locals, prim_locals): (Vec<_>, Vec<_>) =
      locals.iter().cloned().partition(|(_, t)| is_reference_type_name(t));

    let mut offset: i32 = -8;
    let mut root_index = 0usize;
    for (name, type_name) in &ref_locals {
      slot_names.push(name.clone());
      slot_offsets.insert(name.clone(), offset);
      slot_type_names.insert(name.clone(), type_name.clone());
      root_slot_names.push(name.clone());
      root_slot_indices.insert(name.clone(), root_index);
      root_slot_offsets.insert(name.clone(), offset);
      root_index += 1;
      offset -= 8;
    }

    let temp_root_slot_start_index = root_index;
    let mut temp_root_slot_offsets = Vec::new();
    if needs_temp_roots {
      for _ in 0..TEMP_RUNTIME_ROOT_SLOT_COUNT {
        temp_root_slot_offsets.push(offset);
        offset -= 8;
        root_index += 1;
      }
    }

    for (name, type_name) in &prim_locals {
      slot_names.push(name.clone());
      slot_offsets.insert(name.clone(), offset);
      slot_type_names.insert(name.clone(), type_name.clone());
      offset -= 8;
    }

    let root_slot_count = root_index;
    let (thread_state_offset, root_frame_offset) = if root_slot_count > 0 {
      let thread_state_offset = offset;
      offset -= 8;
      // 24-byte header: three 8-byte words (slots pointer, count, link).
      let root_frame_offset = offset - 16;
      offset -= 24;
      (thread_state_offset, root_frame_offset)
    } else {
      (0, 0)
    };

    let raw_size = -offset;
    let stack_size = (raw_size + 15) & !15;

    Self {
      slot_names,
      slot_offsets,
      slot_type_names,
      root_slot_names,
      root_slot_indices,
      root_slot_offsets,
      temp_root_slot_offsets,
      temp_root_slot_start_index,
      root_slot_count,
      thread_state_offset,
      root_frame_offset,
      stack_size,
    }
  }
}

pub fn is_reference_type_name(name: &str) -> bool {
  !PRIMITIVE_TYPE_NAMES.contains(&name) && !name.is_empty()
}

/// A fully resolved call target: either a free function or an instance
/// method, with the expression that produces its receiver (`None` for a
/// free function or static method).
#[derive(Debug, Clone)]
pub struct ResolvedCallTarget {
  pub symbol: String,
  pub is_method: bool,
  pub return_type_name: String,
}

/// Layout of a class's boxed representation: the GC type tag symbol and
/// the byte offset of each field within the payload.
#[derive(Debug, Clone)]
pub struct ConstructorLayout {
  pub class_name: String,
  pub label: String,
  pub type_symbol: String,
  pub payload_bytes: i32,
  pub field_names: Vec<String>,
  pub field_offsets: HashMap<String, i32>,
}

/// Size of the boxed-object header (type tag + GC bookkeeping) that
/// precedes every object's fields in memory.
pub const OBJECT_HEADER_BYTES: i32 = 24;

impl ConstructorLayout {
  pub fn build(class_name: &str, field_names: &[String]) -> Self {
    let mut field_offsets = HashMap::new();
    for (i, name) in field_names.iter().enumerate() {
      field_offsets.insert(name.clone(), OBJECT_HEADER_BYTES + (i as i32) * 8);
    }
    Self {
      class_name: class_name.to_string(),
      label: mangle_class_label(class_name),
      type_symbol: mangle_type_symbol(class_name),
      payload_bytes: (field_names.len() as i32) * 8,
      field_names: field_names.to_vec(),
      field_offsets,
    }
  }
}

/// Running state for one function/method body being lowered.
#[derive(Debug, Default)]
pub struct LabelCounter(pub u64);

impl LabelCounter {
  pub fn next(&mut self, prefix: &str) -> String {
    let id = self.0;
    self.0 += 1;
    format!(".L{prefix}{id}")
  }
}

/// Fixed runtime descriptor symbols for built-in reference types that
/// don't go through user-class type metadata emission at all.
fn builtin_runtime_type_symbol(type_name: &str) -> Option<&'static str> {
  match type_name {
    "Vec" => Some("rt_type_vec_desc"),
    "Map" => Some("rt_type_map_desc"),
    "BoxI64" => Some("rt_type_box_i64_desc"),
    "BoxU64" => Some("rt_type_box_u64_desc"),
    "BoxU8" => Some("rt_type_box_u8_desc"),
    "BoxBool" => Some("rt_type_box_bool_desc"),
    "BoxDouble" => Some("rt_type_box_double_desc"),
    _ => None,
  }
}

/// Replaces the characters that can't appear in an assembly symbol:
/// `.` and `::` separators, and (for array element types) the trailing
/// `[]` on `T[]`, which becomes `T__`.
fn safe_symbol_name(name: &str) -> String {
  name.replace("::", "_").replace('.', "_").replace("[]", "__")
}

/// Mangles a reference type's runtime type-tag symbol: `__nif_type_<safe>`,
/// or a fixed runtime descriptor symbol for built-in boxed types.
pub fn mangle_type_symbol(type_name: &str) -> String {
  match builtin_runtime_type_symbol(type_name) {
    Some(sym) => sym.to_string(),
    None => format!("__nif_type_{}", safe_symbol_name(type_name)),
  }
}
/// Mangles a reference type's name-string symbol: `__nif_type_name_<safe>`.
pub fn mangle_type_name_symbol(type_name: &str) -> String {
  format!("__nif_type_name_{}", safe_symbol_name(type_name))
}
/// Mangles a class+method pair to `__nif_method_<Type>_<method>`.
pub fn mangle_method_symbol(class_name: &str, method_name: &str) -> String {
  format!("__nif_method_{}_{}", safe_symbol_name(class_name), safe_symbol_name(method_name))
}
/// Mangles a class constructor entry point to `__nif_ctor_<Type>`.
pub fn mangle_class_label(class_name: &str) -> String {
  format!("__nif_ctor_{}", safe_symbol_name(class_name))
}
/// Free functions are emitted under their own source name — `main` and
/// `sum3` keep those labels verbatim; only methods, constructors and type
/// descriptors get a mangled symbol.
pub fn function_label(name: &str) -> String { name.to_string() }
