//! Names of the C runtime's external ABI surface. The runtime itself is
//! out of scope; these are only the symbols the emitter references.

/// Every `rt_*` symbol the emitter may call, declared `.extern` up front
/// so the assembler doesn't need to see their definitions. This is a
/// closed set: the emitter never invents a runtime call outside this list.
pub const RUNTIME_SYMBOLS: &[&str] = &[
  "rt_thread_state",
  "rt_root_frame_init",
  "rt_push_roots",
  "rt_pop_roots",
  "rt_root_slot_store",
  "rt_trace_push",
  "rt_trace_pop",
  "rt_trace_set_location",
  "rt_alloc_obj",
  "rt_checked_cast",
  "rt_str_from_bytes",
  "rt_str_get_u8",
  "rt_str_slice",
  "rt_vec_new",
  "rt_vec_len",
  "rt_vec_push",
  "rt_vec_get",
  "rt_vec_set",
  "rt_box_i64_new",
  "rt_box_i64_get",
  "rt_box_u64_new",
  "rt_box_u64_get",
  "rt_box_u8_new",
  "rt_box_u8_get",
  "rt_box_bool_new",
  "rt_box_bool_get",
  "rt_box_double_new",
  "rt_box_double_get",
  "rt_array_len",
  "rt_array_new_i64",
  "rt_array_new_u64",
  "rt_array_new_u8",
  "rt_array_new_bool",
  "rt_array_new_double",
  "rt_array_new_ref",
  "rt_array_get_i64",
  "rt_array_get_u64",
  "rt_array_get_u8",
  "rt_array_get_bool",
  "rt_array_get_double",
  "rt_array_get_ref",
  "rt_array_set_i64",
  "rt_array_set_u64",
  "rt_array_set_u8",
  "rt_array_set_bool",
  "rt_array_set_double",
  "rt_array_set_ref",
  "rt_array_slice_i64",
  "rt_array_slice_u64",
  "rt_array_slice_u8",
  "rt_array_slice_bool",
  "rt_array_slice_double",
  "rt_array_slice_ref",
  "rt_panic_str",
];

/// Return type name (nifc type, not an assembly size) of a runtime call,
/// used by the emitter to know how to consume its `rax`/`xmm0` result.
pub fn runtime_return_type(name: &str) -> &'static str {
  match name {
    "rt_array_len" | "rt_vec_len" | "rt_array_get_u64" => "u64",
    "rt_array_get_i64" => "i64",
    "rt_array_get_u8" | "rt_str_get_u8" | "rt_box_u8_get" => "u8",
    "rt_array_get_bool" | "rt_box_bool_get" => "bool",
    "rt_array_get_double" | "rt_box_double_get" => "double",
    "rt_box_i64_get" => "i64",
    "rt_box_u64_get" => "u64",
    "rt_array_get_ref" | "rt_checked_cast" | "rt_vec_get"
    | "rt_thread_state" | "rt_alloc_obj"
    | "rt_box_i64_new" | "rt_box_u64_new" | "rt_box_u8_new" | "rt_box_bool_new" | "rt_box_double_new"
    | "rt_str_from_bytes" | "rt_str_slice" | "rt_vec_new"
    | "rt_array_new_i64" | "rt_array_new_u64" | "rt_array_new_u8" | "rt_array_new_bool"
    | "rt_array_new_double" | "rt_array_new_ref" | "rt_array_slice_i64" | "rt_array_slice_u64"
    | "rt_array_slice_u8" | "rt_array_slice_bool" | "rt_array_slice_double" | "rt_array_slice_ref" => "Obj",
    _ => "unit",
  }
}
