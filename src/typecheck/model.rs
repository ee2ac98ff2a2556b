//! Type-checker data model: resolved types, signatures and class info.

use std::collections::HashMap;

use crate::span::SourceSpan;

pub const PRIMITIVE_TYPE_NAMES: &[&str] = &["i64", "u64", "u8", "bool", "double", "unit"];
pub const NUMERIC_TYPE_NAMES: &[&str] = &["i64", "u64", "u8", "double"];
pub const REFERENCE_BUILTIN_TYPE_NAMES: &[&str] =
  &["Obj", "Str", "Vec", "Map", "BoxI64", "BoxU64", "BoxU8", "BoxBool", "BoxDouble"];
pub const STR_CLASS_NAME: &str = "Str";

pub const I64_MAX_LITERAL: i128 = i64::MAX as i128;
pub const I64_MIN_MAGNITUDE_LITERAL: i128 = 9_223_372_036_854_775_808;
pub const U64_MAX_LITERAL: i128 = u64::MAX as i128;

pub fn is_primitive(name: &str) -> bool { PRIMITIVE_TYPE_NAMES.contains(&name) }
pub fn is_numeric(name: &str) -> bool { NUMERIC_TYPE_NAMES.contains(&name) }

/// The kind of a resolved type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind { Primitive, Reference, Null, Callable, Module }

/// A fully resolved type, as produced by the type checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
  pub name: String,
  pub kind: TypeKind,
  pub element_type: Option<Box<TypeInfo>>,
}

impl TypeInfo {
  pub fn primitive(name: impl Into<String>) -> Self {
    Self { name: name.into(), kind: TypeKind::Primitive, element_type: None }
  }
  pub fn reference(name: impl Into<String>) -> Self {
    Self { name: name.into(), kind: TypeKind::Reference, element_type: None }
  }
  pub fn array(element: TypeInfo) -> Self {
    Self { name: format!("{}[]", element.name), kind: TypeKind::Reference, element_type: Some(Box::new(element)) }
  }
  pub fn null() -> Self { Self { name: "null".into(), kind: TypeKind::Null, element_type: None } }
  pub fn callable(name: impl Into<String>) -> Self {
    Self { name: name.into(), kind: TypeKind::Callable, element_type: None }
  }
  pub fn module(name: impl Into<String>) -> Self {
    Self { name: name.into(), kind: TypeKind::Module, element_type: None }
  }
  pub fn bool_() -> Self { Self::primitive("bool") }
  pub fn is_reference(&self) -> bool { self.kind == TypeKind::Reference }
}

#[derive(Debug, Clone)]
pub struct FunctionSig {
  pub name: String,
  pub params: Vec<TypeInfo>,
  pub return_type: TypeInfo,
  pub is_static: bool,
  pub is_private: bool,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
  pub name: String,
  pub fields: HashMap<String, TypeInfo>,
  pub field_order: Vec<String>,
  pub methods: HashMap<String, FunctionSig>,
  pub private_fields: std::collections::HashSet<String>,
  pub private_methods: std::collections::HashSet<String>,
  pub span: SourceSpan,
}
