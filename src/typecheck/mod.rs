//! Whole-program nominal type checker.

mod checker;
pub mod model;

pub use checker::{typecheck, typecheck_program};
pub use model::{ClassInfo, FunctionSig, TypeInfo, TypeKind};
