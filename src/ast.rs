//! Immutable AST node types for declarations, statements and expressions.
//!
//! Node families are sum types with variant payloads rather than an
//! inheritance hierarchy; visitors are exhaustive pattern matches.

use crate::span::SourceSpan;

/// A reference to a type as written in source: either a named type or an
/// array of some other type. Arrays are nominal and invariant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum TypeRef {
  Named { name: String, span: SourceSpan },
  Array { element: Box<TypeRef>, span: SourceSpan },
}

impl TypeRef {
  #[must_use] pub fn span(&self) -> &SourceSpan {
    match self {
      TypeRef::Named { span, .. } | TypeRef::Array { span, .. } => span,
    }
  }

  /// The canonical surface-syntax rendering of this type (`T[]` for arrays),
  /// used as a display name and as a map key by the reachability pass.
  #[must_use] pub fn display_name(&self) -> String {
    match self {
      TypeRef::Named { name, .. } => name.clone(),
      TypeRef::Array { element, .. } => format!("{}[]", element.display_name()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ParamDecl {
  pub name: String,
  pub type_ref: TypeRef,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldDecl {
  pub name: String,
  pub type_ref: TypeRef,
  pub is_private: bool,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MethodDecl {
  pub name: String,
  pub params: Vec<ParamDecl>,
  pub return_type: TypeRef,
  pub body: BlockStmt,
  pub is_static: bool,
  pub is_private: bool,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FunctionDecl {
  pub name: String,
  pub params: Vec<ParamDecl>,
  pub return_type: TypeRef,
  pub body: Option<BlockStmt>,
  pub is_export: bool,
  pub is_extern: bool,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClassDecl {
  pub name: String,
  pub fields: Vec<FieldDecl>,
  pub methods: Vec<MethodDecl>,
  pub is_export: bool,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ImportDecl {
  pub module_path: Vec<String>,
  pub is_export: bool,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ModuleAst {
  pub imports: Vec<ImportDecl>,
  pub classes: Vec<ClassDecl>,
  pub functions: Vec<FunctionDecl>,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UnaryOp { Not, Neg }

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BinaryOp {
  Add, Sub, Mul, Div, Mod,
  Lt, Lte, Gt, Gte,
  EqEq, Neq,
  And, Or,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Expression {
  Identifier { name: String, span: SourceSpan },
  Literal { text: String, span: SourceSpan },
  Null { span: SourceSpan },
  Unary { op: UnaryOp, operand: Box<Expression>, span: SourceSpan },
  Binary { op: BinaryOp, left: Box<Expression>, right: Box<Expression>, span: SourceSpan },
  Cast { type_ref: TypeRef, operand: Box<Expression>, span: SourceSpan },
  Call { callee: Box<Expression>, args: Vec<Expression>, span: SourceSpan },
  FieldAccess { object: Box<Expression>, name: String, span: SourceSpan },
  Index { object: Box<Expression>, index: Box<Expression>, span: SourceSpan },
  ArrayCtor { element_type: TypeRef, length: Box<Expression>, span: SourceSpan },
}

impl Expression {
  #[must_use] pub fn span(&self) -> &SourceSpan {
    match self {
      Expression::Identifier { span, .. }
      | Expression::Literal { span, .. }
      | Expression::Null { span }
      | Expression::Unary { span, .. }
      | Expression::Binary { span, .. }
      | Expression::Cast { span, .. }
      | Expression::Call { span, .. }
      | Expression::FieldAccess { span, .. }
      | Expression::Index { span, .. }
      | Expression::ArrayCtor { span, .. } => span,
    }
  }
}

/// The branch an `if` takes when its condition is false.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum ElseBranch {
  Block(BlockStmt),
  If(Box<IfStmt>),
  None,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IfStmt {
  pub condition: Expression,
  pub then_branch: BlockStmt,
  pub else_branch: ElseBranch,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BlockStmt {
  pub statements: Vec<Statement>,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct WhileStmt {
  pub condition: Expression,
  pub body: BlockStmt,
  pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum Statement {
  Block(BlockStmt),
  VarDecl { name: String, type_ref: TypeRef, init: Option<Expression>, span: SourceSpan },
  If(IfStmt),
  While(WhileStmt),
  Return { value: Option<Expression>, span: SourceSpan },
  Break { span: SourceSpan },
  Continue { span: SourceSpan },
  Assign { target: Expression, value: Expression, span: SourceSpan },
  ExprStmt { expr: Expression, span: SourceSpan },
}

impl Statement {
  #[must_use] pub fn span(&self) -> &SourceSpan {
    match self {
      Statement::Block(b) => &b.span,
      Statement::VarDecl { span, .. } => span,
      Statement::If(s) => &s.span,
      Statement::While(s) => &s.span,
      Statement::Return { span, .. } => span,
      Statement::Break { span } => span,
      Statement::Continue { span } => span,
      Statement::Assign { span, .. } => span,
      Statement::ExprStmt { span, .. } => span,
    }
  }
}
