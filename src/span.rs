//! Source positions and spans shared by every compiler phase.

use std::fmt;
use std::rc::Rc;

/// A 1-based line/column position within a source file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourcePos {
  pub path: Rc<str>,
  pub offset: usize,
  pub line: u32,
  pub column: u32,
}

impl SourcePos {
  #[must_use] pub fn new(path: Rc<str>, offset: usize, line: u32, column: u32) -> Self {
    Self { path, offset, line, column }
  }
}

impl fmt::Display for SourcePos {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.path, self.line, self.column)
  }
}

/// A half-open-in-spirit (but both ends inclusive of their position) range
/// between two [`SourcePos`]es. Every token and AST node carries one.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceSpan {
  pub start: SourcePos,
  pub end: SourcePos,
}

impl SourceSpan {
  #[must_use] pub fn new(start: SourcePos, end: SourcePos) -> Self { Self { start, end } }

  /// A zero-width span at a single position, used for lexer errors.
  #[must_use] pub fn point(pos: SourcePos) -> Self { Self { start: pos.clone(), end: pos } }
}

impl fmt::Display for SourceSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.start) }
}
