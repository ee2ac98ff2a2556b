//! Phase error types. Each phase raises its own variant; the CLI boundary
//! flattens them into a single `nifc: <message>` line (see `src/bin/nifc.rs`).

use std::path::PathBuf;
use thiserror::Error;

use crate::span::SourceSpan;

/// An error raised by the lexer, carrying the span at which scanning failed.
#[derive(Debug, Error)]
#[error("{message} at {span}")]
pub struct LexerError {
  pub message: String,
  pub span: SourceSpan,
}

/// An error raised by the parser.
#[derive(Debug, Error)]
#[error("{message} at {span}")]
pub struct ParserError {
  pub message: String,
  pub span: SourceSpan,
}

/// An error raised by the module resolver. Some resolver failures (a
/// missing entry file, an unreadable module) have no span, only a path.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("{message} at {span}")]
  Spanned { message: String, span: SourceSpan },
  #[error("{message} at {}", .path.display())]
  AtPath { message: String, path: PathBuf },
  #[error("{0}")]
  Bare(String),
}

impl ResolveError {
  pub fn spanned(message: impl Into<String>, span: SourceSpan) -> Self {
    Self::Spanned { message: message.into(), span }
  }
  pub fn at_path(message: impl Into<String>, path: PathBuf) -> Self {
    Self::AtPath { message: message.into(), path }
  }
  pub fn bare(message: impl Into<String>) -> Self { Self::Bare(message.into()) }
}

/// An error raised by the type checker.
#[derive(Debug, Error)]
#[error("{message} at {span}")]
pub struct TypeCheckError {
  pub message: String,
  pub span: SourceSpan,
}

impl TypeCheckError {
  pub fn new(message: impl Into<String>, span: SourceSpan) -> Self {
    Self { message: message.into(), span }
  }
}

/// An error raised while merging per-module ASTs or validating the entry
/// point. These have no useful span (they compare symbols across whole
/// modules), matching the original `ValueError`-only linker errors.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LinkError(pub String);

impl LinkError {
  pub fn new(message: impl Into<String>) -> Self { Self(message.into()) }
}

/// The union of every phase error, used at the CLI boundary.
#[derive(Debug, Error)]
pub enum NifcError {
  #[error(transparent)]
  Lexer(#[from] LexerError),
  #[error(transparent)]
  Parser(#[from] ParserError),
  #[error(transparent)]
  Resolve(#[from] ResolveError),
  #[error(transparent)]
  TypeCheck(#[from] TypeCheckError),
  #[error(transparent)]
  Link(#[from] LinkError),
  #[error("{0}")]
  Io(String),
}

impl NifcError {
  /// The bare message, without the `nifc: ` CLI prefix.
  #[must_use] pub fn message(&self) -> String { self.to_string() }
}
