//! Token kinds and the fixed keyword/punctuation tables.

/// The kind of a lexed token. Mirrors the surface grammar one for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TokenKind {
  Eof,

  Ident,
  IntLit,
  FloatLit,
  StringLit,
  CharLit,

  Import,
  Export,
  Extern,
  Class,
  Private,
  Fn,
  Var,
  If,
  Else,
  While,
  Static,
  Break,
  Continue,
  Return,

  I64,
  U64,
  U8,
  Bool,
  Double,
  Unit,

  Obj,

  True,
  False,
  Null,

  LParen,
  RParen,
  LBrace,
  RBrace,
  LBracket,
  RBracket,
  Comma,
  Semicolon,
  Dot,
  Colon,

  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  Assign,
  Bang,

  EqEq,
  Neq,
  Lt,
  Lte,
  Gt,
  Gte,
  AndAnd,
  OrOr,
  Arrow,
}

impl TokenKind {
  /// Token kinds that can begin a type name (primitive keywords, `Obj`, or
  /// a plain identifier that may be extended with `.ident` / `[]`).
  #[must_use] pub fn is_type_name_start(self) -> bool {
    matches!(
      self,
      TokenKind::Ident
        | TokenKind::I64
        | TokenKind::U64
        | TokenKind::U8
        | TokenKind::Bool
        | TokenKind::Double
        | TokenKind::Unit
        | TokenKind::Obj
    )
  }
}

/// Keyword lexeme -> token kind. Looked up only once an identifier has
/// been fully scanned.
pub fn keyword(lexeme: &str) -> Option<TokenKind> {
  Some(match lexeme {
    "import" => TokenKind::Import,
    "export" => TokenKind::Export,
    "extern" => TokenKind::Extern,
    "class" => TokenKind::Class,
    "private" => TokenKind::Private,
    "fn" => TokenKind::Fn,
    "var" => TokenKind::Var,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "static" => TokenKind::Static,
    "break" => TokenKind::Break,
    "continue" => TokenKind::Continue,
    "return" => TokenKind::Return,
    "i64" => TokenKind::I64,
    "u64" => TokenKind::U64,
    "u8" => TokenKind::U8,
    "bool" => TokenKind::Bool,
    "double" => TokenKind::Double,
    "unit" => TokenKind::Unit,
    "Obj" => TokenKind::Obj,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
    _ => return None,
  })
}

/// Two-character punctuation, checked before falling back to single chars.
pub fn two_char_token(s: &str) -> Option<TokenKind> {
  Some(match s {
    "->" => TokenKind::Arrow,
    "==" => TokenKind::EqEq,
    "!=" => TokenKind::Neq,
    "<=" => TokenKind::Lte,
    ">=" => TokenKind::Gte,
    "&&" => TokenKind::AndAnd,
    "||" => TokenKind::OrOr,
    _ => return None,
  })
}

/// Single-character punctuation.
pub fn one_char_token(c: char) -> Option<TokenKind> {
  Some(match c {
    '(' => TokenKind::LParen,
    ')' => TokenKind::RParen,
    '{' => TokenKind::LBrace,
    '}' => TokenKind::RBrace,
    '[' => TokenKind::LBracket,
    ']' => TokenKind::RBracket,
    ',' => TokenKind::Comma,
    ';' => TokenKind::Semicolon,
    '.' => TokenKind::Dot,
    ':' => TokenKind::Colon,
    '+' => TokenKind::Plus,
    '-' => TokenKind::Minus,
    '*' => TokenKind::Star,
    '/' => TokenKind::Slash,
    '%' => TokenKind::Percent,
    '=' => TokenKind::Assign,
    '!' => TokenKind::Bang,
    '<' => TokenKind::Lt,
    '>' => TokenKind::Gt,
    _ => return None,
  })
}
