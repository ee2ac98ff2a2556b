//! Byte-stream lexer: source text -> a flat token list terminated by `EOF`.

use std::rc::Rc;

use crate::error::LexerError;
use crate::span::{SourcePos, SourceSpan};
use crate::tokens::{self, TokenKind};

/// A single lexed token.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub span: SourceSpan,
}

struct Lexer<'a> {
  source: &'a [u8],
  path: Rc<str>,
  index: usize,
  line: u32,
  column: u32,
}

impl<'a> Lexer<'a> {
  fn new(source: &'a str, path: Rc<str>) -> Self {
    Self { source: source.as_bytes(), path, index: 0, line: 1, column: 1 }
  }

  fn is_at_end(&self) -> bool { self.index >= self.source.len() }

  fn peek(&self) -> u8 { if self.is_at_end() { 0 } else { self.source[self.index] } }

  fn peek_next(&self) -> u8 {
    let i = self.index + 1;
    if i >= self.source.len() { 0 } else { self.source[i] }
  }

  fn pos(&self) -> SourcePos {
    SourcePos::new(self.path.clone(), self.index, self.line, self.column)
  }

  fn advance(&mut self) -> u8 {
    let ch = self.source[self.index];
    self.index += 1;
    if ch == b'\n' {
      self.line += 1;
      self.column = 1;
    } else {
      self.column += 1;
    }
    ch
  }

  fn lexeme_from(&self, start_offset: usize) -> String {
    String::from_utf8_lossy(&self.source[start_offset..self.index]).into_owned()
  }

  fn skip_whitespace_and_comments(&mut self) {
    loop {
      if self.is_at_end() { return; }
      let ch = self.peek();
      if ch == b' ' || ch == b'\t' || ch == b'\r' || ch == b'\n' {
        self.advance();
        continue;
      }
      if ch == b'/' && self.peek_next() == b'/' {
        self.advance();
        self.advance();
        while !self.is_at_end() && self.peek() != b'\n' { self.advance(); }
        continue;
      }
      return;
    }
  }

  fn is_ident_start(ch: u8) -> bool { ch.is_ascii_alphabetic() || ch == b'_' }
  fn is_ident_part(ch: u8) -> bool { ch.is_ascii_alphanumeric() || ch == b'_' }
  fn is_hex_digit(ch: u8) -> bool { ch.is_ascii_hexdigit() }

  fn read_identifier(&mut self, start: SourcePos) -> Token {
    while !self.is_at_end() && Self::is_ident_part(self.peek()) { self.advance(); }
    let lexeme = self.lexeme_from(start.offset);
    let kind = tokens::keyword(&lexeme).unwrap_or(TokenKind::Ident);
    Token { kind, lexeme, span: SourceSpan::new(start, self.pos()) }
  }

  fn read_number(&mut self, start: SourcePos) -> Token {
    while !self.is_at_end() && self.peek().is_ascii_digit() { self.advance(); }

    let mut is_float = false;
    if !self.is_at_end() && self.peek() == b'.' && self.peek_next().is_ascii_digit() {
      is_float = true;
      self.advance();
      while !self.is_at_end() && self.peek().is_ascii_digit() { self.advance(); }
    }

    if !is_float && !self.is_at_end() && self.peek() == b'u' {
      self.advance();
      if !self.is_at_end() && self.peek() == b'8' { self.advance(); }
    }

    let lexeme = self.lexeme_from(start.offset);
    let kind = if is_float { TokenKind::FloatLit } else { TokenKind::IntLit };
    Token { kind, lexeme, span: SourceSpan::new(start, self.pos()) }
  }

  fn read_string(&mut self, start: SourcePos) -> Result<Token, LexerError> {
    self.advance(); // opening quote

    loop {
      if self.is_at_end() {
        return Err(LexerError {
          message: "Unterminated string literal".into(),
          span: SourceSpan::new(start, self.pos()),
        });
      }
      let ch = self.peek();
      if ch == b'\n' {
        return Err(LexerError {
          message: "Unterminated string literal".into(),
          span: SourceSpan::new(start, self.pos()),
        });
      }
      if ch == b'\\' {
        self.advance();
        if self.is_at_end() {
          return Err(LexerError {
            message: "Unterminated string literal".into(),
            span: SourceSpan::new(start, self.pos()),
          });
        }
        let esc = self.peek();
        match esc {
          b'"' | b'\\' | b'n' | b'r' | b't' | b'0' => { self.advance(); }
          b'x' => {
            self.advance();
            let first = self.peek();
            let second = self.peek_next();
            if !Self::is_hex_digit(first) || !Self::is_hex_digit(second) {
              return Err(LexerError {
                message: "Invalid string escape sequence".into(),
                span: SourceSpan::new(start, self.pos()),
              });
            }
            self.advance();
            self.advance();
          }
          _ => {
            return Err(LexerError {
              message: "Invalid string escape sequence".into(),
              span: SourceSpan::new(start, self.pos()),
            });
          }
        }
        continue;
      }
      if ch == b'"' {
        self.advance();
        let lexeme = self.lexeme_from(start.offset);
        return Ok(Token { kind: TokenKind::StringLit, lexeme, span: SourceSpan::new(start, self.pos()) });
      }
      self.advance();
    }
  }

  fn read_char(&mut self, start: SourcePos) -> Result<Token, LexerError> {
    self.advance(); // opening quote
    let unterminated = |lexer: &Self, start: &SourcePos| LexerError {
      message: "Character literal must contain exactly one byte".into(),
      span: SourceSpan::new(start.clone(), lexer.pos()),
    };

    if self.is_at_end() { return Err(unterminated(self, &start)); }
    let ch = self.peek();
    if ch == b'\\' {
      self.advance();
      if self.is_at_end() {
        return Err(LexerError {
          message: "Invalid character escape sequence".into(),
          span: SourceSpan::new(start, self.pos()),
        });
      }
      let esc = self.peek();
      match esc {
        b'n' | b'r' | b't' | b'0' | b'\\' | b'\'' | b'"' => { self.advance(); }
        b'x' => {
          self.advance();
          let first = self.peek();
          let second = self.peek_next();
          if !Self::is_hex_digit(first) || !Self::is_hex_digit(second) {
            return Err(LexerError {
              message: "Invalid character escape sequence".into(),
              span: SourceSpan::new(start, self.pos()),
            });
          }
          self.advance();
          self.advance();
        }
        _ => {
          return Err(LexerError {
            message: "Invalid character escape sequence".into(),
            span: SourceSpan::new(start, self.pos()),
          });
        }
      }
    } else if ch == b'\'' {
      return Err(unterminated(self, &start));
    } else {
      self.advance();
    }

    if self.is_at_end() || self.peek() != b'\'' {
      return Err(unterminated(self, &start));
    }
    self.advance();
    let lexeme = self.lexeme_from(start.offset);
    Ok(Token { kind: TokenKind::CharLit, lexeme, span: SourceSpan::new(start, self.pos()) })
  }

  fn lex(mut self) -> Result<Vec<Token>, LexerError> {
    let mut out = Vec::new();

    while !self.is_at_end() {
      self.skip_whitespace_and_comments();
      if self.is_at_end() { break; }

      let start = self.pos();
      let ch = self.peek();

      if Self::is_ident_start(ch) {
        out.push(self.read_identifier(start));
        continue;
      }
      if ch.is_ascii_digit() {
        out.push(self.read_number(start));
        continue;
      }
      if ch == b'"' {
        out.push(self.read_string(start)?);
        continue;
      }
      if ch == b'\'' {
        out.push(self.read_char(start)?);
        continue;
      }

      let rest = &self.source[self.index..];
      if rest.len() >= 2 {
        if let Some(kind) = tokens::two_char_token(std::str::from_utf8(&rest[..2]).unwrap_or("")) {
          let lexeme = std::str::from_utf8(&rest[..2]).unwrap().to_owned();
          self.advance();
          self.advance();
          out.push(Token { kind, lexeme, span: SourceSpan::new(start, self.pos()) });
          continue;
        }
      }

      if let Some(kind) = tokens::one_char_token(ch as char) {
        self.advance();
        out.push(Token { kind, lexeme: (ch as char).to_string(), span: SourceSpan::new(start, self.pos()) });
        continue;
      }

      return Err(LexerError {
        message: format!("Unexpected character '{}'", ch as char),
        span: SourceSpan::new(start.clone(), start),
      });
    }

    let eof_pos = self.pos();
    out.push(Token { kind: TokenKind::Eof, lexeme: String::new(), span: SourceSpan::point(eof_pos) });
    Ok(out)
  }
}

/// Lex `source` (read from `path`, used only for diagnostics) into a token
/// stream terminated by a single `EOF` token.
pub fn lex(source: &str, path: &str) -> Result<Vec<Token>, LexerError> {
  Lexer::new(source, Rc::from(path)).lex()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(src: &str) -> Vec<TokenKind> {
    lex(src, "<test>").unwrap().into_iter().map(|t| t.kind).collect()
  }

  #[test]
  fn final_token_is_eof_at_end_position() {
    let tokens = lex("var x : i64;", "<test>").unwrap();
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
  }

  #[test]
  fn keywords_and_punctuation() {
    assert_eq!(
      kinds("import export extern class private fn var if else while static break continue return"),
      vec![
        TokenKind::Import, TokenKind::Export, TokenKind::Extern, TokenKind::Class,
        TokenKind::Private, TokenKind::Fn, TokenKind::Var, TokenKind::If, TokenKind::Else,
        TokenKind::While, TokenKind::Static, TokenKind::Break, TokenKind::Continue,
        TokenKind::Return, TokenKind::Eof,
      ]
    );
  }

  #[test]
  fn two_char_before_one_char() {
    assert_eq!(kinds("-> == != <= >= && ||"), vec![
      TokenKind::Arrow, TokenKind::EqEq, TokenKind::Neq, TokenKind::Lte, TokenKind::Gte,
      TokenKind::AndAnd, TokenKind::OrOr, TokenKind::Eof,
    ]);
  }

  #[test]
  fn int_vs_float_and_suffixes() {
    let toks = lex("5 5u 5u8 5.5", "<t>").unwrap();
    assert_eq!(toks[0].kind, TokenKind::IntLit);
    assert_eq!(toks[1].lexeme, "5u");
    assert_eq!(toks[2].lexeme, "5u8");
    assert_eq!(toks[3].kind, TokenKind::FloatLit);
  }

  #[test]
  fn dot_not_consumed_without_following_digit() {
    let toks = lex("5.len()", "<t>").unwrap();
    assert_eq!(toks[0].kind, TokenKind::IntLit);
    assert_eq!(toks[0].lexeme, "5");
    assert_eq!(toks[1].kind, TokenKind::Dot);
  }

  #[test]
  fn string_escapes() {
    let toks = lex(r#""a\nb\x41""#, "<t>").unwrap();
    assert_eq!(toks[0].kind, TokenKind::StringLit);
  }

  #[test]
  fn unterminated_string_is_error() {
    let err = lex("\"abc", "<t>").unwrap_err();
    assert_eq!(err.message, "Unterminated string literal");
  }

  #[test]
  fn invalid_escape_is_error() {
    let err = lex(r#""\q""#, "<t>").unwrap_err();
    assert_eq!(err.message, "Invalid string escape sequence");
  }

  #[test]
  fn char_literal_hex_escape() {
    let toks = lex("'\\x41'", "<t>").unwrap();
    assert_eq!(toks[0].kind, TokenKind::CharLit);
  }

  #[test]
  fn char_literal_must_be_one_byte() {
    let err = lex("'ab'", "<t>").unwrap_err();
    assert_eq!(err.message, "Character literal must contain exactly one byte");
  }

  #[test]
  fn unexpected_character_error() {
    let err = lex("@", "<t>").unwrap_err();
    assert_eq!(err.message, "Unexpected character '@'");
  }

  #[test]
  fn line_comment_runs_to_eol() {
    let toks = lex("1 // comment\n2", "<t>").unwrap();
    assert_eq!(toks[0].lexeme, "1");
    assert_eq!(toks[1].lexeme, "2");
  }
}
