//! String literal interning: collects every distinct literal used in a
//! module and assigns each a `.rodata` label, escaping bytes the way the
//! lexer accepted them (`\n \r \t \0 \xHH`).

use std::collections::HashMap;

/// Decodes a lexed string-literal lexeme (quotes included) into its raw
/// byte sequence.
pub fn decode_string_literal(lexeme: &str) -> Vec<u8> {
  let inner = &lexeme[1..lexeme.len() - 1];
  let mut bytes = Vec::new();
  let mut chars = inner.chars().peekable();
  while let Some(c) = chars.next() {
    if c != '\\' { bytes.push(c as u8); continue; }
    match chars.next() {
      Some('n') => bytes.push(b'\n'),
      Some('r') => bytes.push(b'\r'),
      Some('t') => bytes.push(b'\t'),
      Some('0') => bytes.push(0),
      Some('"') => bytes.push(b'"'),
      Some('\\') => bytes.push(b'\\'),
      Some('x') => {
        let hi = chars.next().unwrap_or('0');
        let lo = chars.next().unwrap_or('0');
        let value = u8::from_str_radix(&format!("{hi}{lo}"), 16).unwrap_or(0);
        bytes.push(value);
      }
      Some(other) => bytes.push(other as u8),
      None => {}
    }
  }
  bytes
}

/// Decodes a lexed char-literal lexeme (single quotes included) into its
/// one byte value.
pub fn decode_char_literal(lexeme: &str) -> u8 {
  let inner = &lexeme[1..lexeme.len() - 1];
  if let Some(rest) = inner.strip_prefix('\\') {
    let mut chars = rest.chars();
    match chars.next() {
      Some('n') => b'\n',
      Some('r') => b'\r',
      Some('t') => b'\t',
      Some('0') => 0,
      Some('\\') => b'\\',
      Some('\'') => b'\'',
      Some('"') => b'"',
      Some('x') => {
        let hi = chars.next().unwrap_or('0');
        let lo = chars.next().unwrap_or('0');
        u8::from_str_radix(&format!("{hi}{lo}"), 16).unwrap_or(0)
      }
      Some(other) => other as u8,
      None => 0,
    }
  } else {
    inner.bytes().next().unwrap_or(0)
  }
}

/// Interning table mapping each distinct literal's decoded bytes to a
/// stable `.rodata` label, assigned in first-seen order. One entry per
/// distinct literal holds both the label and its decoded length, since
/// `rt_str_from_bytes` takes `(thread_state, ptr, length)` rather than a
/// length-prefixed blob.
#[derive(Debug, Default)]
pub struct StringTable {
  labels: HashMap<Vec<u8>, String>,
  order: Vec<Vec<u8>>,
}

impl StringTable {
  pub fn new() -> Self { Self::default() }

  pub fn intern(&mut self, bytes: Vec<u8>) -> String {
    if let Some(label) = self.labels.get(&bytes) { return label.clone(); }
    let label = format!("__nif_str_lit_{}", self.order.len());
    self.order.push(bytes.clone());
    self.labels.insert(bytes, label.clone());
    label
  }

  /// Emits the `.rodata` section body: one byte array per interned
  /// literal, each reachable from its label. No length prefix — callers
  /// pass the length separately to `rt_str_from_bytes`.
  pub fn emit_rodata(&self) -> String {
    let mut out = String::new();
    if self.order.is_empty() { return out; }
    out.push_str("  .section .rodata\n");
    for bytes in &self.order {
      let label = &self.labels[bytes];
      out.push_str(&format!("{label}:\n"));
      if bytes.is_empty() {
        out.push_str("  .byte 0\n");
        continue;
      }
      out.push_str("  .byte ");
      let rendered: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
      out.push_str(&rendered.join(", "));
      out.push('\n');
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_escapes() {
    assert_eq!(decode_string_literal("\"a\\nb\""), vec![b'a', b'\n', b'b']);
    assert_eq!(decode_string_literal("\"\\x41\""), vec![0x41]);
  }

  #[test]
  fn interning_dedupes() {
    let mut table = StringTable::new();
    let a = table.intern(b"hi".to_vec());
    let b = table.intern(b"hi".to_vec());
    assert_eq!(a, b);
  }

  #[test]
  fn char_literal_hex_escape_decodes() {
    assert_eq!(decode_char_literal("'\\x41'"), 0x41);
    assert_eq!(decode_char_literal("'a'"), b'a');
  }
}
