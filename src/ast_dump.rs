//! JSON AST dump used by `--print-ast` / `--print-ast-spans`.

use serde_json::Value;

use crate::ast::ModuleAst;

/// Serializes `module` to pretty-printed JSON. When `include_spans` is
/// false, every `span` field present in the serialized tree is stripped
/// so diffs stay stable across cosmetic source reformatting.
pub fn dump_module(module: &ModuleAst, include_spans: bool) -> serde_json::Result<String> {
  let mut value = serde_json::to_value(module)?;
  if !include_spans { strip_spans(&mut value); }
  serde_json::to_string_pretty(&value)
}

fn strip_spans(value: &mut Value) {
  match value {
    Value::Object(map) => {
      map.remove("span");
      for v in map.values_mut() { strip_spans(v); }
    }
    Value::Array(items) => {
      for v in items { strip_spans(v); }
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;
  use crate::parser::parse;

  #[test]
  fn spans_are_stripped_when_disabled() {
    let ast = parse(lex("fn main() -> i64 { return 0; }", "<t>").unwrap()).unwrap();
    let json = dump_module(&ast, false).unwrap();
    assert!(!json.contains("\"span\""));
  }

  #[test]
  fn spans_are_present_when_enabled() {
    let ast = parse(lex("fn main() -> i64 { return 0; }", "<t>").unwrap()).unwrap();
    let json = dump_module(&ast, true).unwrap();
    assert!(json.contains("\"span\""));
  }
}
