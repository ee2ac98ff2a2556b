//! Recursive-descent parser: tokens -> [`ModuleAst`].

use crate::ast::*;
use crate::error::ParserError;
use crate::lexer::Token;
use crate::span::SourceSpan;
use crate::tokens::TokenKind;

struct TokenStream {
  tokens: Vec<Token>,
  index: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>) -> Self {
    assert!(!tokens.is_empty(), "TokenStream requires at least one token (EOF)");
    Self { tokens, index: 0 }
  }

  fn is_at_end(&self) -> bool { self.peek(0).kind == TokenKind::Eof }

  fn peek(&self, offset: isize) -> &Token {
    let target = self.index as isize + offset;
    if target < 0 { return &self.tokens[0]; }
    let target = target as usize;
    if target >= self.tokens.len() { return self.tokens.last().unwrap(); }
    &self.tokens[target]
  }

  fn previous(&self) -> &Token { self.peek(-1) }

  fn advance(&mut self) -> Token {
    let current = self.peek(0).clone();
    if !self.is_at_end() { self.index += 1; }
    current
  }

  fn check(&self, kind: TokenKind) -> bool { self.peek(0).kind == kind }

  fn matches(&mut self, kind: TokenKind) -> bool {
    if self.check(kind) { self.advance(); true } else { false }
  }

  fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParserError> {
    if self.check(kind) { return Ok(self.advance()); }
    Err(ParserError { message: message.to_string(), span: self.peek(0).span.clone() })
  }
}

/// Parse a full module: imports, classes and functions at top level.
pub fn parse(tokens: Vec<Token>) -> Result<ModuleAst, ParserError> {
  let start = tokens[0].span.start.clone();
  let mut s = TokenStream::new(tokens);
  let mut imports = Vec::new();
  let mut classes = Vec::new();
  let mut functions = Vec::new();

  while !s.is_at_end() {
    let is_export = s.matches(TokenKind::Export);
    if s.check(TokenKind::Import) {
      imports.push(parse_import(&mut s, is_export)?);
    } else if s.check(TokenKind::Class) {
      classes.push(parse_class(&mut s, is_export)?);
    } else if s.check(TokenKind::Extern) {
      functions.push(parse_function(&mut s, is_export, true)?);
    } else if s.check(TokenKind::Fn) {
      functions.push(parse_function(&mut s, is_export, false)?);
    } else {
      return Err(ParserError { message: "Expected declaration".into(), span: s.peek(0).span.clone() });
    }
  }

  let end = s.previous().span.end.clone();
  Ok(ModuleAst { imports, classes, functions, span: SourceSpan::new(start, end) })
}

/// Parse a standalone expression (used by tests and tooling).
pub fn parse_expression(tokens: Vec<Token>) -> Result<Expression, ParserError> {
  let mut s = TokenStream::new(tokens);
  parse_expr(&mut s)
}

fn parse_import(s: &mut TokenStream, is_export: bool) -> Result<ImportDecl, ParserError> {
  let start = s.expect(TokenKind::Import, "Expected 'import'")?.span.start;
  let mut segments = vec![s.expect(TokenKind::Ident, "Expected module path segment")?.lexeme];
  while s.matches(TokenKind::Dot) {
    segments.push(s.expect(TokenKind::Ident, "Expected module path segment")?.lexeme);
  }
  let end = s.expect(TokenKind::Semicolon, "Expected ';' after import")?.span.end;
  Ok(ImportDecl { module_path: segments, is_export, span: SourceSpan::new(start, end) })
}

fn parse_class(s: &mut TokenStream, is_export: bool) -> Result<ClassDecl, ParserError> {
  let start = s.expect(TokenKind::Class, "Expected 'class'")?.span.start;
  let name = s.expect(TokenKind::Ident, "Expected class name")?.lexeme;
  s.expect(TokenKind::LBrace, "Expected '{' after class name")?;

  let mut fields = Vec::new();
  let mut methods = Vec::new();
  while !s.check(TokenKind::RBrace) && !s.is_at_end() {
    let mut is_static = false;
    let mut is_private = false;
    loop {
      if s.matches(TokenKind::Static) { is_static = true; continue; }
      if s.matches(TokenKind::Private) { is_private = true; continue; }
      break;
    }
    if s.check(TokenKind::Fn) {
      methods.push(parse_method(s, is_static, is_private)?);
    } else {
      fields.push(parse_field(s, is_private)?);
    }
  }
  let end = s.expect(TokenKind::RBrace, "Expected '}' after class body")?.span.end;
  Ok(ClassDecl { name, fields, methods, is_export, span: SourceSpan::new(start, end) })
}

fn parse_field(s: &mut TokenStream, is_private: bool) -> Result<FieldDecl, ParserError> {
  let name_tok = s.expect(TokenKind::Ident, "Expected field name")?;
  let start = name_tok.span.start.clone();
  s.expect(TokenKind::Colon, "Expected ':' after field name")?;
  let type_ref = parse_type(s)?;
  let end = s.expect(TokenKind::Semicolon, "Expected ';' after field declaration")?.span.end;
  Ok(FieldDecl { name: name_tok.lexeme, type_ref, is_private, span: SourceSpan::new(start, end) })
}

fn parse_method(s: &mut TokenStream, is_static: bool, is_private: bool) -> Result<MethodDecl, ParserError> {
  let start = s.expect(TokenKind::Fn, "Expected 'fn'")?.span.start;
  let name = s.expect(TokenKind::Ident, "Expected method name")?.lexeme;
  let params = parse_params(s)?;
  s.expect(TokenKind::Arrow, "Expected '->' after parameter list")?;
  let return_type = parse_type(s)?;
  let body = parse_block(s)?;
  let end = body.span.end.clone();
  Ok(MethodDecl { name, params, return_type, body, is_static, is_private, span: SourceSpan::new(start, end) })
}

fn parse_function(s: &mut TokenStream, is_export: bool, is_extern: bool) -> Result<FunctionDecl, ParserError> {
  let start = if is_extern {
    s.expect(TokenKind::Extern, "Expected 'extern'")?.span.start
  } else {
    s.peek(0).span.start.clone()
  };
  s.expect(TokenKind::Fn, "Expected 'fn'")?;
  let name = s.expect(TokenKind::Ident, "Expected function name")?.lexeme;
  let params = parse_params(s)?;
  s.expect(TokenKind::Arrow, "Expected '->' after parameter list")?;
  let return_type = parse_type(s)?;

  if is_extern {
    let end = s.expect(TokenKind::Semicolon, "Expected ';' after extern function declaration")?.span.end;
    return Ok(FunctionDecl { name, params, return_type, body: None, is_export, is_extern, span: SourceSpan::new(start, end) });
  }

  let body = parse_block(s)?;
  let end = body.span.end.clone();
  Ok(FunctionDecl { name, params, return_type, body: Some(body), is_export, is_extern, span: SourceSpan::new(start, end) })
}

fn parse_params(s: &mut TokenStream) -> Result<Vec<ParamDecl>, ParserError> {
  s.expect(TokenKind::LParen, "Expected '(' after name")?;
  let mut params = Vec::new();
  if !s.check(TokenKind::RParen) {
    loop {
      let name_tok = s.expect(TokenKind::Ident, "Expected parameter name")?;
      let start = name_tok.span.start.clone();
      s.expect(TokenKind::Colon, "Expected ':' after parameter name")?;
      let type_ref = parse_type(s)?;
      let end = type_ref.span().end.clone();
      params.push(ParamDecl { name: name_tok.lexeme, type_ref, span: SourceSpan::new(start, end) });
      if !s.matches(TokenKind::Comma) { break; }
    }
  }
  s.expect(TokenKind::RParen, "Expected ')' after parameter list")?;
  Ok(params)
}

fn parse_type(s: &mut TokenStream) -> Result<TypeRef, ParserError> {
  let start_tok = s.peek(0).clone();
  if !start_tok.kind.is_type_name_start() {
    return Err(ParserError { message: "Expected type".into(), span: start_tok.span.clone() });
  }
  let mut name = s.advance().lexeme;
  while s.check(TokenKind::Dot) {
    s.advance();
    let seg = s.expect(TokenKind::Ident, "Expected identifier after '.' in type name")?;
    name.push('.');
    name.push_str(&seg.lexeme);
  }
  let mut ty = TypeRef::Named { name, span: SourceSpan::new(start_tok.span.start.clone(), s.previous().span.end.clone()) };
  while s.check(TokenKind::LBracket) && s.peek(1).kind == TokenKind::RBracket {
    s.advance();
    s.advance();
    let end = s.previous().span.end.clone();
    let span = SourceSpan::new(start_tok.span.start.clone(), end);
    ty = TypeRef::Array { element: Box::new(ty), span };
  }
  Ok(ty)
}

fn parse_block(s: &mut TokenStream) -> Result<BlockStmt, ParserError> {
  let start = s.expect(TokenKind::LBrace, "Expected '{'")?.span.start;
  let mut statements = Vec::new();
  while !s.check(TokenKind::RBrace) {
    if s.is_at_end() {
      return Err(ParserError { message: "Unterminated block".into(), span: s.peek(0).span.clone() });
    }
    statements.push(parse_statement(s)?);
  }
  let end = s.expect(TokenKind::RBrace, "Expected '}' to close block")?.span.end;
  Ok(BlockStmt { statements, span: SourceSpan::new(start, end) })
}

fn parse_statement(s: &mut TokenStream) -> Result<Statement, ParserError> {
  if s.check(TokenKind::LBrace) {
    return Ok(Statement::Block(parse_block(s)?));
  }
  if s.check(TokenKind::Var) {
    return parse_var_decl(s);
  }
  if s.check(TokenKind::If) {
    return Ok(Statement::If(parse_if(s)?));
  }
  if s.check(TokenKind::While) {
    return parse_while(s);
  }
  if s.check(TokenKind::Return) {
    return parse_return(s);
  }
  if s.check(TokenKind::Break) {
    let span = s.advance().span;
    let end = s.expect(TokenKind::Semicolon, "Expected ';' after 'break'")?.span.end;
    return Ok(Statement::Break { span: SourceSpan::new(span.start, end) });
  }
  if s.check(TokenKind::Continue) {
    let span = s.advance().span;
    let end = s.expect(TokenKind::Semicolon, "Expected ';' after 'continue'")?.span.end;
    return Ok(Statement::Continue { span: SourceSpan::new(span.start, end) });
  }
  parse_assign_or_expr_stmt(s)
}

fn parse_var_decl(s: &mut TokenStream) -> Result<Statement, ParserError> {
  let start = s.expect(TokenKind::Var, "Expected 'var'")?.span.start;
  let name = s.expect(TokenKind::Ident, "Expected variable name")?.lexeme;
  s.expect(TokenKind::Colon, "Expected ':' after variable name")?;
  let type_ref = parse_type(s)?;
  let init = if s.matches(TokenKind::Assign) { Some(parse_expr(s)?) } else { None };
  let end = s.expect(TokenKind::Semicolon, "Expected ';' after variable declaration")?.span.end;
  Ok(Statement::VarDecl { name, type_ref, init, span: SourceSpan::new(start, end) })
}

fn parse_if(s: &mut TokenStream) -> Result<IfStmt, ParserError> {
  let start = s.expect(TokenKind::If, "Expected 'if'")?.span.start;
  let condition = parse_expr(s)?;
  let then_branch = parse_block(s)?;
  let mut end = then_branch.span.end.clone();
  let else_branch = if s.matches(TokenKind::Else) {
    if s.check(TokenKind::If) {
      let nested = parse_if(s)?;
      end = nested.span.end.clone();
      ElseBranch::If(Box::new(nested))
    } else {
      let blk = parse_block(s)?;
      end = blk.span.end.clone();
      ElseBranch::Block(blk)
    }
  } else {
    ElseBranch::None
  };
  Ok(IfStmt { condition, then_branch, else_branch, span: SourceSpan::new(start, end) })
}

fn parse_while(s: &mut TokenStream) -> Result<Statement, ParserError> {
  let start = s.expect(TokenKind::While, "Expected 'while'")?.span.start;
  let condition = parse_expr(s)?;
  let body = parse_block(s)?;
  let end = body.span.end.clone();
  Ok(Statement::While(WhileStmt { condition, body, span: SourceSpan::new(start, end) }))
}

fn parse_return(s: &mut TokenStream) -> Result<Statement, ParserError> {
  let start = s.expect(TokenKind::Return, "Expected 'return'")?.span.start;
  let value = if s.check(TokenKind::Semicolon) { None } else { Some(parse_expr(s)?) };
  let end = s.expect(TokenKind::Semicolon, "Expected ';' after return statement")?.span.end;
  Ok(Statement::Return { value, span: SourceSpan::new(start, end) })
}

fn parse_assign_or_expr_stmt(s: &mut TokenStream) -> Result<Statement, ParserError> {
  let expr = parse_expr(s)?;
  if s.matches(TokenKind::Assign) {
    if !matches!(expr, Expression::Identifier { .. } | Expression::FieldAccess { .. } | Expression::Index { .. }) {
      return Err(ParserError { message: "Invalid assignment target".into(), span: expr.span().clone() });
    }
    let value = parse_expr(s)?;
    let end = s.expect(TokenKind::Semicolon, "Expected ';' after assignment")?.span.end;
    let start = expr.span().start.clone();
    return Ok(Statement::Assign { target: expr, value, span: SourceSpan::new(start, end) });
  }
  let end = s.expect(TokenKind::Semicolon, "Expected ';' after expression statement")?.span.end;
  let start = expr.span().start.clone();
  Ok(Statement::ExprStmt { expr, span: SourceSpan::new(start, end) })
}

// ---- Expression parsing: Pratt-style precedence climbing ----

fn parse_expr(s: &mut TokenStream) -> Result<Expression, ParserError> { parse_or(s) }

fn parse_or(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let mut left = parse_and(s)?;
  while s.matches(TokenKind::OrOr) {
    let right = parse_and(s)?;
    let start = left.span().start.clone();
    let end = right.span().end.clone();
    left = Expression::Binary { op: BinaryOp::Or, left: Box::new(left), right: Box::new(right), span: SourceSpan::new(start, end) };
  }
  Ok(left)
}

fn parse_and(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let mut left = parse_equality(s)?;
  while s.matches(TokenKind::AndAnd) {
    let right = parse_equality(s)?;
    let start = left.span().start.clone();
    let end = right.span().end.clone();
    left = Expression::Binary { op: BinaryOp::And, left: Box::new(left), right: Box::new(right), span: SourceSpan::new(start, end) };
  }
  Ok(left)
}

fn parse_equality(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let mut left = parse_comparison(s)?;
  loop {
    let op = if s.check(TokenKind::EqEq) { Some(BinaryOp::EqEq) }
      else if s.check(TokenKind::Neq) { Some(BinaryOp::Neq) }
      else { None };
    let Some(op) = op else { break };
    s.advance();
    let right = parse_comparison(s)?;
    let start = left.span().start.clone();
    let end = right.span().end.clone();
    left = Expression::Binary { op, left: Box::new(left), right: Box::new(right), span: SourceSpan::new(start, end) };
  }
  Ok(left)
}

fn parse_comparison(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let mut left = parse_additive(s)?;
  loop {
    let op = if s.check(TokenKind::Lt) { Some(BinaryOp::Lt) }
      else if s.check(TokenKind::Lte) { Some(BinaryOp::Lte) }
      else if s.check(TokenKind::Gt) { Some(BinaryOp::Gt) }
      else if s.check(TokenKind::Gte) { Some(BinaryOp::Gte) }
      else { None };
    let Some(op) = op else { break };
    s.advance();
    let right = parse_additive(s)?;
    let start = left.span().start.clone();
    let end = right.span().end.clone();
    left = Expression::Binary { op, left: Box::new(left), right: Box::new(right), span: SourceSpan::new(start, end) };
  }
  Ok(left)
}

fn parse_additive(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let mut left = parse_multiplicative(s)?;
  loop {
    let op = if s.check(TokenKind::Plus) { Some(BinaryOp::Add) }
      else if s.check(TokenKind::Minus) { Some(BinaryOp::Sub) }
      else { None };
    let Some(op) = op else { break };
    s.advance();
    let right = parse_multiplicative(s)?;
    let start = left.span().start.clone();
    let end = right.span().end.clone();
    left = Expression::Binary { op, left: Box::new(left), right: Box::new(right), span: SourceSpan::new(start, end) };
  }
  Ok(left)
}

fn parse_multiplicative(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let mut left = parse_unary(s)?;
  loop {
    let op = if s.check(TokenKind::Star) { Some(BinaryOp::Mul) }
      else if s.check(TokenKind::Slash) { Some(BinaryOp::Div) }
      else if s.check(TokenKind::Percent) { Some(BinaryOp::Mod) }
      else { None };
    let Some(op) = op else { break };
    s.advance();
    let right = parse_unary(s)?;
    let start = left.span().start.clone();
    let end = right.span().end.clone();
    left = Expression::Binary { op, left: Box::new(left), right: Box::new(right), span: SourceSpan::new(start, end) };
  }
  Ok(left)
}

fn parse_unary(s: &mut TokenStream) -> Result<Expression, ParserError> {
  if s.check(TokenKind::Bang) || s.check(TokenKind::Minus) {
    let tok = s.advance();
    let op = if tok.kind == TokenKind::Bang { UnaryOp::Not } else { UnaryOp::Neg };
    let operand = parse_unary(s)?;
    let end = operand.span().end.clone();
    return Ok(Expression::Unary { op, operand: Box::new(operand), span: SourceSpan::new(tok.span.start, end) });
  }
  parse_cast(s)
}

/// A cast is recognized by lookahead: `(` type-name `)` followed by a
/// token that can start a unary expression.
fn looks_like_cast(s: &TokenStream) -> bool {
  if !s.check(TokenKind::LParen) { return false; }
  let mut i: isize = 1;
  if !s.peek(i).kind.is_type_name_start() { return false; }
  i += 1;
  while s.peek(i).kind == TokenKind::Dot {
    if s.peek(i + 1).kind != TokenKind::Ident { return false; }
    i += 2;
  }
  if s.peek(i).kind != TokenKind::RParen { return false; }
  i += 1;
  let after = s.peek(i).kind;
  matches!(
    after,
    TokenKind::Ident | TokenKind::IntLit | TokenKind::FloatLit | TokenKind::StringLit
      | TokenKind::CharLit | TokenKind::LParen | TokenKind::Bang | TokenKind::Minus
      | TokenKind::True | TokenKind::False | TokenKind::Null
  )
}

fn parse_cast(s: &mut TokenStream) -> Result<Expression, ParserError> {
  if looks_like_cast(s) {
    let start = s.expect(TokenKind::LParen, "Expected '('")?.span.start;
    let type_ref = parse_type(s)?;
    s.expect(TokenKind::RParen, "Expected ')' after cast type")?;
    let operand = parse_unary(s)?;
    let end = operand.span().end.clone();
    return Ok(Expression::Cast { type_ref, operand: Box::new(operand), span: SourceSpan::new(start, end) });
  }
  parse_postfix(s)
}

fn parse_postfix(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let mut expr = parse_primary(s)?;
  loop {
    if s.matches(TokenKind::LParen) {
      let mut args = Vec::new();
      if !s.check(TokenKind::RParen) {
        loop {
          args.push(parse_expr(s)?);
          if !s.matches(TokenKind::Comma) { break; }
        }
      }
      let end = s.expect(TokenKind::RParen, "Expected ')' after call arguments")?.span.end;
      let start = expr.span().start.clone();
      expr = Expression::Call { callee: Box::new(expr), args, span: SourceSpan::new(start, end) };
      continue;
    }
    if s.matches(TokenKind::Dot) {
      let name_tok = s.expect(TokenKind::Ident, "Expected field or method name after '.'")?;
      let start = expr.span().start.clone();
      let end = name_tok.span.end.clone();
      expr = Expression::FieldAccess { object: Box::new(expr), name: name_tok.lexeme, span: SourceSpan::new(start, end) };
      continue;
    }
    if s.matches(TokenKind::LBracket) {
      let index = parse_expr(s)?;
      let end = s.expect(TokenKind::RBracket, "Expected ']' after index expression")?.span.end;
      let start = expr.span().start.clone();
      expr = Expression::Index { object: Box::new(expr), index: Box::new(index), span: SourceSpan::new(start, end) };
      continue;
    }
    break;
  }
  Ok(expr)
}

fn parse_primary(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let tok = s.peek(0).clone();
  match tok.kind {
    TokenKind::IntLit | TokenKind::FloatLit | TokenKind::StringLit | TokenKind::CharLit => {
      s.advance();
      Ok(Expression::Literal { text: tok.lexeme, span: tok.span })
    }
    TokenKind::True | TokenKind::False => {
      s.advance();
      Ok(Expression::Literal { text: tok.lexeme, span: tok.span })
    }
    TokenKind::Null => {
      s.advance();
      Ok(Expression::Null { span: tok.span })
    }
    TokenKind::LParen => {
      s.advance();
      let inner = parse_expr(s)?;
      s.expect(TokenKind::RParen, "Expected ')' after expression")?;
      Ok(inner)
    }
    _ if tok.kind.is_type_name_start() && s.peek(1).kind == TokenKind::LBracket => {
      parse_array_ctor(s)
    }
    TokenKind::Ident => {
      s.advance();
      Ok(Expression::Identifier { name: tok.lexeme, span: tok.span })
    }
    _ => Err(ParserError { message: "Expected expression".into(), span: tok.span }),
  }
}

fn parse_array_ctor(s: &mut TokenStream) -> Result<Expression, ParserError> {
  let element_type = parse_type(s)?;
  s.expect(TokenKind::LParen, "Expected '(' after array type in array constructor")?;
  let length = parse_expr(s)?;
  let end = s.expect(TokenKind::RParen, "Expected ')' after array constructor length")?.span.end;
  let start = element_type.span().start.clone();
  Ok(Expression::ArrayCtor { element_type, length: Box::new(length), span: SourceSpan::new(start, end) })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::lex;

  fn parse_src(src: &str) -> ModuleAst {
    parse(lex(src, "<test>").unwrap()).unwrap()
  }

  #[test]
  fn empty_block_and_noop_return() {
    let m = parse_src("fn main() -> unit { return; }");
    assert_eq!(m.functions.len(), 1);
  }

  #[test]
  fn array_type_and_ctor() {
    let m = parse_src("fn f() -> i64[] { var a: i64[] = i64[](3); return a; }");
    assert_eq!(m.functions.len(), 1);
  }

  #[test]
  fn if_else_if_chain() {
    let m = parse_src("fn f(x: i64) -> i64 { if x > 0 { return 1; } else if x < 0 { return -1; } else { return 0; } }");
    let body = m.functions[0].body.as_ref().unwrap();
    assert_eq!(body.statements.len(), 1);
  }

  #[test]
  fn cast_expression() {
    let e = parse_expression(lex("(Obj)x", "<t>").unwrap()).unwrap();
    assert!(matches!(e, Expression::Cast { .. }));
  }

  #[test]
  fn invalid_assignment_target_is_error() {
    let err = parse(lex("fn f() -> unit { 1 + 2 = 3; }", "<t>").unwrap()).unwrap_err();
    assert_eq!(err.message, "Invalid assignment target");
  }

  #[test]
  fn unterminated_block_is_error() {
    let err = parse(lex("fn f() -> unit {", "<t>").unwrap()).unwrap_err();
    assert_eq!(err.message, "Unterminated block");
  }

  #[test]
  fn qualified_type_name() {
    let m = parse_src("fn f(x: util.Counter) -> unit { }");
    match &m.functions[0].params[0].type_ref {
      TypeRef::Named { name, .. } => assert_eq!(name, "util.Counter"),
      _ => panic!("expected named type"),
    }
  }

  #[test]
  fn static_private_method_modifiers() {
    let m = parse_src("class C { static private fn f() -> unit { } }");
    let method = &m.classes[0].methods[0];
    assert!(method.is_static);
    assert!(method.is_private);
  }

  #[test]
  fn precedence_mul_before_add() {
    let e = parse_expression(lex("1 + 2 * 3", "<t>").unwrap()).unwrap();
    match e {
      Expression::Binary { op: BinaryOp::Add, right, .. } => {
        assert!(matches!(*right, Expression::Binary { op: BinaryOp::Mul, .. }));
      }
      _ => panic!("expected addition at top level"),
    }
  }
}
