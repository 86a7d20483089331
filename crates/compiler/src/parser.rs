//! Recursive-descent parser for XL.
//!
//! One source file parses to a [`Program`]: imports, global declarations,
//! and functions in source order. Expressions use a precedence ladder,
//! lowest binding first:
//!
//! ```text
//! ||  →  &&  →  == !=  →  < > <= >=  →  & | ^ << >> >>>  →  + -  →  * /
//! ```
//!
//! All levels are left-associative. There is no unary minus; negative
//! literals are written `Int(-N)`. Trailing semicolons are tolerated after
//! any statement or declaration. There is no error recovery: the first
//! unexpected token aborts the parse.

use crate::ast::{BinOp, Expr, Function, Program, Stmt, VarDecl};
use crate::lexer::{Token, TokenKind};

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    Expr::Binary { left: Box::new(left), op, right: Box::new(right) }
}

/// Parse failure: the offending token (or end of input) plus what the
/// grammar expected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },
    UnexpectedEnd {
        expected: String,
    },
    InvalidNumber {
        text: String,
        line: usize,
        column: usize,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found, line, column } => {
                write!(
                    f,
                    "expected {} but found '{}' at line {}, column {}",
                    expected, found, line, column
                )
            }
            ParseError::UnexpectedEnd { expected } => {
                write!(f, "expected {} but reached the end of input", expected)
            }
            ParseError::InvalidNumber { text, line, column } => {
                write!(f, "invalid number literal '{}' at line {}, column {}", text, line, column)
            }
        }
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser { tokens, pos: 0 }
    }

    /// Parse a whole file.
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        loop {
            self.skip_semicolons();
            let Some(tok) = self.peek() else { break };
            match tok.kind {
                TokenKind::Import => {
                    self.advance();
                    let target = self.expect(TokenKind::Str)?;
                    program.imports.push(target.text);
                }
                TokenKind::Var => program.globals.push(self.parse_var_decl()?),
                TokenKind::Func => program.functions.push(self.parse_func()?),
                _ => return Err(self.unexpected("a declaration")),
            }
        }
        Ok(program)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn parse_var_decl(&mut self) -> Result<VarDecl, ParseError> {
        self.expect(TokenKind::Var)?;
        let name = self.expect(TokenKind::Ident)?.text;
        self.expect_op("=")?;
        let value = self.parse_expr()?;
        Ok(VarDecl { name, value })
    }

    fn parse_func(&mut self) -> Result<Function, ParseError> {
        self.expect(TokenKind::Func)?;
        let name = self.expect(TokenKind::Ident)?.text;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.expect(TokenKind::Ident)?.text);
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Function { name, params, body })
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.peek().is_none() {
                return Err(ParseError::UnexpectedEnd { expected: "'}'".to_string() });
            }
            body.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let Some(tok) = self.peek() else {
            return Err(ParseError::UnexpectedEnd { expected: "a statement".to_string() });
        };
        let stmt = match tok.kind {
            TokenKind::Var => Stmt::Var(self.parse_var_decl()?),
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Return => {
                self.advance();
                Stmt::Return(self.parse_expr()?)
            }
            TokenKind::Ident => self.parse_ident_stmt()?,
            _ => Stmt::Expr(self.parse_expr()?),
        };
        self.skip_semicolons();
        Ok(stmt)
    }

    /// A statement starting with an identifier: assignment, array-element
    /// assignment, or a bare expression (typically a call).
    fn parse_ident_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_at(1) {
            Some(next) if next.kind == TokenKind::LBracket => {
                let name = self.expect(TokenKind::Ident)?.text;
                self.expect(TokenKind::LBracket)?;
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                self.expect_op("=")?;
                let value = self.parse_expr()?;
                Ok(Stmt::ArrayAssign { name, index, value })
            }
            Some(next) if next.kind == TokenKind::Op && next.text == "=" => {
                let name = self.expect(TokenKind::Ident)?.text;
                self.advance(); // '='
                Ok(Stmt::Assign { name, expr: self.parse_expr()? })
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then_body = self.parse_block()?;
        let else_body = if self.check(TokenKind::Else) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then_body, else_body })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::While { cond, body })
    }

    /// `for (init cond; step) { body }` — init and step reuse the statement
    /// grammar, so `var` declarations and assignments both work there.
    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;
        let init = Box::new(self.parse_stmt()?);
        let cond = self.parse_expr()?;
        self.skip_semicolons();
        let step = Box::new(self.parse_stmt()?);
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::For { init, cond, step, body })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_logic_or()
    }

    fn parse_logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_logic_and()?;
        while let Some(op) = self.match_op(&["||"]) {
            node = binary(node, op, self.parse_logic_and()?);
        }
        Ok(node)
    }

    fn parse_logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_equality()?;
        while let Some(op) = self.match_op(&["&&"]) {
            node = binary(node, op, self.parse_equality()?);
        }
        Ok(node)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_relational()?;
        while let Some(op) = self.match_op(&["==", "!="]) {
            node = binary(node, op, self.parse_relational()?);
        }
        Ok(node)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_bitwise()?;
        while let Some(op) = self.match_op(&["<", ">", "<=", ">="]) {
            node = binary(node, op, self.parse_bitwise()?);
        }
        Ok(node)
    }

    fn parse_bitwise(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_term()?;
        while let Some(op) = self.match_op(&["&", "|", "^", "<<", ">>", ">>>"]) {
            node = binary(node, op, self.parse_term()?);
        }
        Ok(node)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_factor()?;
        while let Some(op) = self.match_op(&["+", "-"]) {
            node = binary(node, op, self.parse_factor()?);
        }
        Ok(node)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let mut node = self.parse_primary()?;
        while let Some(op) = self.match_op(&["*", "/"]) {
            node = binary(node, op, self.parse_primary()?);
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.advance() else {
            return Err(ParseError::UnexpectedEnd { expected: "an expression".to_string() });
        };
        match tok.kind {
            TokenKind::Number => Ok(Expr::Number(parse_int_literal(&tok)?)),
            TokenKind::Str => Ok(Expr::Str(tok.text)),
            TokenKind::New => {
                self.expect(TokenKind::LParen)?;
                let size = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Alloc(Box::new(size)))
            }
            TokenKind::LParen => {
                let node = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(node)
            }
            TokenKind::Ident if tok.text == "Int" => self.parse_signed_literal(),
            TokenKind::Ident => {
                let name = tok.text;
                if self.check(TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(Expr::Call { name, args })
                } else if self.check(TokenKind::LBracket) {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    Ok(Expr::Index { name, index: Box::new(index) })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "an expression".to_string(),
                found: tok.text,
                line: tok.line,
                column: tok.column,
            }),
        }
    }

    /// `Int(N)` / `Int(-N)`: the primary grammar has no unary minus, so
    /// negative literals go through this sugar.
    fn parse_signed_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;
        let negative = match self.peek() {
            Some(t) if t.kind == TokenKind::Op && t.text == "-" => {
                self.advance();
                true
            }
            _ => false,
        };
        let num = self.expect(TokenKind::Number)?;
        let mut value = parse_int_literal(&num)?;
        if negative {
            value = value.wrapping_neg();
        }
        self.expect(TokenKind::RParen)?;
        Ok(Expr::Number(value))
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        match self.advance_if(|t| t.kind == kind) {
            Some(tok) => Ok(tok),
            None => Err(self.unexpected(kind.describe())),
        }
    }

    fn expect_op(&mut self, symbol: &str) -> Result<Token, ParseError> {
        match self.advance_if(|t| t.kind == TokenKind::Op && t.text == symbol) {
            Some(tok) => Ok(tok),
            None => Err(self.unexpected(&format!("'{}'", symbol))),
        }
    }

    fn advance_if(&mut self, pred: impl Fn(&Token) -> bool) -> Option<Token> {
        if self.peek().is_some_and(&pred) {
            self.advance()
        } else {
            None
        }
    }

    /// Consume and translate the next operator if it is one of `symbols`.
    fn match_op(&mut self, symbols: &[&str]) -> Option<BinOp> {
        let tok = self.peek()?;
        if tok.kind == TokenKind::Op && symbols.contains(&tok.text.as_str()) {
            let op = BinOp::from_symbol(&tok.text)?;
            self.advance();
            Some(op)
        } else {
            None
        }
    }

    fn skip_semicolons(&mut self) {
        while self.check(TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(tok) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: tok.text.clone(),
                line: tok.line,
                column: tok.column,
            },
            None => ParseError::UnexpectedEnd { expected: expected.to_string() },
        }
    }
}

/// Decode a number token: `0x` hexadecimal or decimal, wrapped into the
/// VM's 64-bit word domain.
fn parse_int_literal(tok: &Token) -> Result<i64, ParseError> {
    let digits = tok.text.strip_prefix("0x").or_else(|| tok.text.strip_prefix("0X"));
    let parsed = match digits {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => tok.text.parse::<u64>(),
    };
    match parsed {
        Ok(v) => Ok(v as i64),
        Err(_) => Err(ParseError::InvalidNumber {
            text: tok.text.clone(),
            line: tok.line,
            column: tok.column,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(source: &str) -> Program {
        Parser::new(tokenize(source).unwrap()).parse().unwrap()
    }

    fn parse_expression(source: &str) -> Expr {
        let mut parser = Parser::new(tokenize(source).unwrap());
        parser.parse_expr().unwrap()
    }

    #[test]
    fn test_program_sections_in_source_order() {
        let program = parse(
            r#"
            import "lib.xl"
            var total = 0;
            func main() { return total; }
            "#,
        );
        assert_eq!(program.imports, vec!["lib.xl"]);
        assert_eq!(program.globals.len(), 1);
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
    }

    #[test]
    fn test_precedence_mul_binds_tighter_than_add() {
        // 2 + 3 * 4 parses as 2 + (3 * 4)
        let expr = parse_expression("2 + 3 * 4");
        match expr {
            Expr::Binary { left, op: BinOp::Add, right } => {
                assert_eq!(*left, Expr::Number(2));
                assert!(matches!(*right, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_left_associativity() {
        // 10 - 3 - 2 parses as (10 - 3) - 2
        let expr = parse_expression("10 - 3 - 2");
        match expr {
            Expr::Binary { left, op: BinOp::Sub, right } => {
                assert!(matches!(*left, Expr::Binary { op: BinOp::Sub, .. }));
                assert_eq!(*right, Expr::Number(2));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_comparison_binds_looser_than_bitwise() {
        // a & 1 == 0 parses as (a & 1) == 0
        let expr = parse_expression("a & 1 == 0");
        assert!(matches!(expr, Expr::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn test_parenthesized_expression() {
        let expr = parse_expression("(2 + 3) * 4");
        match expr {
            Expr::Binary { left, op: BinOp::Mul, .. } => {
                assert!(matches!(*left, Expr::Binary { op: BinOp::Add, .. }));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_signed_literal_sugar() {
        assert_eq!(parse_expression("Int(-5)"), Expr::Number(-5));
        assert_eq!(parse_expression("Int(7)"), Expr::Number(7));
        assert_eq!(parse_expression("Int(-0x10)"), Expr::Number(-16));
    }

    #[test]
    fn test_hex_literal_full_width() {
        assert_eq!(
            parse_expression("0x8000000000000000"),
            Expr::Number(i64::MIN)
        );
    }

    #[test]
    fn test_call_and_index_primaries() {
        assert_eq!(
            parse_expression("sub(10, 3)"),
            Expr::Call {
                name: "sub".to_string(),
                args: vec![Expr::Number(10), Expr::Number(3)],
            }
        );
        assert!(matches!(parse_expression("a[i + 1]"), Expr::Index { .. }));
        assert!(matches!(parse_expression("new(3)"), Expr::Alloc(_)));
    }

    #[test]
    fn test_statement_forms() {
        let program = parse(
            r#"
            func f(a, b) {
                var x = 1
                x = x + 1;
                a[0] = x
                if (x == 2) { return 1; } else { return 0; }
            }
            "#,
        );
        let body = &program.functions[0].body;
        assert!(matches!(body[0], Stmt::Var(_)));
        assert!(matches!(body[1], Stmt::Assign { .. }));
        assert!(matches!(body[2], Stmt::ArrayAssign { .. }));
        assert!(matches!(body[3], Stmt::If { .. }));
    }

    #[test]
    fn test_for_header_reuses_statement_grammar() {
        let program = parse("func main() { for (var i = 0; i < 5; i = i + 1) { prints(\"x\"); } }");
        match &program.functions[0].body[0] {
            Stmt::For { init, cond, step, body } => {
                assert!(matches!(**init, Stmt::Var(_)));
                assert!(matches!(cond, Expr::Binary { op: BinOp::Lt, .. }));
                assert!(matches!(**step, Stmt::Assign { .. }));
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_while_loop() {
        let program = parse("func main() { while (1) { x = x + 1; } }");
        assert!(matches!(program.functions[0].body[0], Stmt::While { .. }));
    }

    #[test]
    fn test_expression_statement_is_popped_call() {
        let program = parse("func main() { prints(\"hi\"); }");
        assert!(matches!(program.functions[0].body[0], Stmt::Expr(Expr::Call { .. })));
    }

    #[test]
    fn test_missing_paren_reports_expected_token() {
        let tokens = tokenize("func main( { }").unwrap();
        let err = Parser::new(tokens).parse().unwrap_err();
        match err {
            ParseError::UnexpectedToken { expected, found, .. } => {
                assert_eq!(expected, "')'");
                assert_eq!(found, "{");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_stray_top_level_token_is_an_error() {
        let tokens = tokenize("42").unwrap();
        assert!(Parser::new(tokens).parse().is_err());
    }

    #[test]
    fn test_else_is_optional() {
        let program = parse("func main() { if (1) { return 1; } return 0; }");
        match &program.functions[0].body[0] {
            Stmt::If { else_body, .. } => assert!(else_body.is_empty()),
            other => panic!("unexpected statement: {:?}", other),
        }
    }
}
