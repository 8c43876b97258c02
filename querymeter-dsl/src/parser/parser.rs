//! Recursive-descent parser for the expression language
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr        := or_expr ( "if" or_expr "else" expr )?
//! or_expr     := and_expr ( "or" and_expr )*
//! and_expr    := not_expr ( "and" not_expr )*
//! not_expr    := "not" not_expr | comparison
//! comparison  := arith ( compare_op arith )*
//! arith       := term ( ("+" | "-") term )*
//! term        := factor ( ("*" | "/" | "//" | "%") factor )*
//! factor      := ("-" | "+") factor | power
//! power       := primary ( "**" factor )?
//! primary     := literal | name ( "." name )* | builtin "(" args ")"
//!              | "SOURCES" "[" string "]" | "(" expr ")"
//! ```

use super::ast::*;
use crate::lexer::*;

/// Depth limit of the expression tree. Parentheses, unary and power operators
/// and every link of a binary operator chain count one level.
const MAX_DEPTH: usize = 128;

/// Name of the explicit source mapping.
pub const SOURCES_NAME: &str = "SOURCES";

/// Parse an expression string.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize();
    let mut parser = Parser::new(tokens);
    parser.parse()
}

/// Parser for the expression language.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    depth: usize,
}

impl Parser {
    /// Create a new parser from a vector of tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens = tokens;
        if tokens.last().map(|t| t.kind != TokenKind::Eof).unwrap_or(true) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                span,
            });
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse the tokens as exactly one expression.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        if let Some(token) = self
            .tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Error(_)))
        {
            let message = match &token.kind {
                TokenKind::Error(msg) => msg.clone(),
                _ => "lexer error".to_string(),
            };
            return Err(ParseError {
                message,
                line: token.span.line,
                column: token.span.column,
            });
        }

        if self.is_at_end() {
            return Err(self.error("expected an expression"));
        }

        let expr = self.parse_expr()?;

        if !self.is_at_end() {
            return Err(match &self.current().kind {
                TokenKind::Assign => self.error("assignment is not allowed in expressions"),
                other => self.error(&format!("unexpected {} after expression", other)),
            });
        }

        Ok(expr)
    }

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let result = self.parse_conditional();
        self.leave();
        result
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let body = self.parse_or_expr()?;

        if self.check(&TokenKind::If) {
            self.advance();
            let test = self.parse_or_expr()?;
            self.expect(TokenKind::Else)?;
            let orelse = self.parse_expr()?;
            return Ok(Expr::Conditional {
                body: Box::new(body),
                test: Box::new(test),
                orelse: Box::new(orelse),
            });
        }

        Ok(body)
    }

    pub(crate) fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        let mut links = 0;

        while self.check(&TokenKind::Or) {
            self.advance();
            self.enter_link(&mut links)?;
            let right = self.parse_and_expr()?;
            left = Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.leave_links(links);
        Ok(left)
    }

    pub(crate) fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not_expr()?;
        let mut links = 0;

        while self.check(&TokenKind::And) {
            self.advance();
            self.enter_link(&mut links)?;
            let right = self.parse_not_expr()?;
            left = Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.leave_links(links);
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            self.enter()?;
            let operand = self.parse_not_expr();
            self.leave();
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand?),
            });
        }

        self.parse_comparison()
    }

    pub(crate) fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_arith()?;
        let mut rest = Vec::new();

        while let Some(op) = self.compare_op() {
            self.advance();
            rest.push((op, self.parse_arith()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn compare_op(&self) -> Option<CompareOp> {
        match self.current().kind {
            TokenKind::Eq => Some(CompareOp::Eq),
            TokenKind::Ne => Some(CompareOp::Ne),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::Le => Some(CompareOp::Le),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::Ge => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        let mut links = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.enter_link(&mut links)?;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.leave_links(links);
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;
        let mut links = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            self.enter_link(&mut links)?;
            let right = self.parse_factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.leave_links(links);
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Pos),
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                self.enter()?;
                let operand = self.parse_factor();
                self.leave();
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand?),
                })
            }
            None => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;

        if self.check(&TokenKind::DoubleStar) {
            self.advance();
            self.enter()?;
            let exponent = self.parse_factor();
            self.leave();
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent?),
            });
        }

        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let literal = match &self.current().kind {
            TokenKind::Int(i) => Some(Literal::Int(*i)),
            TokenKind::Float(f) => Some(Literal::Float(*f)),
            TokenKind::String(s) => Some(Literal::Str(s.clone())),
            TokenKind::True => Some(Literal::Bool(true)),
            TokenKind::False => Some(Literal::Bool(false)),
            TokenKind::None => Some(Literal::None),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expr::Literal(literal));
        }

        match self.current().kind.clone() {
            TokenKind::Identifier(name) => self.parse_name_or_call(name),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Reserved(keyword) => Err(self.error(&format!(
                "keyword `{}` is not allowed in expressions",
                keyword
            ))),
            TokenKind::Assign => Err(self.error("assignment is not allowed in expressions")),
            TokenKind::Eof => Err(self.error("unexpected end of expression")),
            other => Err(self.error(&format!("unexpected {}", other))),
        }
    }

    fn parse_name_or_call(&mut self, name: String) -> Result<Expr, ParseError> {
        self.advance();

        if name == SOURCES_NAME && self.check(&TokenKind::LBracket) {
            self.advance();
            let key = self.expect_string()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Expr::Source(key));
        }

        if self.check(&TokenKind::LParen) {
            return self.parse_call(&name);
        }

        let mut dotted = name;
        while self.check(&TokenKind::Dot) {
            self.advance();
            let part = self.expect_identifier()?;
            dotted.push('.');
            dotted.push_str(&part);
        }

        if self.check(&TokenKind::LParen) || self.check(&TokenKind::LBracket) {
            return Err(self.error(&format!("`{}` cannot be called or indexed", dotted)));
        }

        Ok(Expr::Name(dotted))
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        let func = Builtin::from_name(name)
            .ok_or_else(|| self.error(&format!("calling `{}` is not allowed", name)))?;
        self.expect(TokenKind::LParen)?;

        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            args.push(self.parse_expr()?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::RParen)?;

        let (min, max) = func.arity();
        if args.len() < min || max.map(|m| args.len() > m).unwrap_or(false) {
            let expected = match max {
                Some(m) if m == min => format!("{}", min),
                Some(m) => format!("{} to {}", min, m),
                None => format!("at least {}", min),
            };
            return Err(self.error(&format!(
                "`{}` expects {} argument(s), got {}",
                name,
                expected,
                args.len()
            )));
        }

        Ok(Expr::Call { func, args })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return Err(self.error("expression is nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Each node of a left-associative chain nests the previous one.
    fn enter_link(&mut self, links: &mut usize) -> Result<(), ParseError> {
        self.enter()?;
        *links += 1;
        Ok(())
    }

    fn leave_links(&mut self, links: usize) {
        self.depth = self.depth.saturating_sub(links);
    }

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {}, found {}", kind, self.current().kind)))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error(&format!("expected a name, found {}", other))),
        }
    }

    pub(crate) fn expect_string(&mut self) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error(&format!("expected a string, found {}", other))),
        }
    }

    pub(crate) fn error(&self, msg: &str) -> ParseError {
        let span = self.current().span;
        ParseError {
            message: msg.to_string(),
            line: span.line,
            column: span.column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    fn int(i: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Literal::Int(i)))
    }

    #[test]
    fn test_parse_dotted_division() -> Result<(), ParseError> {
        let expr = parse("test.foo / 2")?;
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Div,
                left: name("test.foo"),
                right: int(2),
            }
        );
        Ok(())
    }

    #[test]
    fn test_power_binds_tighter_than_negation() -> Result<(), ParseError> {
        let expr = parse("-2 ** 2")?;
        assert_eq!(
            expr,
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::Binary {
                    op: BinaryOp::Pow,
                    left: int(2),
                    right: int(2),
                }),
            }
        );
        Ok(())
    }

    #[test]
    fn test_power_is_right_associative() -> Result<(), ParseError> {
        let expr = parse("2 ** 3 ** 2")?;
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Pow,
                left: int(2),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Pow,
                    left: int(3),
                    right: int(2),
                }),
            }
        );
        Ok(())
    }

    #[test]
    fn test_explicit_source_lookup() -> Result<(), ParseError> {
        assert_eq!(
            parse(r#"SOURCES["test.foo"]"#)?,
            Expr::Source("test.foo".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_chained_comparison_and_conditional() -> Result<(), ParseError> {
        let expr = parse("1 if 0 < a <= 10 else 0")?;
        match expr {
            Expr::Conditional { test, .. } => match *test {
                Expr::Compare { rest, .. } => assert_eq!(rest.len(), 2),
                other => panic!("expected comparison, got {:?}", other),
            },
            other => panic!("expected conditional, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_rejects_statements() {
        for source in ["import os", "raise Exception", "foo = 5", "lambda: 1", "x; y"] {
            let err = parse(source).expect_err(source);
            assert!(err.to_string().starts_with("invalid syntax"), "{}", err);
        }
    }

    #[test]
    fn test_rejects_unknown_calls_and_attributes() {
        assert!(parse("open('x')").is_err());
        assert!(parse("a.b()").is_err());
        assert!(parse("a[0]").is_err());
        assert!(parse("__import__('os')").is_err());
    }

    #[test]
    fn test_builtin_arity() {
        assert!(parse("abs(1, 2)").is_err());
        assert!(parse("max(1)").is_err());
        assert!(parse("round(2.5, 1)").is_ok());
        assert!(parse("min(1, 2, 3)").is_ok());
    }

    #[test]
    fn test_empty_and_trailing_input() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("(1").is_err());
    }

    #[test]
    fn test_error_location() {
        let err = parse("1 +\n  import").expect_err("reserved keyword");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        let err = parse(&deep).expect_err("too deep");
        assert!(err.message.contains("nested too deeply"));
        let negations = format!("{}1", "-".repeat(200));
        assert!(parse(&negations).is_err());
    }

    #[test]
    fn test_operator_chains_count_toward_nesting_limit() {
        for op in ["+", "*", " and ", " or "] {
            let long = format!("1{}", format!("{}1", op).repeat(5000));
            let err = parse(&long).expect_err("chain too deep");
            assert!(err.message.contains("nested too deeply"), "{}: {}", op, err);
        }
        let sum = format!("1{}", "+1".repeat(99));
        assert!(parse(&sum).is_ok());
    }
}
