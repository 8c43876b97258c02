//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

/// Lexer for the expression language.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
        }
    }

    /// Tokenize the entire source into a vector of tokens. The last token is
    /// always `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        tokens
    }

    /// Get the next token from the source.
    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ',' => self.single(TokenKind::Comma),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '%' => self.single(TokenKind::Percent),

                '.' => {
                    if self.peek_next_char().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                        self.scan_number()
                    } else {
                        self.single(TokenKind::Dot)
                    }
                }

                '*' => {
                    self.advance();
                    if self.peek_char() == Some('*') {
                        self.advance();
                        TokenKind::DoubleStar
                    } else {
                        TokenKind::Star
                    }
                }

                '/' => {
                    self.advance();
                    if self.peek_char() == Some('/') {
                        self.advance();
                        TokenKind::DoubleSlash
                    } else {
                        TokenKind::Slash
                    }
                }

                '=' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Eq
                    } else {
                        TokenKind::Assign
                    }
                }

                '!' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Ne
                    } else {
                        TokenKind::Error("unexpected character `!`".to_string())
                    }
                }

                '<' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }

                '>' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }

                '"' | '\'' => self.scan_string(c),

                c if c.is_ascii_digit() => self.scan_number(),

                c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),

                c => {
                    self.advance();
                    TokenKind::Error(format!("unexpected character `{}`", c))
                }
            },
        };

        Token {
            kind,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let ident = &self.source[start..self.pos];

        if ident.starts_with("__") {
            return TokenKind::Error(format!("name `{}` is not allowed", ident));
        }

        // Keywords are case-sensitive
        match ident {
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            kw if RESERVED_KEYWORDS.contains(&kw) => TokenKind::Reserved(kw.to_string()),
            _ => TokenKind::Identifier(ident.to_string()),
        }
    }

    /// Scan a string literal with escape sequences.
    fn scan_string(&mut self, quote: char) -> TokenKind {
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.peek_char() {
                None | Some('\n') => return TokenKind::Error("unterminated string".to_string()),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('r') => {
                            self.advance();
                            value.push('\r');
                        }
                        Some(c) if c == '\\' || c == '"' || c == '\'' => {
                            self.advance();
                            value.push(c);
                        }
                        _ => value.push('\\'),
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }

        TokenKind::String(value)
    }

    /// Scan an integer or float literal. Integers too large for `i64` become
    /// floats.
    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        let mut is_float = false;

        self.consume_digits();

        if self.peek_char() == Some('.') {
            is_float = true;
            self.advance();
            self.consume_digits();
        }

        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let after = self.peek_next_char();
            let signed = matches!(after, Some('+') | Some('-'));
            let has_digits = if signed {
                self.source[self.pos..]
                    .chars()
                    .nth(2)
                    .map(|c| c.is_ascii_digit())
                    .unwrap_or(false)
            } else {
                after.map(|c| c.is_ascii_digit()).unwrap_or(false)
            };
            if has_digits {
                is_float = true;
                self.advance();
                if signed {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        if self
            .peek_char()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        {
            while let Some(c) = self.peek_char() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            let text = &self.source[start..self.pos];
            return TokenKind::Error(format!("invalid number `{}`", text));
        }

        let text = &self.source[start..self.pos];
        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return TokenKind::Int(i);
            }
        }
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Float(n),
            Err(_) => TokenKind::Error(format!("invalid number `{}`", text)),
        }
    }

    fn consume_digits(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Skip whitespace and `#` comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\n') => {
                    self.advance();
                    self.line += 1;
                    self.column = 1;
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].char_indices();
        iter.next();
        iter.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((i, c)) = self.chars.next() {
            self.pos = i + c.len_utf8();
            self.column += 1;
            Some(c)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_arithmetic_tokens() {
        assert_eq!(
            kinds("test.foo / 2 ** -3 // 4"),
            vec![
                TokenKind::Identifier("test".into()),
                TokenKind::Dot,
                TokenKind::Identifier("foo".into()),
                TokenKind::Slash,
                TokenKind::Int(2),
                TokenKind::DoubleStar,
                TokenKind::Minus,
                TokenKind::Int(3),
                TokenKind::DoubleSlash,
                TokenKind::Int(4),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(kinds("2.5")[0], TokenKind::Float(2.5));
        assert_eq!(kinds(".5")[0], TokenKind::Float(0.5));
        assert_eq!(kinds("1e3")[0], TokenKind::Float(1000.0));
        assert_eq!(kinds("1e-2")[0], TokenKind::Float(0.01));
        assert_eq!(kinds("99999999999999999999")[0], TokenKind::Float(1e20));
        assert!(matches!(kinds("5xx")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_reserved_and_assignment() {
        assert_eq!(kinds("import os")[0], TokenKind::Reserved("import".into()));
        assert_eq!(kinds("raise")[0], TokenKind::Reserved("raise".into()));
        assert_eq!(kinds("foo = 5")[1], TokenKind::Assign);
        assert_eq!(kinds("foo == 5")[1], TokenKind::Eq);
    }

    #[test]
    fn test_dunder_names_rejected() {
        assert!(matches!(kinds("__import__")[0], TokenKind::Error(_)));
        assert_eq!(kinds("_source")[0], TokenKind::Identifier("_source".into()));
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds(r#""a\"b""#)[0], TokenKind::String("a\"b".into()));
        assert_eq!(kinds("'x'")[0], TokenKind::String("x".into()));
        assert!(matches!(kinds("'x")[0], TokenKind::Error(_)));
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = Lexer::new("1 +\n  2").tokenize();
        assert_eq!(tokens[2].span.line, 2);
        assert_eq!(tokens[2].span.column, 3);
    }

    proptest! {
        #[test]
        fn prop_tokenize_always_ends_with_eof(source in "\\PC{0,64}") {
            let tokens = Lexer::new(&source).tokenize();
            prop_assert!(!tokens.is_empty());
            prop_assert_eq!(&tokens[tokens.len() - 1].kind, &TokenKind::Eof);
            for token in &tokens {
                prop_assert!(token.span.start <= token.span.end);
            }
        }
    }
}
