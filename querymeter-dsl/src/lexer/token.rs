//! Lexer token types

use std::fmt;

/// Token kinds for the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    True,
    False,
    None,
    And,
    Or,
    Not,
    If,
    Else,
    /// Statement-level and unsupported keywords. Lexed as such so the parser
    /// can reject them by name.
    Reserved(String),

    // Literals
    Int(i64),
    Float(f64),
    String(String),
    Identifier(String),

    // Arithmetic operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,

    // Comparison operators
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    /// Single `=`; only ever an error.
    Assign,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,

    // Special
    Eof,
    Error(String),
}

/// Keywords that introduce statements or constructs outside the expression
/// grammar.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "except", "exec", "finally", "for", "from", "global", "import", "in", "is", "lambda",
    "nonlocal", "pass", "print", "raise", "return", "try", "while", "with", "yield",
];

/// Whether an identifier is a keyword of the language.
pub fn is_keyword(ident: &str) -> bool {
    matches!(
        ident,
        "True" | "False" | "None" | "and" | "or" | "not" | "if" | "else"
    ) || RESERVED_KEYWORDS.contains(&ident)
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::True => write!(f, "`True`"),
            TokenKind::False => write!(f, "`False`"),
            TokenKind::None => write!(f, "`None`"),
            TokenKind::And => write!(f, "`and`"),
            TokenKind::Or => write!(f, "`or`"),
            TokenKind::Not => write!(f, "`not`"),
            TokenKind::If => write!(f, "`if`"),
            TokenKind::Else => write!(f, "`else`"),
            TokenKind::Reserved(kw) => write!(f, "keyword `{}`", kw),
            TokenKind::Int(i) => write!(f, "number `{}`", i),
            TokenKind::Float(x) => write!(f, "number `{}`", x),
            TokenKind::String(s) => write!(f, "string {:?}", s),
            TokenKind::Identifier(name) => write!(f, "name `{}`", name),
            TokenKind::Plus => write!(f, "`+`"),
            TokenKind::Minus => write!(f, "`-`"),
            TokenKind::Star => write!(f, "`*`"),
            TokenKind::DoubleStar => write!(f, "`**`"),
            TokenKind::Slash => write!(f, "`/`"),
            TokenKind::DoubleSlash => write!(f, "`//`"),
            TokenKind::Percent => write!(f, "`%`"),
            TokenKind::Eq => write!(f, "`==`"),
            TokenKind::Ne => write!(f, "`!=`"),
            TokenKind::Lt => write!(f, "`<`"),
            TokenKind::Le => write!(f, "`<=`"),
            TokenKind::Gt => write!(f, "`>`"),
            TokenKind::Ge => write!(f, "`>=`"),
            TokenKind::Assign => write!(f, "`=`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::LBracket => write!(f, "`[`"),
            TokenKind::RBracket => write!(f, "`]`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Dot => write!(f, "`.`"),
            TokenKind::Eof => write!(f, "end of expression"),
            TokenKind::Error(msg) => write!(f, "{}", msg),
        }
    }
}

/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
