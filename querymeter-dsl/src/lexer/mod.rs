//! Lexer module for the expression language

pub mod token;
pub mod scanner;

pub use token::*;
pub use scanner::*;
