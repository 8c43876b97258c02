//! Fuzz target for the expression parser
//!
//! Parsing and printing never panic; rejected input carries a position.
//!
//! Run with: cargo +nightly fuzz run parser_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use querymeter_dsl::{parse, pretty_print, Lexer, Parser};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        match parse(input) {
            Ok(expr) => {
                assert!(!pretty_print(&expr).is_empty());
            }
            Err(err) => {
                assert!(err.line >= 1, "Error line should be >= 1");
                assert!(err.column >= 1, "Error column should be >= 1");
                assert!(!err.message.is_empty(), "Error message should not be empty");
            }
        }

        let tokens = Lexer::new(input).tokenize();
        let _ = Parser::new(tokens).parse();
    }
});
