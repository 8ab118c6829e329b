//! Lexical and object-level parsing.
//!
//! - `lexer`: byte tokenizer (names, strings, numbers, delimiters)
//! - `pdf_parser`: token stream to typed object parser

pub mod lexer;
pub mod pdf_parser;

// Re-export main types for convenience
pub use lexer::{Lexer, Token};
pub use pdf_parser::PDFParser;
