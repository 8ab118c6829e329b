//! Error types for the folio PDF engine.

use thiserror::Error;

/// Primary error type for PDF read and write operations.
///
/// Structural problems (missing header/footer markers, an unreadable
/// cross-reference table, a trailer without /Root) abort a load. Failures
/// scoped to a single object are caught at the loader boundary and turned
/// into warnings with a null or corrected substitute. `NotAPage` and
/// `UnbreakableCycle` are raised by the writer and are fatal to that write
/// call only.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(u32),

    #[error("no valid xref table found")]
    NoValidXRef,

    #[error("PDF syntax error: {0}")]
    SyntaxError(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("object is not a page: {0}")]
    NotAPage(String),

    #[error("unbreakable cycle while serializing: {0}")]
    UnbreakableCycle(String),
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
