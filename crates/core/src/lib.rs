//! folio - a PDF object-model engine: read, mutate, and rewrite documents.
//!
//! The crate covers the tokenizer, the typed object model with lazy
//! indirect-reference resolution, the cross-reference parsing and repair
//! engine (classic tables, index streams, object-stream containers,
//! incremental update chains), stream decompression and predictor
//! reconstruction, the standard decryption handlers, and a serializer that
//! turns a mutated object graph back into a complete file.

pub mod codec;
pub mod document;
pub mod error;
pub mod model;
pub mod parser;
pub mod utils;
pub mod warnings;
pub mod writer;

// Re-export codec modules for convenience
pub use codec::aes;
pub use codec::arcfour;
pub use codec::filters;

// Re-export parser modules
pub use parser::lexer;
pub use parser::pdf_parser;

// Re-export model module under its historical name
pub use model::objects as pdftypes;

// Re-export document modules
pub use document::catalog as pdfdocument;
pub use document::page as pdfpage;
pub use document::security;
pub use document::xref;

// Commonly used types at the crate root
pub use document::catalog::{LoadOptions, PDFDocument};
pub use document::page::PDFPage;
pub use error::{PdfError, Result};
pub use model::objects::{Name, PDFObjRef, PDFObject, PDFStream, PdfDict};
pub use warnings::WarningSink;
pub use writer::{ObjectBuilder, ObjectSource, PDFWriter, WriteOptions};
