//! Typed PDF object model.

pub mod objects;

// Re-export main types for convenience
pub use objects::{Name, PDFObjRef, PDFObject, PDFStream, PdfDict};
