//! Document structure: index engine, object loading, pages, security.
//!
//! - `xref` - cross-reference parsing, repair, and incremental merge
//! - `catalog` - PDFDocument: load orchestration and object resolution
//! - `page` - page-tree walk and page attributes
//! - `security` - standard security handlers (RC4/AES)

pub mod catalog;
pub mod page;
pub mod security;
pub mod xref;

// Re-export main types for convenience
pub use catalog::{LoadOptions, PDFDocument, PdfBytes};
pub use page::PDFPage;
pub use security::{SecurityHandler, create_security_handler};
pub use xref::{XRefEntry, XRefTable};
