//! Shared fixture builder.
//!
//! Assembles syntactically valid PDF bytes while recording object offsets,
//! so tests never hand-count byte positions.

#![allow(dead_code)]

/// Incremental byte builder for classic-table documents.
///
/// Objects are numbered 1, 2, ... in insertion order; `finish` emits the
/// xref table, trailer, and tail markers.
pub struct PdfBuilder {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self {
            out: b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec(),
            offsets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Append an indirect object; returns its object number.
    pub fn add_object(&mut self, body: &str) -> u32 {
        self.add_object_raw(body.as_bytes())
    }

    pub fn add_object_raw(&mut self, body: &[u8]) -> u32 {
        let objid = self.offsets.len() as u32 + 1;
        self.offsets.push(self.out.len());
        self.out
            .extend_from_slice(format!("{} 0 obj\n", objid).as_bytes());
        self.out.extend_from_slice(body);
        self.out.extend_from_slice(b"\nendobj\n");
        objid
    }

    /// Append a stream object. `dict_entries` must not contain /Length;
    /// `declared_len` overrides the true length to fabricate corruption.
    pub fn add_stream_object(
        &mut self,
        dict_entries: &str,
        data: &[u8],
        declared_len: Option<usize>,
    ) -> u32 {
        let len = declared_len.unwrap_or(data.len());
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict_entries, len).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.add_object_raw(&body)
    }

    /// Override the recorded offset of an object (fabricates a shifted
    /// index entry).
    pub fn set_offset(&mut self, objid: u32, offset: usize) {
        self.offsets[(objid - 1) as usize] = offset;
    }

    pub fn offset_of(&self, objid: u32) -> usize {
        self.offsets[(objid - 1) as usize]
    }

    /// Emit xref table + trailer + tail. `trailer_entries` is appended to
    /// the generated /Size (e.g. "/Root 1 0 R").
    pub fn finish(self, trailer_entries: &str) -> Vec<u8> {
        let PdfBuilder { mut out, offsets } = self;
        let count = offsets.len();
        let xref_at = out.len();

        out.extend_from_slice(format!("xref\n0 {}\n", count + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f\r\n");
        for offset in &offsets {
            out.extend_from_slice(format!("{:010} {:05} n\r\n", offset, 0).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
                count + 1,
                trailer_entries,
                xref_at
            )
            .as_bytes(),
        );
        out
    }
}

/// Format bytes as a PDF hex string literal.
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::from("<");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out.push('>');
    out
}

/// A well-formed three-page document; page 3 carries a content stream.
pub fn three_page_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object(
        "<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 \
         /MediaBox [0 0 612 792] /Rotate 90 >>",
    );
    builder.add_object("<< /Type /Page /Parent 2 0 R /Contents 6 0 R >>");
    builder.add_object("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] >>");
    builder.add_object("<< /Type /Page /Parent 2 0 R /Rotate 0 >>");
    builder.add_stream_object("", b"BT /F1 12 Tf (Hello) Tj ET", None);
    builder.finish("/Root 1 0 R")
}
