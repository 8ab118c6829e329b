//! Serializer: turns a trailer-shaped object graph into a complete file.
//!
//! The walk is queue-driven rather than recursive: every reference gets an
//! object number the first time it is seen and its target is queued, so
//! the call depth only ever follows the direct (by-value) spine of a
//! single object, never the indirect graph. Reference cycles therefore
//! serialize as `N 0 R` tokens pointing back at already-assigned numbers.
//!
//! Output is the classic form: numbered objects, an `xref` table with
//! fixed-width entries, a trailer dictionary with a recomputed /Size, and
//! the `startxref`/`%%EOF` tail.

use crate::codec::filters;
use crate::document::catalog::PDFDocument;
use crate::document::page::MAX_PAGE_TREE_DEPTH;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObjRef, PDFObject, PdfDict};
use crate::warnings::WarningSink;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::rc::Rc;

/// Version written when neither the caller nor the source names one.
const DEFAULT_VERSION: &str = "1.3";

/// Column at which array/dictionary bodies wrap.
const WRAP_COLUMN: usize = 70;

/// Depth bound on the value formatter's explicit stack. By-value
/// containers cannot alias, so only a pathological input reaches this.
const MAX_FORMAT_DEPTH: usize = 1000;

/// Four high bytes on the second line mark the file as binary.
const BINARY_MARKER: [u8; 4] = [0xE2, 0xE3, 0xCF, 0xD3];

/// Provides the targets of indirect references during serialization.
///
/// Implemented by [`PDFDocument`] (write back a loaded document) and by
/// [`ObjectBuilder`] (application-constructed graphs).
pub trait ObjectSource {
    fn fetch(&self, r: &PDFObjRef) -> Result<Rc<PDFObject>>;
}

impl ObjectSource for PDFDocument {
    fn fetch(&self, r: &PDFObjRef) -> Result<Rc<PDFObject>> {
        self.getobj_shared(r.objid)
    }
}

/// Application-side arena for building new indirect objects.
///
/// `add` registers an object and hands back the reference that stands for
/// it - that is how application code marks an object indirect, and how
/// shared sub-graphs and cycles are expressed. `reserve`/`set` allow a
/// reference to exist before its object does, which is what a cycle
/// needs.
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    objects: Vec<Option<PDFObject>>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object; returns the reference that addresses it.
    pub fn add(&mut self, obj: PDFObject) -> PDFObjRef {
        self.objects.push(Some(obj));
        PDFObjRef::new(self.objects.len() as u32, 0)
    }

    /// Reserve a number with no object behind it yet.
    pub fn reserve(&mut self) -> PDFObjRef {
        self.objects.push(None);
        PDFObjRef::new(self.objects.len() as u32, 0)
    }

    /// Fill (or replace) the object behind a reference.
    pub fn set(&mut self, r: PDFObjRef, obj: PDFObject) {
        if let Some(slot) = self.objects.get_mut((r.objid as usize).wrapping_sub(1)) {
            *slot = Some(obj);
        }
    }

    pub fn get(&self, r: &PDFObjRef) -> Option<&PDFObject> {
        self.objects
            .get((r.objid as usize).wrapping_sub(1))?
            .as_ref()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectSource for ObjectBuilder {
    fn fetch(&self, r: &PDFObjRef) -> Result<Rc<PDFObject>> {
        self.get(r)
            .cloned()
            .map(Rc::new)
            .ok_or(PdfError::ObjectNotFound(r.objid))
    }
}

/// Options for a write call.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Deflate streams that carry no filter yet (kept only when smaller
    /// by a worthwhile margin).
    pub compress: bool,
    /// Header version; defaults to the source document's, or "1.3".
    pub version: Option<String>,
}

/// Numbering and queueing state for one write call.
struct SerializeState {
    /// Source reference key to output object number
    assigned: FxHashMap<(u32, u16), u32>,
    /// Objects awaiting body emission, in number order
    queue: VecDeque<(u32, Rc<PDFObject>)>,
    next_id: u32,
}

impl SerializeState {
    fn new() -> Self {
        Self {
            assigned: FxHashMap::default(),
            queue: VecDeque::new(),
            next_id: 1,
        }
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Serializes a trailer-shaped root against an [`ObjectSource`].
pub struct PDFWriter {
    options: WriteOptions,
    warnings: WarningSink,
}

impl PDFWriter {
    pub fn new(options: WriteOptions) -> Self {
        Self {
            options,
            warnings: WarningSink::new(),
        }
    }

    /// Warnings recorded by write calls so far.
    pub fn warnings(&self) -> &[String] {
        self.warnings.messages()
    }

    /// Serialize to an in-memory buffer.
    pub fn write(&mut self, trailer: &PdfDict, source: &dyn ObjectSource) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(trailer, source, &mut out)?;
        Ok(out)
    }

    /// Serialize and stream the finished bytes to a sink.
    pub fn write_to(
        &mut self,
        trailer: &PdfDict,
        source: &dyn ObjectSource,
        sink: &mut dyn std::io::Write,
    ) -> Result<()> {
        validate_pages(trailer, source, &mut self.warnings)?;

        let mut state = SerializeState::new();

        // Seed pass: walking the trailer assigns numbers to everything
        // reachable and fills the queue.
        let _ = self.format_value(&PDFObject::Dict(trailer.clone()), &mut state, source)?;

        let version = self
            .options
            .version
            .clone()
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(format!("%PDF-{}\n", version).as_bytes());
        out.push(b'%');
        out.extend_from_slice(&BINARY_MARKER);
        out.push(b'\n');

        // Dequeued objects may queue more; numbers stay dense and in
        // emission order.
        let mut offsets: Vec<(u32, usize)> = Vec::new();
        while let Some((num, obj)) = state.queue.pop_front() {
            offsets.push((num, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n", num).as_bytes());
            let body = self.format_object_body(&obj, &mut state, source)?;
            out.extend_from_slice(&body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let count = (state.next_id - 1) as usize;
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", count + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f\r\n");
        offsets.sort_unstable_by_key(|&(num, _)| num);
        for (_, offset) in &offsets {
            out.extend_from_slice(format!("{:010} {:05} n\r\n", offset, 0).as_bytes());
        }

        let mut final_trailer = trailer.clone();
        final_trailer.set("Size", PDFObject::Int((count + 1) as i64));
        let trailer_body =
            self.format_value(&PDFObject::Dict(final_trailer), &mut state, source)?;
        if !state.queue.is_empty() {
            // A direct stream value in the trailer would have been
            // promoted after the body was already written out.
            return Err(PdfError::SyntaxError(
                "trailer dictionary may not contain stream values".into(),
            ));
        }
        out.extend_from_slice(b"trailer\n\n");
        out.extend_from_slice(&trailer_body);
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());

        sink.write_all(&out)?;
        Ok(())
    }

    /// Format the body of a dequeued indirect object.
    fn format_object_body(
        &mut self,
        obj: &PDFObject,
        state: &mut SerializeState,
        source: &dyn ObjectSource,
    ) -> Result<Vec<u8>> {
        let PDFObject::Stream(stream) = obj else {
            return self.format_value(obj, state, source);
        };

        let mut attrs = stream.attrs.clone();
        let mut data = stream.get_rawdata().to_vec();

        if self.options.compress && !attrs.contains_key("Filter") {
            let compressed = filters::flate_encode(&data);
            if filters::compression_worthwhile(data.len(), compressed.len()) {
                data = compressed;
                attrs.set("Filter", PDFObject::Name("FlateDecode".into()));
            }
            // Otherwise the compressed form is false savings; keep the
            // original bytes and no filter tag.
        }
        attrs.set("Length", PDFObject::Int(data.len() as i64));

        let mut body = self.format_value(&PDFObject::Dict(attrs), state, source)?;
        body.extend_from_slice(b"\nstream\n");
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\nendstream");
        Ok(body)
    }

    /// Iterative value formatter.
    ///
    /// Emits delimiter and value tokens with an explicit stack (the call
    /// stack never follows nesting), then joins them wrapped at
    /// [`WRAP_COLUMN`]. Dictionary keys are emitted in byte-lexicographic
    /// order so output is deterministic.
    fn format_value(
        &mut self,
        obj: &PDFObject,
        state: &mut SerializeState,
        source: &dyn ObjectSource,
    ) -> Result<Vec<u8>> {
        enum Task<'a> {
            Obj(&'a PDFObject),
            Tok(Vec<u8>),
        }

        let mut tokens: Vec<Vec<u8>> = Vec::new();
        let mut stack: Vec<Task> = vec![Task::Obj(obj)];

        while let Some(task) = stack.pop() {
            if stack.len() > MAX_FORMAT_DEPTH {
                return Err(PdfError::UnbreakableCycle(format!(
                    "value nesting exceeds {} levels",
                    MAX_FORMAT_DEPTH
                )));
            }

            match task {
                Task::Tok(tok) => tokens.push(tok),
                Task::Obj(value) => match value {
                    PDFObject::Null => tokens.push(b"null".to_vec()),
                    PDFObject::Bool(true) => tokens.push(b"true".to_vec()),
                    PDFObject::Bool(false) => tokens.push(b"false".to_vec()),
                    PDFObject::Int(n) => tokens.push(n.to_string().into_bytes()),
                    PDFObject::Real(v) => tokens.push(format_real(*v).into_bytes()),
                    PDFObject::Name(name) => tokens.push(format_name(name)),
                    PDFObject::String(bytes) => tokens.push(format_string(bytes)),
                    PDFObject::Ref(r) => match self.ensure_assigned(r, state, source) {
                        Some(num) => tokens.push(format!("{} 0 R", num).into_bytes()),
                        None => tokens.push(b"null".to_vec()),
                    },
                    PDFObject::Array(items) => {
                        tokens.push(b"[".to_vec());
                        stack.push(Task::Tok(b"]".to_vec()));
                        for item in items.iter().rev() {
                            stack.push(Task::Obj(item));
                        }
                    }
                    PDFObject::Dict(dict) => {
                        tokens.push(b"<<".to_vec());
                        stack.push(Task::Tok(b">>".to_vec()));
                        let keys = dict.sorted_keys();
                        for key in keys.into_iter().rev() {
                            // Entries pushed value-under-key so the key
                            // pops first
                            stack.push(Task::Obj(dict.get(key).expect("key from iteration")));
                            stack.push(Task::Tok(format_name(key)));
                        }
                    }
                    PDFObject::Stream(stream) => {
                        // A stream can never be inlined: promote it to a
                        // fresh indirect object.
                        let num = state.alloc();
                        state.queue.push_back((
                            num,
                            Rc::new(PDFObject::Stream(stream.clone())),
                        ));
                        tokens.push(format!("{} 0 R", num).into_bytes());
                    }
                },
            }
        }

        Ok(wrap_tokens(&tokens))
    }

    /// Assign an output number to a reference the first time it is seen,
    /// queueing its target. A dangling reference serializes as null.
    fn ensure_assigned(
        &mut self,
        r: &PDFObjRef,
        state: &mut SerializeState,
        source: &dyn ObjectSource,
    ) -> Option<u32> {
        let key = (r.objid, r.genno);
        if let Some(num) = state.assigned.get(&key) {
            return Some(*num);
        }

        match source.fetch(r) {
            Ok(obj) => {
                let num = state.alloc();
                state.assigned.insert(key, num);
                state.queue.push_back((num, obj));
                Some(num)
            }
            Err(_) => {
                self.warnings
                    .warn(format!("dangling reference {}, writing null", r));
                None
            }
        }
    }
}

impl PDFDocument {
    /// Serialize this document back to bytes.
    ///
    /// The emitted trailer is the merged trailer minus the per-revision
    /// keys (/Prev, /XRefStm) and /Size, which is recomputed. /Encrypt is
    /// dropped with a warning: the engine writes the decrypted graph and
    /// does not re-encrypt.
    pub fn save(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        let mut trailer = self.trailer().clone();
        trailer.remove("Prev");
        trailer.remove("XRefStm");
        trailer.remove("Size");

        let mut writer = PDFWriter::new(WriteOptions {
            compress: options.compress,
            version: options
                .version
                .clone()
                .or_else(|| Some(self.version().to_string())),
        });

        if trailer.remove("Encrypt").is_some() {
            writer
                .warnings
                .warn("dropping /Encrypt: documents are written decrypted");
        }

        let out = writer.write(&trailer, self)?;
        for msg in writer.warnings() {
            self.warn(msg.clone());
        }
        Ok(out)
    }
}

/// Check the page tree on the way out: every leaf reachable from
/// /Root -> /Pages must carry /Type /Page.
fn validate_pages(
    trailer: &PdfDict,
    source: &dyn ObjectSource,
    warnings: &mut WarningSink,
) -> Result<()> {
    let Some(root) = trailer.get("Root") else {
        warnings.warn("trailer has no /Root entry");
        return Ok(());
    };

    fn resolve<'a>(
        source: &dyn ObjectSource,
        obj: &'a PDFObject,
    ) -> Option<(Rc<PDFObject>, Option<PDFObjRef>)> {
        match obj {
            PDFObject::Ref(r) => source.fetch(r).ok().map(|o| (o, Some(*r))),
            other => Some((Rc::new(other.clone()), None)),
        }
    }

    let Some((root_obj, _)) = resolve(source, root) else {
        return Ok(()); // dangling /Root becomes null and warns later
    };
    let Ok(catalog) = root_obj.as_dict() else {
        return Ok(());
    };
    let Some(pages) = catalog.get("Pages") else {
        return Ok(());
    };

    let mut visited: FxHashSet<(u32, u16)> = FxHashSet::default();
    let mut stack: Vec<(PDFObject, usize)> = vec![(pages.clone(), 1)];

    while let Some((node, depth)) = stack.pop() {
        if depth > MAX_PAGE_TREE_DEPTH {
            return Err(PdfError::UnbreakableCycle(format!(
                "page tree deeper than {} levels",
                MAX_PAGE_TREE_DEPTH
            )));
        }

        let Some((resolved, key)) = resolve(source, &node) else {
            continue;
        };
        if let Some(r) = key
            && !visited.insert((r.objid, r.genno))
        {
            continue;
        }
        let Ok(dict) = resolved.as_dict() else {
            continue;
        };

        match dict.get("Kids") {
            Some(kids) => {
                if let Some((kids_obj, _)) = resolve(source, kids)
                    && let Ok(kids) = kids_obj.as_array()
                {
                    for kid in kids {
                        stack.push((kid.clone(), depth + 1));
                    }
                }
            }
            None => {
                // Leaf: must be tagged as a page
                if dict.get_name("Type") != Some("Page") {
                    let what = key
                        .map(|r| format!("object {}", r.objid))
                        .unwrap_or_else(|| "inline page dictionary".to_string());
                    return Err(PdfError::NotAPage(what));
                }
            }
        }
    }

    Ok(())
}

/// Format a real without exponent notation, trailing zeros trimmed.
fn format_real(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{:.6}", v);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Format a name with #XX escapes for bytes outside the regular range.
fn format_name(name: &str) -> Vec<u8> {
    let mut out = vec![b'/'];
    for &b in name.as_bytes() {
        let regular = (b'!'..=b'~').contains(&b)
            && !matches!(b, b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%');
        if regular {
            out.push(b);
        } else {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        }
    }
    out
}

/// Format a string: literal form with escapes, or hex for mostly-binary
/// content.
fn format_string(bytes: &[u8]) -> Vec<u8> {
    let binary = bytes
        .iter()
        .filter(|&&b| !(0x20..0x7f).contains(&b) && !matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    if binary * 4 > bytes.len() {
        // Hex form reads better than a wall of octal escapes
        let mut out = vec![b'<'];
        for &b in bytes {
            out.extend_from_slice(format!("{:02x}", b).as_bytes());
        }
        out.push(b'>');
        return out;
    }

    let mut out = vec![b'('];
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x20..=0x7e => out.push(b),
            other => out.extend_from_slice(format!("\\{:03o}", other).as_bytes()),
        }
    }
    out.push(b')');
    out
}

/// Join tokens with spaces, wrapping lines at [`WRAP_COLUMN`].
fn wrap_tokens(tokens: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut line_len = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 {
            if line_len + 1 + tok.len() > WRAP_COLUMN {
                out.push(b'\n');
                line_len = 0;
            } else {
                out.push(b' ');
                line_len += 1;
            }
        }
        out.extend_from_slice(tok);
        line_len += tok.len();
    }
    out
}
