//! PDF document: load orchestration and object resolution.
//!
//! The load sequence is: header version, tail marker, index chain merge,
//! security handler, catalog/info resolution, object-stream bulk loading,
//! page-tree resolution, then the optional eager decrypt/decompress
//! passes. After that every remaining indirect object resolves on demand
//! and is memoized.
//!
//! The document is deliberately single-threaded (`Rc`/`RefCell`): one
//! document is owned and mutated by one caller at a time, and the type
//! system enforces it by not being `Sync`.

use super::page::{self, PDFPage};
use super::security::{SecurityHandler, create_security_handler};
use super::xref::{self, XRefEntry};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObject, PDFStream, PdfDict};
use crate::parser::lexer::{Lexer, Token};
use crate::parser::pdf_parser::PDFParser;
use crate::warnings::WarningSink;
use crate::codec::filters;
use bytes::Bytes;
use memmap2::Mmap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

/// How far around a recorded offset the loader searches for a shifted
/// object header.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Options for loading a document.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// User or owner password (empty string tries the default user
    /// password).
    pub password: String,
    /// Materialize and decrypt every indexed object up front.
    pub decrypt_eagerly: bool,
    /// Additionally replace each filtered stream with its decoded bytes.
    pub decompress_eagerly: bool,
}

/// Backing storage for the document bytes.
#[derive(Clone)]
pub enum PdfBytes {
    Owned(Bytes),
    Shared(Bytes),
}

impl PdfBytes {
    const fn as_bytes(&self) -> &Bytes {
        match self {
            Self::Owned(data) => data,
            Self::Shared(data) => data,
        }
    }

    fn as_slice(&self) -> &[u8] {
        self.as_bytes().as_ref()
    }
}

/// A loaded PDF document.
///
/// Owns the merged trailer, the number-to-location index, and the
/// memoized object table; exposes the ordered page list and on-demand
/// resolution of any remaining indirect object.
pub struct PDFDocument {
    data: PdfBytes,
    version: String,
    offsets: FxHashMap<u32, XRefEntry>,
    trailer: PdfDict,
    catalog: PdfDict,
    info: Option<PdfDict>,
    security_handler: Option<Box<dyn SecurityHandler>>,
    /// Resolved-object table; each object resolves at most once
    cache: RefCell<FxHashMap<u32, Rc<PDFObject>>>,
    /// Objects currently being resolved (reference-cycle guard)
    resolving: RefCell<FxHashSet<u32>>,
    /// Bulk-extracted object-stream containers
    objstms: RefCell<FxHashMap<u32, Rc<Vec<PDFObject>>>>,
    warnings: RefCell<WarningSink>,
    pages: Vec<PDFPage>,
}

impl PDFDocument {
    /// Load a document from raw bytes with just a password.
    pub fn new<D: AsRef<[u8]>>(data: D, password: &str) -> Result<Self> {
        Self::with_options(
            data,
            &LoadOptions {
                password: password.to_string(),
                ..LoadOptions::default()
            },
        )
    }

    /// Load a document from raw bytes.
    pub fn with_options<D: AsRef<[u8]>>(data: D, options: &LoadOptions) -> Result<Self> {
        Self::load(
            PdfBytes::Owned(Bytes::copy_from_slice(data.as_ref())),
            options,
        )
    }

    /// Load a document from shared bytes (zero-copy).
    pub fn from_bytes(data: Bytes, options: &LoadOptions) -> Result<Self> {
        Self::load(PdfBytes::Shared(data), options)
    }

    /// Load a document from a memory-mapped file.
    pub fn from_mmap(mmap: Mmap, options: &LoadOptions) -> Result<Self> {
        Self::load(PdfBytes::Shared(Bytes::from_owner(mmap)), options)
    }

    fn load(data: PdfBytes, options: &LoadOptions) -> Result<Self> {
        let mut doc = Self {
            data,
            version: String::new(),
            offsets: FxHashMap::default(),
            trailer: PdfDict::new(),
            catalog: PdfDict::new(),
            info: None,
            security_handler: None,
            cache: RefCell::new(FxHashMap::default()),
            resolving: RefCell::new(FxHashSet::default()),
            objstms: RefCell::new(FxHashMap::default()),
            warnings: RefCell::new(WarningSink::new()),
            pages: Vec::new(),
        };
        doc.parse(options)?;
        Ok(doc)
    }

    /// Run the load sequence.
    fn parse(&mut self, options: &LoadOptions) -> Result<()> {
        self.version = version_from_header(self.data.as_slice())?;

        // Index chain
        let mut sink = WarningSink::new();
        let start = xref::read_startxref(self.data.as_slice())?;
        let table = xref::load_xref_table(self.data.as_slice(), start, &mut sink)?;
        self.warnings.borrow_mut().absorb(sink);

        self.offsets = table.offsets;
        self.trailer = table.trailer;
        // Pre-size the object table from the index
        self.cache = RefCell::new(FxHashMap::with_capacity_and_hasher(
            self.offsets.len(),
            Default::default(),
        ));

        // Security handler, before anything that resolves strings
        if let Some(encrypt_ref) = self.trailer.get("Encrypt").cloned() {
            let encrypt_obj = self.resolve(&encrypt_ref)?;
            let encrypt = encrypt_obj.as_dict()?.clone();

            let doc_id: Vec<Vec<u8>> = match self.trailer.get_array("ID") {
                Some(arr) => arr
                    .iter()
                    .filter_map(|o| o.as_string().ok().map(|s| s.to_vec()))
                    .collect(),
                None => Vec::new(),
            };

            self.security_handler =
                create_security_handler(&encrypt, &doc_id, &options.password)?;
        }

        // Catalog is mandatory; info is not
        let root_ref = self
            .trailer
            .get("Root")
            .cloned()
            .ok_or_else(|| PdfError::SyntaxError("trailer has no /Root".into()))?;
        let root_obj = self.resolve(&root_ref)?;
        self.catalog = root_obj
            .as_dict()
            .map_err(|_| PdfError::SyntaxError("/Root is not a dictionary".into()))?
            .clone();

        // The document version is the newer of header and catalog /Version
        if let Some(catalog_version) = self.catalog.get_name("Version")
            && version_tuple(catalog_version) > version_tuple(&self.version)
        {
            self.version = catalog_version.to_string();
        }

        if let Some(info_ref) = self.trailer.get("Info").cloned() {
            match self.resolve(&info_ref) {
                Ok(obj) => match obj.as_dict() {
                    Ok(dict) => self.info = Some(dict.clone()),
                    Err(_) => self.warn("/Info is not a dictionary"),
                },
                Err(e) => self.warn(format!("unresolvable /Info: {}", e)),
            }
        }

        // Bulk-load the object-stream containers the index refers to,
        // before the document is handed out
        for container in &table.containers {
            if let Err(e) = self.load_objstm(*container) {
                self.warn(format!(
                    "object stream {} could not be loaded: {}",
                    container, e
                ));
            }
        }

        self.pages = page::collect_pages(self)?;

        if options.decrypt_eagerly || options.decompress_eagerly {
            self.materialize_all(options.decompress_eagerly);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors

    /// Raw document bytes.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Document version: the newer of the header and catalog versions.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Merged trailer dictionary (Root, Info, ID, Size, Encrypt, ...).
    pub fn trailer(&self) -> &PdfDict {
        &self.trailer
    }

    /// The document catalog (the resolved /Root dictionary).
    pub fn catalog(&self) -> &PdfDict {
        &self.catalog
    }

    /// The resolved /Info dictionary, if any.
    pub fn info(&self) -> Option<&PdfDict> {
        self.info.as_ref()
    }

    /// Whether the document carries an /Encrypt dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.security_handler.is_some()
    }

    /// The ordered, validated page list.
    pub fn pages(&self) -> &[PDFPage] {
        &self.pages
    }

    /// Warnings collected so far (load + any later resolution).
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().messages().to_vec()
    }

    pub(crate) fn warn(&self, msg: impl Into<String>) {
        self.warnings.borrow_mut().warn(msg);
    }

    // ------------------------------------------------------------------
    // Resolution

    /// Resolve a value: references go through the object table (a missing
    /// target warns and yields null), everything else passes through.
    pub fn resolve(&self, obj: &PDFObject) -> Result<Rc<PDFObject>> {
        match obj {
            PDFObject::Ref(r) => match self.getobj_shared(r.objid) {
                Ok(resolved) => Ok(resolved),
                Err(PdfError::ObjectNotFound(objid)) => {
                    self.warn(format!("missing object {}, substituting null", objid));
                    Ok(Rc::new(PDFObject::Null))
                }
                Err(e) => Err(e),
            },
            other => Ok(Rc::new(other.clone())),
        }
    }

    /// Get an object by number (cloned).
    pub fn getobj(&self, objid: u32) -> Result<PDFObject> {
        Ok((*self.getobj_shared(objid)?).clone())
    }

    /// Get an object by number without cloning the cached value.
    ///
    /// Resolution happens at most once per object; afterwards the memoized
    /// value is returned. A reference cycle (an object whose loading
    /// requires itself) is an error rather than a hang.
    pub fn getobj_shared(&self, objid: u32) -> Result<Rc<PDFObject>> {
        if objid == 0 {
            return Err(PdfError::ObjectNotFound(0));
        }

        if !self.resolving.borrow_mut().insert(objid) {
            return Err(PdfError::SyntaxError(format!(
                "circular reference detected for object {}",
                objid
            )));
        }
        let result = self.getobj_inner(objid);
        self.resolving.borrow_mut().remove(&objid);
        result
    }

    fn getobj_inner(&self, objid: u32) -> Result<Rc<PDFObject>> {
        if let Some(obj) = self.cache.borrow().get(&objid) {
            return Ok(Rc::clone(obj));
        }

        let entry = *self
            .offsets
            .get(&objid)
            .ok_or(PdfError::ObjectNotFound(objid))?;

        let obj = match entry {
            XRefEntry::Offset { pos, genno } => {
                match self.parse_indirect_at(pos, objid, genno) {
                    Ok(obj) => {
                        if self.security_handler.is_some() {
                            self.decrypt_object(obj, objid, genno)
                        } else {
                            obj
                        }
                    }
                    Err(e) => {
                        // A broken object costs itself, not the load
                        self.warn(format!(
                            "object {} could not be loaded ({}), substituting null",
                            objid, e
                        ));
                        PDFObject::Null
                    }
                }
            }
            XRefEntry::InStream { container, index } => {
                // Already decrypted when the container was decoded
                match self.objstm_object(container, index) {
                    Ok(obj) => obj,
                    Err(e) => {
                        self.warn(format!(
                            "object {} could not be extracted from stream {} ({}), substituting null",
                            objid, container, e
                        ));
                        PDFObject::Null
                    }
                }
            }
        };

        let obj = Rc::new(obj);
        self.cache.borrow_mut().insert(objid, Rc::clone(&obj));
        Ok(obj)
    }

    /// Inheritable dictionary lookup: walk the /Parent chain until the key
    /// is found. A cycle in the chain is a loud failure, not a hang.
    pub fn get_inheritable(&self, dict: &PdfDict, key: &str) -> Result<Option<PDFObject>> {
        if let Some(value) = dict.get(key) {
            return Ok(Some(value.clone()));
        }

        let mut visited: FxHashSet<u32> = FxHashSet::default();
        let mut hops = 0usize;
        let mut parent = dict.get("Parent").cloned();

        while let Some(p) = parent {
            hops += 1;
            if hops > page::MAX_PAGE_TREE_DEPTH {
                return Err(PdfError::SyntaxError(
                    "cycle in /Parent chain (depth bound exceeded)".into(),
                ));
            }
            if let PDFObject::Ref(r) = &p
                && !visited.insert(r.objid)
            {
                return Err(PdfError::SyntaxError(format!(
                    "cycle in /Parent chain at object {}",
                    r.objid
                )));
            }

            let resolved = self.resolve(&p)?;
            let d = resolved.as_dict()?;
            if let Some(value) = d.get(key) {
                return Ok(Some(value.clone()));
            }
            parent = d.get("Parent").cloned();
        }

        Ok(None)
    }

    // ------------------------------------------------------------------
    // Object loading

    /// Parse the indirect object at a recorded offset, validating its
    /// `objid genno obj` header and recovering from small shifts.
    fn parse_indirect_at(&self, pos: usize, objid: u32, genno: u16) -> Result<PDFObject> {
        let data = self.data.as_slice();
        if pos >= data.len() {
            return Err(PdfError::SyntaxError(format!(
                "offset {} beyond end of file",
                pos
            )));
        }

        let body_pos = match check_object_header(data, pos, objid, genno) {
            Some(body_pos) => body_pos,
            None => {
                // Generators mis-offset objects by a few bytes; look for
                // the literal header text nearby before giving up.
                let needle = format!("{} {} obj", objid, genno);
                match search_nearby(data, pos, needle.as_bytes()) {
                    Some(found) => {
                        self.warn(format!(
                            "object {} found at offset {} (index said {})",
                            objid, found, pos
                        ));
                        check_object_header(data, found, objid, genno).ok_or_else(|| {
                            PdfError::SyntaxError(format!(
                                "unparsable object header for {} at {}",
                                objid, found
                            ))
                        })?
                    }
                    None => {
                        return Err(PdfError::SyntaxError(format!(
                            "no object header '{}' near offset {}",
                            needle, pos
                        )));
                    }
                }
            }
        };

        let mut parser = PDFParser::new_at(data, body_pos);
        let obj = parser.parse_object()?;
        for msg in parser.take_warnings() {
            self.warn(msg);
        }

        // A dictionary followed by the stream keyword is a stream object
        if let PDFObject::Dict(dict) = &obj {
            let after = parser.tell();
            let rem = &data[after..];
            let mut p = 0;
            while p < rem.len() && Lexer::is_whitespace(rem[p]) {
                p += 1;
            }
            if rem[p..].starts_with(b"stream") {
                p += b"stream".len();
                // Optional CR before the mandatory LF
                if rem.get(p) == Some(&b'\r') {
                    p += 1;
                }
                if rem.get(p) == Some(&b'\n') {
                    p += 1;
                }
                let stream_start = after + p;

                let declared = match dict.get("Length") {
                    Some(len_obj) => self
                        .resolve(len_obj)
                        .ok()
                        .and_then(|resolved| resolved.as_int().ok())
                        .filter(|&len| len >= 0)
                        .map(|len| len as usize),
                    None => None,
                };

                let (length, corrected) = stream_extent(data, stream_start, declared);
                let mut attrs = dict.clone();
                if corrected {
                    self.warn(format!(
                        "stream {}: declared /Length {:?} inconsistent with endstream, corrected to {}",
                        objid, declared, length
                    ));
                    attrs.set("Length", PDFObject::Int(length as i64));
                }

                let raw = self
                    .data
                    .as_bytes()
                    .slice(stream_start..stream_start + length);
                let mut stream = PDFStream::new(attrs, raw);
                stream.set_objid(objid, genno);
                return Ok(PDFObject::Stream(Box::new(stream)));
            }
        }

        Ok(obj)
    }

    // ------------------------------------------------------------------
    // Object streams

    /// Extract one object from a bulk-loaded container.
    fn objstm_object(&self, container: u32, index: usize) -> Result<PDFObject> {
        let objects = self.load_objstm(container)?;
        objects
            .get(index)
            .cloned()
            .ok_or_else(|| PdfError::SyntaxError(format!("index {} outside object stream", index)))
    }

    /// Decode an object-stream container and extract all its objects as a
    /// unit. The container is decrypted and decompressed once; contained
    /// objects are addressed by inner index, not byte offset.
    fn load_objstm(&self, container: u32) -> Result<Rc<Vec<PDFObject>>> {
        if let Some(objects) = self.objstms.borrow().get(&container) {
            return Ok(Rc::clone(objects));
        }

        let stream_obj = self.getobj_shared(container)?;
        let stream = stream_obj.as_stream()?;

        if stream.attrs.get_name("Type") != Some("ObjStm") {
            return Err(PdfError::SyntaxError(format!(
                "object {} is not an object stream",
                container
            )));
        }

        let data = self.decode_stream(stream)?;

        let n = stream
            .get("N")
            .ok_or_else(|| PdfError::SyntaxError("missing /N in object stream".into()))?
            .as_int()? as usize;
        let first = stream
            .get("First")
            .ok_or_else(|| PdfError::SyntaxError("missing /First in object stream".into()))?
            .as_int()? as usize;

        if first > data.len() {
            return Err(PdfError::SyntaxError(
                "/First beyond object stream data".into(),
            ));
        }

        // Header: objid offset pairs for all contained objects
        let mut header = PDFParser::new(&data[..first]);
        let mut offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let _objid = header.parse_object()?.as_int()?;
            let offset = header.parse_object()?.as_int()? as usize;
            offsets.push(offset);
        }

        let mut objects = Vec::with_capacity(n);
        for offset in offsets {
            let at = first + offset;
            if at > data.len() {
                self.warn(format!(
                    "object stream {}: inner offset {} beyond data",
                    container, offset
                ));
                objects.push(PDFObject::Null);
                continue;
            }
            let mut parser = PDFParser::new_at(&data, at);
            match parser.parse_object() {
                Ok(obj) => objects.push(obj),
                Err(e) => {
                    self.warn(format!(
                        "object stream {}: unparsable inner object ({})",
                        container, e
                    ));
                    objects.push(PDFObject::Null);
                }
            }
        }

        let objects = Rc::new(objects);
        self.objstms
            .borrow_mut()
            .insert(container, Rc::clone(&objects));
        Ok(objects)
    }

    // ------------------------------------------------------------------
    // Decryption

    /// Decrypt strings and stream data within an object.
    fn decrypt_object(&self, obj: PDFObject, objid: u32, genno: u16) -> PDFObject {
        let handler = match &self.security_handler {
            Some(handler) => handler,
            None => return obj,
        };

        match obj {
            PDFObject::String(data) => {
                PDFObject::String(handler.decrypt_string(objid, genno, &data))
            }
            PDFObject::Array(arr) => PDFObject::Array(
                arr.into_iter()
                    .map(|item| self.decrypt_object(item, objid, genno))
                    .collect(),
            ),
            PDFObject::Dict(dict) => {
                let mut out = PdfDict::new();
                for (key, value) in &dict {
                    out.set(key.clone(), self.decrypt_object(value.clone(), objid, genno));
                }
                PDFObject::Dict(out)
            }
            PDFObject::Stream(mut stream) => {
                let mut attrs = PdfDict::new();
                for (key, value) in &stream.attrs {
                    attrs.set(key.clone(), self.decrypt_object(value.clone(), objid, genno));
                }
                stream.attrs = attrs;
                stream.set_objid(objid, genno);
                let decrypted = if stream_bypasses_crypt(&stream.attrs) {
                    // A /Crypt filter naming Identity leaves the bytes alone
                    stream.get_rawdata().to_vec()
                } else {
                    handler.decrypt_stream(objid, genno, stream.get_rawdata(), &stream.attrs)
                };
                stream.set_rawdata_decrypted(decrypted);
                PDFObject::Stream(stream)
            }
            other => other,
        }
    }

    // ------------------------------------------------------------------
    // Stream decoding

    /// Decode a stream: decrypt first (unless already done), then apply
    /// the filter chain. Unsupported filters leave the data untouched
    /// with a warning so round trips stay byte-faithful.
    pub fn decode_stream(&self, stream: &PDFStream) -> Result<Vec<u8>> {
        let objid = stream.objid.unwrap_or(0);
        let genno = stream.genno.unwrap_or(0);

        let mut data = stream.get_rawdata().to_vec();

        if !stream.rawdata_is_decrypted()
            && let Some(handler) = &self.security_handler
            && !stream_bypasses_crypt(&stream.attrs)
        {
            data = handler.decrypt_stream(objid, genno, &data, &stream.attrs);
        }

        let (names, parms) = self.filter_chain(stream);

        if let Some(unsupported) = names
            .iter()
            .find(|name| !filters::is_supported_filter(name.as_str()))
        {
            self.warn(format!(
                "unsupported filter /{}, stream left undecoded",
                unsupported
            ));
            return Ok(data);
        }

        let mut sink = WarningSink::new();
        for (i, name) in names.iter().enumerate() {
            match name.as_str() {
                "FlateDecode" | "Fl" => {
                    data = filters::flate_decode_lenient(&data, &mut sink);
                    if let Some(Some(p)) = parms.get(i) {
                        data = filters::apply_predictor(data, p, &mut sink);
                    }
                }
                // Handled in the decryption layer
                "Crypt" => {}
                _ => unreachable!("filter support checked above"),
            }
        }
        self.warnings.borrow_mut().absorb(sink);

        Ok(data)
    }

    /// Normalize /Filter and /DecodeParms (either may be indirect, single
    /// or array-valued) into aligned lists.
    fn filter_chain(&self, stream: &PDFStream) -> (Vec<String>, Vec<Option<PdfDict>>) {
        let mut names = Vec::new();
        let mut parms: Vec<Option<PdfDict>> = Vec::new();

        let filter = stream
            .get("Filter")
            .and_then(|f| self.resolve(f).ok());
        match filter.as_deref() {
            Some(PDFObject::Name(name)) => names.push(name.to_string()),
            Some(PDFObject::Array(arr)) => {
                for item in arr {
                    match self.resolve(item).ok().as_deref() {
                        Some(PDFObject::Name(name)) => names.push(name.to_string()),
                        _ => self.warn("non-name entry in /Filter array"),
                    }
                }
            }
            _ => {}
        }

        let decode_parms = stream
            .get_any(&["DecodeParms", "DP"])
            .and_then(|p| self.resolve(p).ok());
        match decode_parms.as_deref() {
            Some(PDFObject::Dict(d)) => parms.push(Some(d.clone())),
            Some(PDFObject::Array(arr)) => {
                for item in arr {
                    match self.resolve(item).ok().as_deref() {
                        Some(PDFObject::Dict(d)) => parms.push(Some(d.clone())),
                        _ => parms.push(None),
                    }
                }
            }
            _ => {}
        }
        parms.resize_with(names.len(), || None);

        (names, parms)
    }

    // ------------------------------------------------------------------
    // Eager passes

    /// Resolve every indexed object; with `decompress` also replace each
    /// supported filtered stream by its decoded bytes (the filter tag is
    /// removed and /Length recomputed). Streams without a filter tag are
    /// untouched, so the pass is idempotent.
    fn materialize_all(&self, decompress: bool) {
        let mut objids: Vec<u32> = self.offsets.keys().copied().collect();
        objids.sort_unstable();

        for objid in objids {
            let obj = match self.getobj_shared(objid) {
                Ok(obj) => obj,
                Err(_) => continue, // already warned
            };
            if !decompress {
                continue;
            }

            let PDFObject::Stream(stream) = obj.as_ref() else {
                continue;
            };
            if stream.get("Filter").is_none() {
                continue;
            }
            let (names, _) = self.filter_chain(stream);
            if names.iter().any(|n| !filters::is_supported_filter(n)) {
                // decode_stream would pass it through; keep the raw form
                continue;
            }
            let Ok(decoded) = self.decode_stream(stream) else {
                continue;
            };

            let mut attrs = stream.attrs.clone();
            attrs.remove("Filter");
            attrs.remove("DecodeParms");
            attrs.remove("DP");
            attrs.set("Length", PDFObject::Int(decoded.len() as i64));
            let mut replacement = PDFStream::new(attrs, Bytes::new());
            replacement.set_objid(objid, stream.genno.unwrap_or(0));
            replacement.set_rawdata_decrypted(decoded);
            // /Length was just recomputed; set_rawdata_decrypted keeps it
            self.cache
                .borrow_mut()
                .insert(objid, Rc::new(PDFObject::Stream(Box::new(replacement))));
        }
    }
}

/// Whether the stream's filter chain names /Crypt with the Identity
/// filter (or no name at all), bypassing document decryption.
fn stream_bypasses_crypt(attrs: &PdfDict) -> bool {
    let crypt_index = match attrs.get("Filter") {
        Some(PDFObject::Name(name)) => {
            if name == "Crypt" {
                Some(0)
            } else {
                None
            }
        }
        Some(PDFObject::Array(arr)) => arr
            .iter()
            .position(|f| matches!(f, PDFObject::Name(n) if n == "Crypt")),
        _ => None,
    };
    let Some(crypt_index) = crypt_index else {
        return false;
    };

    let parms = match attrs.get_any(&["DecodeParms", "DP"]) {
        Some(PDFObject::Dict(d)) => Some(d),
        Some(PDFObject::Array(arr)) => match arr.get(crypt_index) {
            Some(PDFObject::Dict(d)) => Some(d),
            _ => None,
        },
        _ => None,
    };

    match parms.and_then(|p| p.get_name("Name")) {
        None | Some("Identity") => true,
        Some(_) => false,
    }
}

/// Validate `objid genno obj` at `pos`; on success return the body start.
fn check_object_header(data: &[u8], pos: usize, objid: u32, genno: u16) -> Option<usize> {
    let mut lexer = Lexer::new(data);
    lexer.seek(pos);

    match lexer.next_token() {
        Some(Ok((_, Token::Int(n)))) if n == objid as i64 => {}
        _ => return None,
    }
    match lexer.next_token() {
        Some(Ok((_, Token::Int(n)))) if n == genno as i64 => {}
        _ => return None,
    }
    match lexer.next_token() {
        Some(Ok((_, Token::Keyword(kw)))) if kw == b"obj" => {}
        _ => return None,
    }

    Some(lexer.tell())
}

/// Search a window around `pos` for the literal header text.
fn search_nearby(data: &[u8], pos: usize, needle: &[u8]) -> Option<usize> {
    let start = pos.saturating_sub(HEADER_SEARCH_WINDOW);
    let end = (pos + HEADER_SEARCH_WINDOW + needle.len()).min(data.len());
    if start >= end {
        return None;
    }
    data[start..end]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|rel| start + rel)
}

/// Determine the stream's byte extent.
///
/// The declared /Length wins when the bytes at its end read back
/// `endstream`; otherwise the literal marker wins and the returned length
/// is flagged as corrected.
fn stream_extent(data: &[u8], start: usize, declared: Option<usize>) -> (usize, bool) {
    if let Some(len) = declared {
        let end = start + len;
        if end <= data.len() && reads_endstream(data, end) {
            return (len, false);
        }
    }

    match find_forward(&data[start.min(data.len())..], b"endstream") {
        Some(rel) => {
            let mut end = start + rel;
            // One EOL before the marker delimits, it is not data
            if end >= 2 && &data[end - 2..end] == b"\r\n" {
                end -= 2;
            } else if end >= 1 && (data[end - 1] == b'\n' || data[end - 1] == b'\r') {
                end -= 1;
            }
            (end.saturating_sub(start), true)
        }
        None => {
            // No marker at all: truncated file, take what is there
            let available = data.len().saturating_sub(start);
            (declared.unwrap_or(available).min(available), true)
        }
    }
}

fn reads_endstream(data: &[u8], mut pos: usize) -> bool {
    while pos < data.len() && Lexer::is_whitespace(data[pos]) {
        pos += 1;
    }
    data[pos..].starts_with(b"endstream")
}

fn find_forward(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read `%PDF-x.y` from the head of the buffer. A missing or unparsable
/// header is structural and fatal.
fn version_from_header(data: &[u8]) -> Result<String> {
    let window = &data[..data.len().min(1024)];
    let at = find_forward(window, b"%PDF-")
        .ok_or_else(|| PdfError::SyntaxError("missing %PDF header".into()))?;

    let rest = &window[at + b"%PDF-".len()..];
    let mut end = 0;
    while end < rest.len() && (rest[end].is_ascii_digit() || rest[end] == b'.') {
        end += 1;
    }
    if end == 0 || !rest[0].is_ascii_digit() {
        return Err(PdfError::SyntaxError("unparsable %PDF header version".into()));
    }

    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

/// Parse "1.7"-style version strings for comparison; unparsable parts
/// compare as zero.
fn version_tuple(version: &str) -> (u32, u32) {
    let mut parts = version.split('.');
    let major = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor)
}
