//! Cross-reference (index) engine.
//!
//! Locates the `startxref` marker at the file tail, parses classic tables
//! and compressed index streams, follows the `/Prev` incremental-update
//! chain (plus hybrid `/XRefStm` companions), and merges all sections into
//! one offset map in which the newest section always wins.
//!
//! A malformed classic table is re-scanned line by line instead of
//! aborting; a missing or unreadable tail marker is structural and fatal.

use crate::codec::filters;
use crate::error::{PdfError, Result};
use crate::model::objects::PdfDict;
use crate::parser::lexer::{Lexer, Token};
use crate::parser::pdf_parser::PDFParser;
use crate::utils::nunpack;
use crate::warnings::WarningSink;
use rustc_hash::{FxHashMap, FxHashSet};

/// How far from the end of the file the tail markers are searched for.
const TAIL_WINDOW: usize = 2048;

/// Location of one indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Object stored at a byte offset in the file
    Offset { pos: usize, genno: u16 },
    /// Object packed inside an object-stream container
    InStream { container: u32, index: usize },
}

/// One table's (or index stream's) worth of entries plus its trailer.
#[derive(Debug, Default)]
struct XRefSection {
    offsets: FxHashMap<u32, XRefEntry>,
    trailer: PdfDict,
}

/// Merged view of the whole incremental update chain.
#[derive(Debug, Default)]
pub struct XRefTable {
    /// Object number to location, newest section winning
    pub offsets: FxHashMap<u32, XRefEntry>,
    /// Merged trailer (newest value per key; /Prev and /XRefStm dropped)
    pub trailer: PdfDict,
    /// Object-stream containers referenced by type-2 entries
    pub containers: Vec<u32>,
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Read the `startxref` offset from the file tail.
///
/// The marker, a numeric offset, and the `%%EOF` footer must all be
/// present; anything else is a structural error.
pub fn read_startxref(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(TAIL_WINDOW);
    let tail = &data[tail_start..];

    let marker = rfind_bytes(tail, b"startxref").ok_or(PdfError::NoValidXRef)?;

    if find_bytes(&tail[marker..], b"%%EOF").is_none() {
        return Err(PdfError::SyntaxError("missing %%EOF footer marker".into()));
    }

    let rest = &tail[marker + b"startxref".len()..];
    let mut pos = 0;
    while pos < rest.len() && matches!(rest[pos], b' ' | b'\r' | b'\n') {
        pos += 1;
    }
    let num_start = pos;
    while pos < rest.len() && rest[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == num_start {
        return Err(PdfError::SyntaxError(
            "startxref offset is not numeric".into(),
        ));
    }

    let offset: usize = std::str::from_utf8(&rest[num_start..pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(PdfError::NoValidXRef)?;

    if offset >= data.len() {
        return Err(PdfError::SyntaxError(format!(
            "startxref offset {} beyond end of file",
            offset
        )));
    }

    Ok(offset)
}

/// Load and merge the whole index chain starting at `start`.
///
/// Sections are accumulated newest-first while walking `/Prev`, then
/// applied oldest-first so that a newer section's offset for an object
/// number always overwrites an older one. The first section must parse;
/// a broken section further down the chain costs only its revisions.
pub(crate) fn load_xref_table(
    data: &[u8],
    start: usize,
    warnings: &mut WarningSink,
) -> Result<XRefTable> {
    let mut sections: Vec<XRefSection> = Vec::new();
    let mut visited: FxHashSet<usize> = FxHashSet::default();
    let mut pos = start;

    loop {
        if !visited.insert(pos) {
            warnings.warn(format!("circular /Prev chain at offset {}", pos));
            break;
        }

        let section = match load_section_at(data, pos, warnings) {
            Ok(section) => section,
            Err(e) => {
                if sections.is_empty() {
                    return Err(e);
                }
                warnings.warn(format!(
                    "broken previous index section at offset {}: {}",
                    pos, e
                ));
                break;
            }
        };

        let xref_stm = section.trailer.get_int("XRefStm").map(|n| n as usize);
        let prev = section.trailer.get_int("Prev").map(|n| n as usize);

        sections.push(section);

        // Hybrid-reference file: the classic table is accompanied by an
        // index stream. It is recorded after its host so the host stays
        // authoritative after the oldest-first merge.
        if let Some(stm_pos) = xref_stm
            && visited.insert(stm_pos)
        {
            match parse_xref_stream(data, stm_pos, warnings) {
                Ok(stm_section) => sections.push(stm_section),
                Err(e) => warnings.warn(format!(
                    "broken /XRefStm section at offset {}: {}",
                    stm_pos, e
                )),
            }
        }

        match prev {
            Some(prev_pos) => pos = prev_pos,
            None => break,
        }
    }

    let mut merged = XRefTable::default();
    for section in sections.into_iter().rev() {
        for (objid, entry) in section.offsets {
            merged.offsets.insert(objid, entry);
        }
        for (key, value) in &section.trailer {
            if key != "Prev" && key != "XRefStm" {
                merged.trailer.set(key.clone(), value.clone());
            }
        }
    }

    let mut containers: FxHashSet<u32> = FxHashSet::default();
    for entry in merged.offsets.values() {
        if let XRefEntry::InStream { container, .. } = entry {
            containers.insert(*container);
        }
    }
    merged.containers = containers.into_iter().collect();
    merged.containers.sort_unstable();

    Ok(merged)
}

/// Parse the section at `pos`: a classic table or an index stream.
fn load_section_at(data: &[u8], pos: usize, warnings: &mut WarningSink) -> Result<XRefSection> {
    if pos >= data.len() {
        return Err(PdfError::SyntaxError(format!(
            "index offset {} beyond end of file",
            pos
        )));
    }

    if data[pos..].starts_with(b"xref") {
        match parse_classic_table(data, pos) {
            Ok(section) => Ok(section),
            Err(e) => {
                warnings.warn(format!(
                    "malformed xref table at offset {} ({}), re-scanning line by line",
                    pos, e
                ));
                recover_classic_table(data, pos)
            }
        }
    } else {
        parse_xref_stream(data, pos, warnings)
    }
}

/// Strict classic-table parse: `xref`, subsection headers, entry triples,
/// `trailer` and its dictionary. Any structural deviation is an error and
/// sends the caller to the permissive re-scan.
fn parse_classic_table(data: &[u8], pos: usize) -> Result<XRefSection> {
    let mut section = XRefSection::default();
    let mut lexer = Lexer::new(data);
    lexer.seek(pos + b"xref".len());

    loop {
        let (tok_pos, token) = match lexer.next_token() {
            Some(result) => result?,
            None => return Err(PdfError::UnexpectedEof),
        };

        match token {
            Token::Keyword(kw) if kw == b"trailer" => {
                let mut parser = PDFParser::new_at(data, lexer.tell());
                let trailer = parser.parse_object()?;
                section.trailer = trailer.as_dict()?.clone();
                return Ok(section);
            }
            Token::Int(start_id) if start_id >= 0 => {
                let count = match lexer.next_token() {
                    Some(Ok((_, Token::Int(n)))) if n >= 0 => n as usize,
                    _ => {
                        return Err(PdfError::SyntaxError(format!(
                            "bad xref subsection header at offset {}",
                            tok_pos
                        )));
                    }
                };

                let mut base_objid = start_id as u64;
                for i in 0..count as u64 {
                    let offset = match lexer.next_token() {
                        Some(Ok((_, Token::Int(n)))) if n >= 0 => n as usize,
                        _ => {
                            return Err(PdfError::SyntaxError(
                                "bad xref entry offset".into(),
                            ));
                        }
                    };
                    let genno = match lexer.next_token() {
                        Some(Ok((_, Token::Int(n)))) if n >= 0 => n as u64,
                        _ => {
                            return Err(PdfError::SyntaxError(
                                "bad xref entry generation".into(),
                            ));
                        }
                    };
                    let in_use = match lexer.next_token() {
                        Some(Ok((_, Token::Keyword(kw)))) if kw == b"n" => true,
                        Some(Ok((_, Token::Keyword(kw)))) if kw == b"f" => false,
                        _ => {
                            return Err(PdfError::SyntaxError("bad xref entry flag".into()));
                        }
                    };

                    // Some generators start a subsection at 1 but still
                    // include the object-0 free entry; shift the base so
                    // the remaining entries line up.
                    if i == 0 && base_objid > 0 && !in_use && offset == 0 && genno == 65535 {
                        base_objid -= 1;
                    }

                    if in_use {
                        section.offsets.insert(
                            (base_objid + i) as u32,
                            XRefEntry::Offset {
                                pos: offset,
                                genno: genno.min(u16::MAX as u64) as u16,
                            },
                        );
                    }
                }
            }
            other => {
                return Err(PdfError::SyntaxError(format!(
                    "unexpected token {:?} in xref table at offset {}",
                    other, tok_pos
                )));
            }
        }
    }
}

/// Permissive classic-table recovery: scan line by line between the table
/// start and the `trailer` keyword, tolerating blank and short lines.
fn recover_classic_table(data: &[u8], pos: usize) -> Result<XRefSection> {
    let mut section = XRefSection::default();

    let body_start = pos + b"xref".len();
    let trailer_rel =
        find_bytes(&data[body_start..], b"trailer").ok_or(PdfError::NoValidXRef)?;
    let body = &data[body_start..body_start + trailer_rel];

    fn parse_num(field: &[u8]) -> Option<u64> {
        std::str::from_utf8(field).ok()?.parse().ok()
    }

    let mut next_objid: u64 = 0;
    for line in body.split(|&b| b == b'\n' || b == b'\r') {
        let fields: Vec<&[u8]> = line
            .split(|b: &u8| b.is_ascii_whitespace())
            .filter(|f| !f.is_empty())
            .collect();

        match fields.len() {
            2 => {
                // Subsection header: start count
                if let (Some(start), Some(_count)) = (parse_num(fields[0]), parse_num(fields[1]))
                {
                    next_objid = start;
                }
            }
            3 => {
                let (offset, genno) = match (parse_num(fields[0]), parse_num(fields[1])) {
                    (Some(o), Some(g)) => (o, g),
                    _ => continue,
                };
                let flag = fields[2];
                if flag != b"n" && flag != b"f" {
                    continue;
                }
                let objid = next_objid;
                next_objid += 1;
                if flag == b"n" {
                    section.offsets.insert(
                        objid as u32,
                        XRefEntry::Offset {
                            pos: offset as usize,
                            genno: genno.min(u16::MAX as u64) as u16,
                        },
                    );
                }
            }
            _ => continue,
        }
    }

    // Trailer dictionary after the keyword
    let trailer_pos = body_start + trailer_rel + b"trailer".len();
    let mut parser = PDFParser::new_at(data, trailer_pos);
    if let Ok(trailer) = parser.parse_object()
        && let Ok(dict) = trailer.as_dict()
    {
        section.trailer = dict.clone();
    }

    if section.offsets.is_empty() {
        return Err(PdfError::NoValidXRef);
    }

    Ok(section)
}

/// Parse a compressed index stream (an indirect object of /Type /XRef).
fn parse_xref_stream(data: &[u8], pos: usize, warnings: &mut WarningSink) -> Result<XRefSection> {
    let mut lexer = Lexer::new(data);
    lexer.seek(pos);

    // Header: objid genno obj
    for expected in ["object number", "generation number"] {
        match lexer.next_token() {
            Some(Ok((_, Token::Int(n)))) if n >= 0 => {}
            _ => {
                return Err(PdfError::SyntaxError(format!(
                    "index stream at offset {}: bad {}",
                    pos, expected
                )));
            }
        }
    }
    match lexer.next_token() {
        Some(Ok((_, Token::Keyword(kw)))) if kw == b"obj" => {}
        _ => {
            return Err(PdfError::SyntaxError(format!(
                "no object header at index offset {}",
                pos
            )));
        }
    }

    let mut parser = PDFParser::new_at(data, lexer.tell());
    let dict_obj = parser.parse_object()?;
    let dict = dict_obj.as_dict()?;

    if dict.get_name("Type") != Some("XRef") {
        return Err(PdfError::SyntaxError(format!(
            "object at index offset {} is not an XRef stream",
            pos
        )));
    }

    // Stream extent: always delimited by the endstream marker. Index
    // streams must be parseable before any object can be loaded, so the
    // declared /Length (which may be indirect) cannot be trusted here.
    let after_dict = parser.tell();
    let rem = &data[after_dict..];
    let mut p = 0;
    while p < rem.len() && Lexer::is_whitespace(rem[p]) {
        p += 1;
    }
    if !rem[p..].starts_with(b"stream") {
        return Err(PdfError::SyntaxError(
            "XRef stream dictionary without stream data".into(),
        ));
    }
    p += b"stream".len();
    if rem.get(p) == Some(&b'\r') {
        p += 1;
    }
    if rem.get(p) == Some(&b'\n') {
        p += 1;
    }
    let body_start = p;
    let end = find_bytes(&rem[body_start..], b"endstream").ok_or_else(|| {
        PdfError::SyntaxError("XRef stream without endstream marker".into())
    })?;
    let mut body = &rem[body_start..body_start + end];
    // One EOL before endstream is delimiter, not data
    if body.ends_with(b"\r\n") {
        body = &body[..body.len() - 2];
    } else if body.ends_with(b"\n") || body.ends_with(b"\r") {
        body = &body[..body.len() - 1];
    }

    // Decode: index streams only ever carry FlateDecode (+ predictor)
    let mut decoded = body.to_vec();
    match dict.get_name("Filter") {
        Some("FlateDecode") | Some("Fl") => {
            decoded = filters::flate_decode_lenient(&decoded, warnings);
        }
        None => {}
        Some(other) => {
            warnings.warn(format!("unsupported filter /{} on index stream", other));
        }
    }
    if let Some(parms) = dict.get_dict("DecodeParms") {
        decoded = filters::apply_predictor(decoded, parms, warnings);
    }

    // Entry geometry
    let w = dict
        .get_array("W")
        .ok_or_else(|| PdfError::SyntaxError("missing /W in index stream".into()))?;
    if w.len() != 3 {
        return Err(PdfError::SyntaxError("/W must have 3 elements".into()));
    }
    let w0 = w[0].as_int()? as usize;
    let w1 = w[1].as_int()? as usize;
    let w2 = w[2].as_int()? as usize;
    let entry_size = w0 + w1 + w2;
    if entry_size == 0 {
        return Err(PdfError::SyntaxError("/W describes empty entries".into()));
    }

    let size = dict
        .get_int("Size")
        .ok_or_else(|| PdfError::SyntaxError("missing /Size in index stream".into()))?
        as usize;

    let index_pairs: Vec<(u32, usize)> = match dict.get_array("Index") {
        Some(arr) => {
            let mut pairs = Vec::new();
            let mut i = 0;
            while i + 1 < arr.len() {
                pairs.push((arr[i].as_int()? as u32, arr[i + 1].as_int()? as usize));
                i += 2;
            }
            pairs
        }
        None => vec![(0, size)],
    };

    let mut section = XRefSection::default();
    let mut data_pos = 0;

    for (start_objid, count) in index_pairs {
        for i in 0..count {
            if data_pos + entry_size > decoded.len() {
                warnings.warn("index stream shorter than its /Index declares");
                break;
            }

            let objid = start_objid + i as u32;
            let entry_type = nunpack(&decoded[data_pos..data_pos + w0], 1);
            let field1 = nunpack(&decoded[data_pos + w0..data_pos + w0 + w1], 0);
            let field2 = nunpack(&decoded[data_pos + w0 + w1..data_pos + entry_size], 0);
            data_pos += entry_size;

            match entry_type {
                0 => {
                    // Free object
                }
                1 => {
                    section.offsets.insert(
                        objid,
                        XRefEntry::Offset {
                            pos: field1 as usize,
                            genno: field2.min(u16::MAX as u64) as u16,
                        },
                    );
                }
                2 => {
                    section.offsets.insert(
                        objid,
                        XRefEntry::InStream {
                            container: field1 as u32,
                            index: field2 as usize,
                        },
                    );
                }
                _ => {}
            }
        }
    }

    // The stream's own attributes double as its trailer
    for (key, value) in dict {
        if !matches!(key.as_str(), "Length" | "Filter" | "DecodeParms" | "W" | "Index") {
            section.trailer.set(key.clone(), value.clone());
        }
    }

    Ok(section)
}
