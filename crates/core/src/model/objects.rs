//! PDF object types.
//!
//! The fundamental value type is [`PDFObject`]. Containers hold their
//! elements by value; sharing and cycles between objects are expressed
//! through [`PDFObjRef`] keys resolved against a document (or an
//! [`crate::writer::ObjectBuilder`]) rather than through pointers, so deep
//! or cyclic graphs never translate into deep ownership.

use crate::error::{PdfError, Result};
use crate::utils::decode_text;
use bytes::Bytes;
use smol_str::SmolStr;
use std::collections::HashMap;

/// A PDF name.
///
/// Names act as dictionary keys and enum-like tags (`/Type`, `/Filter`).
/// `SmolStr` keeps typical names inline and makes clones O(1), which gives
/// interning-like equality/hash cost without a global table.
pub type Name = SmolStr;

/// PDF object - the fundamental value type.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null object (also the "absent" marker for dictionary entries)
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type, /Font)
    Name(Name),
    /// String (byte array; literal and hex forms are not distinguished)
    String(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(PdfDict),
    /// Stream (dictionary attributes + binary data)
    Stream(Box<PDFStream>),
    /// Indirect object reference
    Ref(PDFObjRef),
}

impl PDFObject {
    /// Check if this is a null object.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as boolean.
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(PdfError::TypeError {
                expected: "bool",
                got: self.type_name(),
            }),
        }
    }

    /// Get as integer.
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "int",
                got: self.type_name(),
            }),
        }
    }

    /// Get as real (float).
    pub const fn as_real(&self) -> Result<f64> {
        match self {
            Self::Real(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "real",
                got: self.type_name(),
            }),
        }
    }

    /// Get numeric value (int or real coerced to f64).
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(PdfError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Get as name.
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "name",
                got: self.type_name(),
            }),
        }
    }

    /// Get as byte string.
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "string",
                got: self.type_name(),
            }),
        }
    }

    /// Decode a string value to Unicode text.
    ///
    /// Understands UTF-16BE with a BOM and the legacy single-byte
    /// PDFDocEncoding.
    pub fn as_text(&self) -> Result<String> {
        Ok(decode_text(self.as_string()?))
    }

    /// Get as array.
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(PdfError::TypeError {
                expected: "array",
                got: self.type_name(),
            }),
        }
    }

    /// Get as dictionary. A stream answers with its attribute dictionary.
    pub fn as_dict(&self) -> Result<&PdfDict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.attrs),
            _ => Err(PdfError::TypeError {
                expected: "dict",
                got: self.type_name(),
            }),
        }
    }

    /// Get as stream.
    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(PdfError::TypeError {
                expected: "stream",
                got: self.type_name(),
            }),
        }
    }

    /// Get as indirect reference.
    pub const fn as_reference(&self) -> Result<&PDFObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(PdfError::TypeError {
                expected: "ref",
                got: self.type_name(),
            }),
        }
    }

    /// Get type name for error messages.
    pub(crate) const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }
}

/// PDF indirect object reference.
///
/// The (object number, generation number) pair identifies at most one live
/// object per document; resolving the same reference twice yields the same
/// memoized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PDFObjRef {
    /// Object number
    pub objid: u32,
    /// Generation number
    pub genno: u16,
}

impl PDFObjRef {
    pub const fn new(objid: u32, genno: u16) -> Self {
        Self { objid, genno }
    }
}

impl std::fmt::Display for PDFObjRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.objid, self.genno)
    }
}

/// PDF dictionary: a mapping from [`Name`] to [`PDFObject`].
///
/// Keys are unique and insertion order is irrelevant; serialization walks
/// the keys in byte-lexicographic order so output is deterministic.
/// Setting a key to `PDFObject::Null` deletes it - a null entry and an
/// absent entry are indistinguishable, and iteration never yields one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDict {
    entries: HashMap<Name, PDFObject>,
}

impl PdfDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&PDFObject> {
        self.entries.get(key)
    }

    /// Set a key. Assigning `PDFObject::Null` removes the key instead.
    pub fn set(&mut self, key: impl Into<Name>, value: PDFObject) {
        let key = key.into();
        if value.is_null() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<PDFObject> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &PDFObject)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    /// Keys in byte-lexicographic order - the stable total order used when
    /// emitting dictionary entries.
    pub fn sorted_keys(&self) -> Vec<&Name> {
        let mut keys: Vec<&Name> = self.entries.keys().collect();
        keys.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
        keys
    }

    /// Get attribute, trying multiple names (abbreviated stream keys).
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        names.iter().find_map(|name| self.entries.get(*name))
    }

    // Typed conveniences - all answer None on a missing key or a type
    // mismatch; callers that need the distinction use `get`.

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool().ok())
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_name().ok())
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(|v| v.as_string().ok())
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<PDFObject>> {
        self.get(key).and_then(|v| v.as_array().ok())
    }

    pub fn get_dict(&self, key: &str) -> Option<&PdfDict> {
        self.get(key).and_then(|v| v.as_dict().ok())
    }
}

impl FromIterator<(Name, PDFObject)> for PdfDict {
    fn from_iter<T: IntoIterator<Item = (Name, PDFObject)>>(iter: T) -> Self {
        let mut dict = Self::new();
        for (k, v) in iter {
            dict.set(k, v);
        }
        dict
    }
}

impl<'a> IntoIterator for &'a PdfDict {
    type Item = (&'a Name, &'a PDFObject);
    type IntoIter = std::collections::hash_map::Iter<'a, Name, PDFObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// PDF stream: dictionary attributes plus binary data.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    /// Stream dictionary attributes
    pub attrs: PdfDict,
    /// Raw (possibly encrypted/encoded) data
    rawdata: Bytes,
    /// Whether rawdata has already been decrypted
    rawdata_decrypted: bool,
    /// Object number (set when the stream is loaded from a document)
    pub objid: Option<u32>,
    /// Generation number
    pub genno: Option<u16>,
}

impl PDFStream {
    pub fn new(attrs: PdfDict, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            rawdata_decrypted: false,
            objid: None,
            genno: None,
        }
    }

    /// Tag the stream with its indirect identity.
    pub const fn set_objid(&mut self, objid: u32, genno: u16) {
        self.objid = Some(objid);
        self.genno = Some(genno);
    }

    /// Raw (undecoded) data.
    pub fn get_rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Raw data as shared bytes.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    pub const fn rawdata_is_decrypted(&self) -> bool {
        self.rawdata_decrypted
    }

    /// Replace rawdata with its decrypted form.
    pub fn set_rawdata_decrypted(&mut self, data: Vec<u8>) {
        self.rawdata = Bytes::from(data);
        self.rawdata_decrypted = true;
    }

    /// Replace the stream bytes, recomputing the declared /Length.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.attrs.set("Length", PDFObject::Int(data.len() as i64));
        self.rawdata = Bytes::from(data);
    }

    /// Check if the attribute dictionary contains a key.
    pub fn contains(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Get attribute by name.
    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        self.attrs.get(name)
    }

    /// Get attribute, trying multiple names.
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        self.attrs.get_any(names)
    }
}
