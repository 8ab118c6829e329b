//! Tests for the typed object model.

use folio_core::pdftypes::{PDFObject, PDFStream, PdfDict};
use folio_core::utils::decode_text;

#[test]
fn test_typed_accessors() {
    assert_eq!(PDFObject::Int(3).as_int().unwrap(), 3);
    assert_eq!(PDFObject::Real(1.5).as_real().unwrap(), 1.5);
    assert_eq!(PDFObject::Int(3).as_num().unwrap(), 3.0);
    assert_eq!(PDFObject::Bool(true).as_bool().unwrap(), true);
    assert_eq!(PDFObject::Name("X".into()).as_name().unwrap(), "X");
    assert!(PDFObject::Null.is_null());

    // Mismatches carry both type names
    let err = PDFObject::Int(3).as_name().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("name") && msg.contains("int"), "got: {}", msg);
}

#[test]
fn test_dict_set_null_deletes() {
    let mut dict = PdfDict::new();
    dict.set("Keep", PDFObject::Int(1));
    dict.set("Drop", PDFObject::Int(2));
    assert_eq!(dict.len(), 2);

    // Assigning the absent marker is deletion
    dict.set("Drop", PDFObject::Null);
    assert!(dict.get("Drop").is_none());
    assert_eq!(dict.len(), 1);

    // And the key no longer shows up in iteration
    let keys: Vec<&str> = dict.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["Keep"]);

    // Setting an absent key to null is a no-op
    dict.set("Ghost", PDFObject::Null);
    assert!(!dict.contains_key("Ghost"));
}

#[test]
fn test_dict_sorted_keys_byte_lexicographic() {
    let mut dict = PdfDict::new();
    for key in ["Zebra", "Alpha", "alpha", "A1", "AA"] {
        dict.set(key, PDFObject::Int(1));
    }
    let sorted: Vec<&str> = dict.sorted_keys().into_iter().map(|k| k.as_str()).collect();
    // Uppercase sorts before lowercase in raw byte order
    assert_eq!(sorted, vec!["A1", "AA", "Alpha", "Zebra", "alpha"]);
}

#[test]
fn test_dict_typed_getters() {
    let mut dict = PdfDict::new();
    dict.set("N", PDFObject::Int(7));
    dict.set("Name", PDFObject::Name("Foo".into()));
    dict.set("S", PDFObject::String(b"bytes".to_vec()));

    assert_eq!(dict.get_int("N"), Some(7));
    assert_eq!(dict.get_name("Name"), Some("Foo"));
    assert_eq!(dict.get_bytes("S"), Some(b"bytes".as_slice()));
    assert_eq!(dict.get_int("Name"), None);
    assert_eq!(dict.get_int("Missing"), None);
}

#[test]
fn test_stream_set_data_recomputes_length() {
    let mut attrs = PdfDict::new();
    attrs.set("Length", PDFObject::Int(999));
    let mut stream = PDFStream::new(attrs, b"old".as_slice());

    stream.set_data(b"new data, longer than before".to_vec());
    assert_eq!(stream.attrs.get_int("Length"), Some(28));
    assert_eq!(stream.get_rawdata(), b"new data, longer than before");
}

#[test]
fn test_stream_get_any_abbreviated_keys() {
    let mut attrs = PdfDict::new();
    attrs.set("DP", PDFObject::Int(1));
    let stream = PDFStream::new(attrs, b"".as_slice());
    assert!(stream.get_any(&["DecodeParms", "DP"]).is_some());
    assert!(stream.get_any(&["DecodeParms"]).is_none());
}

#[test]
fn test_decode_text_pdfdoc_encoding() {
    assert_eq!(decode_text(b"plain ASCII"), "plain ASCII");
    // 0xA9 maps to the copyright sign in PDFDocEncoding
    assert_eq!(decode_text(b"\xA9 2024"), "\u{00A9} 2024");
    // 0x92 maps to a trademark sign, not a C1 control
    assert_eq!(decode_text(b"x\x92"), "x\u{2122}");
}

#[test]
fn test_decode_text_utf16be_with_bom() {
    let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69, 0x30, 0x42];
    assert_eq!(decode_text(&bytes), "Hi\u{3042}");
}

#[test]
fn test_string_as_text() {
    let obj = PDFObject::String(vec![0xFE, 0xFF, 0x00, 0x41]);
    assert_eq!(obj.as_text().unwrap(), "A");
}

#[test]
fn test_stream_answers_as_dict() {
    let mut attrs = PdfDict::new();
    attrs.set("Type", PDFObject::Name("XObject".into()));
    let obj = PDFObject::Stream(Box::new(PDFStream::new(attrs, b"".as_slice())));
    assert_eq!(obj.as_dict().unwrap().get_name("Type"), Some("XObject"));
}
