//! Tests for document loading: pages, lazy resolution, repair, object
//! streams, encryption, and the eager passes.

mod common;

use common::{PdfBuilder, hex_string, three_page_pdf};
use folio_core::error::PdfError;
use folio_core::filters::flate_encode;
use folio_core::pdftypes::{PDFObjRef, PDFObject, PdfDict};
use folio_core::security::{SecurityHandler, StandardSecurityHandlerV2};
use folio_core::{LoadOptions, PDFDocument};
use std::rc::Rc;

#[test]
fn test_three_page_document_loads() {
    let doc = PDFDocument::new(three_page_pdf(), "").expect("document loads");

    assert_eq!(doc.version(), "1.4");
    assert_eq!(doc.pages().len(), 3);
    assert!(doc.trailer().get("Root").is_some());
    assert_eq!(doc.trailer().get_int("Size"), Some(7));
    assert!(!doc.is_encrypted());
    assert!(doc.warnings().is_empty(), "clean file, no warnings");
}

#[test]
fn test_page_attribute_inheritance() {
    let doc = PDFDocument::new(three_page_pdf(), "").unwrap();
    let pages = doc.pages();

    // Page 1 inherits MediaBox and Rotate from the Pages node
    assert_eq!(pages[0].mediabox, Some([0.0, 0.0, 612.0, 792.0]));
    assert_eq!(pages[0].rotate, 90);
    // Page 2 declares its own MediaBox
    assert_eq!(pages[1].mediabox, Some([0.0, 0.0, 200.0, 200.0]));
    // Page 3 overrides Rotate back to zero
    assert_eq!(pages[2].rotate, 0);
    // CropBox defaults to the media box
    assert_eq!(pages[0].cropbox, pages[0].mediabox);
}

#[test]
fn test_resolution_is_memoized() {
    let doc = PDFDocument::new(three_page_pdf(), "").unwrap();
    let a = doc.getobj_shared(2).unwrap();
    let b = doc.getobj_shared(2).unwrap();
    assert!(Rc::ptr_eq(&a, &b), "second resolution returns the memo");
}

#[test]
fn test_getobj_zero_and_missing() {
    let doc = PDFDocument::new(three_page_pdf(), "").unwrap();

    assert!(matches!(
        doc.getobj(0),
        Err(PdfError::ObjectNotFound(0))
    ));
    assert!(matches!(
        doc.getobj(99),
        Err(PdfError::ObjectNotFound(99))
    ));

    // Resolution substitutes null for a dangling reference and warns
    let resolved = doc.resolve(&PDFObject::Ref(PDFObjRef::new(99, 0))).unwrap();
    assert!(resolved.is_null());
    assert!(doc.warnings().iter().any(|w| w.contains("missing object 99")));
}

/// Declared /Length is 10 bytes short; the endstream marker wins and the
/// declared length is corrected, with a warning.
#[test]
fn test_stream_length_repair() {
    let payload = b"0123456789abcdefghijklmnopqrstuv"; // 32 bytes
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    builder.add_stream_object("", payload, Some(payload.len() - 10));
    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();

    let obj = doc.getobj(3).unwrap();
    let stream = obj.as_stream().unwrap();
    assert_eq!(stream.get_rawdata(), payload, "full stream bytes restored");
    assert_eq!(
        stream.attrs.get_int("Length"),
        Some(payload.len() as i64),
        "declared length corrected in the attributes"
    );
    assert!(
        doc.warnings().iter().any(|w| w.contains("corrected")),
        "repair must be reported: {:?}",
        doc.warnings()
    );
}

#[test]
fn test_stream_length_via_indirect_reference() {
    let payload = b"indirect length payload";
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    let mut body = b"<< /Length 4 0 R >>\nstream\n".to_vec();
    body.extend_from_slice(payload);
    body.extend_from_slice(b"\nendstream");
    builder.add_object_raw(&body);
    builder.add_object(&payload.len().to_string());

    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();
    let obj = doc.getobj(3).unwrap();
    assert_eq!(obj.as_stream().unwrap().get_rawdata(), payload);
    assert!(doc.warnings().is_empty(), "{:?}", doc.warnings());
}

/// The index records an offset a few bytes off; the loader finds the
/// literal header text nearby and keeps going.
#[test]
fn test_shifted_object_header_recovery() {
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    let target = builder.add_object("(shifted)");
    let true_offset = builder.offset_of(target);
    builder.set_offset(target, true_offset.saturating_sub(5));

    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();
    assert_eq!(
        doc.getobj(target).unwrap(),
        PDFObject::String(b"shifted".to_vec())
    );
    assert!(doc.warnings().iter().any(|w| w.contains("found at offset")));
}

/// An object the index points at but which is unrecoverable resolves to
/// null with a warning instead of failing the load.
#[test]
fn test_unloadable_object_becomes_null() {
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    let target = builder.add_object("(lost)");
    builder.set_offset(target, 9_999_999); // far beyond the file

    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();
    assert_eq!(doc.getobj(target).unwrap(), PDFObject::Null);
    assert!(
        doc.warnings()
            .iter()
            .any(|w| w.contains("substituting null"))
    );
}

#[test]
fn test_page_tree_cycle_warns_and_shortens() {
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    // The Pages node lists itself as a kid
    builder.add_object("<< /Type /Pages /Kids [3 0 R 2 0 R] /Count 2 >>");
    builder.add_object("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] >>");

    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();
    assert_eq!(doc.pages().len(), 1, "cycle costs the subtree, not the load");
    assert!(doc.warnings().iter().any(|w| w.contains("cycle")));
}

#[test]
fn test_page_tree_depth_bound_is_hard_error() {
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    // A 70-deep chain of intermediate nodes
    for i in 2..72 {
        builder.add_object(&format!(
            "<< /Type /Pages /Kids [{} 0 R] /Count 1 >>",
            i + 1
        ));
    }
    builder.add_object("<< /Type /Page /MediaBox [0 0 10 10] >>");

    let result = PDFDocument::new(builder.finish("/Root 1 0 R"), "");
    assert!(
        matches!(result, Err(PdfError::SyntaxError(_))),
        "exceeding the depth bound is structural"
    );
}

#[test]
fn test_wrong_node_type_yields_no_pages() {
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 2 >>");
    builder.add_object("<< /Type /Font /Subtype /Type1 >>"); // not a page
    builder.add_object("<< /Type /Page /MediaBox [0 0 10 10] >>");

    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();
    assert_eq!(doc.pages().len(), 1);
    assert!(!doc.warnings().is_empty());
}

#[test]
fn test_inheritable_lookup_walks_parent_chain() {
    let doc = PDFDocument::new(three_page_pdf(), "").unwrap();
    let page = doc.getobj(3).unwrap();
    let page_dict = page.as_dict().unwrap();

    // MediaBox lives on the Pages node, one /Parent hop up
    let found = doc.get_inheritable(page_dict, "MediaBox").unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().as_array().unwrap().len(), 4);

    let absent = doc.get_inheritable(page_dict, "NoSuchKey").unwrap();
    assert!(absent.is_none());
}

#[test]
fn test_inheritable_lookup_fails_loudly_on_cycle() {
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    builder.add_object("<< /Parent 4 0 R >>");
    builder.add_object("<< /Parent 3 0 R >>");

    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();
    let a = doc.getobj(3).unwrap();
    let result = doc.get_inheritable(a.as_dict().unwrap(), "Missing");
    assert!(matches!(result, Err(PdfError::SyntaxError(_))));
}

/// Build a document indexed by an uncompressed XRef stream, with two
/// objects packed into an ObjStm container (type-2 entries).
#[test]
fn test_xref_stream_and_object_stream() {
    let mut out = b"%PDF-1.5\n%\xe2\xe3\xcf\xd3\n".to_vec();
    let mut offsets = vec![0usize; 8]; // object number -> offset

    let mut add_obj = |out: &mut Vec<u8>, offsets: &mut Vec<usize>, objid: usize, body: &[u8]| {
        offsets[objid] = out.len();
        out.extend_from_slice(format!("{} 0 obj\n", objid).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    };

    add_obj(
        &mut out,
        &mut offsets,
        1,
        b"<< /Type /Catalog /Pages 2 0 R >>",
    );
    add_obj(
        &mut out,
        &mut offsets,
        2,
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
    );
    add_obj(
        &mut out,
        &mut offsets,
        3,
        b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 10 10] >>",
    );

    // ObjStm container (object 4) holding objects 5 and 6
    let inner_a = b"<< /Name (five) >>";
    let inner_b = b"(six)";
    let pair_header = format!("5 0 6 {} ", inner_a.len() + 1);
    let mut objstm_data = pair_header.clone().into_bytes();
    let first = objstm_data.len();
    objstm_data.extend_from_slice(inner_a);
    objstm_data.push(b' ');
    objstm_data.extend_from_slice(inner_b);

    let mut objstm_body = format!(
        "<< /Type /ObjStm /N 2 /First {} /Length {} >>\nstream\n",
        first,
        objstm_data.len()
    )
    .into_bytes();
    objstm_body.extend_from_slice(&objstm_data);
    objstm_body.extend_from_slice(b"\nendstream");
    add_obj(&mut out, &mut offsets, 4, &objstm_body);

    // XRef stream (object 7): W = [1 2 1], entries for objects 0..=7
    offsets[7] = out.len();
    let mut entries = Vec::new();
    let mut push_entry = |entries: &mut Vec<u8>, t: u8, f1: u16, f2: u8| {
        entries.push(t);
        entries.extend_from_slice(&f1.to_be_bytes());
        entries.push(f2);
    };
    push_entry(&mut entries, 0, 0, 0); // 0: free
    push_entry(&mut entries, 1, offsets[1] as u16, 0);
    push_entry(&mut entries, 1, offsets[2] as u16, 0);
    push_entry(&mut entries, 1, offsets[3] as u16, 0);
    push_entry(&mut entries, 1, offsets[4] as u16, 0);
    push_entry(&mut entries, 2, 4, 0); // 5: container 4, index 0
    push_entry(&mut entries, 2, 4, 1); // 6: container 4, index 1
    push_entry(&mut entries, 1, offsets[7] as u16, 0);

    let mut xref_body = format!(
        "7 0 obj\n<< /Type /XRef /W [1 2 1] /Size 8 /Root 1 0 R /Length {} >>\nstream\n",
        entries.len()
    )
    .into_bytes();
    xref_body.extend_from_slice(&entries);
    xref_body.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(&xref_body);

    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", offsets[7]).as_bytes());

    let doc = PDFDocument::new(&out, "").expect("xref-stream document loads");
    assert_eq!(doc.pages().len(), 1);
    assert_eq!(
        doc.getobj(5)
            .unwrap()
            .as_dict()
            .unwrap()
            .get_bytes("Name"),
        Some(b"five".as_slice())
    );
    assert_eq!(
        doc.getobj(6).unwrap(),
        PDFObject::String(b"six".to_vec())
    );
}

/// Strings in an RC4-encrypted document decrypt with the right password
/// and the load fails with the wrong one.
#[test]
fn test_encrypted_document_round_trip() {
    const O: [u8; 32] = [
        1, 169, 240, 206, 242, 141, 0, 248, 223, 176, 37, 143, 94, 240, 197, 92, 157, 247, 200,
        22, 149, 143, 54, 49, 0, 175, 119, 236, 2, 38, 36, 84,
    ];
    const U: [u8; 32] = [
        105, 75, 157, 162, 248, 9, 199, 124, 114, 119, 140, 251, 202, 194, 4, 129, 178, 114, 5,
        208, 231, 211, 34, 98, 54, 130, 131, 100, 102, 106, 151, 8,
    ];
    const DOCID: [u8; 16] = [
        101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
    ];

    // Encrypt the Producer string with the same handler the reader will
    // derive (RC4 is symmetric)
    let mut encrypt_dict = PdfDict::new();
    encrypt_dict.set("Filter", PDFObject::Name("Standard".into()));
    encrypt_dict.set("V", PDFObject::Int(1));
    encrypt_dict.set("R", PDFObject::Int(2));
    encrypt_dict.set("P", PDFObject::Int(-4));
    encrypt_dict.set("Length", PDFObject::Int(40));
    encrypt_dict.set("O", PDFObject::String(O.to_vec()));
    encrypt_dict.set("U", PDFObject::String(U.to_vec()));
    let handler =
        StandardSecurityHandlerV2::new(&encrypt_dict, &[DOCID.to_vec()], "foo").unwrap();

    let producer = b"folio test producer";
    let info_objid = 4u32;
    let ciphertext = handler.decrypt_string(info_objid, 0, producer);

    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    builder.add_object(&format!(
        "<< /Filter /Standard /V 1 /R 2 /P -4 /Length 40 /O {} /U {} >>",
        hex_string(&O),
        hex_string(&U)
    ));
    builder.add_object(&format!("<< /Producer {} >>", hex_string(&ciphertext)));

    let trailer = format!(
        "/Root 1 0 R /Encrypt 3 0 R /Info 4 0 R /ID [{} {}]",
        hex_string(&DOCID),
        hex_string(&DOCID)
    );
    let data = builder.finish(&trailer);

    let doc = PDFDocument::new(&data, "foo").expect("encrypted document loads");
    assert!(doc.is_encrypted());
    let info = doc.info().expect("info resolved");
    assert_eq!(info.get_bytes("Producer"), Some(producer.as_slice()));

    // Wrong password is a hard failure
    assert!(matches!(
        PDFDocument::new(&data, "wrong"),
        Err(PdfError::EncryptionError(_))
    ));
}

#[test]
fn test_decompress_eagerly_strips_filter() {
    let payload = b"stream payload that compresses fine fine fine fine fine".to_vec();
    let compressed = flate_encode(&payload);

    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    builder.add_stream_object("/Filter /FlateDecode", &compressed, None);
    let data = builder.finish("/Root 1 0 R");

    let options = LoadOptions {
        decompress_eagerly: true,
        ..LoadOptions::default()
    };
    let doc = PDFDocument::with_options(&data, &options).unwrap();

    let obj = doc.getobj(3).unwrap();
    let stream = obj.as_stream().unwrap();
    assert!(stream.get("Filter").is_none(), "filter tag removed");
    assert_eq!(stream.get_rawdata(), payload.as_slice());
    assert_eq!(stream.attrs.get_int("Length"), Some(payload.len() as i64));

    // Decoding a stream with no filter tag is the identity
    assert_eq!(doc.decode_stream(stream).unwrap(), payload);
}

#[test]
fn test_unsupported_filter_passes_through_with_one_warning() {
    let payload = b"\x2a\x2a compressed-looking bytes \x2a\x2a";
    let mut builder = PdfBuilder::new();
    builder.add_object("<< /Type /Catalog /Pages 2 0 R >>");
    builder.add_object("<< /Type /Pages /Kids [] /Count 0 >>");
    builder.add_stream_object("/Filter /DCTDecode", payload, None);
    builder.add_stream_object("/Filter /DCTDecode", payload, None);
    let doc = PDFDocument::new(builder.finish("/Root 1 0 R"), "").unwrap();

    for objid in [3, 4] {
        let obj = doc.getobj(objid).unwrap();
        let decoded = doc.decode_stream(obj.as_stream().unwrap()).unwrap();
        assert_eq!(decoded, payload.to_vec(), "untouched pass-through");
    }

    let repeats = doc
        .warnings()
        .iter()
        .filter(|w| w.contains("DCTDecode"))
        .count();
    assert_eq!(repeats, 1, "identical warnings are de-duplicated");
}
