//! Page-tree resolution.
//!
//! The page list is derived by walking the catalog's /Pages tree with an
//! explicit stack: bounded depth (exceeding the bound is a hard parse
//! error, not a stack overflow), a visited set against reference cycles,
//! and shape checking on /Type. A node of the wrong shape costs its
//! subtree, never the load.

use super::catalog::PDFDocument;
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFObject, PdfDict};
use rustc_hash::FxHashSet;

/// Maximum page-tree nesting before the walk gives up.
pub const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Attribute keys a page inherits from its ancestors.
const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// A resolved page.
#[derive(Debug, Clone)]
pub struct PDFPage {
    /// Object number of the page dictionary
    pub pageid: u32,
    /// Page attributes with inherited values merged in
    pub attrs: PdfDict,
    /// Media box (physical page size)
    pub mediabox: Option<[f64; 4]>,
    /// Crop box (defaults to the media box)
    pub cropbox: Option<[f64; 4]>,
    /// Page rotation in degrees, normalized to 0/90/180/270
    pub rotate: i64,
    /// Page resources
    pub resources: PdfDict,
}

impl PDFPage {
    fn from_attrs(doc: &PDFDocument, pageid: u32, attrs: PdfDict) -> Self {
        let mediabox = parse_box(doc, &attrs, "MediaBox");
        let cropbox = parse_box(doc, &attrs, "CropBox").or(mediabox);
        let rotate = attrs
            .get("Rotate")
            .and_then(|r| doc.resolve(r).ok())
            .and_then(|r| r.as_int().ok())
            .map(|r| ((r % 360) + 360) % 360)
            .unwrap_or(0);
        let resources = attrs
            .get("Resources")
            .and_then(|r| doc.resolve(r).ok())
            .and_then(|r| r.as_dict().ok().cloned())
            .unwrap_or_default();

        Self {
            pageid,
            attrs,
            mediabox,
            cropbox,
            rotate,
            resources,
        }
    }
}

fn parse_box(doc: &PDFDocument, attrs: &PdfDict, key: &str) -> Option<[f64; 4]> {
    let resolved = doc.resolve(attrs.get(key)?).ok()?;
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0f64; 4];
    for (slot, item) in out.iter_mut().zip(arr) {
        *slot = doc.resolve(item).ok()?.as_num().ok()?;
    }
    Some(out)
}

/// Walk the catalog's page tree and produce the ordered page list.
pub(crate) fn collect_pages(doc: &PDFDocument) -> Result<Vec<PDFPage>> {
    let Some(pages_root) = doc.catalog().get("Pages").cloned() else {
        doc.warn("catalog has no /Pages entry");
        return Ok(Vec::new());
    };

    let mut pages = Vec::new();
    let mut visited: FxHashSet<u32> = FxHashSet::default();
    // (node, inherited attributes, depth); kids pushed in reverse keeps
    // document order on a LIFO stack
    let mut stack: Vec<(PDFObject, PdfDict, usize)> = vec![(pages_root, PdfDict::new(), 1)];

    while let Some((node, inherited, depth)) = stack.pop() {
        if depth > MAX_PAGE_TREE_DEPTH {
            return Err(PdfError::SyntaxError(format!(
                "page tree deeper than {} levels",
                MAX_PAGE_TREE_DEPTH
            )));
        }

        let objid = match &node {
            PDFObject::Ref(r) => {
                if !visited.insert(r.objid) {
                    doc.warn(format!("page tree cycle through object {}", r.objid));
                    continue;
                }
                r.objid
            }
            _ => 0,
        };

        let resolved = match doc.resolve(&node) {
            Ok(obj) => obj,
            Err(e) => {
                doc.warn(format!("unresolvable page tree node: {}", e));
                continue;
            }
        };
        let dict = match resolved.as_dict() {
            Ok(dict) => dict,
            Err(_) => {
                doc.warn("page tree node is not a dictionary, skipping subtree");
                continue;
            }
        };

        match dict.get_name("Type") {
            Some("Pages") => {
                let mut child_inherited = inherited.clone();
                for key in INHERITABLE_KEYS {
                    if let Some(value) = dict.get(key) {
                        child_inherited.set(key, value.clone());
                    }
                }

                let kids = match dict.get("Kids").map(|k| doc.resolve(k)) {
                    Some(Ok(kids)) => kids,
                    _ => {
                        doc.warn(format!("pages node {} has no /Kids array", objid));
                        continue;
                    }
                };
                let Ok(kids) = kids.as_array() else {
                    doc.warn(format!("pages node {}: /Kids is not an array", objid));
                    continue;
                };
                for kid in kids.iter().rev() {
                    stack.push((kid.clone(), child_inherited.clone(), depth + 1));
                }
            }
            Some("Page") => {
                let mut attrs = dict.clone();
                for key in INHERITABLE_KEYS {
                    if !attrs.contains_key(key)
                        && let Some(value) = inherited.get(key)
                    {
                        attrs.set(key, value.clone());
                    }
                }
                pages.push(PDFPage::from_attrs(doc, objid, attrs));
            }
            Some("Catalog") => {
                // A catalog below the root is malformed but salvageable:
                // descend into its own /Pages
                doc.warn(format!("catalog dictionary inside page tree ({})", objid));
                if let Some(inner) = dict.get("Pages") {
                    stack.push((inner.clone(), inherited, depth + 1));
                }
            }
            other => {
                doc.warn(format!(
                    "page tree node {} has type {:?}, subtree yields no pages",
                    objid, other
                ));
            }
        }
    }

    Ok(pages)
}
