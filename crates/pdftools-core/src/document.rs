//! Loading, inspecting and saving PDF documents
//!
//! Transforms never parse bytes themselves: they receive a `lopdf::Document`
//! from [`load_pdf`] and hand it back to [`save_pdf`]. The page helpers here
//! cover the page-tree details every transform needs (inherited attributes,
//! effective page size, rebuilding the tree from a page list).

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::InputFile;
use crate::error::PdfToolsError;

/// US Letter, used when a page has no usable MediaBox
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page attributes that may be inherited from a Pages node
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

// Guards against cyclic Parent chains and reference loops
const MAX_TREE_DEPTH: usize = 64;

/// Serializer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Pack uncompressed streams before writing (smaller output). When off,
    /// objects are written exactly as they are held, which is what flatten
    /// uses for maximum reader compatibility.
    pub object_streams: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            object_streams: true,
        }
    }
}

impl SaveOptions {
    pub fn flattened() -> Self {
        Self {
            object_streams: false,
        }
    }
}

/// Parse PDF bytes into a document
pub fn load_pdf(bytes: &[u8]) -> Result<Document, PdfToolsError> {
    if bytes.is_empty() {
        return Err(PdfToolsError::Decode("File is empty".into()));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(PdfToolsError::Decode(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }

    let doc = Document::load_mem(bytes).map_err(|e| PdfToolsError::Decode(e.to_string()))?;

    if doc.is_encrypted() {
        return Err(PdfToolsError::Decode(
            "Encrypted PDFs are not supported".into(),
        ));
    }

    Ok(doc)
}

/// Load several files in order. The first failure aborts the rest.
pub fn load_pdfs(files: &[InputFile]) -> Result<Vec<Document>, PdfToolsError> {
    let mut docs = Vec::with_capacity(files.len());
    for (i, file) in files.iter().enumerate() {
        let doc = load_pdf(&file.bytes).map_err(|e| match e {
            PdfToolsError::Decode(msg) => PdfToolsError::Decode(format!(
                "Failed to load document {} ({}): {}",
                i + 1,
                file.name,
                msg
            )),
            other => other,
        })?;
        debug!(file = %file.name, pages = doc.get_pages().len(), "loaded document");
        docs.push(doc);
    }
    Ok(docs)
}

/// Serialize a document, dropping objects no longer reachable from the trailer
pub fn save_pdf(doc: &mut Document, options: SaveOptions) -> Result<Vec<u8>, PdfToolsError> {
    doc.prune_objects();
    if options.object_streams {
        doc.compress();
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::Operation(format!("Save failed: {}", e)))?;

    Ok(buffer)
}

/// Page object ids in page order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

pub fn page_count(doc: &Document) -> u32 {
    doc.get_pages().len() as u32
}

/// Follow references until a direct object is reached
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    let mut current = object;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => break,
            },
            _ => break,
        }
    }
    current
}

/// Look up a page attribute, walking up the page tree if the page lacks it
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n as f32),
        _ => None,
    }
}

/// Read a rectangle attribute (MediaBox, CropBox, ...) as [x1, y1, x2, y2]
pub fn page_box(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let value = inherited_attribute(doc, page_id, key)?;
    let array = resolve(doc, &value).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(array) {
        *slot = number(resolve(doc, item))?;
    }
    Some(rect)
}

pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    page_box(doc, page_id, b"MediaBox").unwrap_or(DEFAULT_MEDIA_BOX)
}

/// Width and height of the page's MediaBox in points
pub fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let [x1, y1, x2, y2] = media_box(doc, page_id);
    ((x2 - x1).abs(), (y2 - y1).abs())
}

pub fn rect_object(rect: [f32; 4]) -> Object {
    Object::Array(rect.iter().map(|v| Object::Real(*v)).collect())
}

/// Copy inherited attributes onto the page itself so it survives being
/// moved under a different parent.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> Result<(), PdfToolsError> {
    let mut missing = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        for key in INHERITABLE_KEYS {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(doc, page_id, key) {
                missing.push((key, value));
            }
        }
    }

    let page = doc.get_dictionary_mut(page_id)?;
    for (key, value) in missing {
        page.set(key, value);
    }
    Ok(())
}

fn catalog_id(doc: &Document) -> Result<ObjectId, PdfToolsError> {
    doc.trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| PdfToolsError::Operation("No Root in trailer".into()))
}

/// Object id of the root Pages node
pub fn pages_root_id(doc: &Document) -> Result<ObjectId, PdfToolsError> {
    let catalog_id = catalog_id(doc)?;

    let catalog = doc
        .get_dictionary(catalog_id)
        .map_err(|_| PdfToolsError::Operation("Catalog not found".into()))?;

    catalog
        .get(b"Pages")
        .and_then(|pages| pages.as_reference())
        .map_err(|_| PdfToolsError::Operation("No Pages in catalog".into()))
}

/// Replace the page tree with a flat list of the given pages, in order.
///
/// A page listed more than once is cloned into a new object for each extra
/// occurrence. Every listed page carries its own inheritable attributes
/// afterwards, and the root node carries none, so pages moved in from
/// another tree keep exactly the attributes they had there.
pub fn rebuild_page_tree(doc: &mut Document, pages: &[ObjectId]) -> Result<(), PdfToolsError> {
    let pages_id = pages_root_id(doc)?;

    let unique: HashSet<ObjectId> = pages.iter().copied().collect();
    for &page_id in &unique {
        materialize_inherited(doc, page_id)?;
    }
    {
        let root = doc.get_dictionary_mut(pages_id)?;
        for key in INHERITABLE_KEYS {
            root.remove(key);
        }
    }

    let mut placed = HashSet::new();
    let mut kids = Vec::with_capacity(pages.len());
    for &page_id in pages {
        let id = if placed.insert(page_id) {
            page_id
        } else {
            let copy = doc.get_object(page_id)?.clone();
            doc.add_object(copy)
        };
        doc.get_dictionary_mut(id)?
            .set("Parent", Object::Reference(pages_id));
        kids.push(Object::Reference(id));
    }

    let root = doc
        .get_dictionary_mut(pages_id)
        .map_err(|_| PdfToolsError::Operation("Invalid pages dictionary".into()))?;
    root.set("Count", Object::Integer(kids.len() as i64));
    root.set("Kids", Object::Array(kids));

    Ok(())
}

/// Catalog entries that address pages directly
const NAVIGATION_KEYS: [&[u8]; 4] = [b"Outlines", b"Dests", b"StructTreeRoot", b"OpenAction"];

/// Cut every link to pages that are no longer in the page tree.
///
/// Outlines, named destinations, the structure tree and the open action
/// are dropped from the catalog; any other reference to a dropped page
/// (annotation `/P`, link destinations, form widgets) becomes `null`. After
/// this the dropped pages and everything only they use are unreachable and
/// disappear on save.
pub fn detach_pages(doc: &mut Document, dropped: &HashSet<ObjectId>) -> Result<(), PdfToolsError> {
    if dropped.is_empty() {
        return Ok(());
    }

    let catalog_id = catalog_id(doc)?;
    let names_id = {
        let catalog = doc.get_dictionary_mut(catalog_id)?;
        for key in NAVIGATION_KEYS {
            catalog.remove(key);
        }
        match catalog.get_mut(b"Names") {
            Ok(Object::Dictionary(names)) => {
                names.remove(b"Dests");
                None
            }
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };
    if let Some(names) = names_id.and_then(|id| doc.get_dictionary_mut(id).ok()) {
        names.remove(b"Dests");
    }

    for (id, object) in doc.objects.iter_mut() {
        if !dropped.contains(id) {
            clear_references(object, dropped);
        }
    }

    debug!(pages = dropped.len(), "detached dropped pages");
    Ok(())
}

fn clear_references(object: &mut Object, targets: &HashSet<ObjectId>) {
    if matches!(object, Object::Reference(id) if targets.contains(id)) {
        *object = Object::Null;
        return;
    }
    match object {
        Object::Array(items) => {
            for item in items.iter_mut() {
                clear_references(item, targets);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                clear_references(value, targets);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                clear_references(value, targets);
            }
        }
        _ => {}
    }
}

/// Start an empty document with a catalog and an empty page tree.
/// Returns the document and the id of its Pages node.
pub fn new_document() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(0)),
        ("Kids", Object::Array(vec![])),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    (doc, pages_id)
}

/// Basic facts about a PDF, shown next to a picked file
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct DocumentInfo {
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub encrypted: bool,
    pub size_bytes: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

pub fn describe(bytes: &[u8]) -> Result<DocumentInfo, PdfToolsError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(PdfToolsError::Decode(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }
    let doc = Document::load_mem(bytes).map_err(|e| PdfToolsError::Decode(e.to_string()))?;

    Ok(DocumentInfo {
        page_count: page_count(&doc),
        version: doc.version.clone(),
        encrypted: doc.is_encrypted(),
        size_bytes: bytes.len(),
        title: info_string(&doc, b"Title"),
        author: info_string(&doc, b"Author"),
    })
}

fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let dict = resolve(doc, info).as_dict().ok()?;
    let value = resolve(doc, dict.get(key).ok()?).as_str().ok()?;
    let decoded = String::from_utf8_lossy(value);
    (!decoded.is_empty()).then(|| decoded.into_owned())
}
