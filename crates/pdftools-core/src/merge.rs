//! PDF Merge algorithm
//!
//! Combines multiple PDFs into a single document.

use crate::document::{page_ids, rebuild_page_tree};
use crate::error::PdfToolsError;
use lopdf::{Document, Object};
use tracing::debug;

/// Merge documents into one, pages in input order
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is
/// 3. Take the first document as the destination
/// 4. For each remaining source document:
///    a. Calculate ID offset to avoid conflicts
///    b. Import all objects with remapped IDs
///    c. Append its pages to the destination page list
/// 5. Rebuild the destination page tree from the combined list
pub fn merge_documents(documents: Vec<Document>) -> Result<Document, PdfToolsError> {
    let mut documents = documents.into_iter();
    let mut dest = documents
        .next()
        .ok_or_else(|| PdfToolsError::Operation("No documents to merge".into()))?;

    let mut dest_pages = page_ids(&dest);
    let mut dest_max_id = dest.max_id;
    let mut merged_any = false;

    for source in documents {
        merged_any = true;
        let source_pages = page_ids(&source);
        let id_offset = dest_max_id;

        debug!(
            pages = source_pages.len(),
            id_offset, "appending document to merge"
        );

        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects.insert(new_id, remap_object_refs(object, id_offset));
        }

        dest_pages.extend(
            source_pages
                .into_iter()
                .map(|(num, generation)| (num + id_offset, generation)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
        if source.version > dest.version {
            dest.version = source.version;
        }
    }

    if !merged_any {
        return Ok(dest);
    }

    dest.max_id = dest_max_id;
    rebuild_page_tree(&mut dest, &dest_pages)?;

    Ok(dest)
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{load_pdf, save_pdf, SaveOptions};
    use crate::test_support::{create_test_pdf, page_labels, page_text};
    use pretty_assertions::assert_eq;

    fn load(num_pages: u32, prefix: &str) -> Document {
        load_pdf(&create_test_pdf(num_pages, prefix)).unwrap()
    }

    fn round_trip(mut doc: Document) -> Document {
        let bytes = save_pdf(&mut doc, SaveOptions::default()).unwrap();
        load_pdf(&bytes).unwrap()
    }

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents(vec![]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("No documents to merge"));
    }

    #[test]
    fn test_merge_single_document_returns_same() {
        let merged = merge_documents(vec![load(2, "Single")]).unwrap();
        assert_eq!(page_labels(&merged, "Single"), vec![1, 2]);
    }

    #[test]
    fn test_merge_two_documents_combines_pages() {
        let merged = round_trip(merge_documents(vec![load(2, "DocA"), load(3, "DocB")]).unwrap());

        assert_eq!(merged.get_pages().len(), 5, "Merged document should have 5 pages");
    }

    #[test]
    fn test_merge_preserves_page_order() {
        let merged = round_trip(
            merge_documents(vec![load(2, "First"), load(1, "Second"), load(2, "Third")]).unwrap(),
        );

        assert_eq!(merged.get_pages().len(), 5);
        assert!(page_text(&merged, 1).contains("(First-Page-1)"));
        assert!(page_text(&merged, 2).contains("(First-Page-2)"));
        assert!(page_text(&merged, 3).contains("(Second-Page-1)"));
        assert!(page_text(&merged, 4).contains("(Third-Page-1)"));
        assert!(page_text(&merged, 5).contains("(Third-Page-2)"));
    }

    #[test]
    fn test_merge_handles_different_sizes() {
        let merged = round_trip(
            merge_documents(vec![load(10, "Large"), load(1, "Small"), load(5, "Medium")]).unwrap(),
        );

        assert_eq!(merged.get_pages().len(), 16, "Merged document should have 16 pages");
    }

    #[test]
    fn test_merged_pages_point_at_single_page_tree() {
        let merged = merge_documents(vec![load(1, "P1"), load(1, "P2")]).unwrap();
        let root = crate::document::pages_root_id(&merged).unwrap();

        for (_, page_id) in merged.get_pages() {
            let parent = merged
                .get_dictionary(page_id)
                .unwrap()
                .get(b"Parent")
                .unwrap()
                .as_reference()
                .unwrap();
            assert_eq!(parent, root);
        }
    }

    #[test]
    fn test_merge_does_not_leak_first_root_attributes() {
        let mut first = load(1, "A");
        let root = crate::document::pages_root_id(&first).unwrap();
        first
            .get_dictionary_mut(root)
            .unwrap()
            .set("Rotate", Object::Integer(90));

        let merged = round_trip(merge_documents(vec![first, load(1, "B")]).unwrap());
        let rotations: Vec<i64> = crate::document::page_ids(&merged)
            .into_iter()
            .map(|id| {
                crate::document::inherited_attribute(&merged, id, b"Rotate")
                    .map_or(0, |r| r.as_i64().unwrap())
            })
            .collect();

        assert_eq!(rotations, vec![90, 0]);
    }

    #[test]
    fn test_remap_object_refs_nested() {
        let obj = Object::Array(vec![
            Object::Reference((3, 0)),
            Object::Dictionary(lopdf::Dictionary::from_iter(vec![(
                "Kid",
                Object::Reference((7, 0)),
            )])),
        ]);

        let remapped = remap_object_refs(obj, 10);
        let arr = remapped.as_array().unwrap();
        assert_eq!(arr[0].as_reference().unwrap(), (13, 0));
        let dict = arr[1].as_dict().unwrap();
        assert_eq!(dict.get(b"Kid").unwrap().as_reference().unwrap(), (17, 0));
    }
}
