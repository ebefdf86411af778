//! PDF Split algorithm
//!
//! Builds new documents from a selection of an existing document's pages.
//! The source is cloned, never modified.

use std::collections::HashSet;

use crate::document::{detach_pages, page_ids, rebuild_page_tree};
use crate::error::PdfToolsError;
use lopdf::{Document, ObjectId};

/// Check 1-indexed page numbers against a document's page count
pub fn check_page_numbers(pages: &[u32], page_count: u32) -> Result<(), PdfToolsError> {
    if pages.is_empty() {
        return Err(PdfToolsError::Validation("No pages specified".into()));
    }

    if pages.contains(&0) {
        return Err(PdfToolsError::Validation(
            "Page numbers must be >= 1".into(),
        ));
    }

    for &page in pages {
        if page > page_count {
            return Err(PdfToolsError::Validation(format!(
                "Page {} does not exist (document has {} pages)",
                page, page_count
            )));
        }
    }

    Ok(())
}

/// Build a document containing the given pages (1-indexed), in the order
/// listed. A page listed twice appears twice.
///
/// Every page number is checked before anything is copied, so a bad entry
/// fails the whole call. Pages left out are detached completely: outlines
/// and links that pointed at them go, and so does their content.
pub fn extract_pages(doc: &Document, pages: &[u32]) -> Result<Document, PdfToolsError> {
    let ids = page_ids(doc);
    check_page_numbers(pages, ids.len() as u32)?;

    let selected: Vec<_> = pages.iter().map(|&page| ids[page as usize - 1]).collect();
    let kept: HashSet<ObjectId> = selected.iter().copied().collect();
    let dropped: HashSet<ObjectId> = ids.into_iter().filter(|id| !kept.contains(id)).collect();

    let mut new_doc = doc.clone();
    rebuild_page_tree(&mut new_doc, &selected)?;
    detach_pages(&mut new_doc, &dropped)?;

    Ok(new_doc)
}

/// Lazily split a document into single-page documents, in page order.
///
/// Yields `(page_number, document)`; each part is built only when the
/// iterator is advanced.
pub fn split_each(doc: &Document) -> impl Iterator<Item = Result<(u32, Document), PdfToolsError>> + '_ {
    let page_count = page_ids(doc).len() as u32;
    (1..=page_count).map(move |page| extract_pages(doc, &[page]).map(|part| (page, part)))
}
