//! Page-level geometry and ordering transforms

use std::collections::BTreeSet;

use lopdf::{Document, Object};
use tracing::debug;

use crate::document::{media_box, page_box, page_count, page_ids, rect_object};
use crate::error::PdfToolsError;
use crate::split::extract_pages;

/// Boxes that follow the MediaBox when a page is resized
const DEPENDENT_BOXES: [&[u8]; 4] = [b"CropBox", b"BleedBox", b"TrimBox", b"ArtBox"];

/// Normalize rotation to 0, 90, 180, or 270
pub fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360)
}

/// Set an absolute rotation on every page. Existing rotation is replaced,
/// not added to.
pub fn rotate_pages(doc: &mut Document, degrees: i32) -> Result<(), PdfToolsError> {
    if degrees % 90 != 0 {
        return Err(PdfToolsError::Validation(format!(
            "Rotation must be a multiple of 90, got {}",
            degrees
        )));
    }

    let rotation = normalize_rotation(degrees);
    for page_id in page_ids(doc) {
        doc.get_dictionary_mut(page_id)?
            .set("Rotate", Object::Integer(rotation as i64));
    }
    Ok(())
}

/// Scale every page's width and height by `factor`, keeping its origin.
///
/// This shrinks the page geometry only; content streams are untouched.
pub fn resize_pages(doc: &mut Document, factor: f32) -> Result<(), PdfToolsError> {
    if !(factor.is_finite() && factor > 0.0) {
        return Err(PdfToolsError::Validation(format!(
            "Resize factor must be positive, got {}",
            factor
        )));
    }

    for page_id in page_ids(doc) {
        let old = media_box(doc, page_id);
        let [x1, y1, x2, y2] = old;
        let new = [x1, y1, x1 + (x2 - x1) * factor, y1 + (y2 - y1) * factor];

        let followers: Vec<&[u8]> = DEPENDENT_BOXES
            .into_iter()
            .filter(|key| doc.get_dictionary(page_id).map_or(false, |d| d.has(key)))
            .filter(|key| page_box(doc, page_id, key) == Some(old))
            .collect();

        let page = doc.get_dictionary_mut(page_id)?;
        page.set("MediaBox", rect_object(new));
        for key in followers {
            page.set(key, rect_object(new));
        }
    }
    Ok(())
}

/// New document whose pages follow `order` (1-indexed). Pages may repeat;
/// pages not listed are dropped.
pub fn rearrange_pages(doc: &Document, order: &[u32]) -> Result<Document, PdfToolsError> {
    debug!(?order, "rearranging pages");
    extract_pages(doc, order)
}

/// New document without the listed pages (1-indexed), others in original order
pub fn remove_pages(doc: &Document, removed: &BTreeSet<u32>) -> Result<Document, PdfToolsError> {
    let total = page_count(doc);

    if let Some(&page) = removed.iter().find(|&&p| p == 0 || p > total) {
        return Err(PdfToolsError::Validation(format!(
            "Page {} does not exist (document has {} pages)",
            page, total
        )));
    }

    let kept: Vec<u32> = (1..=total).filter(|p| !removed.contains(p)).collect();
    if kept.is_empty() {
        return Err(PdfToolsError::Validation(
            "Cannot remove every page of the document".into(),
        ));
    }

    extract_pages(doc, &kept)
}
