//! Turn raw form input into a typed request
//!
//! Nothing here touches document bytes: a request that fails validation is
//! rejected before any file is parsed.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::command::{InputFile, OperationKind, PageNumberPosition, TransformRequest};
use crate::error::PdfToolsError;

const SELECT_TWO_PDFS: &str = "Please select at least two PDF files.";
const SELECT_PDF: &str = "Please select a PDF file.";
const WATERMARK_INPUT: &str =
    "Please select a PDF file, enter watermark text, and specify a valid angle.";
const ROTATE_INPUT: &str = "Please select a PDF file and enter a valid degree (multiples of 90).";
const REARRANGE_INPUT: &str = "Please select a PDF file and enter a valid order.";
const SELECT_IMAGES: &str = "Please select image files.";
const REMOVE_PAGES_INPUT: &str = "Please select a PDF file and specify valid page numbers.";

/// Longest range accepted in a page list
const MAX_RANGE_LEN: u32 = 100_000;

/// Values read off the page for one operation, before any checking.
///
/// Which fields matter depends on the operation: `text` is the watermark
/// text, `number` the angle or degree, `list` the page order or the pages
/// to remove, `choice` the page-number position.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawForm {
    pub files: Vec<InputFile>,
    pub text: String,
    pub number: String,
    pub list: String,
    pub choice: String,
}

impl RawForm {
    pub fn with_files(files: Vec<InputFile>) -> Self {
        Self {
            files,
            ..Self::default()
        }
    }
}

fn invalid(message: &str) -> PdfToolsError {
    PdfToolsError::Validation(message.to_string())
}

/// Check a form and build the request for `kind`
pub fn validate(kind: OperationKind, form: RawForm) -> Result<TransformRequest, PdfToolsError> {
    let RawForm {
        mut files,
        text,
        number,
        list,
        choice,
    } = form;

    let first_file = |files: &mut Vec<InputFile>, message: &str| {
        if files.is_empty() {
            Err(invalid(message))
        } else {
            Ok(files.swap_remove(0))
        }
    };

    let request = match kind {
        OperationKind::Merge => {
            if files.len() < 2 {
                return Err(invalid(SELECT_TWO_PDFS));
            }
            TransformRequest::Merge { files }
        }
        OperationKind::Split => TransformRequest::Split {
            file: first_file(&mut files, SELECT_PDF)?,
        },
        OperationKind::PdfToImages => TransformRequest::PdfToImages {
            file: first_file(&mut files, SELECT_PDF)?,
        },
        OperationKind::Compress => TransformRequest::Compress {
            file: first_file(&mut files, SELECT_PDF)?,
        },
        OperationKind::Flatten => TransformRequest::Flatten {
            file: first_file(&mut files, SELECT_PDF)?,
        },
        OperationKind::PageNumbers => TransformRequest::PageNumbers {
            file: first_file(&mut files, SELECT_PDF)?,
            position: PageNumberPosition::from_choice(&choice),
        },
        OperationKind::Watermark => {
            let file = first_file(&mut files, WATERMARK_INPUT)?;
            let angle = parse_int(&number).ok_or_else(|| invalid(WATERMARK_INPUT))?;
            if text.is_empty() {
                return Err(invalid(WATERMARK_INPUT));
            }
            TransformRequest::Watermark { file, text, angle }
        }
        OperationKind::Rotate => {
            let file = first_file(&mut files, ROTATE_INPUT)?;
            let degrees = parse_int(&number)
                .filter(|d| d % 90 == 0)
                .ok_or_else(|| invalid(ROTATE_INPUT))?;
            TransformRequest::Rotate { file, degrees }
        }
        OperationKind::Rearrange => {
            let file = first_file(&mut files, REARRANGE_INPUT)?;
            let order = parse_page_order(&list).map_err(|e| {
                debug!(error = %e, "rejected page order");
                invalid(REARRANGE_INPUT)
            })?;
            TransformRequest::Rearrange { file, order }
        }
        OperationKind::ImagesToPdf => {
            if files.is_empty() {
                return Err(invalid(SELECT_IMAGES));
            }
            TransformRequest::ImagesToPdf { files }
        }
        OperationKind::RemovePages => {
            let file = first_file(&mut files, REMOVE_PAGES_INPUT)?;
            let pages = parse_ranges(&list).map_err(|e| {
                debug!(error = %e, "rejected page list");
                invalid(REMOVE_PAGES_INPUT)
            })?;
            TransformRequest::RemovePages { file, pages }
        }
    };

    Ok(request)
}

/// Parse a whole-string integer: surrounding whitespace and a leading sign
/// are accepted, anything else is not.
pub fn parse_int(input: &str) -> Option<i32> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix(&['+', '-'][..]).unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Parse a comma-separated, 1-based page order such as "3, 1, 2".
/// Entries may repeat; empty entries are skipped.
pub fn parse_page_order(input: &str) -> Result<Vec<u32>, PdfToolsError> {
    let mut order = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let page = parse_int(part)
            .filter(|&p| p >= 1)
            .ok_or_else(|| PdfToolsError::Validation(format!("Invalid page: {}", part)))?;
        order.push(page as u32);
    }

    if order.is_empty() {
        return Err(PdfToolsError::Validation("No pages specified".into()));
    }
    Ok(order)
}

/// Parse page ranges like "1-3,5,7-9" into a set of 1-based page numbers
pub fn parse_ranges(input: &str) -> Result<BTreeSet<u32>, PdfToolsError> {
    let mut pages = BTreeSet::new();

    let page_number = |s: &str| {
        parse_int(s)
            .filter(|&p| p >= 1)
            .map(|p| p as u32)
            .ok_or_else(|| PdfToolsError::Validation(format!("Invalid page: {}", s.trim())))
    };

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = page_number(start)?;
            let end = page_number(end)?;

            if start > end {
                return Err(PdfToolsError::Validation(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }
            if end - start >= MAX_RANGE_LEN {
                return Err(PdfToolsError::Validation(format!(
                    "Range {}-{} is too long",
                    start, end
                )));
            }

            pages.extend(start..=end);
        } else {
            pages.insert(page_number(part)?);
        }
    }

    if pages.is_empty() {
        return Err(PdfToolsError::Validation("No pages specified".into()));
    }
    Ok(pages)
}
