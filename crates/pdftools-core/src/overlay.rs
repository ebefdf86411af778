//! Text overlays drawn on top of existing page content
//!
//! Each overlay wraps the page's existing content in `q ... Q` and appends
//! a new content stream, so it is drawn in default user space regardless
//! of what state the original content leaves behind. Applying an overlay
//! twice adds two overlays; page count never changes.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::command::PageNumberPosition;
use crate::config::WatermarkStyle;
use crate::document::{inherited_attribute, page_ids, page_size, resolve};
use crate::error::PdfToolsError;

/// Encode text for a standard 14 font with WinAnsiEncoding
pub fn encode_win_ansi(text: &str) -> Result<Vec<u8>, PdfToolsError> {
    text.chars()
        .map(|ch| {
            win_ansi_byte(ch).ok_or_else(|| {
                PdfToolsError::Validation(format!(
                    "Cannot draw {:?}: only WinAnsi (Western European) characters are supported",
                    ch
                ))
            })
        })
        .collect()
}

fn win_ansi_byte(ch: char) -> Option<u8> {
    let code = ch as u32;
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
        _ => Some(match ch {
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8A,
            '‹' => 0x8B,
            'Œ' => 0x8C,
            'Ž' => 0x8E,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9A,
            '›' => 0x9B,
            'œ' => 0x9C,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => return None,
        }),
    }
}

/// A line of text placed on a page
struct TextOverlay<'a> {
    text: &'a [u8],
    x: f32,
    y: f32,
    font_size: f32,
    gray: f32,
    /// Fill opacity; `None` leaves the graphics state alone
    opacity: Option<f32>,
    rotation_degrees: f32,
}

/// Draw `text` on every page at a quarter of the page's width and height,
/// rotated counter-clockwise by `angle` degrees.
pub fn watermark(
    doc: &mut Document,
    text: &str,
    angle: i32,
    style: &WatermarkStyle,
) -> Result<(), PdfToolsError> {
    if text.is_empty() {
        return Err(PdfToolsError::Validation("Watermark text is empty".into()));
    }
    let encoded = encode_win_ansi(text)?;
    let font_id = add_helvetica(doc);

    for page_id in page_ids(doc) {
        let (width, height) = page_size(doc, page_id);
        draw_text(
            doc,
            page_id,
            font_id,
            &TextOverlay {
                text: &encoded,
                x: width / 4.0,
                y: height / 4.0,
                font_size: style.font_size,
                gray: style.gray,
                opacity: Some(style.opacity),
                rotation_degrees: angle as f32,
            },
        )?;
    }
    Ok(())
}

/// Label every page with `<n>.` at the chosen position, in black
pub fn page_numbers(
    doc: &mut Document,
    position: PageNumberPosition,
    font_size: f32,
) -> Result<(), PdfToolsError> {
    let font_id = add_helvetica(doc);

    for (index, page_id) in page_ids(doc).into_iter().enumerate() {
        let (width, height) = page_size(doc, page_id);
        let (x, y) = position.anchor(width, height);
        let label = format!("{}.", index + 1);
        draw_text(
            doc,
            page_id,
            font_id,
            &TextOverlay {
                text: label.as_bytes(),
                x,
                y,
                font_size,
                gray: 0.0,
                opacity: None,
                rotation_degrees: 0.0,
            },
        )?;
    }
    Ok(())
}

fn add_helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]))
}

fn draw_text(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    overlay: &TextOverlay<'_>,
) -> Result<(), PdfToolsError> {
    let font_name = add_page_resource(doc, page_id, b"Font", "PtHelv", font_id)?;

    let mut operations = vec![Operation::new("q", vec![])];

    if let Some(opacity) = overlay.opacity {
        let gs_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"ExtGState".to_vec())),
            ("ca", Object::Real(opacity)),
            ("CA", Object::Real(opacity)),
        ]));
        let gs_name = add_page_resource(doc, page_id, b"ExtGState", "PtGs", gs_id)?;
        operations.push(Operation::new("gs", vec![Object::Name(gs_name)]));
    }

    let radians = overlay.rotation_degrees.to_radians();
    let (sin, cos) = radians.sin_cos();

    operations.extend([
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name), Object::Real(overlay.font_size)],
        ),
        Operation::new(
            "rg",
            vec![
                Object::Real(overlay.gray),
                Object::Real(overlay.gray),
                Object::Real(overlay.gray),
            ],
        ),
        Operation::new(
            "Tm",
            vec![
                Object::Real(cos),
                Object::Real(sin),
                Object::Real(-sin),
                Object::Real(cos),
                Object::Real(overlay.x),
                Object::Real(overlay.y),
            ],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(overlay.text.to_vec(), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]);

    let encoded = Content { operations }.encode()?;
    append_isolated_content(doc, page_id, encoded)?;

    debug!(?page_id, x = overlay.x, y = overlay.y, "drew text overlay");
    Ok(())
}

/// Register `target` under a fresh name in one of the page's resource
/// categories and return the name.
///
/// The page gets its own copy of its (possibly inherited or shared)
/// resource dictionary, so other pages never see the new entry.
fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    prefix: &str,
    target: ObjectId,
) -> Result<Vec<u8>, PdfToolsError> {
    let mut resources = inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, &obj).as_dict().ok().cloned())
        .unwrap_or_else(Dictionary::new);

    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok().cloned())
        .unwrap_or_else(Dictionary::new);

    let name = unique_name(&entries, prefix);
    entries.set(name.clone(), Object::Reference(target));
    resources.set(category, Object::Dictionary(entries));

    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(resources));

    Ok(name)
}

fn unique_name(dict: &Dictionary, prefix: &str) -> Vec<u8> {
    let mut n = 0;
    loop {
        let candidate = if n == 0 {
            prefix.to_string()
        } else {
            format!("{}{}", prefix, n)
        };
        if !dict.has(candidate.as_bytes()) {
            return candidate.into_bytes();
        }
        n += 1;
    }
}

/// Wrap the page's current content in `q`/`Q` and append `overlay` after it
fn append_isolated_content(
    doc: &mut Document,
    page_id: ObjectId,
    overlay: Vec<u8>,
) -> Result<(), PdfToolsError> {
    let existing = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // Contents may point at an array of streams
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    };

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut close = b"Q\n".to_vec();
    close.extend_from_slice(&overlay);
    let close_id = doc.add_object(Stream::new(Dictionary::new(), close));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(close_id));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{load_pdf, save_pdf, SaveOptions};
    use crate::test_support::{create_test_pdf, page_text};
    use pretty_assertions::assert_eq;
    use regex::Regex;

    fn load(num_pages: u32) -> Document {
        load_pdf(&create_test_pdf(num_pages, "O")).unwrap()
    }

    fn round_trip(mut doc: Document) -> Document {
        let bytes = save_pdf(&mut doc, SaveOptions::default()).unwrap();
        load_pdf(&bytes).unwrap()
    }

    /// Numeric operands of every `op` in a content stream
    fn operands(text: &str, op: &str) -> Vec<Vec<f32>> {
        let line = Regex::new(&format!(r"(?m)^((?:\S+ )+){}$", op)).unwrap();
        line.captures_iter(text)
            .map(|caps| {
                caps[1]
                    .split_whitespace()
                    .filter_map(|n| n.parse::<f32>().ok())
                    .collect()
            })
            .collect()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len(), "{:?}", actual);
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_encode_win_ansi_ascii_and_latin1() {
        assert_eq!(encode_win_ansi("Draft é").unwrap(), b"Draft \xE9".to_vec());
        assert_eq!(encode_win_ansi("€ — ™").unwrap(), vec![0x80, b' ', 0x97, b' ', 0x99]);
    }

    #[test]
    fn test_encode_win_ansi_rejects_cjk() {
        let err = encode_win_ansi("機密").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_watermark_keeps_page_count_and_content() {
        let mut doc = load(3);
        watermark(&mut doc, "CONFIDENTIAL", 45, &WatermarkStyle::default()).unwrap();
        let doc = round_trip(doc);

        assert_eq!(doc.get_pages().len(), 3);
        for page in 1..=3 {
            let text = page_text(&doc, page);
            assert!(text.contains("(CONFIDENTIAL)"), "{}", text);
            assert!(text.contains(&format!("(O-Page-{})", page)));
        }
    }

    #[test]
    fn test_watermark_position_and_rotation() {
        let mut doc = load(1);
        watermark(&mut doc, "X", 90, &WatermarkStyle::default()).unwrap();
        let text = page_text(&doc, 1);

        // quarter of 612 x 792, rotated a quarter turn
        let matrices = operands(&text, "Tm");
        assert_eq!(matrices.len(), 1);
        assert_close(&matrices[0], &[0.0, 1.0, -1.0, 0.0, 153.0, 198.0]);
        assert!(operands(&text, "Tf").contains(&vec![150.0]));
        assert_close(&operands(&text, "rg")[0], &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_watermark_sets_opacity() {
        let mut doc = load(1);
        watermark(&mut doc, "X", 0, &WatermarkStyle::default()).unwrap();
        let page = page_ids(&doc)[0];

        let resources = doc.get_dictionary(page).unwrap().get(b"Resources").unwrap();
        let gs = resources.as_dict().unwrap().get(b"ExtGState").unwrap();
        let gs_ref = gs.as_dict().unwrap().get(b"PtGs").unwrap();
        let state = doc.get_dictionary(gs_ref.as_reference().unwrap()).unwrap();
        let opacity = match state.get(b"ca").unwrap() {
            Object::Real(v) => *v as f32,
            other => panic!("unexpected {:?}", other),
        };
        assert!((opacity - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_watermark_twice_adds_two_overlays() {
        let mut doc = load(2);
        let style = WatermarkStyle::default();
        watermark(&mut doc, "ONE", 0, &style).unwrap();
        watermark(&mut doc, "TWO", 0, &style).unwrap();
        let doc = round_trip(doc);

        assert_eq!(doc.get_pages().len(), 2);
        let text = page_text(&doc, 1);
        assert_eq!(text.matches(" Tj").count(), 3);
        assert!(text.contains("(ONE)") && text.contains("(TWO)"));
        assert!(text.contains("/PtHelv1"));
    }

    #[test]
    fn test_overlay_does_not_touch_shared_resources() {
        let mut doc = load(2);
        let shared = doc
            .get_dictionary(page_ids(&doc)[0])
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_reference()
            .unwrap();

        page_numbers(&mut doc, PageNumberPosition::BottomLeft, 12.0).unwrap();

        let shared_fonts = doc.get_dictionary(shared).unwrap().get(b"Font").unwrap();
        assert!(!shared_fonts.as_dict().unwrap().has(b"PtHelv"));
    }

    #[test]
    fn test_page_numbers_labels_each_page() {
        let mut doc = load(3);
        page_numbers(&mut doc, PageNumberPosition::TopRight, 12.0).unwrap();
        let doc = round_trip(doc);

        for page in 1..=3 {
            let text = page_text(&doc, page);
            assert!(text.contains(&format!("({}.) Tj", page)), "{}", text);
            assert_close(&operands(&text, "Tm")[0], &[1.0, 0.0, 0.0, 1.0, 562.0, 762.0]);
        }
    }

    #[test]
    fn test_page_numbers_default_position() {
        let mut doc = load(1);
        page_numbers(&mut doc, PageNumberPosition::default(), 12.0).unwrap();
        let text = page_text(&doc, 1);
        assert_close(&operands(&text, "Tm")[0], &[1.0, 0.0, 0.0, 1.0, 306.0, 20.0]);
        assert_close(&operands(&text, "rg")[0], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_existing_content_is_isolated() {
        let mut doc = load(1);
        page_numbers(&mut doc, PageNumberPosition::BottomRight, 12.0).unwrap();
        let text = page_text(&doc, 1);
        let original = text.find("(O-Page-1)").unwrap();
        let first_q = text.find("q\n").unwrap();
        let restore = text.find("Q\n").unwrap();
        assert!(first_q < original && original < restore);
    }
}
