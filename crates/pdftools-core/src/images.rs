//! Build a PDF with one page per image

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::codecs::jpeg::JpegDecoder;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::command::InputFile;
use crate::document::{new_document, rebuild_page_tree};
use crate::error::PdfToolsError;

/// An image XObject ready to be added to a document
struct EmbeddedImage {
    width: u32,
    height: u32,
    stream: Stream,
    /// Alpha channel, when the image has one
    soft_mask: Option<Stream>,
}

/// One page per image, sized to the image's pixel dimensions, in input order.
///
/// JPEG files are embedded as they are; anything else is decoded and stored
/// as Flate-compressed RGB.
pub fn images_to_pdf(files: &[InputFile]) -> Result<Document, PdfToolsError> {
    if files.is_empty() {
        return Err(PdfToolsError::Validation("Please select image files.".into()));
    }

    let (mut doc, _) = new_document();
    let mut pages = Vec::with_capacity(files.len());

    for file in files {
        let image = embed(file)?;
        debug!(
            name = %file.name,
            width = image.width,
            height = image.height,
            "embedding image"
        );
        pages.push(add_image_page(&mut doc, image)?);
    }

    rebuild_page_tree(&mut doc, &pages)?;
    Ok(doc)
}

fn embed(file: &InputFile) -> Result<EmbeddedImage, PdfToolsError> {
    match file.mime_subtype().to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => embed_jpeg(file),
        _ => {
            let image = decode(file)?;
            embed_decoded(&image)
        }
    }
}

fn decode(file: &InputFile) -> Result<DynamicImage, PdfToolsError> {
    let format = match ImageFormat::from_mime_type(&file.mime_type) {
        Some(format) => format,
        None => image::guess_format(&file.bytes).map_err(|e| decode_error(file, e))?,
    };
    image::load_from_memory_with_format(&file.bytes, format).map_err(|e| decode_error(file, e))
}

fn decode_error(file: &InputFile, e: image::ImageError) -> PdfToolsError {
    PdfToolsError::Decode(format!("Failed to read image {}: {}", file.name, e))
}

/// Pass JPEG data through untouched with DCTDecode. Only the header is
/// parsed, for the size and colour model.
fn embed_jpeg(file: &InputFile) -> Result<EmbeddedImage, PdfToolsError> {
    let decoder =
        JpegDecoder::new(Cursor::new(file.bytes.as_slice())).map_err(|e| decode_error(file, e))?;
    let (width, height) = decoder.dimensions();

    let color_space: &[u8] = match decoder.original_color_type() {
        ExtendedColorType::L8 => b"DeviceGray",
        ExtendedColorType::Rgb8 => b"DeviceRGB",
        // CMYK and friends: re-encode rather than guess at Decode arrays
        _ => {
            let image = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(file, e))?;
            return embed_decoded(&image);
        }
    };

    let dict = image_dict(width, height, color_space, b"DCTDecode");
    Ok(EmbeddedImage {
        width,
        height,
        stream: Stream::new(dict, file.bytes.clone()),
        soft_mask: None,
    })
}

fn embed_decoded(image: &DynamicImage) -> Result<EmbeddedImage, PdfToolsError> {
    let (width, height) = (image.width(), image.height());

    let soft_mask = if image.color().has_alpha() {
        let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p.0[3]).collect();
        let dict = image_dict(width, height, b"DeviceGray", b"FlateDecode");
        Some(Stream::new(dict, deflate(&alpha)?))
    } else {
        None
    };

    let rgb = image.to_rgb8();
    let dict = image_dict(width, height, b"DeviceRGB", b"FlateDecode");

    Ok(EmbeddedImage {
        width,
        height,
        stream: Stream::new(dict, deflate(rgb.as_raw())?),
        soft_mask,
    })
}

fn image_dict(width: u32, height: u32, color_space: &[u8], filter: &[u8]) -> Dictionary {
    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Image".to_vec())),
        ("Width", Object::Integer(width as i64)),
        ("Height", Object::Integer(height as i64)),
        ("ColorSpace", Object::Name(color_space.to_vec())),
        ("BitsPerComponent", Object::Integer(8)),
        ("Filter", Object::Name(filter.to_vec())),
    ])
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfToolsError> {
    let compress_error =
        |e: std::io::Error| PdfToolsError::Operation(format!("Failed to compress image: {}", e));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(compress_error)?;
    encoder.finish().map_err(compress_error)
}

/// Add a page that shows `image` over its whole area
fn add_image_page(doc: &mut Document, image: EmbeddedImage) -> Result<ObjectId, PdfToolsError> {
    let EmbeddedImage {
        width,
        height,
        mut stream,
        soft_mask,
    } = image;

    if let Some(mask) = soft_mask {
        let mask_id = doc.add_object(mask);
        stream.dict.set("SMask", Object::Reference(mask_id));
    }
    let image_id = doc.add_object(stream);

    let (w, h) = (width as f32, height as f32);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let resources = Dictionary::from_iter(vec![(
        "XObject",
        Object::Dictionary(Dictionary::from_iter(vec![(
            "Im0",
            Object::Reference(image_id),
        )])),
    )]);

    let page = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width as i64),
                Object::Integer(height as i64),
            ]),
        ),
        ("Resources", Object::Dictionary(resources)),
        ("Contents", Object::Reference(content_id)),
    ]);
    Ok(doc.add_object(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{load_pdf, page_ids, page_size, save_pdf, SaveOptions};
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    fn encoded(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn png_file(width: u32, height: u32) -> InputFile {
        let image = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
        InputFile::new(
            "photo.png",
            "image/png",
            encoded(DynamicImage::ImageRgb8(image), ImageFormat::Png),
        )
    }

    fn jpeg_file(width: u32, height: u32) -> InputFile {
        let image = RgbImage::from_pixel(width, height, Rgb([120, 40, 90]));
        InputFile::new(
            "scan.jpg",
            "image/jpeg",
            encoded(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg),
        )
    }

    fn round_trip(mut doc: Document) -> Document {
        let bytes = save_pdf(&mut doc, SaveOptions::default()).unwrap();
        load_pdf(&bytes).unwrap()
    }

    fn page_image(doc: &Document, page: ObjectId) -> &Stream {
        let resources = doc.get_dictionary(page).unwrap().get(b"Resources").unwrap();
        let xobjects = resources.as_dict().unwrap().get(b"XObject").unwrap();
        let id = xobjects
            .as_dict()
            .unwrap()
            .get(b"Im0")
            .unwrap()
            .as_reference()
            .unwrap();
        doc.get_object(id).unwrap().as_stream().unwrap()
    }

    fn name(stream: &Stream, key: &[u8]) -> Vec<u8> {
        stream.dict.get(key).unwrap().as_name().unwrap().to_vec()
    }

    #[test]
    fn test_png_page_size_matches_pixels() {
        let doc = round_trip(images_to_pdf(&[png_file(40, 30)]).unwrap());
        let pages = page_ids(&doc);
        assert_eq!(pages.len(), 1);
        assert_eq!(page_size(&doc, pages[0]), (40.0, 30.0));
        assert_eq!(name(page_image(&doc, pages[0]), b"Filter"), b"FlateDecode".to_vec());
    }

    #[test]
    fn test_jpeg_is_embedded_verbatim() {
        let file = jpeg_file(64, 48);
        let doc = round_trip(images_to_pdf(std::slice::from_ref(&file)).unwrap());
        let page = page_ids(&doc)[0];

        assert_eq!(page_size(&doc, page), (64.0, 48.0));
        let stream = page_image(&doc, page);
        assert_eq!(name(stream, b"Filter"), b"DCTDecode".to_vec());
        assert_eq!(name(stream, b"ColorSpace"), b"DeviceRGB".to_vec());
        assert_eq!(stream.content, file.bytes);
    }

    #[test]
    fn test_one_page_per_image_in_order() {
        let files = [png_file(10, 20), jpeg_file(30, 40), png_file(50, 60)];
        let doc = round_trip(images_to_pdf(&files).unwrap());

        let sizes: Vec<_> = page_ids(&doc)
            .into_iter()
            .map(|id| page_size(&doc, id))
            .collect();
        assert_eq!(sizes, vec![(10.0, 20.0), (30.0, 40.0), (50.0, 60.0)]);
    }

    #[test]
    fn test_transparent_png_gets_soft_mask() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 128]));
        let file = InputFile::new(
            "logo.png",
            "image/png",
            encoded(DynamicImage::ImageRgba8(image), ImageFormat::Png),
        );
        let doc = images_to_pdf(&[file]).unwrap();
        let stream = page_image(&doc, page_ids(&doc)[0]);
        assert!(stream.dict.get(b"SMask").unwrap().as_reference().is_ok());
    }

    #[test]
    fn test_missing_mime_type_is_sniffed() {
        let mut file = png_file(8, 8);
        file.mime_type.clear();
        let doc = images_to_pdf(&[file]).unwrap();
        assert_eq!(page_size(&doc, page_ids(&doc)[0]), (8.0, 8.0));
    }

    #[test]
    fn test_garbage_image_fails_with_decode_error() {
        let file = InputFile::new("notes.png", "image/png", b"not an image".to_vec());
        let err = images_to_pdf(&[file]).unwrap_err();
        assert!(matches!(err, PdfToolsError::Decode(_)));
        assert!(err.to_string().contains("notes.png"));
    }

    #[test]
    fn test_no_images_fails() {
        assert!(images_to_pdf(&[]).unwrap_err().is_validation());
    }
}
