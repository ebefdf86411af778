//! Page rasterization
//!
//! Rendering itself is delegated to a [`PageRasterizer`]; this module only
//! encodes the bitmaps as PNG and hands them on in page order.

use tracing::debug;

use crate::delivery::{Delivery, OutputFile};
use crate::error::PdfToolsError;

/// Rendered page, 8-bit RGBA, rows top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct RgbaBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBitmap {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, PdfToolsError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(PdfToolsError::Render(format!(
                "Bitmap of {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }
}

/// Renders every page of a PDF.
///
/// `on_page` must be called once per page, in page order, with the
/// 1-based page number. An implementation may render in parallel as long
/// as the callbacks stay ordered. An error returned by `on_page` stops
/// rendering and is passed back to the caller.
pub trait PageRasterizer {
    fn render_pages(
        &self,
        pdf: &[u8],
        scale: f32,
        on_page: &mut dyn FnMut(u32, RgbaBitmap) -> Result<(), PdfToolsError>,
    ) -> Result<(), PdfToolsError>;
}

/// Render `pdf` and deliver `page_<n>.png` for each page as it is ready.
/// Returns the number of pages delivered.
pub fn rasterize(
    rasterizer: &dyn PageRasterizer,
    pdf: &[u8],
    scale: f32,
    delivery: &mut dyn Delivery,
) -> Result<u32, PdfToolsError> {
    let mut expected = 1;
    rasterizer.render_pages(pdf, scale, &mut |page: u32, bitmap: RgbaBitmap| -> Result<(), PdfToolsError> {
        if page != expected {
            return Err(PdfToolsError::Render(format!(
                "Renderer produced page {} out of order (expected {})",
                page, expected
            )));
        }
        debug!(page, width = bitmap.width, height = bitmap.height, "rendered page");
        let png = encode_png(&bitmap)?;
        delivery.deliver(OutputFile::png(format!("page_{}.png", page), png))?;
        expected += 1;
        Ok(())
    })?;
    Ok(expected - 1)
}

/// Encode a bitmap as an 8-bit RGBA PNG
pub fn encode_png(bitmap: &RgbaBitmap) -> Result<Vec<u8>, PdfToolsError> {
    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, bitmap.width, bitmap.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| PdfToolsError::Render(e.to_string()))?;
        writer
            .write_image_data(&bitmap.pixels)
            .map_err(|e| PdfToolsError::Render(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| PdfToolsError::Render(e.to_string()))?;
    }
    Ok(buffer)
}

/// Used when no renderer could be bound; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRasterizer;

impl PageRasterizer for UnavailableRasterizer {
    fn render_pages(
        &self,
        _pdf: &[u8],
        _scale: f32,
        _on_page: &mut dyn FnMut(u32, RgbaBitmap) -> Result<(), PdfToolsError>,
    ) -> Result<(), PdfToolsError> {
        Err(PdfToolsError::Render(
            "No PDF renderer is available in this build".into(),
        ))
    }
}

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use std::cell::OnceCell;

    use pdfium_render::prelude::*;
    use tracing::info;

    use super::{PageRasterizer, RgbaBitmap};
    use crate::error::PdfToolsError;

    /// Renders pages with the PDFium library.
    ///
    /// The library is bound on the first render; a failed bind is retried
    /// on the next one.
    #[derive(Default)]
    pub struct PdfiumRasterizer {
        pdfium: OnceCell<Pdfium>,
    }

    impl PdfiumRasterizer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn is_bound(&self) -> bool {
            self.pdfium.get().is_some()
        }

        fn pdfium(&self) -> Result<&Pdfium, PdfToolsError> {
            if let Some(pdfium) = self.pdfium.get() {
                return Ok(pdfium);
            }
            let bindings = Pdfium::bind_to_system_library()
                .map_err(|e| PdfToolsError::Render(format!("PDFium is not available: {}", e)))?;
            info!("bound PDFium");
            Ok(self.pdfium.get_or_init(|| Pdfium::new(bindings)))
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn render_pages(
            &self,
            pdf: &[u8],
            scale: f32,
            on_page: &mut dyn FnMut(u32, RgbaBitmap) -> Result<(), PdfToolsError>,
        ) -> Result<(), PdfToolsError> {
            let document = self
                .pdfium()?
                .load_pdf_from_byte_slice(pdf, None)
                .map_err(|e| PdfToolsError::Decode(e.to_string()))?;

            for (index, page) in document.pages().iter().enumerate() {
                let width = ((page.width().value * scale).round() as i32).max(1);
                let height = ((page.height().value * scale).round() as i32).max(1);

                let config = PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height);

                let rendered = page
                    .render_with_config(&config)
                    .map_err(|e| PdfToolsError::Render(format!("page {}: {}", index + 1, e)))?;

                let image = rendered.as_image().to_rgba8();
                let bitmap =
                    RgbaBitmap::new(image.width(), image.height(), image.into_raw())?;
                on_page(index as u32 + 1, bitmap)?;
            }
            Ok(())
        }
    }
}
