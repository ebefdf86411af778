//! Client-side PDF toolbox
//!
//! Every operation follows the same pipeline: validate the form input,
//! load the documents with lopdf, transform them, save, and deliver the
//! outputs. [`Dispatcher`] maps each [`OperationKind`] to its handler.
//!
//! Operations:
//! - merge, split, rearrange, remove pages: page-tree edits
//! - rotate, compress: page attribute edits
//! - watermark, page numbers: text overlays
//! - flatten: re-serialization without stream packing
//! - images to PDF: one page per image
//! - PDF to images: rendering through a [`PageRasterizer`]

pub mod command;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod images;
pub mod merge;
pub mod overlay;
pub mod pages;
pub mod raster;
pub mod split;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use command::{InputFile, OperationKind, PageNumberPosition, TransformRequest};
pub use config::{ToolConfig, WatermarkStyle};
pub use delivery::{Collected, Delivery, OutputFile};
pub use dispatch::{Dispatcher, RunReport};
pub use document::{describe, load_pdf, save_pdf, DocumentInfo, SaveOptions};
pub use error::PdfToolsError;
pub use merge::merge_documents;
pub use raster::{PageRasterizer, RgbaBitmap, UnavailableRasterizer};
pub use split::{extract_pages, split_each};
pub use validation::{validate, RawForm};

#[cfg(feature = "pdfium")]
pub use raster::PdfiumRasterizer;
