use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PdfToolsError;

/// Every operation the toolbox exposes, keyed by the name the UI uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Merge,
    Split,
    PdfToImages,
    Watermark,
    Compress,
    Rotate,
    Rearrange,
    PageNumbers,
    Flatten,
    ImagesToPdf,
    RemovePages,
}

impl OperationKind {
    pub const ALL: [OperationKind; 11] = [
        OperationKind::Merge,
        OperationKind::Split,
        OperationKind::PdfToImages,
        OperationKind::Watermark,
        OperationKind::Compress,
        OperationKind::Rotate,
        OperationKind::Rearrange,
        OperationKind::PageNumbers,
        OperationKind::Flatten,
        OperationKind::ImagesToPdf,
        OperationKind::RemovePages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Merge => "merge",
            OperationKind::Split => "split",
            OperationKind::PdfToImages => "pdf-to-images",
            OperationKind::Watermark => "watermark",
            OperationKind::Compress => "compress",
            OperationKind::Rotate => "rotate",
            OperationKind::Rearrange => "rearrange",
            OperationKind::PageNumbers => "page-numbers",
            OperationKind::Flatten => "flatten",
            OperationKind::ImagesToPdf => "images-to-pdf",
            OperationKind::RemovePages => "remove-pages",
        }
    }

    /// File name of the single output, for operations that produce one
    pub fn output_name(&self) -> Option<&'static str> {
        match self {
            OperationKind::Merge => Some("merged.pdf"),
            OperationKind::Watermark => Some("watermarked.pdf"),
            OperationKind::Compress => Some("compressed.pdf"),
            OperationKind::Rotate => Some("rotated.pdf"),
            OperationKind::Rearrange => Some("rearranged.pdf"),
            OperationKind::PageNumbers => Some("page_numbers.pdf"),
            OperationKind::Flatten => Some("flattened.pdf"),
            OperationKind::ImagesToPdf => Some("images_to_pdf.pdf"),
            OperationKind::RemovePages => Some("removed_pages.pdf"),
            OperationKind::Split | OperationKind::PdfToImages => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = PdfToolsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| PdfToolsError::Validation(format!("Unknown operation: {}", s)))
    }
}

/// A file picked by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    pub name: String,
    /// Declared MIME type, e.g. "image/jpeg". May be empty.
    #[serde(default)]
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, "application/pdf", bytes)
    }

    /// Part after the slash of the MIME type ("jpeg" for "image/jpeg")
    pub fn mime_subtype(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
    }
}

/// Where page labels are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageNumberPosition {
    #[default]
    BottomLeft,
    BottomMiddle,
    BottomRight,
    TopRight,
}

impl PageNumberPosition {
    /// Map the select control's value. Unknown values fall back to the default.
    pub fn from_choice(choice: &str) -> Self {
        match choice.trim() {
            "bottom-middle" => PageNumberPosition::BottomMiddle,
            "bottom-right" => PageNumberPosition::BottomRight,
            "top-right" => PageNumberPosition::TopRight,
            _ => PageNumberPosition::BottomLeft,
        }
    }

    /// Text origin in points for a page of the given size
    pub fn anchor(&self, width: f32, height: f32) -> (f32, f32) {
        match self {
            PageNumberPosition::BottomMiddle => (width / 2.0 - 10.0, 20.0),
            PageNumberPosition::BottomRight => (width - 50.0, 20.0),
            PageNumberPosition::TopRight => (width - 50.0, height - 30.0),
            PageNumberPosition::BottomLeft => (width / 2.0, 20.0),
        }
    }
}

/// Validated input for one operation. Page numbers are 1-indexed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TransformRequest {
    Merge {
        files: Vec<InputFile>,
    },
    Split {
        file: InputFile,
    },
    PdfToImages {
        file: InputFile,
    },
    Watermark {
        file: InputFile,
        text: String,
        angle: i32,
    },
    Compress {
        file: InputFile,
    },
    Rotate {
        file: InputFile,
        degrees: i32,
    },
    Rearrange {
        file: InputFile,
        order: Vec<u32>,
    },
    PageNumbers {
        file: InputFile,
        #[serde(default)]
        position: PageNumberPosition,
    },
    Flatten {
        file: InputFile,
    },
    ImagesToPdf {
        files: Vec<InputFile>,
    },
    RemovePages {
        file: InputFile,
        pages: BTreeSet<u32>,
    },
}

impl TransformRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            TransformRequest::Merge { .. } => OperationKind::Merge,
            TransformRequest::Split { .. } => OperationKind::Split,
            TransformRequest::PdfToImages { .. } => OperationKind::PdfToImages,
            TransformRequest::Watermark { .. } => OperationKind::Watermark,
            TransformRequest::Compress { .. } => OperationKind::Compress,
            TransformRequest::Rotate { .. } => OperationKind::Rotate,
            TransformRequest::Rearrange { .. } => OperationKind::Rearrange,
            TransformRequest::PageNumbers { .. } => OperationKind::PageNumbers,
            TransformRequest::Flatten { .. } => OperationKind::Flatten,
            TransformRequest::ImagesToPdf { .. } => OperationKind::ImagesToPdf,
            TransformRequest::RemovePages { .. } => OperationKind::RemovePages,
        }
    }

    pub fn files(&self) -> &[InputFile] {
        match self {
            TransformRequest::Merge { files } | TransformRequest::ImagesToPdf { files } => files,
            TransformRequest::Split { file }
            | TransformRequest::PdfToImages { file }
            | TransformRequest::Watermark { file, .. }
            | TransformRequest::Compress { file }
            | TransformRequest::Rotate { file, .. }
            | TransformRequest::Rearrange { file, .. }
            | TransformRequest::PageNumbers { file, .. }
            | TransformRequest::Flatten { file }
            | TransformRequest::RemovePages { file, .. } => std::slice::from_ref(file),
        }
    }

    pub fn input_size_bytes(&self) -> usize {
        self.files().iter().map(|f| f.bytes.len()).sum()
    }
}
