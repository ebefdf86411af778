//! Output files and where they go

use serde::{Deserialize, Serialize};

use crate::error::PdfToolsError;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";

/// One produced file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl OutputFile {
    pub fn pdf(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: PDF_MIME.to_string(),
            bytes,
        }
    }

    pub fn png(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: PNG_MIME.to_string(),
            bytes,
        }
    }
}

/// Receives outputs one at a time, in the order they are produced.
///
/// Earlier deliveries stand if a later unit fails.
pub trait Delivery {
    fn deliver(&mut self, file: OutputFile) -> Result<(), PdfToolsError>;
}

impl<F> Delivery for F
where
    F: FnMut(OutputFile) -> Result<(), PdfToolsError>,
{
    fn deliver(&mut self, file: OutputFile) -> Result<(), PdfToolsError> {
        self(file)
    }
}

/// Keeps every output in memory
#[derive(Debug, Default)]
pub struct Collected {
    pub files: Vec<OutputFile>,
}

impl Collected {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.file_name.as_str()).collect()
    }

    pub fn into_files(self) -> Vec<OutputFile> {
        self.files
    }
}

impl Delivery for Collected {
    fn deliver(&mut self, file: OutputFile) -> Result<(), PdfToolsError> {
        self.files.push(file);
        Ok(())
    }
}

/// Counts what passes through to an inner sink
pub(crate) struct Tally<'a> {
    inner: &'a mut dyn Delivery,
    pub outputs: usize,
    pub bytes: usize,
}

impl<'a> Tally<'a> {
    pub fn new(inner: &'a mut dyn Delivery) -> Self {
        Self {
            inner,
            outputs: 0,
            bytes: 0,
        }
    }
}

impl Delivery for Tally<'_> {
    fn deliver(&mut self, file: OutputFile) -> Result<(), PdfToolsError> {
        let size = file.bytes.len();
        self.inner.deliver(file)?;
        self.outputs += 1;
        self.bytes += size;
        Ok(())
    }
}
