use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfToolsError {
    /// Bad user input. The message is shown to the user as-is.
    #[error("{0}")]
    Validation(String),

    #[error("Failed to parse document: {0}")]
    Decode(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl PdfToolsError {
    /// Validation errors are reported before any document is touched;
    /// everything else is a processing failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, PdfToolsError::Validation(_))
    }
}

impl From<lopdf::Error> for PdfToolsError {
    fn from(e: lopdf::Error) -> Self {
        PdfToolsError::Operation(e.to_string())
    }
}
