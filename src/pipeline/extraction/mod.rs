pub mod types;
pub mod sanitize;
pub mod pdf;
pub mod pdfium;
pub mod ocr;
pub mod vision_ocr;
pub mod orchestrator;

pub use types::*;
pub use sanitize::*;
pub use pdf::*;
pub use pdfium::*;
pub use ocr::*;
pub use vision_ocr::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF page {page} rendering failed: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("OCR backend unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),

    #[error("Document has no pages")]
    EmptyDocument,
}
