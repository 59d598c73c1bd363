use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// How a page's text was obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExtractionMethod {
    PdfDirect,
    /// PDF with at least one page read by OCR (no text layer).
    ScannedPdfOcr,
    VisionOcr,
    PlainTextRead,
}

/// Per-page extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
    pub confidence: f32,
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

/// PDF text extraction abstraction
pub trait PdfExtractor: Send + Sync {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError>;
}

/// Renders one PDF page to an image the OCR engine accepts.
pub trait PdfPageRenderer: Send + Sync {
    /// `page_index` is 0-based.
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize, dpi: u32) -> Result<Vec<u8>, ExtractionError>;
}

/// The extraction boundary used by the pipeline job.
///
/// Returns the full document text: pages in order, separated by a blank line.
/// The result is untrusted free text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractionError>;
}
