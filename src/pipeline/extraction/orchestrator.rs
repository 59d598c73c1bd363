use super::pdfium::DEFAULT_RENDER_DPI;
use super::sanitize::sanitize_extracted_text;
use super::types::{
    ExtractionMethod, OcrEngine, PageExtraction, PdfExtractor, PdfPageRenderer, TextExtractor,
};
use super::ExtractionError;

/// Separator placed between the texts of consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Form feed: page break inside plain-text exports.
const FORM_FEED: char = '\u{000C}';

/// Pages below this confidence are logged.
const LOW_CONFIDENCE: f32 = 0.5;

/// Whether the extraction boundary can handle `mime_type`.
pub fn is_supported_mime(mime_type: &str) -> bool {
    matches!(mime_type, "application/pdf" | "text/plain") || mime_type.starts_with("image/")
}

/// Production extractor: routes by mime type to the PDF text layer, the OCR
/// engine, or a UTF-8 read, then sanitizes and joins the pages.
///
/// PDF pages without a text layer (scans) go to the OCR engine, rendered
/// one by one when a page renderer is set.
pub struct DocumentExtractor {
    ocr_engine: Box<dyn OcrEngine>,
    pdf_extractor: Box<dyn PdfExtractor>,
    pdf_renderer: Option<Box<dyn PdfPageRenderer>>,
}

impl DocumentExtractor {
    pub fn new(ocr_engine: Box<dyn OcrEngine>, pdf_extractor: Box<dyn PdfExtractor>) -> Self {
        Self {
            ocr_engine,
            pdf_extractor,
            pdf_renderer: None,
        }
    }

    pub fn with_pdf_renderer(mut self, renderer: Box<dyn PdfPageRenderer>) -> Self {
        self.pdf_renderer = Some(renderer);
        self
    }

    /// Text-layer pages, with every empty page replaced by its OCR text.
    /// Page order is kept.
    fn extract_pdf(&self, bytes: &[u8]) -> Result<(ExtractionMethod, Vec<PageExtraction>), ExtractionError> {
        let mut pages = self.pdf_extractor.extract_text(bytes)?;
        let mut ocr_pages = 0;
        let mut whole_document_read = false;

        for (index, page) in pages.iter_mut().enumerate() {
            if !page.text.trim().is_empty() {
                continue;
            }
            let result = match &self.pdf_renderer {
                Some(renderer) => {
                    let image = renderer.render_page(bytes, index, DEFAULT_RENDER_DPI)?;
                    self.ocr_engine.ocr_image(&image)?
                }
                // Without a renderer the whole file goes to OCR once; its
                // text lands on the first empty page.
                None if !whole_document_read => {
                    tracing::warn!(page = page.page_number, "No PDF renderer, OCR on the whole document");
                    whole_document_read = true;
                    self.ocr_engine.ocr_image(bytes)?
                }
                None => continue,
            };
            if result.confidence < LOW_CONFIDENCE {
                tracing::warn!(
                    page = page.page_number,
                    confidence = result.confidence,
                    "Low OCR confidence on scanned page"
                );
            }
            page.text = result.text;
            page.confidence = result.confidence;
            ocr_pages += 1;
        }

        let method = if ocr_pages == 0 {
            ExtractionMethod::PdfDirect
        } else {
            tracing::info!(ocr_pages, "PDF pages read by OCR");
            ExtractionMethod::ScannedPdfOcr
        };
        Ok((method, pages))
    }

    fn extract_pages(
        &self,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<(ExtractionMethod, Vec<PageExtraction>), ExtractionError> {
        match mime_type {
            "application/pdf" => self.extract_pdf(bytes),
            "text/plain" => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| ExtractionError::EncodingError(e.to_string()))?;
                let pages = text
                    .split(FORM_FEED)
                    .enumerate()
                    .map(|(i, page)| PageExtraction {
                        page_number: i + 1,
                        text: page.to_string(),
                        confidence: 0.99,
                    })
                    .collect();
                Ok((ExtractionMethod::PlainTextRead, pages))
            }
            m if m.starts_with("image/") => {
                let ocr_result = self.ocr_engine.ocr_image(bytes)?;
                let page = PageExtraction {
                    page_number: 1,
                    text: ocr_result.text,
                    confidence: ocr_result.confidence,
                };
                Ok((ExtractionMethod::VisionOcr, vec![page]))
            }
            other => Err(ExtractionError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractionError> {
        let (method, mut pages) = self.extract_pages(bytes, mime_type)?;
        if pages.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }

        for page in &mut pages {
            page.text = sanitize_extracted_text(&page.text);
        }

        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR);

        let low_confidence_pages = pages.iter().filter(|p| p.confidence < LOW_CONFIDENCE).count();
        tracing::info!(
            mime_type,
            method = ?method,
            pages = pages.len(),
            low_confidence_pages,
            text_length = full_text.len(),
            "Text extraction complete"
        );

        Ok(full_text)
    }
}
