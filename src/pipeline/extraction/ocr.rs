use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// OCR engine used when no vision backend is configured.
/// Every image upload fails extraction with `OcrUnavailable`.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Err(ExtractionError::OcrUnavailable(
            "no OCR endpoint configured".into(),
        ))
    }
}

/// Mock OCR engine for testing: returns a configurable response.
#[cfg(test)]
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
}

#[cfg(test)]
impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
        }
    }
}

#[cfg(test)]
impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}
