//! PDF page rendering via PDFium, for OCR of scanned pages.
//!
//! `PdfiumRenderer` is stateless. Each render binds a fresh `Pdfium`
//! because the upstream type is `!Send`; the OS caches the library load.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageOutputFormat;
use pdfium_render::prelude::*;

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Largest rendered width or height, in pixels.
const MAX_DIMENSION_PX: u32 = 4096;

/// Rendering resolution for OCR.
pub const DEFAULT_RENDER_DPI: u32 = 200;

const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to PNG with PDFium.
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Verify the library loads now so a missing PDFium is reported at
    /// startup, not on the first scanned upload.
    ///
    /// An explicit `library_path` is used as is. Otherwise the directory of
    /// the running executable is tried, then the system library path.
    pub fn new(library_path: Option<&Path>) -> Result<Self, ExtractionError> {
        let renderer = Self {
            library_path: library_path.map(Path::to_path_buf),
        };
        renderer.load()?;
        Ok(renderer)
    }

    fn load(&self) -> Result<Pdfium, ExtractionError> {
        let unavailable = |reason: String| ExtractionError::PdfRendering { page: 0, reason };

        if let Some(path) = &self.library_path {
            let bindings = Pdfium::bind_to_library(path).map_err(|e| {
                unavailable(format!("Failed to load PDFium from {}: {e}", path.display()))
            })?;
            return Ok(Pdfium::new(bindings));
        }

        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                tracing::debug!(dir = %exe_dir.display(), "Loaded PDFium next to executable");
                return Ok(Pdfium::new(bindings));
            }
        }

        let bindings = Pdfium::bind_to_system_library().map_err(|e| {
            unavailable(format!(
                "PDFium library not found. Set LABINSIGHT_PDFIUM_PATH or install PDFium: {e}"
            ))
        })?;
        Ok(Pdfium::new(bindings))
    }
}

fn map_load_error(e: PdfiumError) -> ExtractionError {
    ExtractionError::PdfParsing(format!("PDFium could not open document: {e}"))
}

/// Pixel size for a page at `dpi`, both sides clamped to
/// `[1, MAX_DIMENSION_PX]` with the aspect ratio kept.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize, dpi: u32) -> Result<Vec<u8>, ExtractionError> {
        let pdfium = self.load()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        let pages = document.pages();

        let index = u16::try_from(page_index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index,
            reason: "page index out of range".into(),
        })?;
        let page = pages.get(index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index,
            reason: format!("document has {} pages", pages.len()),
        })?;

        let (target_w, target_h) =
            compute_render_dimensions(page.width().value, page.height().value, dpi);
        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_index,
                reason: e.to_string(),
            })?;

        let mut png = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut png, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;

        let png = png.into_inner();
        tracing::debug!(
            page = page_index + 1,
            width = target_w,
            height = target_h,
            png_size = png.len(),
            "Rendered PDF page"
        );
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_at_144_dpi() {
        // 8.5 x 11 in
        assert_eq!(compute_render_dimensions(612.0, 792.0, 144), (1224, 1584));
    }

    #[test]
    fn oversized_page_is_capped_keeping_aspect_ratio() {
        let (w, h) = compute_render_dimensions(612.0, 792.0, 600);
        assert!(h <= MAX_DIMENSION_PX && h >= MAX_DIMENSION_PX - 1, "height {h}");
        assert!(w < h);
        let ratio = w as f32 / h as f32;
        assert!((ratio - 612.0 / 792.0).abs() < 0.01, "ratio {ratio}");
    }

    #[test]
    fn degenerate_page_is_at_least_one_pixel() {
        assert_eq!(compute_render_dimensions(0.0, 0.0, 200), (1, 1));
    }

    #[test]
    fn missing_explicit_library_is_rendering_error() {
        let result = PdfiumRenderer::new(Some(Path::new("/nonexistent/libpdfium.so")));
        assert!(matches!(
            result,
            Err(ExtractionError::PdfRendering { ref reason, .. }) if reason.contains("/nonexistent")
        ));
    }
}
