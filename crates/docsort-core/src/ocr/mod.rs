//! OCR with word-level layout.

mod layout;
mod preprocessing;
mod tesseract;

pub use layout::{assemble_lines, lines_from_text, parse_tsv, OcrLine, OcrWord, PageLayout};
pub use preprocessing::ImagePreprocessor;
pub use tesseract::TesseractEngine;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::OcrError;

/// Result type for OCR operations.
pub type Result<T> = std::result::Result<T, OcrError>;

/// An OCR backend providing plain text and word layout.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Plain text recognition.
    fn recognize_text(&self, image: &DynamicImage, language: Option<&str>) -> Result<String>;

    /// Word-level recognition with bounding boxes and grouping.
    fn recognize_words(&self, image: &DynamicImage, language: Option<&str>) -> Result<Vec<OcrWord>>;
}

/// Run `op` with the language hint, then without it. Failure of both yields `None`.
fn with_language_fallback<T>(
    engine: &dyn OcrEngine,
    language: &str,
    op: impl Fn(Option<&str>) -> Result<T>,
) -> Option<T> {
    match op(Some(language)) {
        Ok(value) => Some(value),
        Err(first) => {
            debug!("{} failed with language {}: {}; retrying without", engine.name(), language, first);
            match op(None) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("{} failed: {}", engine.name(), e);
                    None
                }
            }
        }
    }
}

/// Plain OCR text; empty when the engine fails.
pub fn ocr_text(engine: &dyn OcrEngine, image: &DynamicImage, language: &str) -> String {
    with_language_fallback(engine, language, |lang| engine.recognize_text(image, lang))
        .unwrap_or_default()
}

/// OCR layout; empty when the engine fails.
pub fn ocr_layout(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    language: &str,
    min_confidence: f32,
) -> PageLayout {
    let words = with_language_fallback(engine, language, |lang| engine.recognize_words(image, lang))
        .unwrap_or_default();
    PageLayout::from_words(image.width(), image.height(), words, min_confidence)
}
