//! PDF processing module.

mod document;
mod render;

pub use document::PdfDocument;
#[cfg(feature = "pdfium")]
pub use render::PdfiumRasterizer;
pub use render::{PageRasterizer, UnavailableRasterizer};

use std::path::Path;

use crate::error::PdfError;
use image::DynamicImage;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
///
/// Pages are 1-indexed.
pub trait PdfProcessor: Send + Sync {
    /// Get the number of pages in the PDF.
    fn page_count(&self) -> u32;

    /// Embedded text of a page; empty for scanned pages.
    fn page_text(&self, page: u32) -> Result<String>;

    /// Render a page as an image at the specified DPI.
    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage>;

    /// Write a page as a standalone single-page PDF.
    fn save_page(&self, page: u32, path: &Path) -> Result<()>;
}
