//! PDF parsing, per-page text and single-page extraction using lopdf.

use std::panic;
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use lopdf::Document;
use tracing::{debug, trace, warn};

use super::{PageRasterizer, PdfProcessor, Result};
use crate::error::PdfError;

/// Embedded text of one page, or why it could not be read.
type PageText = std::result::Result<String, String>;

/// A loaded PDF.
///
/// Holds the (decrypted) bytes and the embedded text of every page; lopdf
/// documents are re-parsed from the bytes when a page is split out.
pub struct PdfDocument {
    data: Vec<u8>,
    texts: Vec<PageText>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl PdfDocument {
    /// Load a PDF from bytes.
    pub fn load(data: &[u8], rasterizer: Arc<dyn PageRasterizer>) -> Result<Self> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        let data = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(PdfError::NoPages);
        }

        let mut texts: Vec<PageText> = page_numbers
            .iter()
            .map(|&number| {
                doc.extract_text(&[number]).map_err(|e| {
                    debug!("lopdf text extraction failed on page {}: {}", number, e);
                    e.to_string()
                })
            })
            .collect();

        if texts.iter().any(needs_fallback) {
            fill_missing_text(&data, &mut texts);
        }

        debug!("Loaded PDF with {} pages", texts.len());
        Ok(Self {
            data,
            texts,
            rasterizer,
        })
    }

    /// Read and load a PDF file.
    pub fn open(path: &Path, rasterizer: Arc<dyn PageRasterizer>) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| PdfError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::load(&data, rasterizer)
    }

    fn check_page(&self, page: u32) -> Result<usize> {
        if page == 0 || page as usize > self.texts.len() {
            return Err(PdfError::InvalidPage(page));
        }
        Ok(page as usize - 1)
    }
}

fn needs_fallback(text: &PageText) -> bool {
    text.as_ref().map_or(true, |t| t.trim().is_empty())
}

/// Second opinion from pdf-extract for pages lopdf left empty or could not
/// read. Pages neither library reads keep their lopdf error.
fn fill_missing_text(data: &[u8], texts: &mut [PageText]) {
    // pdf-extract panics on some malformed font programs
    let pages = match panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data)) {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            debug!("pdf-extract failed: {}", e);
            return;
        }
        Err(_) => {
            warn!("pdf-extract panicked; keeping lopdf text");
            return;
        }
    };

    for (index, (text, fallback)) in texts.iter_mut().zip(pages).enumerate() {
        if needs_fallback(text) && !fallback.trim().is_empty() {
            trace!("Page {} text recovered by pdf-extract", index + 1);
            *text = Ok(fallback);
        }
    }
}

impl PdfProcessor for PdfDocument {
    fn page_count(&self) -> u32 {
        self.texts.len() as u32
    }

    fn page_text(&self, page: u32) -> Result<String> {
        let index = self.check_page(page)?;
        self.texts[index].clone().map_err(PdfError::TextExtraction)
    }

    fn render_page(&self, page: u32, dpi: u32) -> Result<DynamicImage> {
        self.check_page(page)?;
        trace!("Rendering page {} with {}", page, self.rasterizer.name());
        self.rasterizer.render(&self.data, page, dpi)
    }

    fn save_page(&self, page: u32, path: &Path) -> Result<()> {
        self.check_page(page)?;
        let save_err = |detail: String| PdfError::Save { page, detail };

        let mut doc = Document::load_mem(&self.data).map_err(|e| save_err(e.to_string()))?;
        let others: Vec<u32> = doc.get_pages().keys().copied().filter(|&n| n != page).collect();
        if !others.is_empty() {
            doc.delete_pages(&others);
            doc.prune_objects();
            doc.renumber_objects();
        }
        doc.compress();

        doc.save(path).map_err(|e| save_err(e.to_string()))?;
        debug!("Saved page {} to {}", page, path.display());
        Ok(())
    }
}
