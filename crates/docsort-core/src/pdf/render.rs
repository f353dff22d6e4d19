//! Page rasterization backends.

use image::DynamicImage;

use super::Result;
use crate::error::PdfError;

/// Converts one page of a PDF into a bitmap.
pub trait PageRasterizer: Send + Sync {
    fn name(&self) -> &str;

    /// Render 1-indexed `page` of `data` at `dpi`.
    fn render(&self, data: &[u8], page: u32, dpi: u32) -> Result<DynamicImage>;
}

/// Rasterizer used when no backend could be loaded; every render fails.
///
/// Pages still flow through the pipeline and land in pending.
#[derive(Debug, Clone)]
pub struct UnavailableRasterizer {
    reason: String,
}

impl UnavailableRasterizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl PageRasterizer for UnavailableRasterizer {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn render(&self, _data: &[u8], _page: u32, _dpi: u32) -> Result<DynamicImage> {
        Err(PdfError::RendererUnavailable(self.reason.clone()))
    }
}

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use std::path::PathBuf;

    use image::DynamicImage;
    use pdfium_render::prelude::*;
    use tracing::debug;

    use super::PageRasterizer;
    use crate::error::PdfError;
    use crate::pdf::Result;

    /// Renders pages through the pdfium library.
    ///
    /// Only the library location is kept; pdfium is bound inside each
    /// render so the rasterizer can be shared across worker threads.
    #[derive(Debug, Clone)]
    pub struct PdfiumRasterizer {
        library: Option<PathBuf>,
    }

    impl PdfiumRasterizer {
        /// Use pdfium next to the executable, else the system library.
        ///
        /// Binds once up front so a missing library is reported here.
        pub fn new() -> Result<Self> {
            let local = Pdfium::pdfium_platform_library_name_at_path("./");
            let rasterizer = Self {
                library: local.exists().then_some(local),
            };
            rasterizer.bind()?;
            debug!("Bound pdfium library");
            Ok(rasterizer)
        }

        /// Use the pdfium library at `path`. Nothing is loaded until the
        /// first render.
        pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
            Self {
                library: Some(path.into()),
            }
        }

        fn bind(&self) -> Result<Pdfium> {
            let bindings = match &self.library {
                Some(path) => Pdfium::bind_to_library(path),
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| PdfError::RendererUnavailable(format!("{:?}", e)))?;
            Ok(Pdfium::new(bindings))
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn name(&self) -> &str {
            "pdfium"
        }

        fn render(&self, data: &[u8], page: u32, dpi: u32) -> Result<DynamicImage> {
            let render_err = |detail: String| PdfError::Render { page, detail };

            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(data, None)
                .map_err(|e| render_err(format!("{:?}", e)))?;

            let index = page
                .checked_sub(1)
                .and_then(|i| u16::try_from(i).ok())
                .ok_or(PdfError::InvalidPage(page))?;
            let pdf_page = document
                .pages()
                .get(index)
                .map_err(|_| PdfError::InvalidPage(page))?;

            let config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(|e| render_err(format!("{:?}", e)))?;

            let image = bitmap.as_image();
            debug!("Rendered page {} at {} DPI: {}x{}", page, dpi, image.width(), image.height());
            Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_rasterizer_fails() {
        let rasterizer = UnavailableRasterizer::new("no pdfium");
        assert!(matches!(
            rasterizer.render(b"%PDF", 1, 300),
            Err(PdfError::RendererUnavailable(_))
        ));
    }

    #[cfg(feature = "pdfium")]
    #[test]
    fn test_pdfium_rasterizer_moves_across_threads() {
        fn assert_shareable<T: Send + Sync + 'static>(_: &T) {}

        let rasterizer = PdfiumRasterizer::with_library_path("missing/libpdfium.so");
        assert_shareable(&rasterizer);

        let result = std::thread::spawn(move || rasterizer.render(b"%PDF", 1, 300).map(|_| ()))
            .join()
            .unwrap();
        assert!(matches!(result, Err(PdfError::RendererUnavailable(_))));
    }
}
