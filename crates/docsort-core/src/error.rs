//! Error types for the docsort-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the docsort library.
#[derive(Error, Debug)]
pub enum DocsortError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Machine-readable code error.
    #[error("code reader error: {0}")]
    Code(#[from] CodeError),

    /// File placement or disposition error.
    #[error("routing error: {0}")]
    Route(#[from] RouteError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from a page.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to rasterize a page.
    #[error("failed to render page {page}: {detail}")]
    Render { page: u32, detail: String },

    /// No rasterizer backend could be loaded.
    #[error("renderer unavailable: {0}")]
    RendererUnavailable(String),

    /// Failed to write a single-page PDF.
    #[error("failed to save page {page}: {detail}")]
    Save { page: u32, detail: String },

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR engine binary could not be started.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The engine ran but reported a failure.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Image could not be handed to the engine.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors related to QR/barcode decoding.
#[derive(Error, Debug)]
pub enum CodeError {
    /// The decoder binary could not be started.
    #[error("code reader unavailable: {0}")]
    ReaderUnavailable(String),

    /// Decoding failed.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Errors related to file placement and input disposition.
#[derive(Error, Debug)]
pub enum RouteError {
    /// Destination directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output file could not be written.
    #[error("failed to write {path}: {detail}")]
    Write { path: PathBuf, detail: String },

    /// Archive/delete of the source file failed.
    #[error("failed to dispose of {path}: {source}")]
    Disposition {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for the docsort library.
pub type Result<T> = std::result::Result<T, DocsortError>;
