//! Core library for filing freight and invoice documents.
//!
//! This crate provides:
//! - PDF loading, per-page text, rasterization and single-page extraction
//! - QR/barcode reading and 44-digit access-key decoding
//! - OCR with word-level layout (tesseract)
//! - Document classification and issuer (emissor) inference
//! - Routing of pages to accepted/pending directories and input disposition
//! - An async batch processor bounding concurrent page work

pub mod batch;
pub mod code;
pub mod error;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod route;

pub use batch::{BatchProcessor, FileReport};
pub use code::{cnpj_from_chave, nct_from_chave, AccessKey, CodeReader};
pub use error::{DocsortError, Result};
pub use extract::{infer_issuer, slugify, IssuerEngine, IssuerInference, Pipeline};
pub use models::{DocsortConfig, DocumentType, ExtractionResult, IssuerResolution};
pub use ocr::{OcrEngine, PageLayout};
pub use pdf::{PageRasterizer, PdfDocument, PdfProcessor};
#[cfg(feature = "pdfium")]
pub use pdf::PdfiumRasterizer;
pub use route::{CollisionPolicy, Destination, InputDisposition, PageOutcome, Router, RoutingDecision};
