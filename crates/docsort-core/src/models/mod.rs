//! Data models shared across the pipeline.

pub mod config;
pub mod document;
pub mod vocabulary;

pub use config::{
    CodeConfig, DocsortConfig, FixedIssuer, InferenceConfig, IssuerConfig, OcrConfig,
    RoutingConfig, TemplateConfig,
};
pub use document::{
    DocumentType, ExtractionPath, ExtractionResult, IssuerResolution, UNKNOWN_ISSUER,
    UNKNOWN_NUMBER,
};
pub use vocabulary::{TypeMarkers, Vocabulary};
