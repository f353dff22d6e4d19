//! Field extraction: text normalization, classification, templates,
//! issuer inference and the per-page pipeline.

pub mod classifier;
pub mod issuer;
pub mod patterns;
pub mod pipeline;
pub mod templates;
pub mod text;

pub use classifier::classify_document;
pub use issuer::{
    infer_issuer, resolve_override, Candidate, CnpjAnchor, InferenceContext, IssuerEngine,
    IssuerInference, IssuerStrategy, LabelBlock, MarkerAnchor, TopOfPage,
};
pub use pipeline::Pipeline;
pub use templates::{TemplateMatch, TemplateSet};
pub use text::{slugify, EMPTY_SLUG};
