//! Per-page extraction results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Issuer name used when no candidate survives inference.
pub const UNKNOWN_ISSUER: &str = "EMISSOR_DESCONHECIDO";

/// Document number used when no number could be resolved.
pub const UNKNOWN_NUMBER: &str = "000";

/// Closed set of document types a page can be filed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    /// Electronic transport document (CT-e / DACTE).
    Cte,
    /// Electronic invoice (NF-e / NFS-e).
    Nf,
    /// Payment slip.
    Boleto,
    /// Nothing matched.
    #[default]
    #[serde(rename = "DESCONHECIDO")]
    Unknown,
}

impl DocumentType {
    /// Label used in output filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Cte => "CTE",
            DocumentType::Nf => "NF",
            DocumentType::Boleto => "BOLETO",
            DocumentType::Unknown => "DESCONHECIDO",
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DocumentType::Cte)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of issuer inference for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssuerResolution {
    /// Inference never ran (page failed before reaching it).
    #[default]
    NoAttempt,
    /// Access-key CNPJ found in the caller's canonical map.
    CanonHit,
    /// Batch-wide fixed issuer.
    FixedOverride,
    /// Known embedded-text template matched.
    Template,
    /// Line above a CNPJ / taxpayer-id anchor.
    Anchor1Match,
    /// Line following an issuer label (EMITENTE, PRESTADOR, ...).
    LabelMatch,
    /// Line above the transport-document marker.
    Anchor2Match,
    /// Best line near the top of the page.
    GlobalFallback,
    /// No acceptable candidate.
    Unresolved,
}

/// Which stage produced the page's number and type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPath {
    /// Embedded text matched a known template; nothing was rasterized.
    Template,
    /// Decoded access key plus overrides; OCR was skipped.
    AccessKey,
    /// OCR ran.
    Ocr,
    /// The page could not be processed.
    Failed,
}

/// Output of the extraction pipeline for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Classified document type.
    pub doc_type: DocumentType,
    /// Slugified issuer name, or [`UNKNOWN_ISSUER`].
    pub issuer: String,
    /// Document number without leading zeros, or [`UNKNOWN_NUMBER`].
    pub number: String,
    /// How the issuer was obtained.
    pub resolution: IssuerResolution,
    /// How the page was processed.
    pub path: ExtractionPath,
    /// The 44-digit access key, when one was decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
}

impl ExtractionResult {
    /// Result for a page that could not be processed at all.
    pub fn failed() -> Self {
        Self {
            doc_type: DocumentType::Unknown,
            issuer: UNKNOWN_ISSUER.to_string(),
            number: UNKNOWN_NUMBER.to_string(),
            resolution: IssuerResolution::NoAttempt,
            path: ExtractionPath::Failed,
            access_key: None,
        }
    }

    /// True when the page can be filed without manual triage.
    pub fn is_resolved(&self) -> bool {
        self.doc_type.is_transport()
            && !is_unknown_issuer(&self.issuer)
            && self.number != UNKNOWN_NUMBER
    }

    /// `{issuer}_{TYPE}_{number}` without extension.
    pub fn file_stem(&self) -> String {
        format!("{}_{}_{}", self.issuer, self.doc_type, self.number)
    }
}

/// Whether a slug denotes an unknown issuer.
pub fn is_unknown_issuer(slug: &str) -> bool {
    slug.is_empty() || slug == UNKNOWN_ISSUER || slug == crate::extract::text::EMPTY_SLUG
}
