//! Configuration structures for the filing pipeline.
//!
//! The whole configuration is an immutable value handed to the pipeline and
//! the router; nothing in the crate mutates it after construction.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DocsortError, Result};
use crate::route::{CollisionPolicy, InputDisposition};

use super::vocabulary::Vocabulary;

/// Main configuration for the docsort pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsortConfig {
    /// Rasterization and OCR configuration.
    pub ocr: OcrConfig,

    /// QR/barcode configuration.
    pub codes: CodeConfig,

    /// Issuer overrides and inference tuning.
    pub issuer: IssuerConfig,

    /// Token lists used by classification and issuer inference.
    pub vocabulary: Vocabulary,

    /// Known embedded-text templates.
    pub templates: Vec<TemplateConfig>,

    /// Output placement and input disposition.
    pub routing: RoutingConfig,
}

impl Default for DocsortConfig {
    fn default() -> Self {
        Self {
            ocr: OcrConfig::default(),
            codes: CodeConfig::default(),
            issuer: IssuerConfig::default(),
            vocabulary: Vocabulary::default(),
            templates: default_templates(),
            routing: RoutingConfig::default(),
        }
    }
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Rasterization resolution.
    pub dpi: u32,

    /// Primary OCR language (tesseract code).
    pub language: String,

    /// Skip the embedded-text fast path and always run OCR.
    pub force_ocr: bool,

    /// Words below this confidence (0-100) are dropped before line grouping.
    pub min_word_confidence: f32,

    /// Tesseract page segmentation mode.
    pub page_segmentation_mode: u8,

    /// Tesseract binary.
    pub tesseract_path: String,

    /// Apply grayscale/contrast/median preprocessing before OCR and code reading.
    pub preprocess: bool,

    /// Median filter radius in pixels (0 disables the filter).
    pub median_radius: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            language: "por".to_string(),
            force_ocr: false,
            min_word_confidence: 40.0,
            page_segmentation_mode: 6,
            tesseract_path: "tesseract".to_string(),
            preprocess: true,
            median_radius: 1,
        }
    }
}

/// QR/barcode reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Decode machine-readable codes at all.
    pub enabled: bool,

    /// `zbarimg` binary used for 1-D barcodes.
    pub zbar_path: String,

    /// URL query parameters that may carry the access key, in priority order.
    pub query_keys: Vec<String>,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zbar_path: "zbarimg".to_string(),
            query_keys: ["p", "pChaveAcesso", "chNFe", "chCTe"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Batch-wide issuer override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum FixedIssuer {
    /// Free-form issuer name.
    Name(String),
    /// Id looked up in [`IssuerConfig::known`].
    Known(String),
}

/// Issuer overrides and inference tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Fixed issuer for every page of the batch.
    pub fixed: Option<FixedIssuer>,

    /// CNPJ (14 digits) to canonical issuer name.
    pub canonical: BTreeMap<String, String>,

    /// Small registry of issuers selectable by id.
    pub known: BTreeMap<String, String>,

    /// Scoring and window parameters.
    pub inference: InferenceConfig,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        let known = [
            ("wander", "WANDER PEREIRA DE MATOS"),
            ("washington", "WASHINGTON BALTAZAR SOUZA LIMA ME"),
            ("sanman", "SAN MAN MANUTENCAO LTDA"),
        ]
        .iter()
        .map(|(id, name)| (id.to_string(), name.to_string()))
        .collect();

        Self {
            fixed: None,
            canonical: BTreeMap::new(),
            known,
            inference: InferenceConfig::default(),
        }
    }
}

impl IssuerConfig {
    /// Name of the fixed issuer, if one is configured and resolvable.
    pub fn fixed_name(&self) -> Option<&str> {
        match self.fixed.as_ref()? {
            FixedIssuer::Name(name) => Some(name.as_str()),
            FixedIssuer::Known(id) => self.known.get(id).map(String::as_str),
        }
    }

    /// Canonical name for a CNPJ.
    pub fn canonical_name(&self, cnpj: &str) -> Option<&str> {
        self.canonical.get(cnpj).map(String::as_str)
    }
}

/// Tuning for the issuer inference engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Lines examined above each CNPJ anchor.
    pub anchor_window: usize,

    /// Vertical window above the document marker, in pixels.
    pub marker_window_px: i32,

    /// Lines considered by the top-of-page fallback.
    pub top_lines: usize,

    /// Minimum cleaned length for the top-of-page fallback.
    pub min_fallback_len: usize,

    /// Horizontal tolerance as a fraction of the page width.
    pub center_tolerance_ratio: f32,

    /// Lower bound for the horizontal tolerance, in pixels.
    pub min_center_tolerance: f32,

    /// Candidates with a larger share of digits are discarded.
    pub digit_ratio_limit: f32,

    /// Bonus per company-suffix token.
    pub suffix_bonus: i32,

    /// Penalty for candidates containing a negative token.
    pub rejection_penalty: i32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            anchor_window: 3,
            marker_window_px: 400,
            top_lines: 25,
            min_fallback_len: 8,
            center_tolerance_ratio: 0.05,
            min_center_tolerance: 20.0,
            digit_ratio_limit: 0.25,
            suffix_bonus: 25,
            rejection_penalty: 150,
        }
    }
}

/// A known embedded-text layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Template name, used in logs.
    pub name: String,

    /// Regex whose first capture group is the issuer name.
    pub issuer_pattern: String,

    /// Regex whose first capture group is the document number.
    pub number_pattern: String,

    /// Use this name instead of the captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_name: Option<String>,
}

/// Templates observed in real DACTE layouts with a text layer.
pub fn default_templates() -> Vec<TemplateConfig> {
    vec![
        TemplateConfig {
            name: "header_cnpj_ie".to_string(),
            issuer_pattern: r"(?i)(?:^|\n)[ \t]*([A-Z][A-Z ]{4,})\s+CNPJ:\s*[\d./-]+\s+IE:".to_string(),
            number_pattern: r"(?i)S[ÉE]RIE\s*1\s*(\d{3,9})".to_string(),
            issuer_name: None,
        },
        TemplateConfig {
            name: "washington_baltazar".to_string(),
            issuer_pattern: r"(?i)(WASHINGTON\s+BALTAZAR\s+SOUZA\s+LIMA\s+ME)".to_string(),
            number_pattern: r"(?i)N[ÚU]MERO\s+(\d{3,9})".to_string(),
            issuer_name: None,
        },
    ]
}

/// Output placement and input disposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Destination for confidently resolved pages.
    pub accepted_dir: PathBuf,

    /// Destination for pages needing manual triage.
    pub pending_dir: PathBuf,

    /// Archive for processed source files.
    pub processed_dir: PathBuf,

    /// What to do when the target filename already exists.
    pub collision: CollisionPolicy,

    /// What to do with the source file after all its pages are routed.
    pub disposition: InputDisposition,

    /// Per-page extraction timeout.
    pub page_timeout_secs: u64,

    /// Pages extracted concurrently across all files.
    pub workers: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            accepted_dir: PathBuf::from("renomeados"),
            pending_dir: PathBuf::from("pendentes"),
            processed_dir: PathBuf::from("processados"),
            collision: CollisionPolicy::Skip,
            disposition: InputDisposition::Archive,
            page_timeout_secs: 120,
            workers: 4,
        }
    }
}

impl DocsortConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> std::result::Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ocr.dpi == 0 {
            return Err(DocsortError::Config("ocr.dpi must be positive".to_string()));
        }
        if self.routing.workers == 0 {
            return Err(DocsortError::Config("routing.workers must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.issuer.inference.digit_ratio_limit) {
            return Err(DocsortError::Config(
                "issuer.inference.digit_ratio_limit must be within 0..=1".to_string(),
            ));
        }
        if let Some(FixedIssuer::Known(id)) = &self.issuer.fixed {
            if !self.issuer.known.contains_key(id) {
                return Err(DocsortError::Config(format!("unknown fixed issuer id: {}", id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = DocsortConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ocr.dpi, 300);
        assert_eq!(config.templates.len(), 2);
    }

    #[test]
    fn test_fixed_issuer_resolution() {
        let mut issuer = IssuerConfig::default();
        assert_eq!(issuer.fixed_name(), None);

        issuer.fixed = Some(FixedIssuer::Name("Transportes Beta".to_string()));
        assert_eq!(issuer.fixed_name(), Some("Transportes Beta"));

        issuer.fixed = Some(FixedIssuer::Known("washington".to_string()));
        assert_eq!(issuer.fixed_name(), Some("WASHINGTON BALTAZAR SOUZA LIMA ME"));
    }

    #[test]
    fn test_unknown_fixed_id_is_rejected() {
        let mut config = DocsortConfig::default();
        config.issuer.fixed = Some(FixedIssuer::Known("nobody".to_string()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: DocsortConfig =
            serde_json::from_str(r#"{"ocr": {"dpi": 200}, "routing": {"collision": "replace"}}"#)
                .unwrap();
        assert_eq!(config.ocr.dpi, 200);
        assert_eq!(config.ocr.language, "por");
        assert_eq!(config.routing.collision, CollisionPolicy::Replace);
        assert_eq!(config.routing.disposition, InputDisposition::Archive);
    }

    #[test]
    fn test_fixed_issuer_json_shape() {
        let fixed = FixedIssuer::Known("sanman".to_string());
        let json = serde_json::to_string(&fixed).unwrap();
        assert_eq!(json, r#"{"kind":"known","value":"sanman"}"#);
    }
}
