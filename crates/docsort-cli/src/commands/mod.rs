//! Subcommands and the helpers they share.

pub mod config;
pub mod extract;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use glob::glob;
use tracing::{debug, warn};

use docsort_core::models::{DocsortConfig, FixedIssuer};
use docsort_core::pdf::{PageRasterizer, PdfiumRasterizer, UnavailableRasterizer};

/// Pipeline overrides shared by `process` and `extract`.
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Rasterization resolution
    #[arg(long)]
    dpi: Option<u32>,

    /// Always run OCR, even when embedded text or an access key suffices
    #[arg(long)]
    force_ocr: bool,

    /// OCR language (tesseract code)
    #[arg(long)]
    language: Option<String>,

    /// Use this issuer name for every page
    #[arg(long, conflicts_with = "known_issuer")]
    issuer: Option<String>,

    /// Use an issuer from the configured registry (e.g. "sanman")
    #[arg(long)]
    known_issuer: Option<String>,

    /// Do not decode QR codes or barcodes
    #[arg(long)]
    no_codes: bool,
}

impl PipelineArgs {
    pub fn apply(&self, config: &mut DocsortConfig) {
        if let Some(dpi) = self.dpi {
            config.ocr.dpi = dpi;
        }
        if self.force_ocr {
            config.ocr.force_ocr = true;
        }
        if let Some(language) = &self.language {
            config.ocr.language = language.clone();
        }
        if let Some(name) = &self.issuer {
            config.issuer.fixed = Some(FixedIssuer::Name(name.clone()));
        }
        if let Some(id) = &self.known_issuer {
            config.issuer.fixed = Some(FixedIssuer::Known(id.to_lowercase()));
        }
        if self.no_codes {
            config.codes.enabled = false;
        }
    }
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docsort")
        .join("config.json")
}

/// Explicit file, else the default file when present, else defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<DocsortConfig> {
    if let Some(path) = path {
        return DocsortConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config at {}", default_path.display());
        return Ok(DocsortConfig::from_file(&default_path)?);
    }
    Ok(DocsortConfig::default())
}

/// pdfium when it can be bound; otherwise every page fails to render.
pub fn rasterizer() -> Arc<dyn PageRasterizer> {
    match PdfiumRasterizer::new() {
        Ok(rasterizer) => Arc::new(rasterizer),
        Err(e) => {
            warn!("Rendering disabled: {}", e);
            Arc::new(UnavailableRasterizer::new(e.to_string()))
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// PDF files named by a file, a directory or a glob pattern.
pub fn collect_inputs(input: &str) -> anyhow::Result<Vec<PathBuf>> {
    let path = Path::new(input);

    let mut files: Vec<PathBuf> = if path.is_dir() {
        std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_pdf(p))
            .collect()
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        glob(input)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file() && is_pdf(p))
            .collect()
    };

    files.sort();
    Ok(files)
}
