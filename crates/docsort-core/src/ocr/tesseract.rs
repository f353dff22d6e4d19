//! Tesseract CLI engine.

use std::path::Path;
use std::process::Command;

use image::DynamicImage;
use tracing::{debug, trace};

use crate::error::OcrError;
use crate::models::OcrConfig;

use super::layout::{parse_tsv, OcrWord};
use super::{OcrEngine, Result};

/// OCR engine backed by the `tesseract` binary.
///
/// Each call writes the raster to a temporary PNG and reads results from
/// stdout, so the engine holds no state between pages.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    oem: u8,
    psm: u8,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            binary: "tesseract".to_string(),
            oem: 1,
            psm: 6,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new()
            .with_binary(&config.tesseract_path)
            .with_page_segmentation_mode(config.page_segmentation_mode)
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    pub fn with_page_segmentation_mode(mut self, psm: u8) -> Self {
        self.psm = psm;
        self
    }

    fn run(&self, image: &DynamicImage, language: Option<&str>, tsv: bool) -> Result<String> {
        let dir = tempfile::tempdir()
            .map_err(|e| OcrError::InvalidImage(format!("temp dir: {}", e)))?;
        let input = dir.path().join("page.png");
        image
            .save(&input)
            .map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        self.invoke(&input, language, tsv)
    }

    fn invoke(&self, input: &Path, language: Option<&str>, tsv: bool) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(input)
            .arg("stdout")
            .arg("--oem")
            .arg(self.oem.to_string())
            .arg("--psm")
            .arg(self.psm.to_string());
        if let Some(lang) = language {
            cmd.arg("-l").arg(lang);
        }
        if tsv {
            cmd.arg("tsv");
        }

        trace!("Running {:?}", cmd);
        let output = cmd.output().map_err(|e| {
            OcrError::EngineUnavailable(format!("{} ({})", self.binary, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract produced {} bytes (lang: {:?}, tsv: {})", stdout.len(), language, tsv);
        Ok(stdout)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize_text(&self, image: &DynamicImage, language: Option<&str>) -> Result<String> {
        self.run(image, language, false)
    }

    fn recognize_words(&self, image: &DynamicImage, language: Option<&str>) -> Result<Vec<OcrWord>> {
        let tsv = self.run(image, language, true)?;
        Ok(parse_tsv(&tsv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_missing_binary_is_unavailable() {
        let engine = TesseractEngine::new().with_binary("/nonexistent/tesseract-binary");
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([255])));

        let err = engine.recognize_text(&image, Some("por")).unwrap_err();
        assert!(matches!(err, OcrError::EngineUnavailable(_)));
    }

    #[test]
    fn test_from_config() {
        let config = OcrConfig {
            page_segmentation_mode: 4,
            tesseract_path: "/opt/bin/tesseract".to_string(),
            ..OcrConfig::default()
        };
        let engine = TesseractEngine::from_config(&config);
        assert_eq!(engine.psm, 4);
        assert_eq!(engine.binary, "/opt/bin/tesseract");
    }
}
