//! `zbarimg` CLI reader for 1-D barcodes and QR.

use std::process::Command;

use image::DynamicImage;
use tracing::trace;

use crate::error::CodeError;

use super::{CodeReader, Result};

/// Exit status `zbarimg` uses when the image holds no symbol.
const NO_SYMBOLS: i32 = 4;

#[derive(Debug, Clone)]
pub struct ZbarReader {
    binary: String,
}

impl ZbarReader {
    pub fn new() -> Self {
        Self {
            binary: "zbarimg".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }
}

impl Default for ZbarReader {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeReader for ZbarReader {
    fn name(&self) -> &str {
        "zbarimg"
    }

    fn decode(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let dir = tempfile::tempdir().map_err(|e| CodeError::Decode(format!("temp dir: {}", e)))?;
        let input = dir.path().join("page.png");
        image
            .save(&input)
            .map_err(|e| CodeError::Decode(e.to_string()))?;

        let output = Command::new(&self.binary)
            .arg("--quiet")
            .arg("--raw")
            .arg(&input)
            .output()
            .map_err(|e| CodeError::ReaderUnavailable(format!("{} ({})", self.binary, e)))?;

        match output.status.code() {
            Some(0) => {}
            Some(NO_SYMBOLS) => return Ok(Vec::new()),
            code => {
                return Err(CodeError::Decode(format!(
                    "exit code {}: {}",
                    code.unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }

        let payloads: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        trace!("zbarimg payloads: {:?}", payloads);
        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_missing_binary_is_unavailable() {
        let reader = ZbarReader::new().with_binary("/nonexistent/zbarimg");
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([255])));
        assert!(matches!(reader.decode(&image), Err(CodeError::ReaderUnavailable(_))));
    }
}
