//! In-process QR decoding.

use image::DynamicImage;
use tracing::debug;

use super::{CodeReader, Result};

/// QR decoder backed by `rqrr`.
#[derive(Debug, Clone, Default)]
pub struct QrReader;

impl QrReader {
    pub fn new() -> Self {
        Self
    }
}

impl CodeReader for QrReader {
    fn name(&self) -> &str {
        "rqrr"
    }

    fn decode(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| gray.get_pixel(x as u32, y as u32)[0],
        );

        let mut payloads = Vec::new();
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => payloads.push(content),
                Err(e) => debug!("QR grid found but not decodable: {:?}", e),
            }
        }

        Ok(payloads)
    }
}
