//! Image preprocessing for OCR and code detection.

use image::{DynamicImage, GrayImage, Luma};
use tracing::debug;

/// Grayscale, contrast-stretch and median-filter a page raster.
///
/// The input raster is left untouched; a new grayscale image is returned.
pub struct ImagePreprocessor {
    /// Median filter radius (0 disables the filter).
    median_radius: u32,
    /// Fraction of darkest/brightest pixels ignored when stretching contrast.
    cutoff: f32,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self {
            median_radius: 1,
            cutoff: 0.01,
        }
    }

    /// Set median filter radius.
    pub fn with_median_radius(mut self, radius: u32) -> Self {
        self.median_radius = radius;
        self
    }

    /// Set histogram cutoff for contrast stretching.
    pub fn with_cutoff(mut self, cutoff: f32) -> Self {
        self.cutoff = cutoff.clamp(0.0, 0.49);
        self
    }

    pub fn process(&self, image: &DynamicImage) -> DynamicImage {
        let gray = image.to_luma8();
        let stretched = self.autocontrast(&gray);
        let filtered = if self.median_radius > 0 {
            self.median_filter(&stretched, self.median_radius)
        } else {
            stretched
        };
        debug!(
            "Preprocessed {}x{} raster (median radius {})",
            filtered.width(),
            filtered.height(),
            self.median_radius
        );
        DynamicImage::ImageLuma8(filtered)
    }

    fn autocontrast(&self, image: &GrayImage) -> GrayImage {
        let mut histogram = [0u64; 256];
        for pixel in image.pixels() {
            histogram[pixel[0] as usize] += 1;
        }

        let total: u64 = histogram.iter().sum();
        if total == 0 {
            return image.clone();
        }
        let skip = (total as f32 * self.cutoff) as u64;

        let mut low = 0usize;
        let mut seen = 0u64;
        for (value, count) in histogram.iter().enumerate() {
            seen += count;
            if seen > skip {
                low = value;
                break;
            }
        }

        let mut high = 255usize;
        seen = 0;
        for (value, count) in histogram.iter().enumerate().rev() {
            seen += count;
            if seen > skip {
                high = value;
                break;
            }
        }

        if high <= low {
            return image.clone();
        }

        let span = high - low;
        let mut lut = [0u8; 256];
        for (value, slot) in lut.iter_mut().enumerate() {
            let stretched = value.saturating_sub(low) * 255 / span;
            *slot = stretched.min(255) as u8;
        }

        let mut result = image.clone();
        for pixel in result.pixels_mut() {
            pixel[0] = lut[pixel[0] as usize];
        }
        result
    }

    fn median_filter(&self, image: &GrayImage, radius: u32) -> GrayImage {
        let (width, height) = image.dimensions();
        let mut result = GrayImage::new(width, height);
        let mut window = Vec::with_capacity(((2 * radius + 1) * (2 * radius + 1)) as usize);

        for y in 0..height {
            for x in 0..width {
                window.clear();

                let y_start = y.saturating_sub(radius);
                let y_end = (y + radius + 1).min(height);
                let x_start = x.saturating_sub(radius);
                let x_end = (x + radius + 1).min(width);

                for ly in y_start..y_end {
                    for lx in x_start..x_end {
                        window.push(image.get_pixel(lx, ly)[0]);
                    }
                }

                window.sort_unstable();
                result.put_pixel(x, y, Luma([window[window.len() / 2]]));
            }
        }

        result
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}
