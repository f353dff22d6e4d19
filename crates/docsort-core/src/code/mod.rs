//! Machine-readable code reading and access-key decoding.

mod access_key;
mod qr;
mod zbar;

pub use access_key::{
    cnpj_from_chave, compute_check_digit, format_cnpj, nct_from_chave, parse_access_key, AccessKey,
    ACCESS_KEY_LEN, TRANSPORT_MODELS,
};
pub use qr::QrReader;
pub use zbar::ZbarReader;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::CodeError;
use crate::models::CodeConfig;

/// Result type for code reading.
pub type Result<T> = std::result::Result<T, CodeError>;

/// A QR/barcode decoder.
pub trait CodeReader: Send + Sync {
    fn name(&self) -> &str;

    /// Every payload found in the image.
    fn decode(&self, image: &DynamicImage) -> Result<Vec<String>>;

    /// First payload that yields an access key.
    ///
    /// Decoder failures are logged and treated as "no code".
    fn find_access_key(&self, image: &DynamicImage, query_keys: &[String]) -> Option<AccessKey> {
        let payloads = match self.decode(image) {
            Ok(payloads) => payloads,
            Err(e) => {
                warn!("{} failed: {}", self.name(), e);
                return None;
            }
        };

        debug!("{} decoded {} payload(s)", self.name(), payloads.len());
        payloads
            .iter()
            .find_map(|payload| parse_access_key(payload, query_keys))
    }
}

/// Readers tried in order; stops at the first one yielding a key.
pub struct ChainedReader {
    readers: Vec<Box<dyn CodeReader>>,
}

impl ChainedReader {
    pub fn new(readers: Vec<Box<dyn CodeReader>>) -> Self {
        Self { readers }
    }

    /// In-process QR first, then `zbarimg` for 1-D barcodes.
    pub fn from_config(config: &CodeConfig) -> Self {
        Self::new(vec![
            Box::new(QrReader::new()),
            Box::new(ZbarReader::new().with_binary(&config.zbar_path)),
        ])
    }
}

impl CodeReader for ChainedReader {
    fn name(&self) -> &str {
        "chained"
    }

    fn decode(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let mut payloads = Vec::new();
        for reader in &self.readers {
            match reader.decode(image) {
                Ok(found) => payloads.extend(found),
                Err(e) => warn!("{} failed: {}", reader.name(), e),
            }
        }
        Ok(payloads)
    }

    fn find_access_key(&self, image: &DynamicImage, query_keys: &[String]) -> Option<AccessKey> {
        self.readers
            .iter()
            .find_map(|reader| reader.find_access_key(image, query_keys))
    }
}
