//! Per-page extraction pipeline.
//!
//! Steps run in a fixed order and short-circuit as soon as the page is
//! fully resolved:
//!
//! 1. embedded text and classification
//! 2. known template over the embedded text (no rasterization)
//! 3. rasterize and preprocess
//! 4. access key from QR/barcodes, then issuer overrides
//! 5. OCR text and layout, then issuer inference
//!
//! Collaborator failures never escape a page: they degrade to empty values
//! and, for rasterization, to [`ExtractionResult::failed`].

use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::code::{cnpj_from_chave, nct_from_chave, AccessKey, ChainedReader, CodeReader};
use crate::error::Result;
use crate::models::{
    DocsortConfig, DocumentType, ExtractionPath, ExtractionResult, IssuerResolution, UNKNOWN_NUMBER,
};
use crate::ocr::{ocr_layout, ocr_text, ImagePreprocessor, OcrEngine, PageLayout, TesseractEngine};
use crate::pdf::PdfProcessor;

use super::classifier::classify_document;
use super::issuer::{resolve_override, InferenceContext, IssuerEngine, IssuerInference};
use super::templates::TemplateSet;

/// Extraction pipeline shared by all pages of a batch.
pub struct Pipeline {
    config: Arc<DocsortConfig>,
    templates: TemplateSet,
    preprocessor: ImagePreprocessor,
    engine: IssuerEngine,
    ocr: Arc<dyn OcrEngine>,
    codes: Option<Arc<dyn CodeReader>>,
}

/// Fields gathered so far for one page.
struct PageState {
    doc_type: DocumentType,
    issuer: Option<IssuerInference>,
    number: Option<String>,
    access_key: Option<AccessKey>,
}

impl PageState {
    fn is_complete(&self) -> bool {
        self.issuer.is_some() && self.number.is_some()
    }

    fn finish(self, path: ExtractionPath) -> ExtractionResult {
        let issuer = self.issuer.unwrap_or_else(IssuerInference::unresolved);
        ExtractionResult {
            doc_type: self.doc_type,
            issuer: issuer.issuer,
            number: self.number.unwrap_or_else(|| UNKNOWN_NUMBER.to_string()),
            resolution: issuer.resolution,
            path,
            access_key: self.access_key.map(String::from),
        }
    }
}

impl Pipeline {
    /// Pipeline with the tesseract engine and the default code readers.
    pub fn new(config: DocsortConfig) -> Result<Self> {
        config.validate()?;
        let templates = TemplateSet::compile(&config.templates)?;
        let preprocessor = ImagePreprocessor::new().with_median_radius(config.ocr.median_radius);
        let ocr: Arc<dyn OcrEngine> = Arc::new(TesseractEngine::from_config(&config.ocr));
        let codes: Option<Arc<dyn CodeReader>> = if config.codes.enabled {
            Some(Arc::new(ChainedReader::from_config(&config.codes)))
        } else {
            None
        };

        debug!("Pipeline ready: {} template(s), codes {}", templates.len(), config.codes.enabled);
        Ok(Self {
            config: Arc::new(config),
            templates,
            preprocessor,
            engine: IssuerEngine::new(),
            ocr,
            codes,
        })
    }

    /// Replace the OCR engine.
    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }

    /// Replace the code reader.
    pub fn with_code_reader(mut self, reader: Arc<dyn CodeReader>) -> Self {
        self.codes = Some(reader);
        self
    }

    pub fn config(&self) -> &DocsortConfig {
        &self.config
    }

    /// Extract type, issuer and number for a 1-indexed page. Never fails.
    pub fn extract_page(&self, pdf: &dyn PdfProcessor, page: u32) -> ExtractionResult {
        let embedded = pdf.page_text(page).unwrap_or_else(|e| {
            debug!("Page {}: no embedded text: {}", page, e);
            String::new()
        });

        let mut state = PageState {
            doc_type: classify_document(&embedded, &self.config.vocabulary.type_markers),
            issuer: resolve_override(&self.config.issuer, None),
            number: None,
            access_key: None,
        };

        if let Some(result) = self.template_fast_path(&embedded, &state) {
            debug!("Page {}: template fast path", page);
            return result;
        }

        let raster = match pdf.render_page(page, self.config.ocr.dpi) {
            Ok(image) => image,
            Err(e) => {
                warn!("Page {}: rasterization failed: {}", page, e);
                return ExtractionResult::failed();
            }
        };
        let prepared = self.config.ocr.preprocess.then(|| self.preprocessor.process(&raster));
        let image = prepared.as_ref().unwrap_or(&raster);

        if let Some(key) = self.find_access_key(image, prepared.as_ref().map(|_| &raster)) {
            self.apply_access_key(&mut state, key);
        }

        if state.is_complete() && !self.config.ocr.force_ocr {
            debug!("Page {}: resolved from access key", page);
            return state.finish(ExtractionPath::AccessKey);
        }

        let language = &self.config.ocr.language;
        let text = ocr_text(self.ocr.as_ref(), image, language);
        let layout = ocr_layout(
            self.ocr.as_ref(),
            image,
            language,
            self.config.ocr.min_word_confidence,
        );

        if state.doc_type == DocumentType::Unknown {
            state.doc_type = classify_document(&text, &self.config.vocabulary.type_markers);
        }

        if state.issuer.is_none() {
            let cnpj = state.access_key.as_ref().and_then(|k| cnpj_from_chave(k.as_str()));
            state.issuer = Some(self.infer_from_best_layout(&layout, &text, &embedded, cnpj.as_deref()));
        }

        state.finish(ExtractionPath::Ocr)
    }

    fn template_fast_path(&self, embedded: &str, state: &PageState) -> Option<ExtractionResult> {
        if self.config.ocr.force_ocr || state.doc_type != DocumentType::Cte {
            return None;
        }

        let found = self.templates.match_text(embedded)?;
        let number = found.number?;
        let issuer = match &state.issuer {
            Some(fixed) => fixed.clone(),
            None => {
                let inferred = IssuerInference::named(&found.issuer, IssuerResolution::Template);
                if inferred.resolution != IssuerResolution::Template {
                    return None;
                }
                inferred
            }
        };

        debug!("Template {} matched", found.template);
        Some(ExtractionResult {
            doc_type: state.doc_type,
            issuer: issuer.issuer,
            number,
            resolution: issuer.resolution,
            path: ExtractionPath::Template,
            access_key: None,
        })
    }

    /// Preprocessed image first, then the untouched raster.
    fn find_access_key(&self, image: &DynamicImage, raw: Option<&DynamicImage>) -> Option<AccessKey> {
        let reader = self.codes.as_ref()?;
        let query_keys = &self.config.codes.query_keys;
        reader
            .find_access_key(image, query_keys)
            .or_else(|| raw.and_then(|raw| reader.find_access_key(raw, query_keys)))
    }

    fn apply_access_key(&self, state: &mut PageState, key: AccessKey) {
        debug!("Access key {} (model {})", key, key.model());
        if key.is_transport() {
            state.doc_type = DocumentType::Cte;
            state.number = nct_from_chave(key.as_str());
            if state.issuer.is_none() {
                let cnpj = cnpj_from_chave(key.as_str());
                state.issuer = resolve_override(&self.config.issuer, cnpj.as_deref());
            }
        }
        state.access_key = Some(key);
    }

    /// OCR layout, else OCR text, else embedded text.
    fn infer_from_best_layout(
        &self,
        layout: &PageLayout,
        text: &str,
        embedded: &str,
        cnpj: Option<&str>,
    ) -> IssuerInference {
        let fallback;
        let layout = if !layout.is_empty() {
            layout
        } else {
            let source = if text.trim().is_empty() { embedded } else { text };
            fallback = PageLayout::from_text(source);
            &fallback
        };

        let ctx = InferenceContext {
            layout,
            cnpj,
            vocabulary: &self.config.vocabulary,
            settings: &self.config.issuer.inference,
        };
        self.engine.infer(&ctx)
    }
}
