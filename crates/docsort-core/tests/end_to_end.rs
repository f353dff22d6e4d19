//! Whole-file runs over a generated PDF: extraction, routing and disposition.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;

use docsort_core::code::compute_check_digit;
use docsort_core::error::{CodeError, OcrError};
use docsort_core::models::{ExtractionPath, FixedIssuer};
use docsort_core::ocr::OcrWord;
use docsort_core::route::{DispositionOutcome, PlacementOutcome};
use docsort_core::{
    BatchProcessor, CodeReader, CollisionPolicy, Destination, DocsortConfig, DocumentType,
    InputDisposition, IssuerResolution, OcrEngine, PageRasterizer, Pipeline,
};

const CNPJ: &str = "98765432000110";

/// Two pages: a DACTE with a text layer, then a scanned page with a QR code.
fn build_lote() -> Vec<u8> {
    let pages: [&[&str]; 2] = [
        &[
            "DACTE",
            "ACME TRANSPORTES LTDA",
            "CNPJ: 12.345.678/0001-90 IE: 123456",
            "SERIE 1 000482",
        ],
        &[],
    ];

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![50.into(), (780 - 20 * i as i64).into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Blank scan for every page.
struct BlankRasterizer;

impl PageRasterizer for BlankRasterizer {
    fn name(&self) -> &str {
        "blank"
    }

    fn render(&self, _data: &[u8], _page: u32, _dpi: u32) -> docsort_core::pdf::Result<DynamicImage> {
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255]))))
    }
}

/// Every image carries the QR of one CT-e.
struct PortalQr(String);

impl PortalQr {
    fn for_number(number: &str) -> Self {
        let prefix = format!("431001{}57001{}112345678", CNPJ, number);
        let key = format!("{}{}", prefix, compute_check_digit(&prefix).unwrap());
        Self(format!("https://dfe-portal.svrs.rs.gov.br/cte/qrCode?chCTe={}&tpAmb=1", key))
    }
}

impl CodeReader for PortalQr {
    fn name(&self) -> &str {
        "portal"
    }

    fn decode(&self, _image: &DynamicImage) -> docsort_core::code::Result<Vec<String>> {
        Ok(vec![self.0.clone()])
    }
}

struct NoCodes;

impl CodeReader for NoCodes {
    fn name(&self) -> &str {
        "none"
    }

    fn decode(&self, _image: &DynamicImage) -> docsort_core::code::Result<Vec<String>> {
        Err(CodeError::ReaderUnavailable("no reader".to_string()))
    }
}

struct NoOcr;

impl OcrEngine for NoOcr {
    fn name(&self) -> &str {
        "none"
    }

    fn recognize_text(&self, _image: &DynamicImage, _language: Option<&str>) -> docsort_core::ocr::Result<String> {
        Err(OcrError::EngineUnavailable("no engine".to_string()))
    }

    fn recognize_words(&self, _image: &DynamicImage, _language: Option<&str>) -> docsort_core::ocr::Result<Vec<OcrWord>> {
        Err(OcrError::EngineUnavailable("no engine".to_string()))
    }
}

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("entradas")).unwrap();
        Self { _dir: dir, root }
    }

    fn input(&self) -> PathBuf {
        self.input_named("lote.pdf")
    }

    fn input_named(&self, name: &str) -> PathBuf {
        let path = self.root.join("entradas").join(name);
        std::fs::write(&path, build_lote()).unwrap();
        path
    }

    fn config(&self) -> DocsortConfig {
        let mut config = DocsortConfig::default();
        config.routing.accepted_dir = self.root.join("renomeados");
        config.routing.pending_dir = self.root.join("pendentes");
        config.routing.processed_dir = self.root.join("processados");
        config
    }

    fn accepted(&self, name: &str) -> PathBuf {
        self.root.join("renomeados").join(name)
    }
}

fn processor(config: DocsortConfig, codes: Arc<dyn CodeReader>) -> BatchProcessor {
    let pipeline = Pipeline::new(config)
        .unwrap()
        .with_ocr(Arc::new(NoOcr))
        .with_code_reader(codes);
    BatchProcessor::new(pipeline, Arc::new(BlankRasterizer))
}

fn single_page_text(path: &Path) -> String {
    let doc = Document::load(path).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
    doc.extract_text(&[1]).unwrap()
}

#[tokio::test]
async fn test_lote_is_split_named_and_archived() {
    let ws = Workspace::new();
    let source = ws.input();
    let mut config = ws.config();
    config.issuer.canonical.insert(CNPJ.to_string(), "Rapido Sul Cargas".to_string());

    let reports = processor(config, Arc::new(PortalQr::for_number("000000123")))
        .process_files(vec![source.clone()])
        .await;

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(report.error.is_none());
    assert_eq!(report.pages.len(), 2);

    let first = &report.pages[0];
    assert_eq!(first.extraction.path, ExtractionPath::Template);
    assert_eq!(first.extraction.doc_type, DocumentType::Cte);
    assert_eq!(first.file_name(), "ACME_TRANSPORTES_LTDA_CTE_482.pdf");

    let second = &report.pages[1];
    assert_eq!(second.extraction.path, ExtractionPath::AccessKey);
    assert_eq!(second.extraction.resolution, IssuerResolution::CanonHit);
    assert_eq!(second.file_name(), "Rapido_Sul_Cargas_CTE_123.pdf");

    assert_eq!(report.accepted(), 2);
    assert_eq!(
        report.accepted_files(),
        vec!["ACME_TRANSPORTES_LTDA_CTE_482.pdf", "Rapido_Sul_Cargas_CTE_123.pdf"]
    );

    let text = single_page_text(&ws.accepted("ACME_TRANSPORTES_LTDA_CTE_482.pdf"));
    assert!(text.contains("000482"));
    assert!(ws.accepted("Rapido_Sul_Cargas_CTE_123.pdf").exists());

    assert!(!source.exists());
    assert_eq!(
        report.disposition,
        Some(DispositionOutcome::Archived(ws.root.join("processados").join("lote.pdf")))
    );
}

#[tokio::test]
async fn test_unresolved_page_goes_to_pending() {
    let ws = Workspace::new();
    let source = ws.input();
    let mut config = ws.config();
    config.routing.disposition = InputDisposition::Delete;

    let report = processor(config, Arc::new(NoCodes))
        .process_files(vec![source.clone()])
        .await
        .remove(0);

    assert_eq!(report.pages[0].destination, Destination::Accepted);
    let pending = &report.pages[1];
    assert_eq!(pending.destination, Destination::Pending);
    assert_eq!(pending.extraction.doc_type, DocumentType::Unknown);
    assert_eq!(pending.file_name(), "EMISSOR_DESCONHECIDO_DESCONHECIDO_000.pdf");
    assert!(ws.root.join("pendentes").join(pending.file_name()).exists());

    assert_eq!(report.disposition, Some(DispositionOutcome::Deleted));
    assert!(!source.exists());
}

#[tokio::test]
async fn test_fixed_issuer_names_every_page() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.issuer.fixed = Some(FixedIssuer::Name("Frota Propria".to_string()));
    config.routing.disposition = InputDisposition::Keep;

    let report = processor(config, Arc::new(PortalQr::for_number("000000009")))
        .process_files(vec![ws.input()])
        .await
        .remove(0);

    assert_eq!(
        report.accepted_files(),
        vec!["Frota_Propria_CTE_482.pdf", "Frota_Propria_CTE_9.pdf"]
    );
    for page in &report.pages {
        assert_eq!(page.extraction.resolution, IssuerResolution::FixedOverride);
    }
    assert_eq!(report.disposition, Some(DispositionOutcome::Kept));
}

#[tokio::test]
async fn test_rerun_with_skip_is_idempotent() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.issuer.canonical.insert(CNPJ.to_string(), "Rapido Sul Cargas".to_string());
    config.routing.disposition = InputDisposition::Keep;
    config.routing.collision = CollisionPolicy::Skip;

    let run = || processor(config.clone(), Arc::new(PortalQr::for_number("000000123")));
    let first = run().process_files(vec![ws.input()]).await.remove(0);
    let second = run().process_files(vec![ws.input()]).await.remove(0);

    assert_eq!(first.accepted_files(), second.accepted_files());
    for page in &second.pages {
        assert_eq!(page.placement, PlacementOutcome::SkippedExisting);
    }
    let written = std::fs::read_dir(ws.root.join("renomeados")).unwrap().count();
    assert_eq!(written, 2);
}

#[tokio::test]
async fn test_suffix_policy_keeps_both_runs() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.routing.disposition = InputDisposition::Keep;
    config.routing.collision = CollisionPolicy::Suffix;

    processor(config.clone(), Arc::new(NoCodes))
        .process_files(vec![ws.input()])
        .await;
    let second = processor(config, Arc::new(NoCodes))
        .process_files(vec![ws.input()])
        .await
        .remove(0);

    assert_eq!(second.pages[0].placement, PlacementOutcome::Suffixed);
    assert_eq!(second.pages[0].file_name(), "ACME_TRANSPORTES_LTDA_CTE_482__1.pdf");
    assert!(ws.accepted("ACME_TRANSPORTES_LTDA_CTE_482.pdf").exists());
    assert!(ws.accepted("ACME_TRANSPORTES_LTDA_CTE_482__1.pdf").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_copies_get_distinct_names() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.routing.disposition = InputDisposition::Keep;
    config.routing.collision = CollisionPolicy::Suffix;
    config.routing.workers = 4;

    let reports = processor(config, Arc::new(NoCodes))
        .process_files(vec![ws.input_named("lote_a.pdf"), ws.input_named("lote_b.pdf")])
        .await;

    let mut accepted: Vec<String> = reports.iter().flat_map(|r| r.accepted_files()).collect();
    accepted.sort();
    assert_eq!(
        accepted,
        vec!["ACME_TRANSPORTES_LTDA_CTE_482.pdf", "ACME_TRANSPORTES_LTDA_CTE_482__1.pdf"]
    );
    assert!(ws.accepted("ACME_TRANSPORTES_LTDA_CTE_482.pdf").exists());
    assert!(ws.accepted("ACME_TRANSPORTES_LTDA_CTE_482__1.pdf").exists());

    let pending = std::fs::read_dir(ws.root.join("pendentes")).unwrap().count();
    assert_eq!(pending, 2);
}
