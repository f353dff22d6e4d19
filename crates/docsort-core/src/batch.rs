//! Async batch processing over a bounded pool of blocking workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{DocsortError, Result};
use crate::extract::Pipeline;
use crate::models::ExtractionResult;
use crate::pdf::{PageRasterizer, PdfDocument, PdfProcessor};
use crate::route::{Destination, DispositionOutcome, PageOutcome, Router};

/// Outcome of processing one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub processed_at: DateTime<Utc>,
    /// One entry per page, in page order.
    pub pages: Vec<PageOutcome>,
    /// `None` when the file could not be read and was left in place.
    pub disposition: Option<DispositionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    fn unreadable(source: &Path, error: String) -> Self {
        Self {
            source: source.to_path_buf(),
            processed_at: Utc::now(),
            pages: Vec::new(),
            disposition: None,
            error: Some(error),
        }
    }

    pub fn accepted(&self) -> usize {
        self.count(Destination::Accepted)
    }

    pub fn pending(&self) -> usize {
        self.count(Destination::Pending)
    }

    /// Basenames of the accepted outputs.
    pub fn accepted_files(&self) -> Vec<String> {
        self.pages
            .iter()
            .filter(|p| p.destination == Destination::Accepted)
            .map(PageOutcome::file_name)
            .collect()
    }

    fn count(&self, destination: Destination) -> usize {
        self.pages.iter().filter(|p| p.destination == destination).count()
    }
}

/// Runs the pipeline and router over whole files.
///
/// Page extraction runs on the blocking pool, at most `workers` pages at a
/// time across all files, each bounded by the page timeout.
#[derive(Clone)]
pub struct BatchProcessor {
    pipeline: Arc<Pipeline>,
    router: Arc<Router>,
    rasterizer: Arc<dyn PageRasterizer>,
    workers: Arc<Semaphore>,
    page_timeout: Duration,
}

impl BatchProcessor {
    /// Worker count, timeout and routing come from the pipeline's config.
    pub fn new(pipeline: Pipeline, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        let routing = &pipeline.config().routing;
        let router = Router::from_config(routing);
        let workers = routing.workers.max(1);
        let page_timeout = Duration::from_secs(routing.page_timeout_secs);

        Self {
            pipeline: Arc::new(pipeline),
            router: Arc::new(router),
            rasterizer,
            workers: Arc::new(Semaphore::new(workers)),
            page_timeout,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Process files concurrently; reports come back in input order.
    pub async fn process_files(&self, paths: Vec<PathBuf>) -> Vec<FileReport> {
        let handles: Vec<(PathBuf, JoinHandle<FileReport>)> = paths
            .into_iter()
            .map(|path| (path.clone(), self.spawn_file(path)))
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            reports.push(join_report(&path, handle).await);
        }
        reports
    }

    /// Process one file on a spawned task.
    pub fn spawn_file(&self, path: PathBuf) -> JoinHandle<FileReport> {
        let this = self.clone();
        tokio::spawn(async move { this.process_file(&path).await })
    }

    /// Extract, route and dispose of one file.
    pub async fn process_file(&self, path: &Path) -> FileReport {
        let pdf = match self.load(path).await {
            Ok(pdf) => pdf,
            Err(e) => {
                error!("Skipping {}: {}", path.display(), e);
                return FileReport::unreadable(path, e.to_string());
            }
        };
        self.process_document(path, pdf).await
    }

    /// Extract and route an already loaded document, then dispose of `source`.
    pub async fn process_document(&self, source: &Path, pdf: Arc<dyn PdfProcessor>) -> FileReport {
        let page_count = pdf.page_count();
        let extractions = self.extract_pages(Arc::clone(&pdf)).await;

        let router = Arc::clone(&self.router);
        let routed = tokio::task::spawn_blocking(move || router.route_document(pdf.as_ref(), extractions)).await;
        let pages = match routed {
            Ok(pages) => pages,
            Err(e) => {
                error!("Routing {} failed: {}", source.display(), e);
                let detail = format!("routing failed: {}", e);
                (1..=page_count)
                    .map(|page| self.router.failed_page(page, detail.clone()))
                    .collect()
            }
        };

        let router = Arc::clone(&self.router);
        let input = source.to_path_buf();
        let disposition = tokio::task::spawn_blocking(move || router.dispose_input(&input))
            .await
            .unwrap_or_else(|e| {
                warn!("Disposing of {} failed: {}", source.display(), e);
                DispositionOutcome::Failed(e.to_string())
            });

        let report = FileReport {
            source: source.to_path_buf(),
            processed_at: Utc::now(),
            pages,
            disposition: Some(disposition),
            error: None,
        };
        info!(
            "Processed {}: {} page(s), {} accepted, {} pending",
            source.display(),
            report.pages.len(),
            report.accepted(),
            report.pending()
        );
        report
    }

    /// Extraction only; nothing is written or moved.
    pub async fn extract_file(&self, path: &Path) -> Result<Vec<ExtractionResult>> {
        let pdf = self.load(path).await?;
        Ok(self.extract_pages(pdf).await)
    }

    async fn load(&self, path: &Path) -> Result<Arc<dyn PdfProcessor>> {
        let path = path.to_path_buf();
        let rasterizer = Arc::clone(&self.rasterizer);
        let loaded = tokio::task::spawn_blocking(move || PdfDocument::open(&path, rasterizer))
            .await
            .map_err(|e| DocsortError::Io(std::io::Error::other(e.to_string())))??;
        Ok(Arc::new(loaded))
    }

    async fn extract_pages(&self, pdf: Arc<dyn PdfProcessor>) -> Vec<ExtractionResult> {
        let handles: Vec<JoinHandle<ExtractionResult>> = (1..=pdf.page_count())
            .map(|page| {
                let this = self.clone();
                let pdf = Arc::clone(&pdf);
                tokio::spawn(async move { this.extract_page(pdf, page).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            results.push(handle.await.unwrap_or_else(|e| {
                warn!("Page {} task failed: {}", index + 1, e);
                ExtractionResult::failed()
            }));
        }
        results
    }

    /// One page on the blocking pool; timeouts and panics become failed pages.
    ///
    /// A timed-out page keeps its worker slot until its blocking call returns.
    async fn extract_page(&self, pdf: Arc<dyn PdfProcessor>, page: u32) -> ExtractionResult {
        let Ok(permit) = Arc::clone(&self.workers).acquire_owned().await else {
            return ExtractionResult::failed();
        };

        // The permit lives as long as the blocking work, not the timeout.
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.extract_page(pdf.as_ref(), page)
        });

        match tokio::time::timeout(self.page_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Page {} extraction panicked: {}", page, e);
                ExtractionResult::failed()
            }
            Err(_) => {
                warn!("Page {} timed out after {:?}", page, self.page_timeout);
                ExtractionResult::failed()
            }
        }
    }
}

async fn join_report(path: &Path, handle: JoinHandle<FileReport>) -> FileReport {
    handle.await.unwrap_or_else(|e| {
        error!("Processing {} failed: {}", path.display(), e);
        FileReport::unreadable(path, e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PdfError;
    use crate::models::{DocsortConfig, DocumentType, ExtractionPath};
    use crate::ocr::{OcrEngine, OcrWord};
    use crate::pdf::UnavailableRasterizer;
    use crate::route::{InputDisposition, PlacementOutcome};
    use image::{DynamicImage, GrayImage, Luma};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Page 2 blocks in rendering for a long time.
    struct SlowPdf;

    impl PdfProcessor for SlowPdf {
        fn page_count(&self) -> u32 {
            2
        }

        fn page_text(&self, _page: u32) -> crate::pdf::Result<String> {
            Ok(String::new())
        }

        fn render_page(&self, page: u32, _dpi: u32) -> crate::pdf::Result<DynamicImage> {
            if page == 2 {
                std::thread::sleep(Duration::from_secs(2));
                return Err(PdfError::Render { page, detail: "slow".to_string() });
            }
            Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([255]))))
        }

        fn save_page(&self, page: u32, path: &Path) -> crate::pdf::Result<()> {
            std::fs::write(path, format!("page {}", page)).map_err(|e| PdfError::Save { page, detail: e.to_string() })
        }
    }

    struct PanicOcr;

    impl OcrEngine for PanicOcr {
        fn name(&self) -> &str {
            "panics"
        }

        fn recognize_text(&self, _image: &DynamicImage, _language: Option<&str>) -> crate::ocr::Result<String> {
            panic!("engine crashed");
        }

        fn recognize_words(&self, _image: &DynamicImage, _language: Option<&str>) -> crate::ocr::Result<Vec<OcrWord>> {
            panic!("engine crashed");
        }
    }

    /// Tracks how many pages render at once; every render takes 300ms.
    #[derive(Default)]
    struct TrackingPdf {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl PdfProcessor for TrackingPdf {
        fn page_count(&self) -> u32 {
            3
        }

        fn page_text(&self, _page: u32) -> crate::pdf::Result<String> {
            Ok(String::new())
        }

        fn render_page(&self, page: u32, _dpi: u32) -> crate::pdf::Result<DynamicImage> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Err(PdfError::Render { page, detail: "blank".to_string() })
        }

        fn save_page(&self, page: u32, path: &Path) -> crate::pdf::Result<()> {
            std::fs::write(path, format!("page {}", page)).map_err(|e| PdfError::Save { page, detail: e.to_string() })
        }
    }

    /// Splitting any page crashes the worker.
    struct CrashingSavePdf;

    impl PdfProcessor for CrashingSavePdf {
        fn page_count(&self) -> u32 {
            2
        }

        fn page_text(&self, _page: u32) -> crate::pdf::Result<String> {
            Ok(String::new())
        }

        fn render_page(&self, page: u32, _dpi: u32) -> crate::pdf::Result<DynamicImage> {
            Err(PdfError::Render { page, detail: "blank".to_string() })
        }

        fn save_page(&self, _page: u32, _path: &Path) -> crate::pdf::Result<()> {
            panic!("writer crashed");
        }
    }

    fn processor(root: &Path, ocr: Arc<dyn OcrEngine>) -> BatchProcessor {
        processor_with(root, ocr, InputDisposition::Keep)
    }

    fn processor_with(root: &Path, ocr: Arc<dyn OcrEngine>, disposition: InputDisposition) -> BatchProcessor {
        let mut config = DocsortConfig::default();
        config.codes.enabled = false;
        config.routing.accepted_dir = root.join("ok");
        config.routing.pending_dir = root.join("pending");
        config.routing.processed_dir = root.join("done");
        config.routing.disposition = disposition;

        let pipeline = Pipeline::new(config).unwrap().with_ocr(ocr);
        BatchProcessor::new(pipeline, Arc::new(UnavailableRasterizer::new("test")))
    }

    #[tokio::test]
    async fn test_timeout_and_panic_become_failed_pages() {
        let dir = tempfile::tempdir().unwrap();
        let batch = processor(dir.path(), Arc::new(PanicOcr))
            .with_workers(1)
            .with_page_timeout(Duration::from_millis(200));

        let report = batch.process_document(&dir.path().join("in.pdf"), Arc::new(SlowPdf)).await;

        assert_eq!(report.pages.len(), 2);
        for outcome in &report.pages {
            assert_eq!(outcome.extraction.path, ExtractionPath::Failed);
            assert_eq!(outcome.extraction.doc_type, DocumentType::Unknown);
            assert_eq!(outcome.destination, Destination::Pending);
        }
        assert_eq!(report.pages[1].placement, PlacementOutcome::Suffixed);
        assert_eq!(report.disposition, Some(DispositionOutcome::Kept));
    }

    #[tokio::test]
    async fn test_timed_out_page_keeps_its_worker_slot() {
        let dir = tempfile::tempdir().unwrap();
        let batch = processor(dir.path(), Arc::new(PanicOcr))
            .with_workers(1)
            .with_page_timeout(Duration::from_millis(50));
        let pdf = Arc::new(TrackingPdf::default());

        let report = batch.process_document(&dir.path().join("in.pdf"), pdf.clone()).await;

        assert_eq!(report.pages.len(), 3);
        assert_eq!(pdf.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_routing_crash_reports_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let batch = processor(dir.path(), Arc::new(PanicOcr));

        let report = batch.process_document(&dir.path().join("in.pdf"), Arc::new(CrashingSavePdf)).await;

        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages.iter().map(|p| p.page).collect::<Vec<_>>(), vec![1, 2]);
        for outcome in &report.pages {
            assert_eq!(outcome.placement, PlacementOutcome::Failed);
            assert_eq!(outcome.destination, Destination::Pending);
            assert!(outcome.error.as_deref().unwrap_or_default().contains("routing failed"));
        }
        assert!(report.error.is_none());
        assert_eq!(report.disposition, Some(DispositionOutcome::Kept));
    }

    #[tokio::test]
    async fn test_source_is_archived_after_routing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.pdf");
        std::fs::write(&source, b"%PDF").unwrap();
        let batch = processor_with(dir.path(), Arc::new(PanicOcr), InputDisposition::Archive)
            .with_page_timeout(Duration::from_secs(5));

        let report = batch.process_document(&source, Arc::new(TrackingPdf::default())).await;

        assert_eq!(report.pages.len(), 3);
        assert_eq!(report.disposition, Some(DispositionOutcome::Archived(dir.path().join("done").join("in.pdf"))));
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.pdf");
        std::fs::write(&source, b"not a pdf").unwrap();

        let batch = processor(dir.path(), Arc::new(PanicOcr));
        let reports = batch.process_files(vec![source.clone()]).await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].error.is_some());
        assert!(reports[0].pages.is_empty());
        assert!(reports[0].disposition.is_none());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_extract_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let batch = processor(dir.path(), Arc::new(PanicOcr));
        assert!(batch.extract_file(&dir.path().join("missing.pdf")).await.is_err());
    }
}
