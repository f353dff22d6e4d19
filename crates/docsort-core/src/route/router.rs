//! Page placement with per-directory collision handling.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::error::RouteError;
use crate::models::{ExtractionResult, RoutingConfig};
use crate::pdf::PdfProcessor;

use super::disposition::{self, DispositionOutcome};
use super::{
    numbered_name, CollisionPolicy, Destination, InputDisposition, PageOutcome, PlacementOutcome,
    RoutingDecision,
};

/// Names claimed by this run, per directory.
type ClaimedNames = Arc<Mutex<HashSet<String>>>;

/// Files pages into the accepted/pending directories.
///
/// Safe to share between workers: name selection is serialized per
/// directory, and a name claimed by one page is never reused by another
/// page of the same run.
pub struct Router {
    accepted_dir: PathBuf,
    pending_dir: PathBuf,
    processed_dir: PathBuf,
    collision: CollisionPolicy,
    disposition: InputDisposition,
    claims: Mutex<HashMap<PathBuf, ClaimedNames>>,
}

/// Name chosen for a page and the action to take.
enum Slot {
    Write { path: PathBuf, placement: PlacementOutcome },
    Existing(PathBuf),
}

impl Router {
    pub fn new(accepted_dir: impl Into<PathBuf>, pending_dir: impl Into<PathBuf>) -> Self {
        Self {
            accepted_dir: accepted_dir.into(),
            pending_dir: pending_dir.into(),
            processed_dir: PathBuf::from("processados"),
            collision: CollisionPolicy::Skip,
            disposition: InputDisposition::Archive,
            claims: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(&config.accepted_dir, &config.pending_dir)
            .with_processed_dir(&config.processed_dir)
            .with_collision(config.collision)
            .with_disposition(config.disposition)
    }

    pub fn with_processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.processed_dir = dir.into();
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_disposition(mut self, disposition: InputDisposition) -> Self {
        self.disposition = disposition;
        self
    }

    pub fn directory(&self, destination: Destination) -> &Path {
        match destination {
            Destination::Accepted => &self.accepted_dir,
            Destination::Pending => &self.pending_dir,
        }
    }

    /// Pure filing decision for an extraction result.
    pub fn decide(&self, extraction: &ExtractionResult) -> RoutingDecision {
        let destination = if extraction.is_resolved() {
            Destination::Accepted
        } else {
            Destination::Pending
        };

        RoutingDecision {
            destination,
            file_name: numbered_name(&extraction.file_stem(), 0),
            collision: self.collision,
            disposition: self.disposition,
        }
    }

    /// Write one page to its destination. Failures are reported in the outcome.
    pub fn route_page(&self, pdf: &dyn PdfProcessor, page: u32, extraction: ExtractionResult) -> PageOutcome {
        let decision = self.decide(&extraction);
        let dir = self.directory(decision.destination).to_path_buf();
        let stem = extraction.file_stem();

        let outcome = |path: PathBuf, placement: PlacementOutcome, error: Option<String>| PageOutcome {
            page,
            extraction: extraction.clone(),
            destination: decision.destination,
            path,
            placement,
            error,
        };

        if let Err(e) = fs::create_dir_all(&dir) {
            let err = RouteError::CreateDir { path: dir.clone(), source: e };
            warn!("Page {}: {}", page, err);
            return outcome(dir.join(&decision.file_name), PlacementOutcome::Failed, Some(err.to_string()));
        }

        let result = match self.claim(&dir, &stem) {
            Slot::Existing(path) => outcome(path, PlacementOutcome::SkippedExisting, None),
            Slot::Write { path, placement } => match pdf.save_page(page, &path) {
                Ok(()) => outcome(path, placement, None),
                Err(e) => {
                    let err = RouteError::Write { path: path.clone(), detail: e.to_string() };
                    warn!("Page {}: {}", page, err);
                    outcome(path, PlacementOutcome::Failed, Some(err.to_string()))
                }
            },
        };

        info!(
            "Page {} ({} {} {}) -> {} {} [{:?}]",
            page,
            extraction.doc_type,
            extraction.issuer,
            extraction.number,
            decision.destination,
            result.file_name(),
            result.placement
        );
        result
    }

    /// Route every page of a document; always one outcome per page.
    ///
    /// Pages without an extraction result are filed as failed pages.
    pub fn route_document(&self, pdf: &dyn PdfProcessor, extractions: Vec<ExtractionResult>) -> Vec<PageOutcome> {
        let mut extractions = extractions.into_iter();
        (1..=pdf.page_count())
            .map(|page| {
                let extraction = extractions.next().unwrap_or_else(ExtractionResult::failed);
                self.route_page(pdf, page, extraction)
            })
            .collect()
    }

    /// Outcome for a page that could not be routed at all. Nothing is written.
    pub fn failed_page(&self, page: u32, error: String) -> PageOutcome {
        let extraction = ExtractionResult::failed();
        let decision = self.decide(&extraction);
        PageOutcome {
            page,
            path: self.directory(decision.destination).join(&decision.file_name),
            extraction,
            destination: decision.destination,
            placement: PlacementOutcome::Failed,
            error: Some(error),
        }
    }

    /// Apply the input disposition to a fully routed source file.
    pub fn dispose_input(&self, source: &Path) -> DispositionOutcome {
        match self.disposition {
            InputDisposition::Keep => DispositionOutcome::Kept,
            InputDisposition::Delete => disposition::delete(source),
            InputDisposition::Archive => {
                let claimed = self.claimed(&self.processed_dir);
                let _guard = claimed.lock().unwrap_or_else(PoisonError::into_inner);
                disposition::archive(source, &self.processed_dir)
            }
        }
    }

    fn claimed(&self, dir: &Path) -> ClaimedNames {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(claims.entry(dir.to_path_buf()).or_default())
    }

    /// Pick the name for `stem` in `dir` and reserve it for this run.
    fn claim(&self, dir: &Path, stem: &str) -> Slot {
        let claimed = self.claimed(dir);
        let mut names = claimed.lock().unwrap_or_else(PoisonError::into_inner);

        let mut n = 0;
        loop {
            let name = numbered_name(stem, n);
            n += 1;
            if names.contains(&name) {
                continue;
            }

            let path = dir.join(&name);
            let suffixed = n > 1;
            let slot = if !path.exists() {
                Slot::Write {
                    path,
                    placement: if suffixed { PlacementOutcome::Suffixed } else { PlacementOutcome::Written },
                }
            } else {
                match self.collision {
                    CollisionPolicy::Skip => Slot::Existing(path),
                    CollisionPolicy::Replace => Slot::Write {
                        path,
                        placement: PlacementOutcome::Replaced,
                    },
                    CollisionPolicy::Suffix => continue,
                }
            };

            names.insert(name);
            return slot;
        }
    }
}
