//! Archive/delete of source files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RouteError;

use super::SUFFIX_SEPARATOR;

/// What happened to a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "detail")]
pub enum DispositionOutcome {
    Archived(PathBuf),
    Deleted,
    Kept,
    /// The action failed; produced outputs are left in place.
    Failed(String),
}

pub(super) fn delete(source: &Path) -> DispositionOutcome {
    match fs::remove_file(source) {
        Ok(()) => {
            info!("Removed input {}", source.display());
            DispositionOutcome::Deleted
        }
        Err(e) => failed(RouteError::Disposition {
            path: source.to_path_buf(),
            source: e,
        }),
    }
}

/// Move `source` into `dir`, de-duplicating the name with `__{k}`.
pub(super) fn archive(source: &Path, dir: &Path) -> DispositionOutcome {
    let disposition_err = |e: std::io::Error| RouteError::Disposition {
        path: source.to_path_buf(),
        source: e,
    };

    if let Err(e) = fs::create_dir_all(dir) {
        return failed(RouteError::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        });
    }

    let Some(name) = source.file_name() else {
        return failed(disposition_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "source has no file name",
        )));
    };
    let target = free_path(&dir.join(name));

    match move_file(source, &target) {
        Ok(()) => {
            info!("Archived input to {}", target.display());
            DispositionOutcome::Archived(target)
        }
        Err(e) => failed(disposition_err(e)),
    }
}

/// `path` itself when free, else the first free `{stem}__{k}{.ext}`.
fn free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut k = 1;
    loop {
        let candidate = path.with_file_name(format!("{}{}{}{}", stem, SUFFIX_SEPARATOR, k, ext));
        if !candidate.exists() {
            return candidate;
        }
        k += 1;
    }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn failed(err: RouteError) -> DispositionOutcome {
    warn!("{}", err);
    DispositionOutcome::Failed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let processed = dir.path().join("processados");

        for expected in ["lote.pdf", "lote__1.pdf", "lote__2.pdf"] {
            let source = dir.path().join("lote.pdf");
            fs::write(&source, expected).unwrap();

            let outcome = archive(&source, &processed);
            assert_eq!(outcome, DispositionOutcome::Archived(processed.join(expected)));
            assert!(!source.exists());
            assert_eq!(fs::read_to_string(processed.join(expected)).unwrap(), expected);
        }
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.pdf");
        fs::write(&source, "x").unwrap();

        assert_eq!(delete(&source), DispositionOutcome::Deleted);
        assert!(!source.exists());
    }

    #[test]
    fn test_missing_source_fails_without_panic() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("gone.pdf");

        assert!(matches!(delete(&source), DispositionOutcome::Failed(_)));
        assert!(matches!(
            archive(&source, &dir.path().join("processados")),
            DispositionOutcome::Failed(_)
        ));
    }
}
