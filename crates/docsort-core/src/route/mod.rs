//! Routing of extracted pages to output directories and disposition of
//! source files.

mod disposition;
mod router;

pub use disposition::DispositionOutcome;
pub use router::Router;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::ExtractionResult;

/// Extension of every produced file.
pub const OUTPUT_EXTENSION: &str = "pdf";

/// Separator between a file stem and its uniqueness counter.
pub const SUFFIX_SEPARATOR: &str = "__";

/// Where a page is filed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Confidently resolved transport document.
    Accepted,
    /// Needs manual triage.
    Pending,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Accepted => f.write_str("accepted"),
            Destination::Pending => f.write_str("pending"),
        }
    }
}

/// What to do when the target file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Leave the existing file and report its name.
    Skip,
    /// Overwrite the existing file.
    Replace,
    /// Append `__{n}` until the name is free.
    Suffix,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            "suffix" => Ok(Self::Suffix),
            other => Err(format!("unknown collision policy: {} (skip, replace, suffix)", other)),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionPolicy::Skip => f.write_str("skip"),
            CollisionPolicy::Replace => f.write_str("replace"),
            CollisionPolicy::Suffix => f.write_str("suffix"),
        }
    }
}

/// What happens to a source file once all its pages are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputDisposition {
    /// Move into the processed directory.
    #[serde(alias = "move")]
    Archive,
    /// Remove the file.
    Delete,
    /// Leave the file in place; it may be processed again.
    Keep,
}

impl FromStr for InputDisposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" | "move" => Ok(Self::Archive),
            "delete" => Ok(Self::Delete),
            "keep" => Ok(Self::Keep),
            other => Err(format!("unknown input disposition: {} (archive, delete, keep)", other)),
        }
    }
}

impl fmt::Display for InputDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputDisposition::Archive => f.write_str("archive"),
            InputDisposition::Delete => f.write_str("delete"),
            InputDisposition::Keep => f.write_str("keep"),
        }
    }
}

/// Filing decision for one page, computed from its extraction result alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub destination: Destination,
    /// `{issuer}_{TYPE}_{number}.pdf`
    pub file_name: String,
    pub collision: CollisionPolicy,
    pub disposition: InputDisposition,
}

/// How the target file was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementOutcome {
    Written,
    Replaced,
    /// An existing file was kept and reported as the output.
    SkippedExisting,
    /// Written under a `__{n}` name.
    Suffixed,
    Failed,
}

/// Routing result for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-indexed page number.
    pub page: u32,
    pub extraction: ExtractionResult,
    pub destination: Destination,
    /// Final path, including any uniqueness suffix.
    pub path: PathBuf,
    pub placement: PlacementOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageOutcome {
    /// Basename of the produced file.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// `{stem}.pdf`, or `{stem}__{n}.pdf` for `n > 0`.
pub fn numbered_name(stem: &str, n: u32) -> String {
    if n == 0 {
        format!("{}.{}", stem, OUTPUT_EXTENSION)
    } else {
        format!("{}{}{}.{}", stem, SUFFIX_SEPARATOR, n, OUTPUT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("SKIP".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Skip);
        assert_eq!("replace".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Replace);
        assert!("overwrite".parse::<CollisionPolicy>().is_err());

        assert_eq!("move".parse::<InputDisposition>().unwrap(), InputDisposition::Archive);
        assert_eq!("keep".parse::<InputDisposition>().unwrap(), InputDisposition::Keep);
        assert!("shred".parse::<InputDisposition>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let parsed: InputDisposition = serde_json::from_str("\"move\"").unwrap();
        assert_eq!(parsed, InputDisposition::Archive);
        assert_eq!(serde_json::to_string(&InputDisposition::Archive).unwrap(), "\"archive\"");
        assert_eq!(serde_json::to_string(&PlacementOutcome::SkippedExisting).unwrap(), "\"skipped_existing\"");
    }

    #[test]
    fn test_numbered_name() {
        assert_eq!(numbered_name("ACME_CTE_1", 0), "ACME_CTE_1.pdf");
        assert_eq!(numbered_name("ACME_CTE_1", 2), "ACME_CTE_1__2.pdf");
    }
}
