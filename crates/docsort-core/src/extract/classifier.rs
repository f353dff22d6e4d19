//! Document type classification by marker tokens.

use crate::models::{DocumentType, TypeMarkers};

use super::text::fold_upper;

/// Classify text by the first marker family found.
///
/// Transport markers are checked first, then invoice, then payment slip.
pub fn classify_document(text: &str, markers: &TypeMarkers) -> DocumentType {
    if text.trim().is_empty() {
        return DocumentType::Unknown;
    }

    let folded = fold_upper(text);
    let hit = |tokens: &[String]| tokens.iter().any(|t| folded.contains(t.as_str()));

    if hit(&markers.cte) {
        DocumentType::Cte
    } else if hit(&markers.nf) {
        DocumentType::Nf
    } else if hit(&markers.boleto) {
        DocumentType::Boleto
    } else {
        DocumentType::Unknown
    }
}
