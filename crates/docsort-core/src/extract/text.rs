//! Text normalization helpers.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Slug produced for input with no usable characters.
pub const EMPTY_SLUG: &str = "DESCONHECIDO";

lazy_static! {
    static ref NUMBER_RUN: Regex = Regex::new(r"[0-9]{2,}").unwrap();
    static ref NON_ALNUM_RUN: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Strip diacritics and drop anything outside ASCII.
pub fn fold_accents(text: &str) -> String {
    text.nfkd().filter(|c| c.is_ascii()).collect()
}

/// Accent-folded, upper-cased copy used for token matching.
pub fn fold_upper(text: &str) -> String {
    fold_accents(text).to_uppercase()
}

/// Filesystem-safe form of an issuer name.
///
/// Accents are folded, multi-digit runs removed, and every run of
/// non-alphanumerics becomes a single `_`. Case is preserved. The function
/// is idempotent.
pub fn slugify(text: &str) -> String {
    let folded = fold_accents(text);
    let without_numbers = NUMBER_RUN.replace_all(&folded, "");
    let joined = NON_ALNUM_RUN.replace_all(&without_numbers, "_");
    let trimmed = joined.trim_matches('_');

    if trimmed.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

/// Share of digits among the non-space characters.
pub fn digit_ratio(text: &str) -> f32 {
    let mut total = 0usize;
    let mut digits = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if c.is_ascii_digit() {
            digits += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        digits as f32 / total as f32
    }
}

/// Strip leading zeros from a digit string; `None` if nothing remains.
pub fn normalize_number(digits: &str) -> Option<String> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
