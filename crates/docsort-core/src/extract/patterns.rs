//! Common regex patterns for Brazilian fiscal documents.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Access key (chave de acesso)
    pub static ref ACCESS_KEY_RUN: Regex = Regex::new(r"\d{44}").unwrap();

    // CNPJ patterns
    pub static ref CNPJ_LABEL: Regex = Regex::new(r"(?i)\bCNPJ\b").unwrap();

    // Punctuation around a candidate line
    pub static ref EDGE_PUNCTUATION: Regex = Regex::new(
        r"^[\s:;.,\-|_]+|[\s:;.,\-|_]+$"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_key_run() {
        let text = format!("CHAVE {} FIM", "1".repeat(44));
        assert_eq!(ACCESS_KEY_RUN.find(&text).unwrap().as_str().len(), 44);
        assert!(!ACCESS_KEY_RUN.is_match(&"1".repeat(43)));
    }

    #[test]
    fn test_cnpj_label_is_word() {
        assert!(CNPJ_LABEL.is_match("cnpj 12"));
        assert!(!CNPJ_LABEL.is_match("XCNPJX"));
    }

    #[test]
    fn test_edge_punctuation() {
        assert_eq!(EDGE_PUNCTUATION.replace_all(" : ACME LTDA. - ", ""), "ACME LTDA");
    }
}
