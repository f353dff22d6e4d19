//! Token lists driving classification and issuer inference.
//!
//! All entries are compared against accent-folded, upper-cased text, so they
//! are stored in that form.

use serde::{Deserialize, Serialize};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Marker tokens per document type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMarkers {
    pub cte: Vec<String>,
    pub nf: Vec<String>,
    pub boleto: Vec<String>,
}

impl Default for TypeMarkers {
    fn default() -> Self {
        Self {
            cte: strings(&["CONHECIMENTO DE TRANSPORTE ELETR", "DACTE", "CT-E"]),
            nf: strings(&["NOTA FISCAL ELETR", "NFS-E", "NF-E", "DANFE"]),
            boleto: strings(&["BOLETO", "FICHA DE COMPENSAC", "LINHA DIGITAVEL"]),
        }
    }
}

/// Vocabulary used by the classifier and the issuer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Substrings that mark a line as protocol, role or addressing text.
    pub negative_tokens: Vec<String>,

    /// Company-suffix tokens, matched on the space-padded candidate.
    pub suffix_tokens: Vec<String>,

    /// Leading labels stripped from candidates.
    pub label_prefixes: Vec<String>,

    /// Words where an address or municipality tail starts.
    pub trailing_tokens: Vec<String>,

    /// Two-letter state codes stripped from the end of candidates.
    pub state_codes: Vec<String>,

    /// Labels whose following line names the issuer.
    pub issuer_labels: Vec<String>,

    /// Title tokens of a transport document, used as a secondary anchor.
    pub marker_tokens: Vec<String>,

    /// Type classification markers.
    pub type_markers: TypeMarkers,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            negative_tokens: strings(&[
                "CONHECIMENT", "DACTE", "CHAV", "ACESS", "PROTOC", "RECEIT", "FISCO",
                "DESTINAT", "REMET", "TOMADOR", "AUTORIZA", "CONSULT", "QRCODE", "MODELO",
                "SERIE", "SERLE", "NCT", "NUMERO", "DECLAR", "ASSINAT", "RECEBEDOR",
                "EXPEDIDOR", "CNPJ", "FONE", "E-MAIL", "EMAIL", "INSCRICAO", "DOCUMENTO",
            ]),
            suffix_tokens: strings(&[
                " LTDA", " S/A", " SA ", " ME ", " EPP", " MEI", " EIRELI", " TRANSPORT",
                " LOGIST", " COMERC", " INDUSTR", " SERVI", " DISTRIB",
            ]),
            label_prefixes: strings(&[
                "PRESTADOR DE SERVICOS",
                "PRESTADOR DE SERVICO",
                "RAZAO SOCIAL",
                "NOME EMPRESARIAL",
                "PRESTADOR",
                "EMITENTE",
                "EMISSOR",
                "RAZAO",
            ]),
            trailing_tokens: strings(&[
                "RUA", "R.", "AV", "AV.", "AVENIDA", "ROD", "ROD.", "RODOVIA", "ESTRADA",
                "ALAMEDA", "TRAVESSA", "PRACA", "BAIRRO", "CEP", "MUNICIPIO", "ENDERECO",
                "CIDADE", "KM",
            ]),
            state_codes: strings(&[
                "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS",
                "MG", "PA", "PB", "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC",
                "SP", "SE", "TO",
            ]),
            issuer_labels: strings(&["EMITENTE", "EMISSOR", "PRESTADOR"]),
            marker_tokens: strings(&["DACTE", "CONHECIMENTO DE TRANSPORTE"]),
            type_markers: TypeMarkers::default(),
        }
    }
}

impl Vocabulary {
    /// Whether folded upper-case text contains a negative token.
    pub fn has_negative_token(&self, folded: &str) -> bool {
        self.negative_tokens.iter().any(|t| folded.contains(t.as_str()))
    }

    /// Number of suffix-token occurrences in folded upper-case text.
    pub fn suffix_hits(&self, folded: &str) -> usize {
        let padded = format!(" {} ", folded);
        self.suffix_tokens
            .iter()
            .map(|t| padded.matches(t.as_str()).count())
            .sum()
    }

    pub fn is_state_code(&self, word: &str) -> bool {
        self.state_codes.iter().any(|s| s == word)
    }

    pub fn is_trailing_token(&self, word: &str) -> bool {
        self.trailing_tokens.iter().any(|t| t == word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_hits_are_word_anchored() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.suffix_hits("ACME TRANSPORTES LTDA"), 2);
        assert_eq!(vocab.suffix_hits("JOAO DA SILVA ME"), 1);
        assert_eq!(vocab.suffix_hits("ARMENIO"), 0);
    }

    #[test]
    fn test_negative_tokens() {
        let vocab = Vocabulary::default();
        assert!(vocab.has_negative_token("CHAVE DE ACESSO"));
        assert!(vocab.has_negative_token("DECLARO QUE RECEBI"));
        assert!(!vocab.has_negative_token("ACME TRANSPORTES LTDA"));
    }

    #[test]
    fn test_label_prefixes_longest_first() {
        let vocab = Vocabulary::default();
        let pos_long = vocab.label_prefixes.iter().position(|l| l == "RAZAO SOCIAL");
        let pos_short = vocab.label_prefixes.iter().position(|l| l == "RAZAO");
        assert!(pos_long < pos_short);
    }
}
