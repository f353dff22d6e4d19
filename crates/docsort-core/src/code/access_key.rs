//! The 44-digit fiscal access key (chave de acesso).

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::extract::patterns::ACCESS_KEY_RUN;
use crate::extract::text::{digits_only, normalize_number};

/// Length of an access key.
pub const ACCESS_KEY_LEN: usize = 44;

/// Document models of electronic transport documents (CT-e, CT-e OS).
pub const TRANSPORT_MODELS: [&str; 2] = ["57", "67"];

/// A validated 44-digit access key.
///
/// Field layout: UF (2), period AAMM (4), CNPJ (14), model (2), series (3),
/// number (9), emission type (1), numeric code (8), check digit (1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    /// Exactly 44 ASCII digits, else `None`.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() == ACCESS_KEY_LEN && value.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn uf(&self) -> &str {
        &self.0[0..2]
    }

    pub fn period(&self) -> &str {
        &self.0[2..6]
    }

    pub fn cnpj(&self) -> &str {
        &self.0[6..20]
    }

    pub fn model(&self) -> &str {
        &self.0[20..22]
    }

    pub fn series(&self) -> &str {
        &self.0[22..25]
    }

    /// Raw 9-digit document number.
    pub fn number_digits(&self) -> &str {
        &self.0[25..34]
    }

    pub fn emission_type(&self) -> &str {
        &self.0[34..35]
    }

    pub fn numeric_code(&self) -> &str {
        &self.0[35..43]
    }

    pub fn check_digit(&self) -> &str {
        &self.0[43..44]
    }

    pub fn is_transport(&self) -> bool {
        TRANSPORT_MODELS.contains(&self.model())
    }

    /// Document number without leading zeros; `None` when all zeros.
    pub fn number(&self) -> Option<String> {
        normalize_number(self.number_digits())
    }

    /// Mod-11 check over the first 43 digits.
    pub fn has_valid_check_digit(&self) -> bool {
        compute_check_digit(&self.0[..43]).is_some_and(|d| self.check_digit().starts_with(d))
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccessKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccessKey::parse(&value).ok_or_else(|| format!("not a 44-digit access key: {}", value))
    }
}

impl From<AccessKey> for String {
    fn from(key: AccessKey) -> Self {
        key.0
    }
}

/// Mod-11 check digit for a 43-digit prefix.
pub fn compute_check_digit(prefix: &str) -> Option<char> {
    if prefix.len() != ACCESS_KEY_LEN - 1 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let sum: u32 = prefix
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| (b - b'0') as u32 * (2 + (i as u32 % 8)))
        .sum();

    let rest = sum % 11;
    let digit = if rest < 2 { 0 } else { 11 - rest };
    char::from_digit(digit, 10)
}

/// Document number of a transport-document key.
pub fn nct_from_chave(key: &str) -> Option<String> {
    let key = AccessKey::parse(key)?;
    if !key.is_transport() {
        return None;
    }
    key.number()
}

/// Issuer CNPJ of a transport-document key.
pub fn cnpj_from_chave(key: &str) -> Option<String> {
    let key = AccessKey::parse(key)?;
    key.is_transport().then(|| key.cnpj().to_string())
}

/// `NN.NNN.NNN/NNNN-NN`; `None` unless given exactly 14 digits.
pub fn format_cnpj(cnpj: &str) -> Option<String> {
    if cnpj.len() != 14 || !cnpj.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!(
        "{}.{}.{}/{}-{}",
        &cnpj[0..2],
        &cnpj[2..5],
        &cnpj[5..8],
        &cnpj[8..12],
        &cnpj[12..14]
    ))
}

/// Find an access key in a decoded payload.
///
/// URL payloads are searched first for an allow-listed query parameter
/// holding exactly 44 digits; otherwise the digits of the whole payload are
/// searched for a 44-digit run.
pub fn parse_access_key(payload: &str, query_keys: &[String]) -> Option<AccessKey> {
    let payload = payload.trim();
    if payload.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(payload) {
        for name in query_keys {
            let found = url
                .query_pairs()
                .filter(|(k, _)| k == name)
                .map(|(_, v)| digits_only(&v))
                .find(|d| d.len() == ACCESS_KEY_LEN);
            if let Some(digits) = found {
                return AccessKey::parse(&digits);
            }
        }
    }

    let digits = digits_only(payload);
    ACCESS_KEY_RUN
        .find(&digits)
        .and_then(|m| AccessKey::parse(m.as_str()))
}
