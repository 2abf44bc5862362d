//! The fetch-result record model and its two on-disk encodings.
//!
//! A [`FetchResult`] is the unit of output: one per hostname that survives
//! filtering. Records are encoded to bytes by [`encode`] and concatenated
//! back-to-back in bucketed output files; the text encoding terminates every
//! record with [`RECORD_DELIMITER`], which is the boundary the sift engine
//! splits on.

use serde::Serialize;

mod certs;
mod json;
mod text;

pub use certs::pem_certificate;
pub use text::RECORD_DELIMITER;

/// Success status codes: a record with an empty `error` always carries one
/// of these.
pub const SUCCESS_CODES: [u16; 2] = [200, 206];

/// Everything observed while fetching one site.
///
/// `site` is the hostname exactly as submitted; `url` reflects redirect
/// following and `www.` prefixing. `code` is `0` iff the fetch ended in a
/// non-HTTP error, in which case `error` is non-empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchResult {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub site: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip: String,

    #[serde(rename = "resultcode", skip_serializing_if = "is_zero")]
    pub code: u16,

    /// Peer certificate chain in presentation order, raw DER.
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "certs::serialize_der_chain"
    )]
    pub certificates: Vec<Vec<u8>>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,

    #[serde(rename = "headers", skip_serializing_if = "String::is_empty")]
    pub header: String,
}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

/// The `(site, serialized bytes)` pair queued from fetch workers to writers.
#[derive(Debug, Clone)]
pub struct EncodedRecord {
    pub site: String,
    pub data: Vec<u8>,
}

/// Output encodings selectable per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Newline-delimited JSON, one object per record.
    Json,
    /// Human-readable framed text, records terminated by `+++++\n`.
    Txt,
}

impl OutputFormat {
    /// File extension, without the optional `.lz4` suffix.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Txt => "txt",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "txt" => Ok(OutputFormat::Txt),
            other => Err(crate::Error::UnknownFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encode one record in the selected format.
pub fn encode(result: &FetchResult, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Json => json::encode(result),
        OutputFormat::Txt => text::encode(result),
    }
}

/// Normalize an accumulated warning multiset: lexicographic sort, then
/// adjacent-duplicate removal.
pub fn normalize_warnings(warnings: &mut Vec<String>) {
    warnings.sort_unstable();
    warnings.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("txt").unwrap(), OutputFormat::Txt);
        assert!(OutputFormat::from_str("plain").is_err());
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::Txt.extension(), "txt");
    }

    #[test]
    fn test_normalize_warnings_sorts_and_dedups() {
        let mut warnings = vec![
            "redirect".to_string(),
            "prefix_www".to_string(),
            "redirect".to_string(),
            "redirect".to_string(),
        ];
        normalize_warnings(&mut warnings);
        assert_eq!(warnings, vec!["prefix_www", "redirect"]);
    }

    #[test]
    fn test_normalize_warnings_empty() {
        let mut warnings: Vec<String> = Vec::new();
        normalize_warnings(&mut warnings);
        assert!(warnings.is_empty());
    }
}
