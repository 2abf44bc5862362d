//! Framed plain-text encoding.
//!
//! Layout per record:
//!
//! ```text
//! *Site: <site>
//! *URL: <url>
//! *Warnings: w1, w2            (only when warnings are present)
//! *Error: <error>              (only on failure)
//! *IP: <ip>                    (only on success)
//! *Resultcode: <code>          (only on success)
//! *****
//! <certificate PEM>            (repeated per captured certificate)
//! -----
//! <header block>
//! =====
//! <body>
//! +++++
//! ```
//!
//! The terminating `+++++` line doubles as the inter-record delimiter the
//! sift engine splits on; nothing else in the encoding can produce that
//! exact line at a record boundary.

use super::{FetchResult, certs};

/// The literal inter-record boundary, including its newline.
pub const RECORD_DELIMITER: &[u8] = b"+++++\n";

/// Encode one record in the framed text layout.
pub fn encode(result: &FetchResult) -> Vec<u8> {
    let mut out = String::with_capacity(result.header.len() + result.body.len() + 128);

    out.push_str("*Site: ");
    out.push_str(&result.site);
    out.push('\n');

    out.push_str("*URL: ");
    out.push_str(&result.url);
    out.push('\n');

    if !result.warnings.is_empty() {
        out.push_str("*Warnings: ");
        out.push_str(&result.warnings.join(", "));
        out.push('\n');
    }

    if !result.error.is_empty() {
        out.push_str("*Error: ");
        out.push_str(&result.error);
        out.push('\n');
    } else {
        out.push_str("*IP: ");
        out.push_str(&result.ip);
        out.push('\n');
        out.push_str(&format!("*Resultcode: {}\n", result.code));
    }

    for der in &result.certificates {
        out.push_str("*****\n");
        out.push_str(&certs::pem_certificate(der));
    }

    if result.error.is_empty() {
        out.push_str("-----\n");
        out.push_str(&result.header);
        out.push_str("=====\n");
        out.push_str(&result.body);
        out.push('\n');
    }

    out.push_str("+++++\n");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_layout() {
        let result = FetchResult {
            site: "example.com".to_string(),
            url: "https://example.com/".to_string(),
            ip: "93.184.216.34:443".to_string(),
            code: 200,
            header: "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n".to_string(),
            body: "hello".to_string(),
            ..Default::default()
        };
        let text = String::from_utf8(encode(&result)).unwrap();
        assert_eq!(
            text,
            "*Site: example.com\n\
             *URL: https://example.com/\n\
             *IP: 93.184.216.34:443\n\
             *Resultcode: 200\n\
             -----\n\
             HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n\
             =====\n\
             hello\n\
             +++++\n"
        );
    }

    #[test]
    fn test_error_layout_skips_response_sections() {
        let result = FetchResult {
            site: "nowhere.invalid".to_string(),
            url: "https://www.nowhere.invalid/".to_string(),
            error: "dns error".to_string(),
            warnings: vec!["prefix_www".to_string()],
            ..Default::default()
        };
        let text = String::from_utf8(encode(&result)).unwrap();
        assert!(text.contains("*Warnings: prefix_www\n"));
        assert!(text.contains("*Error: dns error\n"));
        assert!(!text.contains("*IP: "));
        assert!(!text.contains("*Resultcode: "));
        assert!(!text.contains("-----\n"));
        assert!(text.ends_with("+++++\n"));
    }

    #[test]
    fn test_warnings_joined_with_comma_space() {
        let result = FetchResult {
            site: "foo.test".to_string(),
            url: "https://www.foo.test/".to_string(),
            code: 200,
            warnings: vec!["redirect".to_string(), "redirect_to_other_host".to_string()],
            ..Default::default()
        };
        let text = String::from_utf8(encode(&result)).unwrap();
        assert!(text.contains("*Warnings: redirect, redirect_to_other_host\n"));
    }

    #[test]
    fn test_certificates_fenced() {
        let result = FetchResult {
            site: "example.com".to_string(),
            url: "https://example.com/".to_string(),
            code: 200,
            certificates: vec![vec![1, 2, 3], vec![4, 5, 6]],
            ..Default::default()
        };
        let text = String::from_utf8(encode(&result)).unwrap();
        assert_eq!(text.matches("*****\n").count(), 2);
        assert_eq!(text.matches("-----BEGIN CERTIFICATE-----").count(), 2);
    }

    #[test]
    fn test_single_trailing_delimiter() {
        let result = FetchResult {
            site: "example.com".to_string(),
            error: "boom".to_string(),
            ..Default::default()
        };
        let data = encode(&result);
        assert!(data.ends_with(RECORD_DELIMITER));
        let text = String::from_utf8(data).unwrap();
        assert_eq!(text.matches("+++++\n").count(), 1);
    }
}
