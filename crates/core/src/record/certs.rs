//! Captured certificate chains in serialized records.
//!
//! Chains are stored verbatim as DER. The JSON encoding carries each
//! certificate as a base64 string; the text encoding renders a PEM block.
//! Decoding X.509 structure is somebody else's job.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serializer;
use serde::ser::SerializeSeq;

const PEM_LINE_WIDTH: usize = 64;

/// Render one DER certificate as a PEM block, trailing newline included.
pub fn pem_certificate(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / PEM_LINE_WIDTH + 64);
    out.push_str("-----BEGIN CERTIFICATE-----\n");
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(PEM_LINE_WIDTH));
        out.push_str(line);
        out.push('\n');
        rest = tail;
    }
    out.push_str("-----END CERTIFICATE-----\n");
    out
}

/// Serialize a DER chain as a sequence of base64 strings.
pub(super) fn serialize_der_chain<S: Serializer>(
    chain: &[Vec<u8>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(chain.len()))?;
    for der in chain {
        seq.serialize_element(&STANDARD.encode(der))?;
    }
    seq.end()
}
