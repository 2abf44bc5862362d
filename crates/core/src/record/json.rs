//! Newline-delimited JSON encoding.
//!
//! One object per record, one record per line. Empty fields are omitted
//! entirely, so an error record and a success record carry disjoint field
//! sets apart from `site` and `url`.

use super::FetchResult;

/// Encode one record as a single JSON line.
pub fn encode(result: &FetchResult) -> Vec<u8> {
    // FetchResult serialization cannot fail: all fields are strings,
    // integers, or byte vectors.
    let mut data = serde_json::to_vec(result).unwrap_or_default();
    data.push(b'\n');
    data
}
