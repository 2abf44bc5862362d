//! Bucketed output paths.
//!
//! One output file per site (or per `records_per_file` batch) would put
//! millions of entries in a single directory, so files are spread across
//! `buckets` subdirectories keyed by a stable hash of the site name:
//! `<folder>/<bucket>/<site>.<ext>[.lz4]`, where `<bucket>` is the
//! zero-padded lowercase hex of `xxh64(site) mod buckets`. With
//! `buckets <= 1` the subdirectory level is omitted.

use std::path::{Path, PathBuf};

use xxhash_rust::xxh64::xxh64;

use crate::record::OutputFormat;

/// Resolve the output path for a record. Pure: no directories are created.
pub fn record_path(
    folder: &str,
    site: &str,
    buckets: u64,
    format: OutputFormat,
    compress: bool,
) -> PathBuf {
    let mut path = PathBuf::from(folder);
    if buckets > 1 {
        path.push(format!("{:04x}", xxh64(site.as_bytes(), 0) % buckets));
    }
    path.push(site);

    let mut name = path.into_os_string();
    name.push(".");
    name.push(format.extension());
    if compress {
        name.push(".lz4");
    }
    PathBuf::from(name)
}

/// Create the directory a record file lands in, recursively.
pub fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_is_four_hex_digits() {
        let path = record_path("out", "example.com", 4096, OutputFormat::Txt, false);
        let bucket = path
            .parent()
            .unwrap()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(bucket.len(), 4);
        assert!(bucket.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!bucket.chars().any(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_bucket_is_stable() {
        let a = record_path("out", "example.com", 4096, OutputFormat::Txt, false);
        let b = record_path("out", "example.com", 4096, OutputFormat::Txt, false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_bucket_within_range() {
        for site in ["a", "example.com", "www.example.org", "zz.test"] {
            let path = record_path("out", site, 16, OutputFormat::Json, false);
            let bucket = path
                .parent()
                .unwrap()
                .file_name()
                .unwrap()
                .to_str()
                .unwrap();
            let value = u64::from_str_radix(bucket, 16).unwrap();
            assert!(value < 16);
        }
    }

    #[test]
    fn test_single_bucket_omits_subfolder() {
        let path = record_path("out", "example.com", 1, OutputFormat::Txt, false);
        assert_eq!(path, PathBuf::from("out/example.com.txt"));
        let path = record_path("out", "example.com", 0, OutputFormat::Txt, false);
        assert_eq!(path, PathBuf::from("out/example.com.txt"));
    }

    #[test]
    fn test_extensions() {
        let path = record_path("out", "example.com", 1, OutputFormat::Json, true);
        assert_eq!(path, PathBuf::from("out/example.com.json.lz4"));
        let path = record_path("", "example.com", 1, OutputFormat::Txt, true);
        assert_eq!(path, PathBuf::from("example.com.txt.lz4"));
    }

    #[test]
    fn test_ensure_parent_dirs_empty_parent() {
        assert!(ensure_parent_dirs(Path::new("plainfile.txt")).is_ok());
    }
}
