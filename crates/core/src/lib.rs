//! Core types and shared functionality for sitegrab.
//!
//! This crate provides:
//! - The fetch-result record model and its JSON / framed-text encodings
//! - Bucketed output path resolution
//! - Grab-engine configuration with layered loading
//! - Fatal error types shared by the binaries

pub mod bucket;
pub mod config;
pub mod error;
pub mod record;

pub use config::{ConfigError, GrabConfig, cpu_count};
pub use error::Error;
pub use record::{EncodedRecord, FetchResult, OutputFormat, RECORD_DELIMITER};
