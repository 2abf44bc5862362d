//! sitesift entry point.
//!
//! Compiles the regexes, expands the input glob, validates that the output
//! template has one placeholder per capture group, and runs the scan pool.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use regex::bytes::Regex;
use sitegrab_core::Error;
use tracing_subscriber::EnvFilter;

mod cli;
mod rowfmt;
mod scan;
mod split;

use rowfmt::RowFormat;

/// Buffer in front of a file output sink.
const OUTPUT_BUFFER: usize = 4 * 1024 * 1024;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();

    let mut regexes = Vec::with_capacity(args.regexp.len());
    for pattern in &args.regexp {
        let re = Regex::new(pattern).map_err(|e| Error::Regex {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        regexes.push(re);
    }

    let files: Vec<PathBuf> = glob::glob(&args.input)
        .map_err(|e| Error::Glob { pattern: args.input.clone(), message: e.to_string() })?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable glob entry");
                None
            }
        })
        .collect();

    let format = RowFormat::parse(&args.format);
    let total_groups = scan::total_capture_groups(&regexes);
    if format.placeholders() != total_groups {
        anyhow::bail!(
            "output format has {} placeholder(s) but the regexes capture {} group(s)",
            format.placeholders(),
            total_groups
        );
    }

    let out: Box<dyn Write + Send> = if args.output.is_empty() {
        Box::new(std::io::stdout())
    } else {
        let file = std::fs::File::create(&args.output).map_err(|e| Error::CreateFile {
            path: args.output.clone(),
            source: e,
        })?;
        Box::new(BufWriter::with_capacity(OUTPUT_BUFFER, file))
    };

    tracing::info!(files = files.len(), regexes = regexes.len(), "starting sift");

    scan::run(
        files,
        scan::ScanOptions { regexes, format, required_matches: args.requiredmatches },
        out,
    )?;

    Ok(())
}
