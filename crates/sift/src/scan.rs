//! The record-scanning worker pool.
//!
//! File names flow through a bounded channel to one worker per CPU. Each
//! worker streams its file (transparently LZ4-decoding `.lz4` inputs),
//! splits it into records, and projects the configured regex capture groups
//! into formatted output rows. Workers share only the output sink and the
//! progress model.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::ProgressBar;
use lz4_flex::frame::FrameDecoder;
use regex::bytes::Regex;
use sitegrab_core::Error;

use crate::rowfmt::RowFormat;
use crate::split::RecordSplitter;

/// Read buffer in front of every input file.
const READ_BUFFER: usize = 32 * 1024 * 1024;
/// Initial per-file record estimate for the progress model.
const RECORDS_PER_FILE_GUESS: u64 = 100_000;

pub struct ScanOptions {
    pub regexes: Vec<Regex>,
    pub format: RowFormat,
    /// Regexes that must match before a row is emitted; -1 means all.
    pub required_matches: i64,
}

/// Capture groups across all regexes, in regex order.
pub fn total_capture_groups(regexes: &[Regex]) -> usize {
    regexes.iter().map(|re| re.captures_len() - 1).sum()
}

/// Each capture group's name, empty when unnamed.
fn group_names(regexes: &[Regex]) -> Vec<String> {
    regexes
        .iter()
        .flat_map(|re| re.capture_names().skip(1))
        .map(|name| name.unwrap_or_default().to_string())
        .collect()
}

struct Progress {
    bar: ProgressBar,
    files: u64,
    largest: AtomicU64,
}

impl Progress {
    fn new(files: u64) -> Self {
        Self {
            bar: ProgressBar::new(files * RECORDS_PER_FILE_GUESS),
            files,
            largest: AtomicU64::new(0),
        }
    }

    fn record_done(&self) {
        self.bar.inc(1);
    }

    /// Rescale the estimate when a file turns out bigger than any before it.
    fn file_done(&self, records: u64) {
        let previous = self.largest.fetch_max(records, Ordering::Relaxed);
        if records > previous {
            self.bar.set_length(records * self.files);
        }
    }
}

struct ScanContext {
    regexes: Vec<Regex>,
    format: RowFormat,
    required: usize,
    total_groups: usize,
    out: Mutex<Box<dyn Write + Send>>,
    progress: Progress,
}

#[derive(Debug, Default)]
struct FileStats {
    records: u64,
    matches: u64,
}

/// Scan every file, writing matched rows to `out`.
pub fn run(files: Vec<PathBuf>, options: ScanOptions, out: Box<dyn Write + Send>) -> Result<(), Error> {
    let total_groups = total_capture_groups(&options.regexes);
    let required = if options.required_matches < 0 {
        options.regexes.len()
    } else {
        options.required_matches as usize
    };

    let context = ScanContext {
        regexes: options.regexes,
        format: options.format,
        required,
        total_groups,
        out: Mutex::new(out),
        progress: Progress::new(files.len() as u64),
    };

    // Header row: the capture-group names through the same template. Skipped
    // when every group is anonymous, so default single-group scans stay
    // clean for piping.
    let names = group_names(&context.regexes);
    if names.iter().any(|name| !name.is_empty()) {
        write_row(&context, &names);
    }

    let workers = sitegrab_core::cpu_count();
    let (tx, rx) = crossbeam_channel::bounded::<PathBuf>(workers);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let rx = rx.clone();
            let context = &context;
            scope.spawn(move || {
                let mut results = vec![String::new(); context.total_groups];
                for path in rx.iter() {
                    match scan_file(&path, context, &mut results) {
                        Ok(stats) => {
                            context.progress.file_done(stats.records);
                            tracing::info!(
                                file = %path.display(),
                                matches = stats.matches,
                                records = stats.records,
                                "file done"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(file = %path.display(), error = %e, "error processing file");
                        }
                    }
                }
            });
        }

        for file in files {
            if tx.send(file).is_err() {
                break;
            }
        }
        drop(tx);
    });

    context.progress.bar.finish();

    if let Err(e) = context.out.lock().expect("output lock poisoned").flush() {
        tracing::warn!(error = %e, "error flushing output");
    }
    Ok(())
}

fn scan_file(path: &Path, context: &ScanContext, results: &mut [String]) -> std::io::Result<FileStats> {
    let file = File::open(path)?;
    let buffered = BufReader::with_capacity(READ_BUFFER, file);
    let reader: Box<dyn Read> = if is_lz4(path) {
        Box::new(FrameDecoder::new(buffered))
    } else {
        Box::new(buffered)
    };

    let mut splitter = RecordSplitter::new(reader);
    let mut stats = FileStats::default();

    while let Some(record) = splitter.next_record()? {
        stats.records += 1;
        if project(context, &record, results) {
            stats.matches += 1;
            write_row(context, results);
        }
        context.progress.record_done();
    }

    Ok(stats)
}

/// Run every regex against one record, filling `results` slot-for-slot.
/// Returns whether enough regexes matched to emit a row.
fn project(context: &ScanContext, record: &[u8], results: &mut [String]) -> bool {
    let mut matched = 0;
    let mut offset = 0;

    for re in &context.regexes {
        let groups = re.captures_len() - 1;
        match re.captures(record) {
            Some(caps) => {
                matched += 1;
                for i in 0..groups {
                    results[offset + i] = caps
                        .get(i + 1)
                        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                        .unwrap_or_default();
                }
            }
            None => {
                for slot in &mut results[offset..offset + groups] {
                    slot.clear();
                }
            }
        }
        offset += groups;
    }

    matched >= context.required
}

fn write_row(context: &ScanContext, values: &[String]) {
    let row = context.format.render(values);
    let mut out = context.out.lock().expect("output lock poisoned");
    if let Err(e) = out.write_all(row.as_bytes()) {
        tracing::warn!(error = %e, "error writing output row");
    }
}

fn is_lz4(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("lz4"))
}
