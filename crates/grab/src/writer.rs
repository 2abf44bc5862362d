//! Writer workers: encoded records to bucketed, optionally compressed files.
//!
//! A writer owns at most one open file. The file is created lazily when a
//! record arrives and no slot is open, named after that record's site, and
//! rotated once `records_per_file` records have been written. With
//! compression on, the whole file is one LZ4 frame using 4 MiB blocks.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use lz4_flex::frame::{BlockSize, FrameEncoder, FrameInfo};
use sitegrab_core::{EncodedRecord, Error, GrabConfig, OutputFormat, bucket};

enum Sink {
    Plain(File),
    Lz4(Box<FrameEncoder<File>>),
}

impl Sink {
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            Sink::Plain(file) => file.write_all(data),
            Sink::Lz4(encoder) => encoder.write_all(data),
        }
    }

    fn finish(self) -> std::io::Result<()> {
        match self {
            Sink::Plain(_) => Ok(()),
            Sink::Lz4(encoder) => encoder.finish().map(drop).map_err(std::io::Error::other),
        }
    }
}

struct OpenFile {
    path: PathBuf,
    sink: Sink,
    written: usize,
}

/// One writer worker's file state.
pub struct RecordWriter {
    folder: String,
    format: OutputFormat,
    compress: bool,
    records_per_file: usize,
    buckets: u64,
    open: Option<OpenFile>,
}

impl RecordWriter {
    pub fn new(config: &GrabConfig, format: OutputFormat) -> Self {
        Self {
            folder: config.output_folder.clone(),
            format,
            compress: config.compress,
            records_per_file: config.records_per_file,
            buckets: config.buckets,
            open: None,
        }
    }

    /// Append one record, opening or rotating the output file as needed.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`Error`] when the file or its folder cannot be
    /// created. I/O errors on an already-open file are logged and swallowed,
    /// so one bad disk write does not take the run down.
    pub fn write(&mut self, record: &EncodedRecord) -> Result<(), Error> {
        if self.open.is_none() {
            self.open = Some(self.create_for(&record.site)?);
        }

        let open = self.open.as_mut().expect("file slot just filled");
        if let Err(e) = open.sink.write_all(&record.data) {
            tracing::warn!(path = %open.path.display(), error = %e, "error writing record");
        }
        open.written += 1;

        if open.written == self.records_per_file {
            self.rotate();
        }
        Ok(())
    }

    /// Flush and close the current file, if any. Called on queue drain and
    /// on rotation.
    pub fn finish(&mut self) {
        self.rotate();
    }

    fn rotate(&mut self) {
        if let Some(open) = self.open.take()
            && let Err(e) = open.sink.finish()
        {
            tracing::warn!(path = %open.path.display(), error = %e, "error closing record file");
        }
    }

    fn create_for(&self, site: &str) -> Result<OpenFile, Error> {
        let path = bucket::record_path(&self.folder, site, self.buckets, self.format, self.compress);

        bucket::ensure_parent_dirs(&path).map_err(|e| Error::CreateFolder {
            path: path.display().to_string(),
            source: e,
        })?;

        let file = File::create(&path).map_err(|e| Error::CreateFile {
            path: path.display().to_string(),
            source: e,
        })?;

        let sink = if self.compress {
            let info = FrameInfo::new().block_size(BlockSize::Max4MB);
            Sink::Lz4(Box::new(FrameEncoder::with_frame_info(info, file)))
        } else {
            Sink::Plain(file)
        };

        Ok(OpenFile { path, sink, written: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn config(dir: &std::path::Path, records_per_file: usize, compress: bool) -> GrabConfig {
        GrabConfig {
            output_folder: dir.display().to_string(),
            records_per_file,
            buckets: 1,
            compress,
            ..Default::default()
        }
    }

    fn record(site: &str, data: &str) -> EncodedRecord {
        EncodedRecord { site: site.to_string(), data: data.as_bytes().to_vec() }
    }

    #[test]
    fn test_file_named_after_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordWriter::new(&config(dir.path(), 2, false), OutputFormat::Txt);

        writer.write(&record("alpha.test", "a")).unwrap();
        writer.write(&record("beta.test", "b")).unwrap();
        writer.finish();

        let contents = std::fs::read_to_string(dir.path().join("alpha.test.txt")).unwrap();
        assert_eq!(contents, "ab");
        assert!(!dir.path().join("beta.test.txt").exists());
    }

    #[test]
    fn test_rotation_after_records_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordWriter::new(&config(dir.path(), 2, false), OutputFormat::Txt);

        writer.write(&record("alpha.test", "a")).unwrap();
        writer.write(&record("beta.test", "b")).unwrap();
        // Third record lands in a fresh file named after its own site.
        writer.write(&record("gamma.test", "c")).unwrap();
        writer.finish();

        assert_eq!(std::fs::read_to_string(dir.path().join("alpha.test.txt")).unwrap(), "ab");
        assert_eq!(std::fs::read_to_string(dir.path().join("gamma.test.txt")).unwrap(), "c");
    }

    #[test]
    fn test_one_record_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordWriter::new(&config(dir.path(), 1, false), OutputFormat::Json);

        writer.write(&record("alpha.test", "{}\n")).unwrap();
        writer.write(&record("beta.test", "{}\n")).unwrap();
        writer.finish();

        assert!(dir.path().join("alpha.test.json").exists());
        assert!(dir.path().join("beta.test.json").exists());
    }

    #[test]
    fn test_compressed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordWriter::new(&config(dir.path(), 2, true), OutputFormat::Txt);

        writer.write(&record("alpha.test", "first+++++\n")).unwrap();
        writer.write(&record("beta.test", "second+++++\n")).unwrap();
        writer.finish();

        let file = File::open(dir.path().join("alpha.test.txt.lz4")).unwrap();
        let mut decoder = lz4_flex::frame::FrameDecoder::new(file);
        let mut contents = String::new();
        decoder.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "first+++++\nsecond+++++\n");
    }

    #[test]
    fn test_buckets_create_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = GrabConfig {
            output_folder: dir.path().display().to_string(),
            records_per_file: 1,
            buckets: 16,
            ..Default::default()
        };
        let mut writer = RecordWriter::new(&cfg, OutputFormat::Txt);
        writer.write(&record("alpha.test", "a")).unwrap();
        writer.finish();

        let path = bucket::record_path(
            &cfg.output_folder,
            "alpha.test",
            16,
            OutputFormat::Txt,
            false,
        );
        assert!(path.exists());
    }
}
