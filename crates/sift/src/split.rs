//! Streaming record tokenizer.
//!
//! Splits any byte stream on the literal `+++++\n` boundary without ever
//! holding more than one record (plus one read chunk) in memory. Grab output
//! files routinely run to gigabytes; the splitter's buffer only grows to the
//! largest single record it meets.

use std::io::Read;

use sitegrab_core::RECORD_DELIMITER;

const READ_CHUNK: usize = 64 * 1024;

/// Pulls delimiter-separated records off a reader.
pub struct RecordSplitter<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Consumed prefix of `buffer`; compacted before each refill.
    start: usize,
    eof: bool,
}

impl<R: Read> RecordSplitter<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buffer: Vec::new(), start: 0, eof: false }
    }

    /// The next record, without its delimiter. Trailing bytes after the last
    /// delimiter form a final record; a stream ending exactly on a delimiter
    /// does not produce an empty one.
    pub fn next_record(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(pos) = find(&self.buffer[self.start..], RECORD_DELIMITER) {
                let record = self.buffer[self.start..self.start + pos].to_vec();
                self.start += pos + RECORD_DELIMITER.len();
                return Ok(Some(record));
            }

            if self.eof {
                if self.start >= self.buffer.len() {
                    return Ok(None);
                }
                let record = self.buffer[self.start..].to_vec();
                self.start = self.buffer.len();
                return Ok(Some(record));
            }

            self.refill()?;
        }
    }

    fn refill(&mut self) -> std::io::Result<()> {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }

        let old_len = self.buffer.len();
        self.buffer.resize(old_len + READ_CHUNK, 0);
        let read = self.reader.read(&mut self.buffer[old_len..])?;
        self.buffer.truncate(old_len + read);
        if read == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn split_all(data: &[u8]) -> Vec<Vec<u8>> {
        let mut splitter = RecordSplitter::new(Cursor::new(data.to_vec()));
        let mut records = Vec::new();
        while let Some(record) = splitter.next_record().unwrap() {
            records.push(record);
        }
        records
    }

    #[test]
    fn test_split_two_records() {
        let records = split_all(b"first+++++\nsecond+++++\n");
        assert_eq!(records, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn test_trailing_bytes_form_final_record() {
        let records = split_all(b"first+++++\ntail without delimiter");
        assert_eq!(records, vec![b"first".to_vec(), b"tail without delimiter".to_vec()]);
    }

    #[test]
    fn test_no_empty_record_after_final_delimiter() {
        let records = split_all(b"only+++++\n");
        assert_eq!(records, vec![b"only".to_vec()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split_all(b"").is_empty());
    }

    #[test]
    fn test_empty_record_between_delimiters() {
        let records = split_all(b"+++++\n+++++\n");
        assert_eq!(records, vec![b"".to_vec(), b"".to_vec()]);
    }

    #[test]
    fn test_delimiter_split_across_reads() {
        // A reader that trickles one byte at a time forces the delimiter to
        // straddle refills.
        struct OneByte(Cursor<Vec<u8>>);
        impl Read for OneByte {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = 1.min(buf.len());
                self.0.read(&mut buf[..n])
            }
        }

        let mut splitter = RecordSplitter::new(OneByte(Cursor::new(b"a+++++\nb+++++\n".to_vec())));
        let mut records = Vec::new();
        while let Some(record) = splitter.next_record().unwrap() {
            records.push(record);
        }
        assert_eq!(records, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_round_trip() {
        // Splitting and rejoining is lossless for delimiter-free records.
        let records: Vec<&[u8]> = vec![b"*Site: a\n", b"*Site: b\n", b"*Site: c\n"];
        let mut joined = Vec::new();
        for record in &records {
            joined.extend_from_slice(record);
            joined.extend_from_slice(RECORD_DELIMITER);
        }
        let split: Vec<Vec<u8>> = split_all(&joined);
        assert_eq!(split, records.iter().map(|r| r.to_vec()).collect::<Vec<_>>());
    }

    #[test]
    fn test_plus_runs_shorter_than_delimiter_stay_inside_records() {
        let records = split_all(b"a++++b+++++\nc");
        assert_eq!(records, vec![b"a++++b".to_vec(), b"c".to_vec()]);
    }
}
