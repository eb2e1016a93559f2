use std::io::{ErrorKind, Read};

use serde::Serialize;
use tracing::{info, warn};

use super::decoder::{DecodeOptions, RecordDecoder};
use super::layout::CopybookLayout;
use super::record::MainframeRecord;
use crate::error::{CodecError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub records_decoded: u64,
    pub errors: u64,
    pub bytes_read: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Reading,
    Exhausted,
}

/// Fixed-width record iterator over a byte reader
///
/// A field error is yielded for its record and iteration continues; a short
/// final chunk or a read failure is yielded once and ends the batch.
#[derive(Debug)]
pub struct BatchDecoder<'a, R> {
    reader: R,
    layout: &'a CopybookLayout,
    decoder: RecordDecoder,
    record_length: usize,
    buffer: Vec<u8>,
    next_record: u64,
    state: BatchState,
    summary: BatchSummary,
}

/// Decode a batch of `record_length` records
pub fn decode_batch<R: Read>(
    reader: R,
    layout: &CopybookLayout,
    record_length: usize,
    options: DecodeOptions,
) -> Result<BatchDecoder<'_, R>> {
    BatchDecoder::new(reader, layout, record_length, options)
}

impl<'a, R: Read> BatchDecoder<'a, R> {
    pub fn new(
        reader: R,
        layout: &'a CopybookLayout,
        record_length: usize,
        options: DecodeOptions,
    ) -> Result<Self> {
        if record_length < layout.extent() {
            return Err(CodecError::layout(format!(
                "Record length {} is shorter than layout {} ({} bytes)",
                record_length,
                layout.name(),
                layout.extent()
            )));
        }

        Ok(Self {
            reader,
            layout,
            decoder: RecordDecoder::new(options),
            record_length,
            buffer: vec![0u8; record_length],
            next_record: 0,
            state: BatchState::Reading,
            summary: BatchSummary::default(),
        })
    }

    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == BatchState::Exhausted
    }

    /// Fill the buffer; returns the byte count, short only at EOF
    fn fill(&mut self) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < self.record_length {
            match self.reader.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn finish(&mut self) {
        self.state = BatchState::Exhausted;
        info!(
            "Batch {} done: {} records, {} errors, {} bytes",
            self.layout.name(),
            self.summary.records_decoded,
            self.summary.errors,
            self.summary.bytes_read
        );
    }
}

impl<R: Read> Iterator for BatchDecoder<'_, R> {
    type Item = Result<MainframeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == BatchState::Exhausted {
            return None;
        }

        let filled = match self.fill() {
            Ok(filled) => filled,
            Err(e) => {
                self.summary.errors += 1;
                self.finish();
                return Some(Err(CodecError::Io(e)));
            },
        };
        self.summary.bytes_read += filled as u64;

        let record_number = self.next_record;
        self.next_record += 1;

        if filled == 0 {
            self.finish();
            return None;
        }
        if filled < self.record_length {
            warn!(
                "Truncated record #{} ({} bytes, expected {})",
                record_number, filled, self.record_length
            );
            self.summary.errors += 1;
            self.finish();
            return Some(Err(CodecError::TruncatedRecord {
                record_number,
                expected: self.record_length,
                actual: filled,
            }));
        }

        let result = self.decoder.decode(record_number, &self.buffer, self.layout);
        match &result {
            Ok(_) => self.summary.records_decoded += 1,
            Err(e) => {
                warn!("Record #{}: {}", record_number, e);
                self.summary.errors += 1;
            },
        }
        Some(result)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::mainframe::layout::{FieldKind, FieldSpec};
    use std::io::Cursor;

    fn layout() -> CopybookLayout {
        CopybookLayout::new(
            "PAIR",
            4,
            vec![
                FieldSpec::new("CODE", 0, 2, FieldKind::Text),
                FieldSpec::new("QTY", 2, 2, FieldKind::PackedDecimal),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_full_records_then_truncation() {
        let mut data = vec![0xC1, 0xC2, 0x01, 0x2C, 0xC3, 0xC4, 0x04, 0x5D];
        data.extend_from_slice(&[0xC5, 0xC6]);
        let layout = layout();
        let mut batch = decode_batch(Cursor::new(data), &layout, 4, DecodeOptions::default()).unwrap();

        let first = batch.next().unwrap().unwrap();
        assert_eq!(first.record_number(), 0);
        assert_eq!(first.get("QTY").unwrap().to_string(), "12");
        let second = batch.next().unwrap().unwrap();
        assert_eq!(second.get("QTY").unwrap().to_string(), "-45");

        let err = batch.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedRecord {
                record_number: 2,
                expected: 4,
                actual: 2
            }
        ));
        assert!(batch.next().is_none());
        assert!(batch.is_exhausted());

        let summary = batch.summary();
        assert_eq!(summary.records_decoded, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.bytes_read, 10);
    }

    #[test]
    fn test_field_error_does_not_stop_batch() {
        let data = vec![0xC1, 0xC2, 0x01, 0x27, 0xC3, 0xC4, 0x04, 0x5C];
        let layout = layout();
        let results: Vec<_> = decode_batch(Cursor::new(data), &layout, 4, DecodeOptions::default())
            .unwrap()
            .collect();

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(CodecError::InvalidSign { .. })));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_record_length_padding_is_skipped() {
        let data = vec![0xC1, 0xC2, 0x01, 0x2C, 0x00, 0x00, 0xC3, 0xC4, 0x04, 0x5D, 0x00, 0x00];
        let layout = layout();
        let records: Vec<_> = decode_batch(Cursor::new(data), &layout, 6, DecodeOptions::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].record_number(), 1);
    }

    #[test]
    fn test_record_length_shorter_than_layout() {
        let layout = layout();
        let result = decode_batch(Cursor::new(Vec::new()), &layout, 3, DecodeOptions::default());
        assert!(matches!(result, Err(CodecError::Layout(_))));
    }

    #[test]
    fn test_read_failure_ends_batch() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::BrokenPipe, "gone"))
            }
        }

        let layout = layout();
        let mut batch = decode_batch(Failing, &layout, 4, DecodeOptions::default()).unwrap();
        assert!(matches!(batch.next(), Some(Err(CodecError::Io(_)))));
        assert!(batch.next().is_none());
    }

    #[test]
    fn test_empty_input() {
        let layout = layout();
        let mut batch = decode_batch(Cursor::new(Vec::new()), &layout, 4, DecodeOptions::default()).unwrap();
        assert!(batch.next().is_none());
        assert_eq!(batch.summary(), BatchSummary::default());
    }
}
