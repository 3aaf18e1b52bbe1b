use tracing::{debug, warn};

use crate::buffer::{StreamBuffer, Utf8Decoder};
use crate::envelope::{normalize_object, NormalizedRecord};
use crate::scanner::{find_object_start, ObjectScanner, ScanOutcome};

/// Incremental parser for concatenated JSON object streams.
///
/// Fragments may split objects anywhere, including inside strings and inside
/// multi-byte characters; records come out once, in closing-brace order.
#[derive(Debug, Default)]
pub struct RecordStreamParser {
    decoder: Utf8Decoder,
    buffer: StreamBuffer,
    scanner: ObjectScanner,
    skipped_spans: usize,
}

impl RecordStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw transport bytes and drain every complete record.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<NormalizedRecord> {
        let text = self.decoder.decode(bytes);
        self.feed_str(&text)
    }

    /// Feed already-decoded text and drain every complete record.
    pub fn feed_str(&mut self, text: &str) -> Vec<NormalizedRecord> {
        self.buffer.append(text);
        self.drain()
    }

    /// Final pass at end of input. Trailing text that never formed an object
    /// is discarded.
    pub fn finish(&mut self) -> Vec<NormalizedRecord> {
        let tail = self.decoder.finish();
        self.buffer.append(&tail);
        let records = self.drain();

        if !self.buffer.is_blank() {
            warn!(
                discarded_bytes = self.buffer.len(),
                "discarding trailing text after last complete object"
            );
        }
        self.buffer.clear();
        self.scanner.reset();
        records
    }

    /// Parse a complete payload in one shot.
    pub fn parse_all(input: &str) -> Vec<NormalizedRecord> {
        let mut parser = Self::default();
        let mut records = parser.feed_str(input);
        records.extend(parser.finish());
        records
    }

    pub fn buffered(&self) -> &str {
        self.buffer.as_str()
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.is_blank()
    }

    /// Number of candidate spans skipped because they did not parse.
    pub fn skipped_spans(&self) -> usize {
        self.skipped_spans
    }

    fn drain(&mut self) -> Vec<NormalizedRecord> {
        let mut records = Vec::new();

        loop {
            match self.scanner.scan(self.buffer.as_str()) {
                ScanOutcome::Found { end, object, .. } => {
                    self.buffer.consume(end);
                    self.scanner.reset();
                    records.push(normalize_object(object));
                }
                ScanOutcome::Invalid { skip_to } => {
                    self.skipped_spans += 1;
                    warn!(skip_to, "skipping unparseable object candidate");
                    self.buffer.consume(skip_to);
                    self.scanner.reset();
                }
                ScanOutcome::Incomplete => {
                    // Text without any opening brace can never become part of
                    // an object.
                    if find_object_start(self.buffer.as_str()).is_none() && !self.buffer.is_empty() {
                        debug!(bytes = self.buffer.len(), "dropping text outside any object");
                        self.buffer.clear();
                        self.scanner.reset();
                    }
                    break;
                }
            }
        }

        records
    }
}
