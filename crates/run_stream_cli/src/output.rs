//! Newline-delimited JSON output.

use std::io::{self, Write};

use run_stream::{NormalizedRecord, RecordSink, StreamError};

/// Writes each record as one compact JSON line.
///
/// Write failures (e.g. a closed pipe) stop further output and are reported
/// by [`finish`](Self::finish); the stream itself keeps draining.
pub struct JsonLinesSink<W> {
    writer: W,
    written: usize,
    write_error: Option<io::Error>,
    outcome: Option<Result<(), StreamError>>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            write_error: None,
            outcome: None,
        }
    }

    fn write_record(&mut self, record: &NormalizedRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Number of records written, or the first failure.
    pub fn finish(self) -> anyhow::Result<usize> {
        if let Some(error) = self.write_error {
            return Err(anyhow::Error::new(error).context("failed to write records"));
        }
        match self.outcome {
            Some(Ok(())) => Ok(self.written),
            Some(Err(error)) => Err(error.into()),
            None => anyhow::bail!("stream ended without a terminal result"),
        }
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn on_record(&mut self, record: NormalizedRecord) {
        if self.write_error.is_some() {
            return;
        }
        match self.write_record(&record) {
            Ok(()) => self.written += 1,
            Err(error) => {
                tracing::warn!(error = %error, "stopping record output");
                self.write_error = Some(error);
            }
        }
    }

    fn on_error(&mut self, error: StreamError) {
        self.outcome = Some(Err(error));
    }

    fn on_complete(&mut self) {
        self.outcome = Some(Ok(()));
    }
}
