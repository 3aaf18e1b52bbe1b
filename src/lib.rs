//! Incremental record parsing for long-lived agent run responses.
//!
//! A run response is a stream of concatenated JSON objects delivered in
//! fragments of arbitrary size. This crate turns that stream into ordered,
//! normalized records:
//!
//! - [`buffer`] accumulates decoded text and holds back split UTF-8 sequences;
//! - [`scanner`] finds the next complete top-level object in the buffer;
//! - [`envelope`] folds `{event, data}` envelopes into the flat legacy shape;
//! - [`parser`] composes the three into [`RecordStreamParser`];
//! - [`driver`] pulls fragments from a [`Transport`] and reports through a
//!   [`RecordSink`].
//!
//! Invariant: records reach the sink once each, in the order their closing
//! brace arrived, followed by exactly one of completion or error.

pub mod buffer;
pub mod cancel;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod parser;
pub mod scanner;
pub mod transport;

pub use buffer::{StreamBuffer, Utf8Decoder};
pub use cancel::{cancel_signal, CancelSignal};
pub use config::EnvConfig;
pub use dispatch::{CallbackSink, CollectingSink, RecordSink};
pub use driver::{drive, DriverState, StreamDriver, StreamSummary};
pub use envelope::{classify, normalize, NormalizedRecord, ParsedEnvelope};
pub use error::StreamError;
pub use parser::RecordStreamParser;
pub use scanner::{scan, ObjectScanner, ScanOutcome, ScanResult};
pub use transport::{ByteStreamTransport, FragmentTransport, ReaderTransport, Transport};
