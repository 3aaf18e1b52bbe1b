//! Read/decode/scan/dispatch loop for one stream session.

use tracing::{debug, info, warn};

use crate::cancel::{await_or_cancel, is_cancelled, CancelSignal};
use crate::dispatch::{CollectingSink, Dispatcher, RecordSink};
use crate::envelope::NormalizedRecord;
use crate::error::StreamError;
use crate::parser::RecordStreamParser;
use crate::transport::Transport;

/// Lifecycle of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Streaming,
    Draining,
    Completed,
    Failed,
}

impl DriverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the session may move from `self` to `next`. `Failed` is
    /// reachable from every non-terminal state.
    pub fn can_transition_to(&self, next: DriverState) -> bool {
        match (self, next) {
            (state, _) if state.is_terminal() => false,
            (_, Self::Failed) => true,
            (Self::Idle, Self::Streaming)
            | (Self::Streaming, Self::Draining)
            | (Self::Draining, Self::Completed) => true,
            _ => false,
        }
    }
}

/// Counters reported once a session reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub state: DriverState,
    pub records: usize,
    pub fragments: usize,
    pub bytes: usize,
    pub skipped_spans: usize,
}

/// Per-invocation state; owned by one driver run and dropped with it.
struct StreamSession<T> {
    transport: T,
    parser: RecordStreamParser,
    state: DriverState,
    fragments: usize,
    bytes: usize,
}

impl<T: Transport> StreamSession<T> {
    fn new(transport: T) -> Self {
        Self {
            transport,
            parser: RecordStreamParser::new(),
            state: DriverState::Idle,
            fragments: 0,
            bytes: 0,
        }
    }

    async fn pump<S>(
        &mut self,
        cancel: Option<&CancelSignal>,
        dispatcher: &mut Dispatcher<'_, S>,
    ) -> Result<(), StreamError>
    where
        S: RecordSink + ?Sized,
    {
        loop {
            let next = await_or_cancel(self.transport.next_fragment(), cancel).await??;
            if is_cancelled(cancel) {
                return Err(StreamError::Cancelled);
            }
            if self.state == DriverState::Idle {
                self.transition(DriverState::Streaming);
            }

            let Some(fragment) = next else {
                self.transition(DriverState::Draining);
                for record in self.parser.finish() {
                    dispatcher.emit(record);
                }
                return Ok(());
            };

            self.fragments += 1;
            self.bytes += fragment.len();

            let records = self.parser.feed(&fragment);
            debug!(
                fragment = self.fragments,
                bytes = fragment.len(),
                records = records.len(),
                buffered = self.parser.buffered().len(),
                "stream fragment processed"
            );
            for record in records {
                dispatcher.emit(record);
            }
        }
    }

    fn transition(&mut self, next: DriverState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state.as_str(),
            next.as_str()
        );
        self.state = next;
    }

    fn summary(&self, records: usize) -> StreamSummary {
        StreamSummary {
            state: self.state,
            records,
            fragments: self.fragments,
            bytes: self.bytes,
            skipped_spans: self.parser.skipped_spans(),
        }
    }
}

/// Drives one transport to completion, delivering records to a sink.
///
/// Fragments are pulled strictly one at a time; the next read is only issued
/// after every record extractable from the current buffer was dispatched.
pub struct StreamDriver<T> {
    transport: T,
    cancel: Option<CancelSignal>,
}

impl<T: Transport> StreamDriver<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Runs the session. The sink sees every record, then exactly one of
    /// `on_complete` or `on_error`. The transport is released before the
    /// terminal callback fires.
    pub async fn run<S>(self, sink: &mut S) -> StreamSummary
    where
        S: RecordSink + ?Sized,
    {
        let mut dispatcher = Dispatcher::new(sink);
        let mut session = StreamSession::new(self.transport);
        let outcome = session.pump(self.cancel.as_ref(), &mut dispatcher).await;

        session.transition(if outcome.is_ok() {
            DriverState::Completed
        } else {
            DriverState::Failed
        });
        let summary = session.summary(dispatcher.delivered());
        drop(session);

        match outcome {
            Ok(()) => {
                info!(
                    records = summary.records,
                    fragments = summary.fragments,
                    bytes = summary.bytes,
                    skipped = summary.skipped_spans,
                    "stream completed"
                );
                dispatcher.complete();
            }
            Err(error) => {
                warn!(
                    records = summary.records,
                    fragments = summary.fragments,
                    error = %error,
                    "stream failed"
                );
                dispatcher.fail(error);
            }
        }

        summary
    }

    /// Runs the session and collects every record, or returns the failure.
    pub async fn collect(self) -> Result<Vec<NormalizedRecord>, StreamError> {
        let mut sink = CollectingSink::new();
        self.run(&mut sink).await;
        sink.into_result()
    }
}

/// Convenience wrapper: drive `transport` into `sink` without cancellation.
pub async fn drive<T, S>(transport: T, sink: &mut S) -> StreamSummary
where
    T: Transport,
    S: RecordSink + ?Sized,
{
    StreamDriver::new(transport).run(sink).await
}

#[cfg(test)]
mod tests {
    use super::{DriverState, StreamDriver, StreamSession};
    use crate::dispatch::{CollectingSink, Dispatcher};
    use crate::error::StreamError;
    use crate::transport::FragmentTransport;

    #[tokio::test]
    async fn empty_stream_completes_without_records() {
        let mut sink = CollectingSink::new();
        let summary = StreamDriver::new(FragmentTransport::default())
            .run(&mut sink)
            .await;

        assert_eq!(summary.state, DriverState::Completed);
        assert_eq!(summary.fragments, 0);
        assert_eq!(sink.completions, 1);
        assert!(sink.records.is_empty());
    }

    #[tokio::test]
    async fn records_before_failure_are_kept() {
        let transport = FragmentTransport::new(["{\"event\":\"a\"}{\"event\":"])
            .fail_with(StreamError::Transport("reset".to_owned()));
        let mut sink = CollectingSink::new();
        let summary = StreamDriver::new(transport).run(&mut sink).await;

        assert_eq!(summary.state, DriverState::Failed);
        assert_eq!(summary.records, 1);
        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.completions, 0);
        assert!(matches!(sink.error, Some(StreamError::Transport(_))));
    }

    #[test]
    fn terminal_states() {
        assert!(DriverState::Completed.is_terminal());
        assert!(DriverState::Failed.is_terminal());
        assert!(!DriverState::Draining.is_terminal());
        assert_eq!(DriverState::Streaming.as_str(), "streaming");
    }

    #[test]
    fn transitions_follow_the_lifecycle() {
        use DriverState::*;

        assert!(Idle.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Draining));
        assert!(Draining.can_transition_to(Completed));
        assert!(Idle.can_transition_to(Failed));
        assert!(Draining.can_transition_to(Failed));

        assert!(!Idle.can_transition_to(Draining));
        assert!(!Idle.can_transition_to(Completed));
        assert!(!Streaming.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Streaming));
    }

    #[tokio::test]
    async fn end_of_input_on_first_read_passes_through_streaming() {
        let mut sink = CollectingSink::new();
        let mut dispatcher = Dispatcher::new(&mut sink);
        let mut session = StreamSession::new(FragmentTransport::default());

        session
            .pump(None, &mut dispatcher)
            .await
            .expect("empty stream drains");
        assert_eq!(session.state, DriverState::Draining);
    }
}
