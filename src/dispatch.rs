//! Caller-facing callbacks and the once-only terminal contract.

use crate::envelope::NormalizedRecord;
use crate::error::StreamError;

/// Receiver of one stream session's output.
///
/// The driver calls `on_record` once per record in arrival order, then
/// exactly one of `on_complete` or `on_error`.
pub trait RecordSink {
    fn on_record(&mut self, record: NormalizedRecord);

    fn on_error(&mut self, error: StreamError);

    fn on_complete(&mut self);
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn on_record(&mut self, record: NormalizedRecord) {
        (**self).on_record(record);
    }

    fn on_error(&mut self, error: StreamError) {
        (**self).on_error(error);
    }

    fn on_complete(&mut self) {
        (**self).on_complete();
    }
}

/// [`RecordSink`] built from three closures.
pub struct CallbackSink<R, E, C> {
    on_record: R,
    on_error: E,
    on_complete: C,
}

impl<R, E, C> CallbackSink<R, E, C>
where
    R: FnMut(NormalizedRecord),
    E: FnMut(StreamError),
    C: FnMut(),
{
    pub fn new(on_record: R, on_error: E, on_complete: C) -> Self {
        Self {
            on_record,
            on_error,
            on_complete,
        }
    }
}

impl<R, E, C> RecordSink for CallbackSink<R, E, C>
where
    R: FnMut(NormalizedRecord),
    E: FnMut(StreamError),
    C: FnMut(),
{
    fn on_record(&mut self, record: NormalizedRecord) {
        (self.on_record)(record);
    }

    fn on_error(&mut self, error: StreamError) {
        (self.on_error)(error);
    }

    fn on_complete(&mut self) {
        (self.on_complete)();
    }
}

/// Sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub records: Vec<NormalizedRecord>,
    pub error: Option<StreamError>,
    pub completions: usize,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records on success, the error otherwise.
    pub fn into_result(self) -> Result<Vec<NormalizedRecord>, StreamError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.records),
        }
    }
}

impl RecordSink for CollectingSink {
    fn on_record(&mut self, record: NormalizedRecord) {
        self.records.push(record);
    }

    fn on_error(&mut self, error: StreamError) {
        self.error = Some(error);
    }

    fn on_complete(&mut self) {
        self.completions += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Completed,
    Failed,
}

/// Forwards records to a sink and guards the terminal callbacks: at most one
/// of completion or error, and no records after either.
pub(crate) struct Dispatcher<'a, S: RecordSink + ?Sized> {
    sink: &'a mut S,
    delivered: usize,
    terminal: Option<Terminal>,
}

impl<'a, S: RecordSink + ?Sized> Dispatcher<'a, S> {
    pub(crate) fn new(sink: &'a mut S) -> Self {
        Self {
            sink,
            delivered: 0,
            terminal: None,
        }
    }

    pub(crate) fn emit(&mut self, record: NormalizedRecord) {
        if self.terminal.is_some() {
            return;
        }
        tracing::trace!(event = record.event().unwrap_or(""), "dispatching record");
        self.sink.on_record(record);
        self.delivered += 1;
    }

    pub(crate) fn complete(&mut self) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        self.terminal = Some(Terminal::Completed);
        self.sink.on_complete();
        true
    }

    pub(crate) fn fail(&mut self, error: StreamError) -> bool {
        if self.terminal.is_some() {
            return false;
        }
        self.terminal = Some(Terminal::Failed);
        self.sink.on_error(error);
        true
    }

    pub(crate) fn delivered(&self) -> usize {
        self.delivered
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{CallbackSink, CollectingSink, Dispatcher};
    use crate::envelope::NormalizedRecord;
    use crate::error::StreamError;

    fn record(event: &str) -> NormalizedRecord {
        let mut fields = Map::new();
        fields.insert("event".to_owned(), Value::from(event));
        NormalizedRecord::from(fields)
    }

    #[test]
    fn completion_is_delivered_once_and_blocks_later_error() {
        let mut sink = CollectingSink::new();
        let mut dispatcher = Dispatcher::new(&mut sink);

        dispatcher.emit(record("a"));
        assert!(dispatcher.complete());
        assert!(!dispatcher.complete());
        assert!(!dispatcher.fail(StreamError::Cancelled));
        dispatcher.emit(record("late"));
        assert_eq!(dispatcher.delivered(), 1);

        assert_eq!(sink.records.len(), 1);
        assert_eq!(sink.completions, 1);
        assert!(sink.error.is_none());
    }

    #[test]
    fn error_is_delivered_once_and_blocks_completion() {
        let mut sink = CollectingSink::new();
        let mut dispatcher = Dispatcher::new(&mut sink);

        assert!(dispatcher.fail(StreamError::NoResponseBody));
        assert!(!dispatcher.fail(StreamError::Cancelled));
        assert!(!dispatcher.complete());

        assert_eq!(sink.completions, 0);
        assert!(matches!(sink.error, Some(StreamError::NoResponseBody)));
    }

    #[test]
    fn callback_sink_forwards_to_closures() {
        let mut events = Vec::new();
        let mut errors = Vec::new();
        let mut completions = 0;
        {
            let mut sink = CallbackSink::new(
                |record: NormalizedRecord| events.push(record.into_value()),
                |error: StreamError| errors.push(error.to_string()),
                || completions += 1,
            );
            let mut dispatcher = Dispatcher::new(&mut sink);
            dispatcher.emit(record("x"));
            dispatcher.complete();
        }

        assert_eq!(events, vec![json!({"event": "x"})]);
        assert!(errors.is_empty());
        assert_eq!(completions, 1);
    }
}
