use std::cell::RefCell;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use run_stream::{
    cancel_signal, CallbackSink, CollectingSink, DriverState, FragmentTransport, NormalizedRecord,
    ReaderTransport, StreamDriver, StreamError, Transport,
};

/// Yields scripted fragments, then stalls forever.
struct StallingTransport {
    fragments: Vec<Bytes>,
}

impl Transport for StallingTransport {
    async fn next_fragment(&mut self) -> Result<Option<Bytes>, StreamError> {
        if !self.fragments.is_empty() {
            return Ok(Some(self.fragments.remove(0)));
        }
        std::future::pending::<()>().await;
        Ok(None)
    }
}

#[derive(Debug, PartialEq)]
enum Call {
    Record(Value),
    Error(String),
    Complete,
}

#[tokio::test]
async fn callbacks_fire_in_order_and_complete_once() {
    let calls = RefCell::new(Vec::new());
    let mut sink = CallbackSink::new(
        |record: NormalizedRecord| calls.borrow_mut().push(Call::Record(record.into_value())),
        |error: StreamError| calls.borrow_mut().push(Call::Error(error.to_string())),
        || calls.borrow_mut().push(Call::Complete),
    );
    let summary = StreamDriver::new(FragmentTransport::new([
        "{\"event\":\"a\"}{\"ev",
        "ent\":\"b\",\"data\":{\"n\":1}}",
    ]))
    .run(&mut sink)
    .await;
    drop(sink);

    assert_eq!(summary.state, DriverState::Completed);
    assert_eq!(summary.fragments, 2);
    assert_eq!(
        calls.into_inner(),
        vec![
            Call::Record(json!({"event": "a"})),
            Call::Record(json!({"event": "b", "n": 1})),
            Call::Complete,
        ]
    );
}

#[tokio::test]
async fn transport_failure_reports_error_without_completion() {
    let transport = FragmentTransport::new(["{\"event\":\"first\"}"])
        .fail_with(StreamError::Transport("connection reset".to_owned()));
    let mut sink = CollectingSink::new();
    let summary = StreamDriver::new(transport).run(&mut sink).await;

    assert_eq!(summary.state, DriverState::Failed);
    assert_eq!(sink.records.len(), 1);
    assert_eq!(sink.completions, 0);
    assert_eq!(
        sink.error.map(|error| error.to_string()),
        Some("transport error: connection reset".to_owned())
    );
}

#[tokio::test]
async fn cancellation_interrupts_a_stalled_read() {
    let cancel = cancel_signal();
    let transport = StallingTransport {
        fragments: vec![Bytes::from_static(b"{\"event\":\"before\"}")],
    };

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        trigger.store(true, Ordering::SeqCst);
    });

    let mut sink = CollectingSink::new();
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        StreamDriver::new(transport)
            .with_cancellation(cancel)
            .run(&mut sink),
    )
    .await
    .expect("cancellation should end the session");

    assert_eq!(summary.state, DriverState::Failed);
    assert_eq!(sink.records.len(), 1);
    assert_eq!(sink.completions, 0);
    assert!(sink.error.is_some_and(|error| error.is_cancelled()));
}

#[tokio::test]
async fn reader_transport_streams_a_recorded_response() {
    let recorded = concat!(
        "{\"event\":\"RunStarted\"}\n",
        "{\"event\":\"RunContent\",\"data\":\"{\\\"content\\\":\\\"hi\\\"}\"}\n",
        "{\"event\":\"RunCompleted\"}\n",
    );
    let records = StreamDriver::new(ReaderTransport::with_chunk_size(recorded.as_bytes(), 5))
        .collect()
        .await
        .expect("recorded stream should parse");

    let events: Vec<Value> = records.into_iter().map(|record| record.into_value()).collect();
    assert_eq!(
        events,
        vec![
            json!({"event": "RunStarted"}),
            json!({"event": "RunContent", "content": "hi"}),
            json!({"event": "RunCompleted"}),
        ]
    );
}

#[tokio::test]
async fn malformed_span_is_skipped_and_counted() {
    let mut sink = CollectingSink::new();
    let summary = StreamDriver::new(FragmentTransport::new([
        "{\"event\":oops}",
        "{\"event\":\"ok\"}",
    ]))
    .run(&mut sink)
    .await;

    assert_eq!(summary.skipped_spans, 1);
    assert_eq!(summary.records, 1);
    assert_eq!(sink.records[0].event(), Some("ok"));
    assert_eq!(sink.completions, 1);
}
