use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use tracing::{debug, info, warn};

use run_stream::cancel::{await_or_cancel, is_cancelled, CancelSignal};
use run_stream::{
    ByteStreamTransport, CollectingSink, DriverState, NormalizedRecord, RecordSink, StreamDriver,
    StreamError, StreamSummary,
};

use crate::config::HttpStreamConfig;
use crate::error::HttpStreamError;
use crate::headers::build_headers;
use crate::payload::{FormBody, FormValue, RequestBody, RunRequest, StreamRequest};
use crate::retry::retry_delay;
use crate::url::{run_endpoint, RunTarget};

#[derive(Debug)]
pub struct HttpStreamClient {
    http: Client,
    config: HttpStreamConfig,
}

impl HttpStreamClient {
    pub fn new(config: HttpStreamConfig) -> Result<Self, HttpStreamError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &HttpStreamConfig {
        &self.config
    }

    pub fn run_endpoint(&self, target: &RunTarget) -> String {
        run_endpoint(&self.config.base_url, target)
    }

    pub fn build_headers(&self, request: &StreamRequest) -> Result<HeaderMap, HttpStreamError> {
        let mut out = HeaderMap::new();
        for (key, value) in build_headers(&self.config, request) {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| HttpStreamError::InvalidHeader(format!("name {key:?}")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| HttpStreamError::InvalidHeader(format!("value for {key}")))?;
            out.insert(name, value);
        }
        Ok(out)
    }

    /// `POST` builder for `request`. Built fresh for every attempt.
    pub fn build_request(
        &self,
        request: &StreamRequest,
    ) -> Result<reqwest::RequestBuilder, HttpStreamError> {
        let url = Url::parse(request.url.trim()).map_err(|error| HttpStreamError::InvalidUrl {
            url: request.url.clone(),
            reason: error.to_string(),
        })?;
        let builder = self.http.post(url).headers(self.build_headers(request)?);

        Ok(match &request.body {
            RequestBody::Json(body) => builder.body(serde_json::to_vec(body)?),
            RequestBody::Form(form) => builder.multipart(multipart_form(form)?),
        })
    }

    /// Sends `request` once and returns the response when its body can be
    /// streamed.
    ///
    /// Non-success statuses read the body and map it through
    /// [`StreamError::from_error_body`]; `204`/`205` have no body to stream.
    pub async fn open(
        &self,
        request: &StreamRequest,
        cancel: Option<&CancelSignal>,
    ) -> Result<Response, HttpStreamError> {
        let pending = self.build_request(request)?.send();
        let response = await_or_cancel(pending, cancel).await??;
        let status = response.status();

        if status.is_success() {
            if matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT) {
                return Err(StreamError::NoResponseBody.into());
            }
            debug!(url = %request.url, status = status.as_u16(), "run stream opened");
            return Ok(response);
        }

        let body = match await_or_cancel(response.text(), cancel).await? {
            Ok(body) => body,
            Err(error) => {
                warn!(
                    url = %request.url,
                    status = status.as_u16(),
                    error = %error,
                    "failed to read error response body"
                );
                String::new()
            }
        };
        Err(StreamError::from_error_body(status.as_u16(), &body).into())
    }

    /// [`open`](Self::open) with exponential backoff on retryable failures.
    ///
    /// Only the open phase is retried. A status failure that stays retryable
    /// is returned as-is once attempts run out; a connection failure becomes
    /// [`HttpStreamError::RetryExhausted`].
    pub async fn open_with_retry(
        &self,
        request: &StreamRequest,
        cancel: Option<&CancelSignal>,
    ) -> Result<Response, HttpStreamError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            if is_cancelled(cancel) {
                return Err(StreamError::Cancelled.into());
            }

            match self.open(request, cancel).await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_retryable() && attempt < max_retries => {
                    let delay = retry_delay(self.config.retry_base_delay, attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying run stream request"
                    );
                    await_or_cancel(tokio::time::sleep(delay), cancel).await?;
                    attempt += 1;
                }
                Err(HttpStreamError::Request(error)) if attempt > 0 => {
                    return Err(HttpStreamError::RetryExhausted {
                        attempts: attempt + 1,
                        last_error: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Opens `request` and drives its body into `sink`.
    ///
    /// The sink sees the same contract as [`StreamDriver::run`]: records in
    /// order, then one completion or one error. A failure to open the request
    /// is reported through `on_error` as well.
    pub async fn stream<S>(
        &self,
        request: &StreamRequest,
        cancel: Option<&CancelSignal>,
        sink: &mut S,
    ) -> StreamSummary
    where
        S: RecordSink + ?Sized,
    {
        let response = match self.open_with_retry(request, cancel).await {
            Ok(response) => response,
            Err(error) => {
                warn!(url = %request.url, error = %error, "run stream failed to open");
                sink.on_error(error.into());
                return StreamSummary {
                    state: DriverState::Failed,
                    records: 0,
                    fragments: 0,
                    bytes: 0,
                    skipped_spans: 0,
                };
            }
        };

        let mut driver = StreamDriver::new(ByteStreamTransport::new(response.bytes_stream()));
        if let Some(cancel) = cancel {
            driver = driver.with_cancellation(cancel.clone());
        }
        let summary = driver.run(sink).await;
        info!(
            url = %request.url,
            state = summary.state.as_str(),
            records = summary.records,
            "run stream finished"
        );
        summary
    }

    /// Streams `request` and collects every record, or returns the failure.
    pub async fn collect(
        &self,
        request: &StreamRequest,
        cancel: Option<&CancelSignal>,
    ) -> Result<Vec<NormalizedRecord>, StreamError> {
        let mut sink = CollectingSink::new();
        self.stream(request, cancel, &mut sink).await;
        sink.into_result()
    }

    /// Posts `run` to the run route of `target` and streams the response.
    pub async fn run<S>(
        &self,
        target: &RunTarget,
        run: RunRequest,
        cancel: Option<&CancelSignal>,
        sink: &mut S,
    ) -> StreamSummary
    where
        S: RecordSink + ?Sized,
    {
        let request = run.into_stream_request(self.run_endpoint(target));
        self.stream(&request, cancel, sink).await
    }
}

fn multipart_form(body: &FormBody) -> Result<Form, HttpStreamError> {
    let mut form = Form::new();
    for (name, value) in body.fields() {
        form = match value {
            FormValue::Text(text) => form.text(name.clone(), text.clone()),
            FormValue::File {
                bytes,
                file_name,
                mime,
            } => {
                let mut part = Part::bytes(bytes.clone());
                if let Some(file_name) = file_name {
                    part = part.file_name(file_name.clone());
                }
                if let Some(mime) = mime {
                    part = part.mime_str(mime)?;
                }
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::multipart_form;
    use crate::payload::FormBody;

    #[test]
    fn multipart_form_rejects_invalid_mime() {
        let body = FormBody::new().file("upload", b"x".to_vec(), None, Some("not a mime".into()));
        assert!(multipart_form(&body).is_err());
    }

    #[test]
    fn multipart_form_accepts_text_and_files() {
        let body = FormBody::new()
            .text("message", "hi")
            .file("upload", b"x".to_vec(), Some("a.txt".into()), Some("text/plain".into()));
        assert!(multipart_form(&body).is_ok());
    }
}
