//! HTTP side of a run stream: request shaping, error-body decoding and the
//! glue that feeds a response body into [`run_stream::StreamDriver`].
//!
//! Requests are always `POST`. The body is either a JSON object or multipart
//! form data; only the JSON body gets an automatic `content-type`.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod url;

pub use client::HttpStreamClient;
pub use config::HttpStreamConfig;
pub use error::HttpStreamError;
pub use payload::{FormBody, FormValue, RequestBody, RunRequest, StreamRequest};
pub use url::{normalize_base_url, run_endpoint, RunTarget, DEFAULT_ENDPOINT};
