//! Sources of raw stream fragments.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::StreamError;

/// Default read size for [`ReaderTransport`].
pub const DEFAULT_READ_CHUNK: usize = 8 * 1024;

/// Ordered source of opaque byte fragments.
///
/// `Ok(None)` marks end of input. Fragment boundaries carry no meaning.
pub trait Transport {
    fn next_fragment(
        &mut self,
    ) -> impl Future<Output = Result<Option<Bytes>, StreamError>> + Send;
}

/// Adapts a fallible byte stream, e.g. an HTTP response body.
pub struct ByteStreamTransport<S> {
    inner: Pin<Box<S>>,
}

impl<S> ByteStreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl<S, B, E> Transport for ByteStreamTransport<S>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: Into<Bytes> + Send,
    E: fmt::Display + Send,
{
    async fn next_fragment(&mut self) -> Result<Option<Bytes>, StreamError> {
        match self.inner.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk.into())),
            Some(Err(error)) => Err(StreamError::transport(error)),
            None => Ok(None),
        }
    }
}

/// Reads fragments from any async reader (file, stdin, socket).
pub struct ReaderTransport<R> {
    reader: R,
    chunk_size: usize,
}

impl<R> ReaderTransport<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_READ_CHUNK)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<R> Transport for ReaderTransport<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_fragment(&mut self) -> Result<Option<Bytes>, StreamError> {
        let mut chunk = vec![0_u8; self.chunk_size];
        let read = self.reader.read(&mut chunk).await?;
        if read == 0 {
            return Ok(None);
        }
        chunk.truncate(read);
        Ok(Some(Bytes::from(chunk)))
    }
}

/// In-memory fragment script, optionally ending in a failure instead of
/// end of input.
#[derive(Debug, Default)]
pub struct FragmentTransport {
    fragments: VecDeque<Bytes>,
    failure: Option<StreamError>,
}

impl FragmentTransport {
    pub fn new<I, B>(fragments: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Splits `text` into fragments of at most `size` bytes, ignoring
    /// character boundaries.
    pub fn chunked(text: &str, size: usize) -> Self {
        let size = size.max(1);
        Self::new(
            text.as_bytes()
                .chunks(size)
                .map(Bytes::copy_from_slice)
                .collect::<Vec<_>>(),
        )
    }

    /// Fail with `error` once the scripted fragments run out.
    pub fn fail_with(mut self, error: StreamError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn remaining(&self) -> usize {
        self.fragments.len()
    }
}

impl Transport for FragmentTransport {
    async fn next_fragment(&mut self) -> Result<Option<Bytes>, StreamError> {
        if let Some(fragment) = self.fragments.pop_front() {
            return Ok(Some(fragment));
        }
        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }
}
