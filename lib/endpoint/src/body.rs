//! Uniform access to HTTP response bodies.
//!
//! The decoders consume a blocking [`Read`]. A network call may either hand out such a reader
//! directly or a stream of byte chunks, which is wrapped in [`ChunkReader`].

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use std::fmt;
use std::io::{self, Read};
use tokio::runtime::Handle;

/// The body of an HTTP response.
pub enum ResponseBody {
    /// A body that can already be read.
    Reader(Box<dyn Read + Send>),
    /// A body that arrives as a stream of byte chunks.
    Chunks(BoxStream<'static, io::Result<Bytes>>),
}

impl ResponseBody {
    /// Creates a body from a reader. The reader is used as-is.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Creates a body from a stream of byte chunks.
    pub fn from_stream(
        stream: impl Stream<Item = io::Result<Bytes>> + Send + 'static,
    ) -> Self {
        Self::Chunks(stream.boxed())
    }

    /// Turns the body into a blocking reader.
    ///
    /// Chunked bodies are pulled from the stream one chunk at a time using `handle`, so the
    /// returned reader must only be used from a thread that is allowed to block (e.g., within
    /// [`tokio::task::spawn_blocking`]).
    pub fn into_reader(self, handle: Handle) -> Box<dyn Read + Send> {
        match self {
            Self::Reader(reader) => reader,
            Self::Chunks(chunks) => Box::new(ChunkReader::new(handle, chunks)),
        }
    }

    /// Reads the whole body into a string, replacing invalid UTF-8 sequences.
    pub async fn into_string(self) -> io::Result<String> {
        self.into_string_truncated(usize::MAX).await
    }

    /// Reads at most `limit` bytes of the body into a string, replacing invalid UTF-8 sequences.
    ///
    /// The rest of the body is dropped without being read.
    pub async fn into_string_truncated(self, limit: usize) -> io::Result<String> {
        let bytes = match self {
            Self::Reader(reader) => {
                let limit = u64::try_from(limit).unwrap_or(u64::MAX);
                tokio::task::spawn_blocking(move || {
                    let mut buffer = Vec::new();
                    reader.take(limit).read_to_end(&mut buffer).map(|_| buffer)
                })
                .await
                .map_err(io::Error::other)??
            }
            Self::Chunks(mut chunks) => {
                let mut buffer = Vec::new();
                while buffer.len() < limit {
                    let Some(chunk) = chunks.try_next().await? else {
                        break;
                    };
                    let len = chunk.len().min(limit - buffer.len());
                    buffer.extend_from_slice(&chunk[..len]);
                }
                buffer
            }
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader(_) => f.write_str("ResponseBody::Reader"),
            Self::Chunks(_) => f.write_str("ResponseBody::Chunks"),
        }
    }
}

/// A blocking [`Read`] over an asynchronous stream of byte chunks.
///
/// A new chunk is only requested once the previous one has been fully consumed.
pub struct ChunkReader {
    handle: Handle,
    chunks: Option<BoxStream<'static, io::Result<Bytes>>>,
    current: Bytes,
}

impl ChunkReader {
    pub fn new(handle: Handle, chunks: BoxStream<'static, io::Result<Bytes>>) -> Self {
        Self {
            handle,
            chunks: Some(chunks),
            current: Bytes::new(),
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.current.is_empty() {
            let Some(chunks) = &mut self.chunks else {
                return Ok(0);
            };
            match self.handle.block_on(chunks.next()) {
                Some(chunk) => self.current = chunk?,
                None => {
                    // Releases the underlying connection as soon as the body has ended.
                    self.chunks = None;
                    return Ok(0);
                }
            }
        }

        let len = buf.len().min(self.current.len());
        buf[..len].copy_from_slice(&self.current.split_to(len));
        Ok(len)
    }
}
