//! Decoding of SPARQL endpoint responses.
//!
//! The response bodies are decoded on a blocking task. Decoded solutions and triples are
//! handed to the consumer through a bounded channel, so the body is only read as fast as the
//! consumer processes the results.

use crate::body::ResponseBody;
use crate::error::SparqlClientError;
use futures::{Stream, TryStreamExt};
use oxrdf::{Graph, Triple};
use oxrdfio::RdfFormat;
use std::fmt;
use std::io::Read;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

mod json;
mod term;
mod triples;
mod xml;

pub use json::JsonResultsDecoder;
pub use sparesults::QuerySolution;
pub use xml::XmlResultsDecoder;

/// The number of decoded items that may be buffered ahead of the consumer.
const CHANNEL_CAPACITY: usize = 64;

/// A [SPARQL query results](https://www.w3.org/TR/sparql11-results-json/) serialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultsFormat {
    /// [SPARQL Query Results JSON Format](https://www.w3.org/TR/sparql11-results-json/)
    Json,
    /// [SPARQL Query Results XML Format](https://www.w3.org/TR/rdf-sparql-XMLres/)
    Xml,
}

impl ResultsFormat {
    /// The media type of the format.
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Json => "application/sparql-results+json",
            Self::Xml => "application/sparql-results+xml",
        }
    }

    /// The decoder for this format.
    pub fn decoder(self) -> &'static dyn ResultsDecoder {
        match self {
            Self::Json => &JsonResultsDecoder,
            Self::Xml => &XmlResultsDecoder,
        }
    }
}

impl fmt::Display for ResultsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Decodes a SPARQL results serialization.
///
/// The methods are blocking and are called from a thread that is allowed to block.
pub trait ResultsDecoder: Send + Sync {
    /// Decodes the solutions of a SELECT query and hands them to `emit` in document order.
    ///
    /// Decoding stops early once `emit` returns `false`.
    fn decode_solutions(
        &self,
        reader: Box<dyn Read + Send>,
        emit: &mut dyn FnMut(QuerySolution) -> bool,
    ) -> Result<(), SparqlClientError>;

    /// Decodes the result of an ASK query.
    fn decode_boolean(&self, reader: Box<dyn Read + Send>) -> Result<bool, SparqlClientError>;
}

/// The results formats a [`SparqlEndpointFetcher`](crate::SparqlEndpointFetcher) accepts for
/// SELECT and ASK queries, in order of preference.
#[derive(Clone, Debug)]
pub struct ResultsParserRegistry {
    formats: Vec<ResultsFormat>,
    accept: String,
}

impl Default for ResultsParserRegistry {
    fn default() -> Self {
        Self::new(&[(ResultsFormat::Json, 1.0), (ResultsFormat::Xml, 0.7)])
    }
}

impl ResultsParserRegistry {
    /// Creates a registry from formats with their quality weights.
    pub fn new(formats: &[(ResultsFormat, f32)]) -> Self {
        let accept = formats
            .iter()
            .map(|(format, quality)| format!("{};q={quality:.1}", format.media_type()))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            formats: formats.iter().map(|(format, _)| *format).collect(),
            accept,
        }
    }

    /// The value of the `Accept` header for SELECT and ASK queries.
    pub fn accept_header(&self) -> &str {
        &self.accept
    }

    /// The registered formats in order of preference.
    pub fn formats(&self) -> &[ResultsFormat] {
        &self.formats
    }

    /// Finds the format of a response with `content_type`.
    ///
    /// `content_type` must not contain parameters.
    pub fn lookup(&self, content_type: &str) -> Result<ResultsFormat, SparqlClientError> {
        self.formats
            .iter()
            .find(|format| format.media_type().eq_ignore_ascii_case(content_type))
            .copied()
            .ok_or_else(|| SparqlClientError::UnsupportedContentType(content_type.to_owned()))
    }
}

/// A stream over the solutions of a SELECT query.
///
/// The stream is single-pass. A decoding error is returned as its last item.
pub struct QuerySolutionStream {
    receiver: mpsc::Receiver<Result<QuerySolution, SparqlClientError>>,
}

impl QuerySolutionStream {
    pub(crate) fn decode(body: ResponseBody, format: ResultsFormat) -> Self {
        let decoder = format.decoder();
        let receiver = spawn_decoder::<QuerySolution, _>(body, move |reader, emit| {
            decoder.decode_solutions(reader, emit)
        });
        Self { receiver }
    }

    /// Collects all solutions, failing on the first error.
    pub async fn try_collect_to_vec(self) -> Result<Vec<QuerySolution>, SparqlClientError> {
        self.try_collect().await
    }
}

impl Stream for QuerySolutionStream {
    type Item = Result<QuerySolution, SparqlClientError>;

    #[inline]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// A stream over the triples returned by a CONSTRUCT or DESCRIBE query.
///
/// The stream is single-pass. A decoding error is returned as its last item.
pub struct QueryTripleStream {
    receiver: mpsc::Receiver<Result<Triple, SparqlClientError>>,
}

impl QueryTripleStream {
    pub(crate) fn decode(body: ResponseBody, format: RdfFormat, base_iri: String) -> Self {
        let receiver = spawn_decoder::<Triple, _>(body, move |reader, emit| {
            triples::decode_triples(reader, format, &base_iri, emit)
        });
        Self { receiver }
    }

    /// Collects all triples, failing on the first error.
    pub async fn try_collect_to_vec(self) -> Result<Vec<Triple>, SparqlClientError> {
        self.try_collect().await
    }

    /// Collects all triples into a [`Graph`], failing on the first error.
    pub async fn collect_as_graph(self) -> Result<Graph, SparqlClientError> {
        self.try_fold(Graph::new(), |mut graph, triple| async move {
            graph.insert(triple.as_ref());
            Ok::<_, SparqlClientError>(graph)
        })
        .await
    }
}

impl Stream for QueryTripleStream {
    type Item = Result<Triple, SparqlClientError>;

    #[inline]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Decodes the result of an ASK query.
pub(crate) async fn decode_boolean(
    body: ResponseBody,
    format: ResultsFormat,
) -> Result<bool, SparqlClientError> {
    let handle = Handle::current();
    let decoder = format.decoder();
    tokio::task::spawn_blocking(move || decoder.decode_boolean(body.into_reader(handle))).await?
}

/// Runs `decode` on a blocking task and returns the channel receiving its output.
///
/// Decoding stops once the receiver is dropped.
fn spawn_decoder<T, F>(body: ResponseBody, decode: F) -> mpsc::Receiver<Result<T, SparqlClientError>>
where
    T: Send + 'static,
    F: FnOnce(Box<dyn Read + Send>, &mut dyn FnMut(T) -> bool) -> Result<(), SparqlClientError>
        + Send
        + 'static,
{
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || {
        let reader = body.into_reader(handle);
        let mut emit = |item: T| sender.blocking_send(Ok(item)).is_ok();
        if let Err(error) = decode(reader, &mut emit) {
            if sender.blocking_send(Err(error)).is_err() {
                debug!("Results stream dropped before the decoding error could be reported");
            }
        }
    });
    receiver
}
