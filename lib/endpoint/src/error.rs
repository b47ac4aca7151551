use oxrdfio::RdfParseError;
use reqwest::header::InvalidHeaderValue;
use reqwest::StatusCode;
use spargebra::SparqlSyntaxError;
use std::error::Error;
use std::io;
use std::time::Duration;

/// The error type of a custom network call (see [`Fetch`](crate::Fetch)).
pub type FetchError = Box<dyn Error + Send + Sync>;

/// An error raised while talking to a SPARQL endpoint.
#[derive(Debug, thiserror::Error)]
pub enum SparqlClientError {
    /// The query or update is not valid SPARQL.
    #[error(transparent)]
    Syntax(#[from] SparqlSyntaxError),
    /// The endpoint answered with a non-success status, or without a body where one was
    /// required.
    #[error("Invalid SPARQL endpoint response from {url} (HTTP status {status}):\n{body}")]
    Transport {
        /// The request URL without its query string.
        url: String,
        /// The HTTP status of the response.
        status: StatusCode,
        /// The response body, or `empty response` if there was none.
        body: String,
    },
    /// The network call itself failed.
    #[error("Could not send request to SPARQL endpoint {url}: {source}")]
    Network {
        /// The request URL without its query string.
        url: String,
        /// The error of the network call.
        #[source]
        source: FetchError,
    },
    /// The endpoint did not answer within the configured timeout. The request has been aborted.
    #[error("Request to SPARQL endpoint {url} was aborted after {timeout:?}")]
    Timeout {
        /// The request URL without its query string.
        url: String,
        /// The configured timeout.
        timeout: Duration,
    },
    /// The endpoint answered with a content type for which no results decoder is registered.
    #[error("Unknown SPARQL results content type: {0}")]
    UnsupportedContentType(String),
    /// The response of an ASK query did not contain a boolean.
    #[error("No valid ASK response was found.")]
    NoAskResponse,
    /// An error raised by the SPARQL XML results decoder.
    #[error("Invalid SPARQL XML results: {0}")]
    XmlResults(String),
    /// An error raised by the SPARQL JSON results decoder.
    #[error("Invalid SPARQL JSON results: {0}")]
    JsonResults(#[from] serde_json::Error),
    /// An error raised by the RDF decoder.
    #[error(transparent)]
    RdfParsing(#[from] RdfParseError),
    /// A header value passed to the client is not a valid HTTP header value.
    #[error(transparent)]
    InvalidHeader(#[from] InvalidHeaderValue),
    /// An I/O error raised while reading a response body.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The background task decoding the response body did not complete.
    #[error("The response decoder task failed: {0}")]
    DecoderTask(#[from] tokio::task::JoinError),
}

impl SparqlClientError {
    /// Returns whether the error is the result of the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns the HTTP status if the endpoint answered with an unsuccessful response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<SparqlClientError> for io::Error {
    #[inline]
    fn from(error: SparqlClientError) -> Self {
        match error {
            SparqlClientError::Io(error) => error,
            SparqlClientError::RdfParsing(error) => error.into(),
            SparqlClientError::Timeout { .. } => {
                Self::new(io::ErrorKind::TimedOut, error.to_string())
            }
            SparqlClientError::Syntax(_)
            | SparqlClientError::XmlResults(_)
            | SparqlClientError::InvalidHeader(_)
            | SparqlClientError::UnsupportedContentType(_)
            | SparqlClientError::NoAskResponse
            | SparqlClientError::JsonResults(_) => {
                Self::new(io::ErrorKind::InvalidData, error.to_string())
            }
            SparqlClientError::Transport { .. }
            | SparqlClientError::Network { .. }
            | SparqlClientError::DecoderTask(_) => Self::other(error),
        }
    }
}
