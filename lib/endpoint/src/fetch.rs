use crate::body::ResponseBody;
use crate::error::FetchError;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::future::Future;
use std::io;

/// A request to a SPARQL endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// A response of a SPARQL endpoint.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The body of the response. [`None`] if the network call could not provide one.
    pub body: Option<ResponseBody>,
}

impl HttpResponse {
    /// Creates a response without headers and body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Sets the `Content-Type` header.
    ///
    /// Invalid header values are ignored.
    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        if let Ok(value) = content_type.parse() {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// Performs the network calls of a [`SparqlEndpointFetcher`](crate::SparqlEndpointFetcher).
///
/// The future returned by [`Fetch::fetch`] should complete once the response headers are
/// available. Dropping the future must abort the request.
///
/// Closures returning a future implement this trait, which is convenient for tests:
/// ```
/// use rdf_fusion_endpoint::{
///     FetchError, FetcherConfig, HttpRequest, HttpResponse, SparqlEndpointFetcher,
/// };
/// use reqwest::StatusCode;
/// use std::sync::Arc;
///
/// let config = FetcherConfig::new(Arc::new(|_request: HttpRequest| async {
///     Ok::<_, FetchError>(HttpResponse::new(StatusCode::NO_CONTENT))
/// }));
/// let fetcher = SparqlEndpointFetcher::new(config);
///
/// # tokio_test::block_on(async {
/// fetcher
///     .fetch_update("http://example.com/sparql", "CLEAR DEFAULT")
///     .await?;
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// # }).unwrap();
/// ```
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError>;
}

#[async_trait]
impl<F, Fut> Fetch for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HttpResponse, FetchError>> + Send + 'static,
{
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        self(request).await
    }
}

/// Performs network calls using a [`reqwest::Client`].
#[derive(Clone, Debug, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = ResponseBody::from_stream(response.bytes_stream().map_err(io::Error::other));
        Ok(HttpResponse {
            status,
            headers,
            body: Some(body),
        })
    }
}
