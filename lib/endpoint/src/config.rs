use crate::fetch::{Fetch, ReqwestFetch};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The HTTP method used to send queries.
///
/// Updates are always sent using POST.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Sends the query in the `query` URL parameter.
    Get,
    /// Sends the query in the request body.
    #[default]
    Post,
}

/// Holds the configuration of a [`SparqlEndpointFetcher`](crate::SparqlEndpointFetcher).
///
/// The configuration is fixed once the fetcher has been created and is shared by all requests
/// issued by it.
///
/// Usage example:
/// ```
/// use rdf_fusion_endpoint::{FetcherConfig, HttpMethod};
/// use std::time::Duration;
///
/// let config = FetcherConfig::default()
///     .with_method(HttpMethod::Post)
///     .with_timeout(Duration::from_secs(30))
///     .with_force_get_if_url_length_below(600)
///     .with_additional_param("timeout", "30000");
/// assert_eq!(config.additional_params().len(), 1);
/// ```
#[derive(Clone)]
pub struct FetcherConfig {
    method: HttpMethod,
    timeout: Option<Duration>,
    force_get_if_url_length_below: Option<usize>,
    direct_post: bool,
    additional_params: Vec<(String, String)>,
    default_headers: HeaderMap,
    fetch: Arc<dyn Fetch>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestFetch::default()))
    }
}

impl FetcherConfig {
    /// Creates a configuration that uses `fetch` to perform the network calls.
    ///
    /// Use [`Default::default`] to perform them with a default [`reqwest::Client`].
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self {
            method: HttpMethod::default(),
            timeout: None,
            force_get_if_url_length_below: None,
            direct_post: false,
            additional_params: Vec::new(),
            default_headers: HeaderMap::new(),
            fetch,
        }
    }

    /// Sets the HTTP method used to send queries.
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Aborts requests whose response headers did not arrive within `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends queries using GET, even if POST is configured, as long as the resulting URL is
    /// shorter than `length`.
    #[must_use]
    pub fn with_force_get_if_url_length_below(mut self, length: usize) -> Self {
        self.force_get_if_url_length_below = Some(length);
        self
    }

    /// Sends POST queries as raw `application/sparql-query` bodies instead of HTML forms.
    #[must_use]
    pub fn with_direct_post(mut self, direct_post: bool) -> Self {
        self.direct_post = direct_post;
        self
    }

    /// Adds a parameter that is sent along with every query.
    ///
    /// Parameters keep their insertion order. Adding a key a second time replaces its value.
    #[must_use]
    pub fn with_additional_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let value = value.into();
        match self.additional_params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.additional_params.push((key, value)),
        }
        self
    }

    /// Adds a header that is sent with every request.
    #[must_use]
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    /// Replaces the headers that are sent with every request.
    #[must_use]
    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    /// Replaces the function performing the network calls.
    #[must_use]
    pub fn with_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn force_get_if_url_length_below(&self) -> Option<usize> {
        self.force_get_if_url_length_below
    }

    pub fn direct_post(&self) -> bool {
        self.direct_post
    }

    /// The additional parameters in insertion order.
    pub fn additional_params(&self) -> &[(String, String)] {
        &self.additional_params
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn fetch(&self) -> &Arc<dyn Fetch> {
        &self.fetch
    }
}

impl fmt::Debug for FetcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherConfig")
            .field("method", &self.method)
            .field("timeout", &self.timeout)
            .field(
                "force_get_if_url_length_below",
                &self.force_get_if_url_length_below,
            )
            .field("direct_post", &self.direct_post)
            .field("additional_params", &self.additional_params)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}
