use crate::body::ResponseBody;
use crate::classify::{self, QueryType, UpdateTypes};
use crate::config::FetcherConfig;
use crate::error::SparqlClientError;
use crate::executor::{fetch_body, fetch_without_body};
use crate::request::{query_request, update_request};
use crate::results::{
    decode_boolean, QuerySolutionStream, QueryTripleStream, ResultsParserRegistry,
};
use oxrdf::NamedNode;
use oxrdfio::RdfFormat;
use std::sync::Arc;
use tracing::debug;

/// The media type requested for the results of CONSTRUCT and DESCRIBE queries.
const TRIPLES_ACCEPT: &str = "text/turtle";

/// A client for querying and updating a [SPARQL 1.1 protocol](https://www.w3.org/TR/sparql11-protocol/)
/// endpoint.
///
/// The fetcher is cheap to clone. Its configuration is shared between the clones and never
/// changes after construction.
///
/// ```no_run
/// use futures::StreamExt;
/// use rdf_fusion_endpoint::SparqlEndpointFetcher;
///
/// # tokio_test::block_on(async {
/// let fetcher = SparqlEndpointFetcher::default();
/// let mut solutions = fetcher
///     .fetch_bindings("https://dbpedia.org/sparql", "SELECT * WHERE { ?s ?p ?o } LIMIT 10")
///     .await?;
/// while let Some(solution) = solutions.next().await {
///     println!("{:?}", solution?.get("s"));
/// }
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// # }).unwrap();
/// ```
#[derive(Clone, Debug, Default)]
pub struct SparqlEndpointFetcher {
    config: Arc<FetcherConfig>,
    registry: ResultsParserRegistry,
}

impl SparqlEndpointFetcher {
    /// Creates a new fetcher using `config`.
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: ResultsParserRegistry::default(),
        }
    }

    /// Returns the configuration of this fetcher.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Returns the registry of results formats used for SELECT and ASK queries.
    pub fn registry(&self) -> &ResultsParserRegistry {
        &self.registry
    }

    /// Returns the type of `query`.
    ///
    /// See [`query_type`](crate::query_type).
    pub fn query_type(&self, query: &str) -> Result<QueryType, SparqlClientError> {
        Ok(classify::query_type(query)?)
    }

    /// Returns the operation kinds of `update`.
    ///
    /// See [`update_types`](crate::update_types).
    pub fn update_types(&self, update: &str) -> Result<UpdateTypes, SparqlClientError> {
        Ok(classify::update_types(update)?)
    }

    /// Sends `query` with the given `Accept` header and returns the content type and the raw
    /// body of the response.
    ///
    /// The content type is returned without its parameters. It is empty if the endpoint did not
    /// send one.
    pub async fn fetch_raw_stream(
        &self,
        endpoint: &str,
        query: &str,
        accept: &str,
    ) -> Result<(String, ResponseBody), SparqlClientError> {
        let request = query_request(endpoint, query, accept, &self.config)?;
        fetch_body(&self.config, request).await
    }

    /// Sends a SELECT query and returns a stream over its solutions.
    ///
    /// The solutions are decoded while the response body arrives.
    pub async fn fetch_bindings(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<QuerySolutionStream, SparqlClientError> {
        let (content_type, body) = self
            .fetch_raw_stream(endpoint, query, self.registry.accept_header())
            .await?;
        let format = self.registry.lookup(&content_type)?;
        Ok(QuerySolutionStream::decode(body, format))
    }

    /// Sends an ASK query and returns its result.
    pub async fn fetch_ask(&self, endpoint: &str, query: &str) -> Result<bool, SparqlClientError> {
        let (content_type, body) = self
            .fetch_raw_stream(endpoint, query, self.registry.accept_header())
            .await?;
        let format = self.registry.lookup(&content_type)?;
        decode_boolean(body, format).await
    }

    /// Sends a CONSTRUCT or DESCRIBE query and returns a stream over the resulting triples.
    ///
    /// Turtle is requested. The content type returned by the endpoint selects the RDF parser,
    /// which allows endpoints to answer with another triple serialization such as N-Triples.
    pub async fn fetch_triples(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<QueryTripleStream, SparqlClientError> {
        let (content_type, body) = self
            .fetch_raw_stream(endpoint, query, TRIPLES_ACCEPT)
            .await?;
        let format = RdfFormat::from_media_type(&content_type).unwrap_or_else(|| {
            debug!(%content_type, "Decoding unknown triples content type as Turtle");
            RdfFormat::Turtle
        });
        let base_iri = match NamedNode::new(endpoint) {
            Ok(endpoint) => endpoint.into_string(),
            Err(_) => String::new(),
        };
        Ok(QueryTripleStream::decode(body, format, base_iri))
    }

    /// Sends an update to the endpoint.
    ///
    /// Completes once the endpoint has acknowledged the update. The response body is ignored.
    pub async fn fetch_update(&self, endpoint: &str, update: &str) -> Result<(), SparqlClientError> {
        let request = update_request(endpoint, update, &self.config);
        fetch_without_body(&self.config, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::UpdateOperation;

    #[test]
    fn test_classifiers() {
        let fetcher = SparqlEndpointFetcher::default();
        assert_eq!(
            fetcher.query_type("DESCRIBE <http://ex.org/s>").unwrap(),
            QueryType::Construct
        );
        assert!(fetcher
            .update_types("MOVE <http://ex.org/a> TO <http://ex.org/b>")
            .unwrap()
            .contains(UpdateOperation::Move));
        assert!(matches!(
            fetcher.query_type("SELECT * WHERE {"),
            Err(SparqlClientError::Syntax(_))
        ));
    }

    #[test]
    fn test_clones_share_config() {
        let fetcher = SparqlEndpointFetcher::new(FetcherConfig::default().with_direct_post(true));
        let clone = fetcher.clone();
        assert!(Arc::ptr_eq(&fetcher.config, &clone.config));
        assert!(clone.config().direct_post());
    }
}
