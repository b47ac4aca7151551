#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod body;
mod classify;
mod config;
mod error;
mod executor;
mod fetch;
mod fetcher;
mod request;
pub mod results;

pub use body::{ChunkReader, ResponseBody};
pub use classify::{query_type, update_types, QueryType, UpdateOperation, UpdateTypes};
pub use config::{FetcherConfig, HttpMethod};
pub use error::{FetchError, SparqlClientError};
pub use fetch::{Fetch, HttpRequest, HttpResponse, ReqwestFetch};
pub use fetcher::SparqlEndpointFetcher;
pub use request::{
    query_request, update_request, CONTENT_TYPE_FORM, CONTENT_TYPE_SPARQL_QUERY,
    CONTENT_TYPE_SPARQL_UPDATE,
};
pub use results::{QuerySolution, QuerySolutionStream, QueryTripleStream};

pub mod model {
    pub use oxrdf::*;
}
