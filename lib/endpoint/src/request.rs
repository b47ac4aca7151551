//! Chooses how a query or update is put on the wire.

use crate::config::{FetcherConfig, HttpMethod};
use crate::error::SparqlClientError;
use crate::fetch::HttpRequest;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use url::form_urlencoded;

pub const CONTENT_TYPE_SPARQL_QUERY: &str = "application/sparql-query";
pub const CONTENT_TYPE_SPARQL_UPDATE: &str = "application/sparql-update";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// The characters escaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Builds the request for a query.
///
/// `accept` is sent as the `Accept` header, after the default headers of `config`.
pub fn query_request(
    endpoint: &str,
    query: &str,
    accept: &str,
    config: &FetcherConfig,
) -> Result<HttpRequest, SparqlClientError> {
    let mut headers = config.default_headers().clone();
    headers.append(ACCEPT, HeaderValue::from_str(accept)?);

    if let Some(url) = get_url_if_selected(endpoint, query, config) {
        return Ok(HttpRequest {
            method: Method::GET,
            url,
            headers,
            body: None,
        });
    }

    if config.direct_post() {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(CONTENT_TYPE_SPARQL_QUERY),
        );
        let url = if config.additional_params().is_empty() {
            endpoint.to_owned()
        } else {
            format!(
                "{endpoint}?{}",
                encode_params(config.additional_params().iter())
            )
        };
        return Ok(HttpRequest {
            method: Method::POST,
            url,
            headers,
            body: Some(query.to_owned()),
        });
    }

    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("query", query);
    for (key, value) in config.additional_params() {
        form.append_pair(key, value);
    }
    let body = form.finish();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_FORM));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    Ok(HttpRequest {
        method: Method::POST,
        url: endpoint.to_owned(),
        headers,
        body: Some(body),
    })
}

/// Builds the request for an update. Updates are always sent as raw POST bodies.
pub fn update_request(endpoint: &str, update: &str, config: &FetcherConfig) -> HttpRequest {
    let mut headers: HeaderMap = config.default_headers().clone();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_SPARQL_UPDATE),
    );
    HttpRequest {
        method: Method::POST,
        url: endpoint.to_owned(),
        headers,
        body: Some(update.to_owned()),
    }
}

/// Returns the GET url if the query should be sent using GET.
///
/// With POST configured, GET is still used if a length threshold is configured and both the
/// endpoint and the assembled GET url are shorter than it.
fn get_url_if_selected(endpoint: &str, query: &str, config: &FetcherConfig) -> Option<String> {
    match (config.method(), config.force_get_if_url_length_below()) {
        (HttpMethod::Get, _) => Some(get_url(endpoint, query, config)),
        (HttpMethod::Post, Some(threshold)) if endpoint.len() < threshold => {
            let url = get_url(endpoint, query, config);
            (url.len() < threshold).then_some(url)
        }
        (HttpMethod::Post, _) => None,
    }
}

fn get_url(endpoint: &str, query: &str, config: &FetcherConfig) -> String {
    let params = [("query".to_owned(), query.to_owned())];
    format!(
        "{endpoint}?{}",
        encode_params(params.iter().chain(config.additional_params()))
    )
}

fn encode_params<'a>(params: impl Iterator<Item = &'a (String, String)>) -> String {
    params
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, URI_COMPONENT),
                utf8_percent_encode(value, URI_COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Removes the query string of `url`.
pub fn strip_query_string(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
