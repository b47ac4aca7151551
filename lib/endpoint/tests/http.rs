#![cfg(test)]
#![allow(clippy::panic_in_result_fn)]

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rdf_fusion_endpoint::model::NamedNode;
use rdf_fusion_endpoint::{FetcherConfig, HttpMethod, SparqlEndpointFetcher};
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;
use tokio::net::TcpListener;

const SELECT_RESULTS: &str = r#"{"head":{"vars":["s"]},"results":{"bindings":[{"s":{"type":"uri","value":"http://example.org/s"}}]}}"#;

/// Answers like a SPARQL endpoint, picking the response from the query text.
async fn answer(query: &str) -> Response {
    if query.starts_with("ASK") {
        (
            [(CONTENT_TYPE, "application/sparql-results+json")],
            r#"{"boolean":true}"#,
        )
            .into_response()
    } else if query.starts_with("CONSTRUCT") {
        (
            [(CONTENT_TYPE, "text/turtle; charset=utf-8")],
            "<http://example.org/s> <http://example.org/p> <http://example.org/o> .",
        )
            .into_response()
    } else if query.starts_with("SLOW") {
        tokio::time::sleep(Duration::from_secs(10)).await;
        StatusCode::NO_CONTENT.into_response()
    } else if query.starts_with("SELECT") {
        (
            [(CONTENT_TYPE, "application/sparql-results+json")],
            SELECT_RESULTS,
        )
            .into_response()
    } else {
        (StatusCode::BAD_REQUEST, format!("cannot answer {query}")).into_response()
    }
}

async fn handle_get(Query(params): Query<HashMap<String, String>>) -> Response {
    answer(params.get("query").map_or("", String::as_str)).await
}

async fn handle_post(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type == "application/sparql-update" {
        return if body.starts_with(b"INSERT") {
            StatusCode::NO_CONTENT.into_response()
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "server error").into_response()
        };
    }
    let query = url::form_urlencoded::parse(&body)
        .find(|(key, _)| key == "query")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();
    answer(&query).await
}

/// Serves the canned endpoint on an ephemeral port and returns its URL.
async fn serve() -> Result<String, Box<dyn Error>> {
    let app = Router::new().route("/sparql", get(handle_get).post(handle_post));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(format!("http://{address}/sparql"))
}

#[tokio::test]
async fn test_select_over_http() -> Result<(), Box<dyn Error>> {
    let endpoint = serve().await?;
    for method in [HttpMethod::Get, HttpMethod::Post] {
        let fetcher = SparqlEndpointFetcher::new(FetcherConfig::default().with_method(method));
        let solutions = fetcher
            .fetch_bindings(&endpoint, "SELECT * WHERE { ?s ?p ?o }")
            .await?
            .try_collect_to_vec()
            .await?;
        assert_eq!(solutions.len(), 1, "{method:?}");
        assert_eq!(
            solutions[0].get("s"),
            Some(&NamedNode::new("http://example.org/s")?.into())
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_ask_over_http() -> Result<(), Box<dyn Error>> {
    let endpoint = serve().await?;
    let fetcher = SparqlEndpointFetcher::default();
    assert!(fetcher.fetch_ask(&endpoint, "ASK { ?s ?p ?o }").await?);
    Ok(())
}

#[tokio::test]
async fn test_construct_over_http() -> Result<(), Box<dyn Error>> {
    let endpoint = serve().await?;
    let fetcher = SparqlEndpointFetcher::default();
    let graph = fetcher
        .fetch_triples(&endpoint, "CONSTRUCT WHERE { ?s ?p ?o }")
        .await?
        .collect_as_graph()
        .await?;
    assert_eq!(graph.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_update_over_http() -> Result<(), Box<dyn Error>> {
    let endpoint = serve().await?;
    let fetcher = SparqlEndpointFetcher::default();
    fetcher
        .fetch_update(
            &endpoint,
            "INSERT DATA { <http://example.org/s> <http://example.org/p> <http://example.org/o> }",
        )
        .await?;

    let error = fetcher
        .fetch_update(&endpoint, "CLEAR ALL")
        .await
        .err()
        .ok_or("the update must be rejected")?;
    assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(
        error.to_string(),
        format!(
            "Invalid SPARQL endpoint response from {endpoint} (HTTP status 500 Internal Server Error):\nserver error"
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_bad_request_over_http() -> Result<(), Box<dyn Error>> {
    let endpoint = serve().await?;
    let fetcher = SparqlEndpointFetcher::new(FetcherConfig::default().with_method(HttpMethod::Get));
    let Err(error) = fetcher.fetch_bindings(&endpoint, "DESCRIBE ?s").await else {
        panic!("the endpoint cannot answer DESCRIBE");
    };
    assert_eq!(error.status(), Some(StatusCode::BAD_REQUEST));
    assert!(error.to_string().ends_with("cannot answer DESCRIBE ?s"));
    Ok(())
}

#[tokio::test]
async fn test_timeout_over_http() -> Result<(), Box<dyn Error>> {
    let endpoint = serve().await?;
    let fetcher = SparqlEndpointFetcher::new(
        FetcherConfig::default().with_timeout(Duration::from_millis(100)),
    );
    let error = fetcher
        .fetch_raw_stream(&endpoint, "SLOW", "text/plain")
        .await
        .err()
        .ok_or("the request must time out")?;
    assert!(error.is_timeout());
    Ok(())
}

#[tokio::test]
async fn test_connection_refused() -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    drop(listener);
    let fetcher = SparqlEndpointFetcher::default();
    let error = fetcher
        .fetch_ask(&format!("http://{address}/sparql"), "ASK {}")
        .await
        .err()
        .ok_or("nothing is listening")?;
    assert!(matches!(
        error,
        rdf_fusion_endpoint::SparqlClientError::Network { .. }
    ));
    Ok(())
}
