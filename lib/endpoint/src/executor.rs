//! Performs the network call of a request and validates its outcome.

use crate::body::ResponseBody;
use crate::config::FetcherConfig;
use crate::error::SparqlClientError;
use crate::fetch::{HttpRequest, HttpResponse};
use crate::request::strip_query_string;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::io;
use tracing::{debug, warn};

/// The marker reported in place of a body that could not be obtained.
const EMPTY_RESPONSE: &str = "empty response";

/// The number of bytes of an error response body that are kept in the error.
const MAX_ERROR_BODY_LEN: usize = 64 * 1024;

/// Executes `request` and returns the content type and body of the successful response.
///
/// A successful response without a body is a failure.
pub(crate) async fn fetch_body(
    config: &FetcherConfig,
    request: HttpRequest,
) -> Result<(String, ResponseBody), SparqlClientError> {
    let url = strip_query_string(&request.url).to_owned();
    let response = send(config, request, &url).await?;
    let content_type = content_type(&response.headers);
    match response {
        HttpResponse {
            status,
            body: Some(body),
            ..
        } if status.is_success() => {
            debug!(%url, %content_type, "SPARQL endpoint responded");
            Ok((content_type, body))
        }
        response => Err(transport_error(config, url, response).await),
    }
}

/// Executes `request` and verifies that the endpoint answered with a success status.
///
/// The body of a successful response is dropped without being read.
pub(crate) async fn fetch_without_body(
    config: &FetcherConfig,
    request: HttpRequest,
) -> Result<(), SparqlClientError> {
    let url = strip_query_string(&request.url).to_owned();
    let response = send(config, request, &url).await?;
    if !response.status.is_success() {
        return Err(transport_error(config, url, response).await);
    }
    debug!(%url, status = %response.status, "SPARQL endpoint accepted the update");
    Ok(())
}

/// Performs the network call, aborting it once the configured timeout elapses.
async fn send(
    config: &FetcherConfig,
    request: HttpRequest,
    url: &str,
) -> Result<HttpResponse, SparqlClientError> {
    debug!(method = %request.method, %url, "Sending SPARQL request");
    let call = config.fetch().fetch(request);
    let result = match config.timeout() {
        Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
            warn!(%url, ?timeout, "SPARQL request timed out");
            SparqlClientError::Timeout {
                url: url.to_owned(),
                timeout,
            }
        })?,
        None => call.await,
    };
    result.map_err(|source| {
        warn!(%url, error = %source, "SPARQL request failed");
        SparqlClientError::Network {
            url: url.to_owned(),
            source,
        }
    })
}

/// Builds the error of an unsuccessful response.
///
/// At most [`MAX_ERROR_BODY_LEN`] bytes of the body are read, within the configured timeout.
async fn transport_error(
    config: &FetcherConfig,
    url: String,
    response: HttpResponse,
) -> SparqlClientError {
    let status = response.status;
    let body = match response.body {
        Some(body) => {
            let read = body.into_string_truncated(MAX_ERROR_BODY_LEN);
            let result = match config.timeout() {
                Some(timeout) => tokio::time::timeout(timeout, read)
                    .await
                    .unwrap_or_else(|_| {
                        Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "reading the response body timed out",
                        ))
                    }),
                None => read.await,
            };
            match result {
                Ok(body) => body,
                Err(error) => {
                    debug!(%url, %error, "Could not read the body of the failed response");
                    EMPTY_RESPONSE.to_owned()
                }
            }
        }
        None => EMPTY_RESPONSE.to_owned(),
    };
    warn!(%url, %status, "SPARQL endpoint returned an invalid response");
    SparqlClientError::Transport { url, status, body }
}

/// Returns the `Content-Type` of a response without its parameters, or an empty string.
pub(crate) fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or_default().trim().to_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use bytes::Bytes;
    use futures::{stream, StreamExt};
    use reqwest::header::HeaderValue;
    use reqwest::{Method, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;

    fn request() -> HttpRequest {
        HttpRequest {
            method: Method::GET,
            url: "http://ex.org/sparql?query=ASK%7B%7D".to_owned(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    fn config(response: fn() -> HttpResponse) -> FetcherConfig {
        FetcherConfig::new(Arc::new(move |_: HttpRequest| async move {
            Ok::<_, FetchError>(response())
        }))
    }

    #[test]
    fn test_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_type(&headers), "");
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/sparql-results+json ; charset=utf-8"),
        );
        assert_eq!(content_type(&headers), "application/sparql-results+json");
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/turtle"));
        assert_eq!(content_type(&headers), "text/turtle");
    }

    #[tokio::test]
    async fn test_success() {
        let config = config(|| {
            HttpResponse::new(StatusCode::OK)
                .with_content_type("text/turtle;charset=utf-8")
                .with_body(ResponseBody::from_reader(io::empty()))
        });
        let (content_type, _) = fetch_body(&config, request()).await.unwrap();
        assert_eq!(content_type, "text/turtle");
    }

    #[tokio::test]
    async fn test_error_status_reports_body() {
        let config = config(|| {
            HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR).with_body(
                ResponseBody::from_stream(stream::iter(vec![Ok(Bytes::from_static(
                    b"server error",
                ))])),
            )
        });
        let error = fetch_body(&config, request()).await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid SPARQL endpoint response from http://ex.org/sparql (HTTP status 500 Internal Server Error):\nserver error"
        );
        assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_error_body_is_truncated() {
        let config = config(|| {
            HttpResponse::new(StatusCode::BAD_GATEWAY).with_body(ResponseBody::from_stream(
                stream::repeat_with(|| Ok(Bytes::from_static(b"<html>"))),
            ))
        });
        let error = fetch_body(&config, request()).await.unwrap_err();
        let SparqlClientError::Transport { body, .. } = error else {
            panic!("unexpected error: {error}");
        };
        assert_eq!(body.len(), MAX_ERROR_BODY_LEN);
        assert!(body.starts_with("<html><html>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_error_body() {
        let config = config(|| {
            HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE).with_body(
                ResponseBody::from_stream(
                    stream::iter(vec![Ok(Bytes::from_static(b"busy"))]).chain(stream::pending()),
                ),
            )
        })
        .with_timeout(Duration::from_secs(1));
        let error = fetch_without_body(&config, request()).await.unwrap_err();
        assert!(matches!(
            error,
            SparqlClientError::Transport { status, ref body, .. }
                if status == StatusCode::SERVICE_UNAVAILABLE && body == EMPTY_RESPONSE
        ));
    }

    #[tokio::test]
    async fn test_success_without_body() {
        let config = config(|| HttpResponse::new(StatusCode::OK));
        let error = fetch_body(&config, request()).await.unwrap_err();
        assert!(matches!(
            error,
            SparqlClientError::Transport { status, ref body, .. }
                if status == StatusCode::OK && body == EMPTY_RESPONSE
        ));
    }

    #[tokio::test]
    async fn test_update_without_body() {
        let accepted = config(|| HttpResponse::new(StatusCode::NO_CONTENT));
        fetch_without_body(&accepted, request()).await.unwrap();

        let rejected = config(|| HttpResponse::new(StatusCode::BAD_REQUEST));
        let error = fetch_without_body(&rejected, request()).await.unwrap_err();
        assert!(matches!(
            error,
            SparqlClientError::Transport { ref url, ref body, .. }
                if url == "http://ex.org/sparql" && body == EMPTY_RESPONSE
        ));
    }

    #[tokio::test]
    async fn test_network_error() {
        let config = FetcherConfig::new(Arc::new(|_: HttpRequest| async {
            Err::<HttpResponse, FetchError>("connection refused".into())
        }));
        let error = fetch_body(&config, request()).await.unwrap_err();
        assert!(matches!(error, SparqlClientError::Network { .. }));
        assert!(error.to_string().ends_with("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let config = FetcherConfig::new(Arc::new(|_: HttpRequest| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, FetchError>(HttpResponse::new(StatusCode::OK))
        }))
        .with_timeout(Duration::from_secs(1));
        let error = fetch_body(&config, request()).await.unwrap_err();
        assert!(error.is_timeout());
    }
}
