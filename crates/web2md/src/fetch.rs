//! HTTP acquisition with bounded retries.
//!
//! The same client and retry loop serve the document fetch and every image
//! fetch. The client carries the configured timeout, so it applies per request.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode, Url};
use tracing::{debug, info, warn};
use web2md_core::ConverterConfig;

use crate::error::{Error, Result};

/// Pause before retry `n` is `RETRY_PAUSE * n`.
const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Build the HTTP client shared by a converter and its image handler.
pub fn build_client(config: &ConverterConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout))
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(Error::Client)
}

/// Failures worth another attempt: the network, not the request, was at fault.
fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// GET `url`, retrying transient failures up to `max_retries` extra times.
///
/// A non-success status left after the retries is turned into an error.
pub async fn get_with_retries(
    client: &Client,
    url: &Url,
    max_retries: u32,
) -> reqwest::Result<Response> {
    let mut attempt = 0;
    loop {
        let outcome = client.get(url.clone()).send().await;
        let retryable = match &outcome {
            Ok(response) => is_transient_status(response.status()),
            Err(err) => is_transient_error(err),
        };

        if !retryable || attempt >= max_retries {
            return outcome.and_then(Response::error_for_status);
        }

        attempt += 1;
        match &outcome {
            Ok(response) => {
                warn!(%url, status = %response.status(), attempt, max_retries, "retrying request")
            }
            Err(err) => warn!(%url, error = %err, attempt, max_retries, "retrying request"),
        }
        tokio::time::sleep(RETRY_PAUSE * attempt).await;
    }
}

/// A fetched document before decoding.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Final address after redirects; the base for relative references
    pub url: Url,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Raw body
    pub body: Vec<u8>,
}

/// Fetch a document for conversion. Exhausted retries are fatal.
pub async fn fetch_document(client: &Client, url: &str, max_retries: u32) -> Result<FetchedDocument> {
    let parsed = Url::parse(url).map_err(|_| Error::InvalidAddress(url.to_string()))?;
    debug!(%parsed, "fetching document");

    let fetch_error = |source| Error::Fetch {
        url: url.to_string(),
        source,
    };

    let response = get_with_retries(client, &parsed, max_retries)
        .await
        .map_err(fetch_error)?;

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await.map_err(fetch_error)?.to_vec();

    info!(url = %final_url, bytes = body.len(), "fetched document");
    Ok(FetchedDocument {
        url: final_url,
        content_type,
        body,
    })
}
