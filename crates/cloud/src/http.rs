//! HTTP client wrapper with status mapping and retry logic.

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for the Earth Engine JSON and pixel endpoints.
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    request_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(request_timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            max_retries,
            request_timeout,
        })
    }

    /// GET `url` with query parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        auth: &dyn CloudAuth,
    ) -> Result<T> {
        let mut auth_headers = Vec::new();
        auth.sign_request(url, "GET", &mut auth_headers)?;

        let mut req = self.client.get(url).query(query);
        for (key, value) in &auth_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = self.execute_with_retry(req, url).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| CloudError::Network(format!("parsing response from {url}: {e}")))
    }

    /// POST a JSON body and return the raw response bytes.
    pub async fn post_json_for_bytes(
        &self,
        url: &str,
        body: &serde_json::Value,
        auth: &dyn CloudAuth,
    ) -> Result<Vec<u8>> {
        let mut auth_headers = Vec::new();
        auth.sign_request(url, "POST", &mut auth_headers)?;

        let mut req = self.client.post(url).json(body);
        for (key, value) in &auth_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = self.execute_with_retry(req, url).await?;
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Execute a request with exponential backoff retry.
    ///
    /// Timeouts, connection failures and 5xx responses are retried; 4xx
    /// responses are mapped to an error immediately.
    async fn execute_with_retry(&self, request: RequestBuilder, url: &str) -> Result<Response> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 250ms, 500ms, 1s, ...
                let delay = Duration::from_millis(250 * (1 << (attempt - 1).min(6)));
                debug!(attempt, ?delay, url, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let Some(req) = request.try_clone() else {
                return check_status(request.send().await?, url).await;
            };

            match req.send().await {
                Ok(resp) if resp.status().is_server_error() => {
                    let status = resp.status();
                    warn!(%status, url, attempt, "server error");
                    last_err = Some(CloudError::Network(format!("HTTP {status} from {url}")));
                }
                Ok(resp) => return check_status(resp, url).await,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(error = %e, url, attempt, "transient request failure");
                    last_err = Some(CloudError::Http(e));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| CloudError::Network(format!("request to {url} failed"))))
    }

    /// Getter for the timeout duration.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

async fn check_status(resp: Response, url: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = error_message(&body);
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CloudError::Auth(format!("HTTP {status}: {detail}"))
        }
        StatusCode::NOT_FOUND => CloudError::DataUnavailable(format!("{url}: {detail}")),
        s if s.is_client_error() => CloudError::InvalidRequest(format!("HTTP {s}: {detail}")),
        s => CloudError::Network(format!("HTTP {s} from {url}: {detail}")),
    })
}

/// Pull `error.message` out of a Google API error body, falling back to the
/// first 500 characters of the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(500).collect())
}
