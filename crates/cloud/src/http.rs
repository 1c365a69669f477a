//! HTTP client wrapper for the elevation export service.
//!
//! One attempt per request: the export fetch is bounded by the client
//! timeout and never retried.

use crate::error::{CloudError, Result};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// HTTP client for single-shot binary downloads.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    request_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            request_timeout,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// GET `url` and return the body.
    ///
    /// Timeouts, non-2xx statuses and JSON error documents (what ArcGIS-style
    /// services send back instead of an image) are all errors.
    pub async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        debug!(url = %url, "fetching");

        let resp = self.client.get(url.clone()).send().await.map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CloudError::Status {
                status: status.as_u16(),
                url: redact_query(url),
            });
        }

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);

        let body = resp.bytes().await.map_err(|e| self.classify(e))?.to_vec();
        debug!(bytes = body.len(), "fetched");

        if is_json || looks_like_json(&body) {
            return Err(CloudError::Service(service_message(&body)));
        }

        Ok(body)
    }

    fn classify(&self, err: reqwest::Error) -> CloudError {
        if err.is_timeout() {
            CloudError::Timeout(self.request_timeout.as_secs())
        } else {
            CloudError::Http(err)
        }
    }
}

fn looks_like_json(body: &[u8]) -> bool {
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .map(|&b| b == b'{')
        .unwrap_or(false)
}

/// Human-readable text out of a service error document.
///
/// ArcGIS REST wraps failures as `{"error": {"message": ..., "details": [...]}}`.
fn service_message(body: &[u8]) -> String {
    let fallback = || String::from_utf8_lossy(body).chars().take(300).collect();
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(doc) => doc
            .pointer("/error/message")
            .or_else(|| doc.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(fallback),
        Err(_) => fallback(),
    }
}

/// URL without its query string, for error messages.
fn redact_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
