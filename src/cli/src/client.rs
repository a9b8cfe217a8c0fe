//! HTTP client for a running Preflight server.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Status and JSON body of a response. Non-2xx statuses are not errors here;
/// the health endpoints use 503 and 502 to carry well-formed payloads.
#[derive(Debug)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiReply {
    /// `error.message` from an error payload, if present.
    pub fn error_message(&self) -> Option<&str> {
        self.body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
    }
}

/// HTTP client for the Preflight API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and parse the JSON body whatever the status.
    pub async fn get_json(&self, path: &str) -> Result<ApiReply> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        Self::reply(resp, &url).await
    }

    /// GET `path` and return only the status; the body is not parsed.
    pub async fn get_status(&self, path: &str) -> Result<StatusCode> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        Ok(resp.status())
    }

    /// POST to `path` without a body and parse the JSON reply.
    pub async fn post_json(&self, path: &str) -> Result<ApiReply> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;
        Self::reply(resp, &url).await
    }

    async fn reply(resp: reqwest::Response, url: &str) -> Result<ApiReply> {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text)
            .with_context(|| format!("Unexpected response from {} ({}): {}", url, status, text))?;
        Ok(ApiReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_status_reports_non_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health/live"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri()).unwrap();
        let status = client.get_status("/health/live").await.unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_get_status_unreachable_is_error() {
        let client = ApiClient::new("http://127.0.0.1:1").unwrap();
        let err = client.get_status("/health/live").await.unwrap_err();
        assert!(format!("{:#}", err).contains("/health/live"));
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
