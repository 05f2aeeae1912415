use std::time::Duration;

use async_trait::async_trait;
use mixa_publish_core::{Credentials, PublishError, SiteApi, SiteInfo};
use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

pub const DEFAULT_API_BASE: &str = "https://app.mixa.site/api";

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 200;

/// Error payload the service attaches to failed requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_text: Option<String>,
}

/// Mixa REST API client.
///
/// Every endpoint is addressed by the site's secret token:
/// `GET /site/token/{token}/info`, `GET /site/token/{token}/auth` and
/// `POST /site/token/{token}/build`.
#[derive(Debug, Clone)]
pub struct MixaApiClient {
    http_client: HttpClient,
    base_url: String,
}

impl Default for MixaApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MixaApiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.into(),
        }
    }

    /// URL of a token endpoint, with the token percent-encoded as one path segment.
    fn token_url(&self, secret_token: &str, endpoint: &str) -> Result<Url, PublishError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            PublishError::Configuration(format!("Invalid API base URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                PublishError::Configuration(format!("Invalid API base URL {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["site", "token", secret_token, endpoint]);
        Ok(url)
    }

    /// Send a request with exponential backoff retry on 429 and gateway errors.
    async fn send_with_retry(
        &self,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response, PublishError> {
        let mut delay = Duration::from_millis(BASE_DELAY_MS);
        let mut attempt = 0;

        loop {
            let response = build_request()
                .send()
                .await
                .map_err(|e| PublishError::Transport(format!("API request failed: {}", e)))?;

            let status = response.status();
            let retryable = status == StatusCode::TOO_MANY_REQUESTS
                || status == StatusCode::BAD_GATEWAY
                || status == StatusCode::SERVICE_UNAVAILABLE
                || status == StatusCode::GATEWAY_TIMEOUT;
            if !retryable || attempt == MAX_RETRIES {
                return Ok(response);
            }

            attempt += 1;
            warn!(
                attempt,
                status = status.as_u16(),
                delay_ms = delay.as_millis() as u64,
                "API request throttled, retrying"
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    /// Turn a non-success response into a transport error, preferring the service's message.
    async fn failure(response: Response, what: &str) -> PublishError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = error_text(&text).unwrap_or(text);
        PublishError::Transport(format!("{} failed with status {}: {}", what, status, message))
    }
}

/// The `errorText` field of an error body, if any.
fn error_text(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error_text)
        .filter(|t| !t.is_empty())
}

/// Parse a site info body. Anything without a subdomain means no site.
fn parse_site_info(body: &str) -> Option<SiteInfo> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let info: SiteInfo = serde_json::from_value(value).ok()?;
    if info.subdomain.trim().is_empty() {
        return None;
    }
    Some(info)
}

/// Parse a credentials body. An empty body or `{}` yields empty credentials;
/// a body of the wrong shape is a credential error.
fn parse_credentials(body: &str) -> Result<Credentials, PublishError> {
    if body.trim().is_empty() {
        return Ok(Credentials::default());
    }
    match serde_json::from_str::<Option<Credentials>>(body) {
        Ok(credentials) => Ok(credentials.unwrap_or_default()),
        Err(e) => Err(PublishError::Credential(format!(
            "Malformed credentials response: {}",
            e
        ))),
    }
}

#[async_trait]
impl SiteApi for MixaApiClient {
    #[instrument(skip_all, level = "debug")]
    async fn fetch_site_info(&self, secret_token: &str) -> Result<Option<SiteInfo>, PublishError> {
        if secret_token.trim().is_empty() {
            return Ok(None);
        }
        let url = self.token_url(secret_token, "info")?;

        let response = self
            .send_with_retry(|| self.http_client.get(url.clone()))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("No site for the given token");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::failure(response, "Site info").await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(format!("Failed to read site info: {}", e)))?;
        let info = parse_site_info(&body);
        debug!(found = info.is_some(), "Fetched site info");
        Ok(info)
    }

    #[instrument(skip_all, level = "debug")]
    async fn fetch_credentials(&self, secret_token: &str) -> Result<Credentials, PublishError> {
        let url = self.token_url(secret_token, "auth")?;

        let response = self
            .send_with_retry(|| self.http_client.get(url.clone()))
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response, "Credential request").await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(format!("Failed to read credentials: {}", e)))?;
        let credentials = parse_credentials(&body)?;
        debug!(
            expiration = ?credentials.expiration,
            "Fetched store credentials"
        );
        Ok(credentials)
    }

    #[instrument(skip_all, level = "debug")]
    async fn trigger_build(&self, secret_token: &str) -> Result<(), PublishError> {
        let url = self.token_url(secret_token, "build")?;

        let response = self
            .send_with_retry(|| self.http_client.post(url.clone()))
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response, "Build trigger").await);
        }

        debug!("Build triggered");
        Ok(())
    }
}
