//! Private REST client for the device cloud
//!
//! This crate provides a minimal asynchronous client for the mbed-Connector
//! style device cloud used by connector-bridge. Reads issued through it do not
//! return the resource value: the cloud answers with an async-response id and
//! later delivers the value to the registered notification callback.

mod error;

pub use error::ConnectorError;

use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Default base URL of the device cloud REST API
pub const DEFAULT_API_URL: &str = "https://api.connector.mbed.com";

/// Body returned by the device cloud when a read has been queued
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AsyncReadResponse {
    /// Correlation id that the eventual `async-responses` callback entry will carry
    #[serde(rename = "async-response-id")]
    pub async_response_id: String,
}

/// A minimal client for the device cloud REST API
#[derive(Debug, Clone)]
pub struct ConnectorClient {
    http: reqwest::Client,
    base_url: String,
    base: Url,
    token: String,
}

impl ConnectorClient {
    /// Create a client against the public device cloud
    pub fn new(token: impl Into<String>) -> Result<Self, ConnectorError> {
        Self::with_base_url(DEFAULT_API_URL, token)
    }

    /// Create a client against a specific API base URL
    ///
    /// Fails with [`ConnectorError::InvalidTarget`] when `base_url` is not an
    /// absolute http(s) URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConnectorError::Transport(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ConnectorError::InvalidTarget(format!(
                "'{base_url}' is not an http(s) base URL"
            )));
        }

        Ok(Self {
            http,
            base_url,
            base,
            token: token.into(),
        })
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Queue a read of `resource_path` on `endpoint`
    ///
    /// # Returns
    /// The async-response id under which the value will be delivered
    pub async fn read(
        &self,
        endpoint: &str,
        resource_path: &str,
    ) -> Result<AsyncReadResponse, ConnectorError> {
        let url = self.endpoint_url("endpoints", endpoint, resource_path)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ConnectorError::Parse(format!("invalid read response '{text}': {e}")))
    }

    /// Subscribe to value changes of `resource_path` on `endpoint`
    ///
    /// Subsequent changes arrive as unsolicited `notifications` on the callback.
    pub async fn subscribe(&self, endpoint: &str, resource_path: &str) -> Result<(), ConnectorError> {
        let url = self.endpoint_url("subscriptions", endpoint, resource_path)?;

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Write a plain-text value to `resource_path` on `endpoint`
    pub async fn write(
        &self,
        endpoint: &str,
        resource_path: &str,
        body: &str,
    ) -> Result<(), ConnectorError> {
        let url = self.endpoint_url("endpoints", endpoint, resource_path)?;

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .body(body.to_string())
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Execute the function resource at `resource_path` on `endpoint`
    pub async fn execute(&self, endpoint: &str, resource_path: &str) -> Result<(), ConnectorError> {
        let url = self.endpoint_url("endpoints", endpoint, resource_path)?;

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// Register `callback_url` as the notification channel for this token
    pub async fn register_callback(&self, callback_url: &str) -> Result<(), ConnectorError> {
        let url = self.api_url(["notification", "callback"])?;

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "url": callback_url }))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    /// URL of `resource_path` on `endpoint` within `collection`.
    ///
    /// The endpoint id always occupies exactly one path segment.
    fn endpoint_url(
        &self,
        collection: &str,
        endpoint: &str,
        resource_path: &str,
    ) -> Result<Url, ConnectorError> {
        validate_endpoint_id(endpoint)?;

        let segments = [collection, endpoint]
            .into_iter()
            .chain(resource_path.split('/').filter(|segment| !segment.is_empty()));
        self.api_url(segments)
    }

    /// Append percent-encoded `segments` to the base URL.
    fn api_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, ConnectorError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConnectorError::InvalidTarget(format!("'{}' cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ConnectorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ConnectorError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Endpoint ids come from clients; refuse anything that could leave its path segment.
fn validate_endpoint_id(endpoint: &str) -> Result<(), ConnectorError> {
    let invalid = endpoint.is_empty()
        || endpoint == "."
        || endpoint == ".."
        || endpoint
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control());

    if invalid {
        return Err(ConnectorError::InvalidTarget(format!(
            "invalid endpoint id '{}'",
            endpoint.escape_debug()
        )));
    }
    Ok(())
}
