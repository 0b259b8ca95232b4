//! Error types for the device cloud client

use thiserror::Error;

/// Errors that can occur while talking to the device cloud
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The request never produced an HTTP response (DNS, connect, TLS, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The device cloud answered with a non-2xx status
    #[error("Unexpected status from device cloud: {status} {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// An endpoint id or base URL that cannot be addressed safely
    #[error("Invalid request target: {0}")]
    InvalidTarget(String),

    /// The response body could not be interpreted
    #[error("Response parsing error: {0}")]
    Parse(String),
}

impl From<url::ParseError> for ConnectorError {
    fn from(err: url::ParseError) -> Self {
        ConnectorError::InvalidTarget(err.to_string())
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        ConnectorError::Transport(err.to_string())
    }
}
