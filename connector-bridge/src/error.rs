//! Error types for the connector-bridge crate.

use std::time::Duration;

use callback_server::{CorrelationError, ServerError};
use connector_client::ConnectorError;
use warp::http::StatusCode;

use crate::logging::LoggingError;
use crate::schema::DecodeError;

/// Errors surfaced by bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The outbound call to the device cloud failed before a response arrived
    #[error("Device cloud request failed: {0}")]
    Transport(String),

    /// The device cloud answered with a non-2xx status
    #[error("Unexpected statusCode from device cloud: {status} {body}")]
    UpstreamStatus {
        /// HTTP status returned by the device cloud
        status: u16,
        /// Response body returned by the device cloud
        body: String,
    },

    /// The endpoint id cannot be addressed on the device cloud
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A read was accepted but the response carried no async-response id
    #[error("Device cloud did not return an async-response id: {0}")]
    MissingAsyncResponseId(String),

    /// No callback arrived for the read before its deadline
    #[error(
        "No response within {}s for {id}. The device cloud may have dropped the notification \
         channel; it needs to be re-registered or given time to recover",
        waited.as_secs()
    )]
    Timeout {
        /// Async-response id that was awaited
        id: String,
        /// How long the request waited
        waited: Duration,
    },

    /// The same async-response id was handed out twice
    #[error("Async response {id} was claimed by a newer request")]
    Superseded {
        /// The duplicated async-response id
        id: String,
    },

    /// A resource value could not be decoded with its schema
    #[error("Failed to decode resource value: {0}")]
    Decode(#[from] DecodeError),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The HTTP server could not be started
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Logging could not be initialised
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

impl BridgeError {
    /// HTTP status used when this error is returned to a status page client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::InvalidEndpoint(_) => StatusCode::BAD_REQUEST,
            BridgeError::Transport(_)
            | BridgeError::UpstreamStatus { .. }
            | BridgeError::MissingAsyncResponseId(_)
            | BridgeError::Superseded { .. }
            | BridgeError::Decode(_) => StatusCode::BAD_GATEWAY,
            BridgeError::Configuration(_) | BridgeError::Server(_) | BridgeError::Logging(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ConnectorError> for BridgeError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Transport(msg) => BridgeError::Transport(msg),
            ConnectorError::Status { status, body } => BridgeError::UpstreamStatus { status, body },
            ConnectorError::Parse(msg) => BridgeError::MissingAsyncResponseId(msg),
            ConnectorError::InvalidTarget(msg) => BridgeError::InvalidEndpoint(msg),
        }
    }
}

impl From<CorrelationError> for BridgeError {
    fn from(err: CorrelationError) -> Self {
        match err {
            CorrelationError::Timeout { id, waited } => BridgeError::Timeout { id, waited },
            CorrelationError::Superseded { id } => BridgeError::Superseded { id },
        }
    }
}

/// Convenience type alias for Results using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
