//! Error types for the callback server crate.

use std::time::Duration;

/// Outcome of waiting on a correlation waiter that did not yield a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    /// No matching async response arrived before the deadline
    #[error("No async response for {id} within {waited:?}")]
    Timeout {
        /// The async-response id that was awaited
        id: String,
        /// How long the caller waited
        waited: Duration,
    },

    /// The waiter was replaced by a later registration of the same id
    #[error("Waiter for {id} was replaced by a duplicate registration")]
    Superseded {
        /// The async-response id that was registered twice
        id: String,
    },
}

/// Errors raised while interpreting a single callback entry.
///
/// These never leave the notification router: they are logged and the
/// offending entry is skipped.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The entry is not shaped like an async response or notification
    #[error("Malformed {kind} entry: {reason}")]
    MalformedEntry {
        /// Which batch the entry came from
        kind: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The base64 payload could not be decoded
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Errors from starting or running the HTTP server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound
    #[error("Failed to bind callback server: {0}")]
    Bind(String),
}
