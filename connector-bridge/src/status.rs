//! Status requests: one synchronous read over an asynchronous device cloud.
//!
//! A status request issues a read, receives an async-response id, registers a
//! waiter for that id and suspends until the notification callback delivers
//! the value or the deadline passes:
//!
//! ```text
//! Issuing ──► AwaitingCallback ──► Resolved ──┐
//!    │               └──────────► TimedOut ──┼──► Responded
//!    └─────────────────────────► UpstreamError ┘
//! ```
//!
//! `Resolved` and `TimedOut` are exclusive; the correlation table decides
//! which one wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use callback_server::CorrelationTable;

use crate::device_cloud::DeviceCloud;
use crate::error::{BridgeError, Result};
use crate::schema::{EndpointSchema, ResourceValue};

/// Phases of a status request, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    Issuing,
    AwaitingCallback,
    Resolved,
    TimedOut,
    UpstreamError,
    Responded,
}

impl fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusPhase::Issuing => "issuing",
            StatusPhase::AwaitingCallback => "awaiting-callback",
            StatusPhase::Resolved => "resolved",
            StatusPhase::TimedOut => "timed-out",
            StatusPhase::UpstreamError => "upstream-error",
            StatusPhase::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Value of one endpoint resource, as read through the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub endpoint_id: String,
    pub resource_path: String,
    pub value: ResourceValue,
}

/// Runs status requests against the device cloud.
pub struct StatusHandler {
    cloud: Arc<dyn DeviceCloud>,
    correlation: CorrelationTable,
    timeout: Duration,
}

impl StatusHandler {
    /// Create a handler.
    ///
    /// # Arguments
    ///
    /// * `cloud` - Device cloud reads and subscriptions are issued against
    /// * `correlation` - Table the notification router resolves async responses in
    /// * `timeout` - How long to wait for the callback after the read was accepted
    pub fn new(cloud: Arc<dyn DeviceCloud>, correlation: CorrelationTable, timeout: Duration) -> Self {
        Self {
            cloud,
            correlation,
            timeout,
        }
    }

    /// Deadline applied to each read.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read the current value of `schema`'s resource on `endpoint_id`.
    ///
    /// The read is attempted once. On success a subscription for the same
    /// resource is requested in the background so later changes arrive as
    /// notifications; its failure is only logged.
    pub async fn fetch(&self, endpoint_id: &str, schema: &EndpointSchema) -> Result<StatusReport> {
        let path = schema.resource_path.as_str();
        log_phase(endpoint_id, StatusPhase::Issuing);

        let read = match self.cloud.read(endpoint_id, path).await {
            Ok(read) => read,
            Err(e) => {
                let err = BridgeError::from(e);
                tracing::warn!(
                    endpoint = %endpoint_id,
                    phase = %StatusPhase::UpstreamError,
                    error = %err,
                    "Status read rejected by device cloud"
                );
                return Err(err);
            }
        };

        let handle = self.correlation.register(read.async_response_id.as_str());
        tracing::debug!(
            endpoint = %endpoint_id,
            phase = %StatusPhase::AwaitingCallback,
            async_response_id = %read.async_response_id,
            timeout_ms = self.timeout.as_millis() as u64,
            "Waiting for async response"
        );

        let payload = match self.correlation.wait(handle, self.timeout).await {
            Ok(payload) => payload,
            Err(e) => {
                let err = BridgeError::from(e);
                tracing::warn!(
                    endpoint = %endpoint_id,
                    phase = %StatusPhase::TimedOut,
                    error = %err,
                    "Status read not answered"
                );
                return Err(err);
            }
        };

        log_phase(endpoint_id, StatusPhase::Resolved);
        let value = schema.decode(&payload)?;

        self.subscribe_in_background(endpoint_id, path);

        Ok(StatusReport {
            endpoint_id: endpoint_id.to_string(),
            resource_path: path.to_string(),
            value,
        })
    }

    fn subscribe_in_background(&self, endpoint_id: &str, path: &str) {
        let cloud = Arc::clone(&self.cloud);
        let endpoint_id = endpoint_id.to_string();
        let path = path.to_string();

        tokio::spawn(async move {
            match cloud.subscribe(&endpoint_id, &path).await {
                Ok(()) => tracing::info!(endpoint = %endpoint_id, path = %path, "Made subscription"),
                Err(e) => tracing::warn!(
                    endpoint = %endpoint_id,
                    path = %path,
                    error = %e,
                    "Subscription request failed"
                ),
            }
        });
    }
}

fn log_phase(endpoint_id: &str, phase: StatusPhase) {
    tracing::debug!(endpoint = %endpoint_id, phase = %phase, "Status request");
}
