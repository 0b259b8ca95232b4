//! Demultiplexing of device cloud callbacks.
//!
//! This module provides the `NotificationRouter`, which splits an incoming
//! callback document into async responses (handed to the correlation table)
//! and unsolicited notifications (sent over a channel to the consuming crate).
//!
//! Routing never fails. The device cloud tears down the whole notification
//! channel when a callback is answered with anything but 2xx, and only resumes
//! after a cooldown, so every problem is logged and the entry skipped.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::correlation::CorrelationTable;
use crate::payload::{AsyncResponseEntry, CallbackBody, NotificationEntry};

/// Decoded unsolicited notification for one endpoint resource.
///
/// The payload is still in the resource's own encoding; interpreting it is up
/// to the consumer, which knows the schema of each resource path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// Endpoint (device) name
    pub endpoint_id: String,
    /// Resource path that changed
    pub path: String,
    /// Raw resource value
    pub payload: Bytes,
}

/// What happened to the entries of one callback document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouteSummary {
    /// Async responses that fulfilled a waiter
    pub resolved: usize,
    /// Async responses with no registered waiter (late, duplicate, timed out)
    pub unmatched: usize,
    /// Notifications forwarded to the consumer channel
    pub forwarded: usize,
    /// Entries skipped for a missing payload or a malformed shape
    pub skipped: usize,
    /// The document itself was not valid JSON
    pub malformed: bool,
}

/// Routes callback documents to the correlation table and the notification channel.
#[derive(Clone)]
pub struct NotificationRouter {
    correlation: CorrelationTable,
    notification_sender: mpsc::UnboundedSender<NotificationPayload>,
}

impl NotificationRouter {
    /// Create a new router.
    ///
    /// # Arguments
    ///
    /// * `correlation` - Table holding the waiters for outstanding reads
    /// * `notification_sender` - Channel receiving unsolicited notifications
    ///
    /// # Example
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use callback_server::{CorrelationTable, NotificationPayload, NotificationRouter};
    ///
    /// let (tx, _rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// let router = NotificationRouter::new(CorrelationTable::new(), tx);
    /// ```
    pub fn new(
        correlation: CorrelationTable,
        notification_sender: mpsc::UnboundedSender<NotificationPayload>,
    ) -> Self {
        Self {
            correlation,
            notification_sender,
        }
    }

    /// The correlation table async responses are resolved against.
    pub fn correlation(&self) -> &CorrelationTable {
        &self.correlation
    }

    /// Route a raw callback request body.
    ///
    /// A body that is not valid JSON is logged and reported as
    /// [`RouteSummary::malformed`]; the caller still answers `200 OK`.
    pub fn route_raw(&self, body: &[u8]) -> RouteSummary {
        match CallbackBody::from_slice(body) {
            Ok(parsed) => self.route(parsed),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    body = %String::from_utf8_lossy(body),
                    "Ignoring callback with malformed JSON body"
                );
                RouteSummary {
                    malformed: true,
                    ..RouteSummary::default()
                }
            }
        }
    }

    /// Route a parsed callback document.
    ///
    /// Async responses are processed before notifications, each batch in
    /// arrival order.
    pub fn route(&self, body: CallbackBody) -> RouteSummary {
        let mut summary = RouteSummary::default();

        if body.is_empty() {
            tracing::debug!("Callback carried no async responses or notifications");
            return summary;
        }

        for value in body.async_responses.unwrap_or_default() {
            self.route_async_response(value, &mut summary);
        }

        for value in body.notifications.unwrap_or_default() {
            self.route_notification(value, &mut summary);
        }

        tracing::debug!(?summary, "Callback routed");
        summary
    }

    fn route_async_response(&self, value: serde_json::Value, summary: &mut RouteSummary) {
        let entry = match AsyncResponseEntry::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping async response");
                summary.skipped += 1;
                return;
            }
        };

        let payload = match entry.decoded_payload() {
            None => {
                tracing::debug!(
                    async_response_id = %entry.id,
                    status = ?entry.status,
                    "Skipping async response without payload"
                );
                summary.skipped += 1;
                return;
            }
            Some(Err(e)) => {
                tracing::warn!(async_response_id = %entry.id, error = %e, "Skipping async response");
                summary.skipped += 1;
                return;
            }
            Some(Ok(payload)) => payload,
        };

        if self.correlation.resolve(&entry.id, payload) {
            summary.resolved += 1;
        } else {
            tracing::debug!(
                async_response_id = %entry.id,
                "No waiter for async response, dropping"
            );
            summary.unmatched += 1;
        }
    }

    fn route_notification(&self, value: serde_json::Value, summary: &mut RouteSummary) {
        let entry = match NotificationEntry::from_value(value) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping notification");
                summary.skipped += 1;
                return;
            }
        };

        let payload = match entry.decoded_payload() {
            None => {
                summary.skipped += 1;
                return;
            }
            Some(Err(e)) => {
                tracing::warn!(
                    endpoint = %entry.ep,
                    path = %entry.path,
                    error = %e,
                    "Skipping notification"
                );
                summary.skipped += 1;
                return;
            }
            Some(Ok(payload)) => payload,
        };

        tracing::info!(
            endpoint = %entry.ep,
            path = %entry.path,
            payload = ?payload,
            "New event"
        );

        let notification = NotificationPayload {
            endpoint_id: entry.ep,
            path: entry.path,
            payload,
        };

        // Receiver dropped means nobody consumes events any more; not an error
        // the callback caller should see.
        if self.notification_sender.send(notification).is_err() {
            tracing::warn!("Notification consumer has gone away, dropping event");
            summary.skipped += 1;
        } else {
            summary.forwarded += 1;
        }
    }
}
