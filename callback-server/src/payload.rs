//! Wire format of the device cloud notification callback.
//!
//! The device cloud `PUT`s a JSON document to the registered callback URL.
//! Only two of its keys matter here:
//!
//! ```json
//! {
//!   "async-responses": [{ "id": "1073741825#521f", "status": 200, "payload": "AAU=" }],
//!   "notifications":   [{ "ep": "device-1", "path": "/3200/0/5501", "payload": "AQI=" }]
//! }
//! ```
//!
//! Entries are kept as raw JSON values at the top level so that one malformed
//! entry can be rejected without discarding its siblings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CallbackError;

/// Top-level callback document.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackBody {
    /// Results of previously issued reads
    #[serde(rename = "async-responses", default)]
    pub async_responses: Option<Vec<Value>>,

    /// Unsolicited resource change events
    #[serde(default)]
    pub notifications: Option<Vec<Value>>,
}

impl CallbackBody {
    /// Parse a callback document from raw request bytes.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Whether the document carries neither batch.
    pub fn is_empty(&self) -> bool {
        self.async_responses.as_ref().map_or(true, Vec::is_empty)
            && self.notifications.as_ref().map_or(true, Vec::is_empty)
    }
}

/// One entry of the `async-responses` batch.
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncResponseEntry {
    /// Correlation id returned when the read was issued
    pub id: String,
    /// Status the device reported for the read, if any
    #[serde(default)]
    pub status: Option<u16>,
    /// Base64 encoded resource value
    #[serde(default)]
    pub payload: Option<String>,
}

impl AsyncResponseEntry {
    /// Interpret one raw entry of the batch.
    pub fn from_value(value: Value) -> Result<Self, CallbackError> {
        serde_json::from_value(value).map_err(|e| CallbackError::MalformedEntry {
            kind: "async-response",
            reason: e.to_string(),
        })
    }

    /// Decoded payload bytes, `None` when the entry carries no payload.
    pub fn decoded_payload(&self) -> Option<Result<Bytes, CallbackError>> {
        decode_payload(self.payload.as_deref())
    }
}

/// One entry of the `notifications` batch.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationEntry {
    /// Endpoint (device) name
    pub ep: String,
    /// Resource path that changed, e.g. `/3200/0/5501`
    pub path: String,
    /// Base64 encoded new value
    #[serde(default)]
    pub payload: Option<String>,
}

impl NotificationEntry {
    /// Interpret one raw entry of the batch.
    pub fn from_value(value: Value) -> Result<Self, CallbackError> {
        serde_json::from_value(value).map_err(|e| CallbackError::MalformedEntry {
            kind: "notification",
            reason: e.to_string(),
        })
    }

    /// Decoded payload bytes, `None` when the entry carries no payload.
    pub fn decoded_payload(&self) -> Option<Result<Bytes, CallbackError>> {
        decode_payload(self.payload.as_deref())
    }
}

fn decode_payload(payload: Option<&str>) -> Option<Result<Bytes, CallbackError>> {
    match payload {
        None | Some("") => None,
        Some(encoded) => Some(
            STANDARD
                .decode(encoded)
                .map(Bytes::from)
                .map_err(CallbackError::from),
        ),
    }
}
