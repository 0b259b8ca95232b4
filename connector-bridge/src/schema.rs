//! Endpoint resource schemas.
//!
//! The device cloud delivers resource values as opaque bytes. How they are
//! interpreted depends on the resource path, never on the bytes themselves:
//! the button counter at `/3200/0/5501` is a 2-byte big-endian integer, other
//! resources are plain UTF-8 text.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Resource path of the button press counter.
pub const BUTTON_COUNTER_PATH: &str = "/3200/0/5501";

/// Errors from decoding a resource payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Counter payloads carry two bytes
    #[error("Counter payload needs 2 bytes, got {0}")]
    TooShort(usize),

    /// Text payload is not UTF-8
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// A decoded resource value.
///
/// Serializes as a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceValue {
    Counter(u16),
    Text(String),
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::Counter(count) => write!(f, "{count}"),
            ResourceValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for ResourceValue {
    fn from(text: &str) -> Self {
        ResourceValue::Text(text.to_string())
    }
}

/// How a resource payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadDecoder {
    /// Big-endian counter, `(byte0 << 8) + byte1`
    Counter,
    /// Raw UTF-8 text
    Text,
}

impl PayloadDecoder {
    /// Decode `payload` into a value.
    pub fn decode(&self, payload: &[u8]) -> Result<ResourceValue, DecodeError> {
        match self {
            PayloadDecoder::Counter => match payload {
                [high, low, ..] => Ok(ResourceValue::Counter(u16::from_be_bytes([*high, *low]))),
                _ => Err(DecodeError::TooShort(payload.len())),
            },
            PayloadDecoder::Text => Ok(ResourceValue::Text(std::str::from_utf8(payload)?.to_string())),
        }
    }
}

/// Resource path plus the decoder for its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSchema {
    /// Resource path, e.g. `/3200/0/5501`
    pub resource_path: String,
    /// Decoder for values of this resource
    pub decoder: PayloadDecoder,
}

impl EndpointSchema {
    pub fn new(resource_path: impl Into<String>, decoder: PayloadDecoder) -> Self {
        Self {
            resource_path: resource_path.into(),
            decoder,
        }
    }

    /// Schema of the button press counter.
    pub fn button_counter() -> Self {
        Self::new(BUTTON_COUNTER_PATH, PayloadDecoder::Counter)
    }

    /// Decode a value of this resource.
    pub fn decode(&self, payload: &[u8]) -> Result<ResourceValue, DecodeError> {
        self.decoder.decode(payload)
    }
}

/// Known resource schemas, keyed by resource path.
///
/// Paths without a registered schema are decoded as text.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, EndpointSchema>,
    status_path: String,
}

impl SchemaRegistry {
    /// Create a registry whose status page shows `status_schema`.
    pub fn new(status_schema: EndpointSchema) -> Self {
        let status_path = status_schema.resource_path.clone();
        let mut schemas = HashMap::new();
        schemas.insert(status_path.clone(), status_schema);
        Self {
            schemas,
            status_path,
        }
    }

    /// Add or replace a schema.
    pub fn with_schema(mut self, schema: EndpointSchema) -> Self {
        self.schemas.insert(schema.resource_path.clone(), schema);
        self
    }

    /// Schema for `resource_path`, falling back to text.
    pub fn schema_for(&self, resource_path: &str) -> EndpointSchema {
        self.schemas
            .get(resource_path)
            .cloned()
            .unwrap_or_else(|| EndpointSchema::new(resource_path, PayloadDecoder::Text))
    }

    /// Schema of the resource shown on the status page.
    pub fn status_schema(&self) -> EndpointSchema {
        self.schema_for(&self.status_path)
    }

    /// Decode a value of `resource_path`.
    pub fn decode(&self, resource_path: &str, payload: &[u8]) -> Result<ResourceValue, DecodeError> {
        match self.schemas.get(resource_path) {
            Some(schema) => schema.decode(payload),
            None => PayloadDecoder::Text.decode(payload),
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(EndpointSchema::button_counter())
    }
}
