//! Commands sent to endpoints from live subscribers.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::device_cloud::DeviceCloud;
use crate::relay::FanOutRelay;
use crate::schema::ResourceValue;

/// Resource holding the level/color value of an endpoint.
pub const LEVEL_RESOURCE_PATH: &str = "/Test5/0/D";

/// Resource holding the blink pattern.
pub const PATTERN_RESOURCE_PATH: &str = "/3201/0/5853";

/// Function resource that plays the blink pattern.
pub const ACTION_RESOURCE_PATH: &str = "/3201/0/5850";

/// A command frame received from a live subscriber.
///
/// `value` may be a string or a number; numbers are written as their
/// decimal text.
///
/// ```json
/// {"action": "set-value", "id": "device-1", "value": "#ff0000"}
/// {"action": "set-value", "id": "device-1", "value": 128}
/// {"action": "trigger-action", "id": "device-1"}
/// {"action": "set-pattern", "id": "device-1", "pattern": "500:500:500"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum LiveCommand {
    SetValue {
        id: String,
        #[serde(deserialize_with = "text_or_number")]
        value: String,
    },
    TriggerAction { id: String },
    SetPattern { id: String, pattern: String },
}

impl LiveCommand {
    /// Endpoint the command targets.
    pub fn endpoint_id(&self) -> &str {
        match self {
            LiveCommand::SetValue { id, .. }
            | LiveCommand::TriggerAction { id }
            | LiveCommand::SetPattern { id, .. } => id,
        }
    }
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Forwards subscriber commands to the device cloud.
///
/// Writes are echoed to all live subscribers whether or not the device cloud
/// accepted them, so the UI reflects the intended value immediately.
#[derive(Clone)]
pub struct CommandDispatcher {
    cloud: Arc<dyn DeviceCloud>,
    relay: FanOutRelay,
}

impl CommandDispatcher {
    pub fn new(cloud: Arc<dyn DeviceCloud>, relay: FanOutRelay) -> Self {
        Self { cloud, relay }
    }

    /// Write `value` to the level resource of `endpoint_id` and echo it.
    pub async fn set_value(&self, endpoint_id: &str, value: &str) {
        let result = self.cloud.write(endpoint_id, LEVEL_RESOURCE_PATH, value).await;
        log_outcome("set-value", endpoint_id, &result);
        self.relay.publish(endpoint_id, ResourceValue::from(value));
    }

    /// Write `pattern` to the pattern resource of `endpoint_id` and echo it.
    pub async fn set_pattern(&self, endpoint_id: &str, pattern: &str) {
        let result = self
            .cloud
            .write(endpoint_id, PATTERN_RESOURCE_PATH, pattern)
            .await;
        log_outcome("set-pattern", endpoint_id, &result);
        self.relay.publish(endpoint_id, ResourceValue::from(pattern));
    }

    /// Execute the action resource of `endpoint_id`.
    pub async fn trigger_action(&self, endpoint_id: &str) {
        let result = self.cloud.execute(endpoint_id, ACTION_RESOURCE_PATH).await;
        log_outcome("trigger-action", endpoint_id, &result);
    }

    /// Run a command received from a subscriber.
    pub async fn dispatch(&self, command: LiveCommand) {
        match command {
            LiveCommand::SetValue { id, value } => self.set_value(&id, &value).await,
            LiveCommand::TriggerAction { id } => self.trigger_action(&id).await,
            LiveCommand::SetPattern { id, pattern } => self.set_pattern(&id, &pattern).await,
        }
    }
}

fn log_outcome<E: std::fmt::Display>(action: &str, endpoint_id: &str, result: &Result<(), E>) {
    match result {
        Ok(()) => tracing::info!(action, endpoint = %endpoint_id, "Command accepted by device cloud"),
        Err(e) => tracing::warn!(action, endpoint = %endpoint_id, error = %e, "Command failed"),
    }
}
