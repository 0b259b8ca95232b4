//! Shared helpers for connector-bridge integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use connector_bridge::{Bridge, BridgeConfig, DeviceCloud};
use connector_client::{AsyncReadResponse, ConnectorError};
use parking_lot::Mutex;

/// A call made against the mock device cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Read { endpoint: String, path: String },
    Subscribe { endpoint: String, path: String },
    Write { endpoint: String, path: String, body: String },
    Execute { endpoint: String, path: String },
    RegisterCallback { url: String },
}

/// In-memory device cloud recording every call.
///
/// Reads are accepted with async-response id `r1` unless configured to fail.
#[derive(Default)]
pub struct MockCloud {
    read_failure: Option<u16>,
    fail_writes: bool,
    calls: Mutex<Vec<Call>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every read with this non-2xx status.
    pub fn failing_reads(mut self, status: u16) -> Self {
        self.read_failure = Some(status);
        self
    }

    /// Reject every write and execute.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn write_result(&self) -> Result<(), ConnectorError> {
        if self.fail_writes {
            Err(ConnectorError::Status {
                status: 500,
                body: "device offline".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceCloud for MockCloud {
    async fn read(&self, endpoint: &str, path: &str) -> Result<AsyncReadResponse, ConnectorError> {
        self.record(Call::Read {
            endpoint: endpoint.to_string(),
            path: path.to_string(),
        });
        match self.read_failure {
            Some(status) => Err(ConnectorError::Status {
                status,
                body: "endpoint not found".to_string(),
            }),
            None => Ok(AsyncReadResponse {
                async_response_id: "r1".to_string(),
            }),
        }
    }

    async fn subscribe(&self, endpoint: &str, path: &str) -> Result<(), ConnectorError> {
        self.record(Call::Subscribe {
            endpoint: endpoint.to_string(),
            path: path.to_string(),
        });
        Ok(())
    }

    async fn write(&self, endpoint: &str, path: &str, body: &str) -> Result<(), ConnectorError> {
        self.record(Call::Write {
            endpoint: endpoint.to_string(),
            path: path.to_string(),
            body: body.to_string(),
        });
        self.write_result()
    }

    async fn execute(&self, endpoint: &str, path: &str) -> Result<(), ConnectorError> {
        self.record(Call::Execute {
            endpoint: endpoint.to_string(),
            path: path.to_string(),
        });
        self.write_result()
    }

    async fn register_callback(&self, url: &str) -> Result<(), ConnectorError> {
        self.record(Call::RegisterCallback {
            url: url.to_string(),
        });
        Ok(())
    }
}

/// Config binding a free local port, not registering any callback.
pub fn test_config(status_timeout: Duration) -> BridgeConfig {
    BridgeConfig::new("test-token")
        .with_listen_addr("127.0.0.1:0".parse().unwrap())
        .with_status_timeout(status_timeout)
        .with_register_callback(false)
}

pub async fn start_bridge(cloud: Arc<MockCloud>, status_timeout: Duration) -> Bridge {
    Bridge::start(test_config(status_timeout), cloud)
        .await
        .expect("Failed to start bridge")
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Send a callback document to the bridge.
pub async fn put_callback(bridge: &Bridge, body: &str) -> reqwest::Response {
    reqwest::Client::new()
        .put(format!("{}/notification", bridge.base_url()))
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("Failed to send callback")
}
