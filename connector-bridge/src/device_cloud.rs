//! The device cloud as seen by the bridge.
//!
//! Handlers talk to the device cloud through the [`DeviceCloud`] trait so the
//! correlation flow can be exercised without network access.

use async_trait::async_trait;
use connector_client::{AsyncReadResponse, ConnectorClient, ConnectorError};

/// Operations the bridge needs from the device cloud.
#[async_trait]
pub trait DeviceCloud: Send + Sync {
    /// Queue a read; the value arrives later under the returned async-response id
    async fn read(
        &self,
        endpoint: &str,
        resource_path: &str,
    ) -> Result<AsyncReadResponse, ConnectorError>;

    /// Ask for future changes of a resource to be delivered as notifications
    async fn subscribe(&self, endpoint: &str, resource_path: &str) -> Result<(), ConnectorError>;

    /// Write a plain-text value to a resource
    async fn write(&self, endpoint: &str, resource_path: &str, body: &str)
        -> Result<(), ConnectorError>;

    /// Execute a function resource
    async fn execute(&self, endpoint: &str, resource_path: &str) -> Result<(), ConnectorError>;

    /// Register the URL callbacks are delivered to
    async fn register_callback(&self, callback_url: &str) -> Result<(), ConnectorError>;
}

#[async_trait]
impl DeviceCloud for ConnectorClient {
    async fn read(
        &self,
        endpoint: &str,
        resource_path: &str,
    ) -> Result<AsyncReadResponse, ConnectorError> {
        ConnectorClient::read(self, endpoint, resource_path).await
    }

    async fn subscribe(&self, endpoint: &str, resource_path: &str) -> Result<(), ConnectorError> {
        ConnectorClient::subscribe(self, endpoint, resource_path).await
    }

    async fn write(
        &self,
        endpoint: &str,
        resource_path: &str,
        body: &str,
    ) -> Result<(), ConnectorError> {
        ConnectorClient::write(self, endpoint, resource_path, body).await
    }

    async fn execute(&self, endpoint: &str, resource_path: &str) -> Result<(), ConnectorError> {
        ConnectorClient::execute(self, endpoint, resource_path).await
    }

    async fn register_callback(&self, callback_url: &str) -> Result<(), ConnectorError> {
        ConnectorClient::register_callback(self, callback_url).await
    }
}
