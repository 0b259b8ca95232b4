//! # connector-bridge
//!
//! Bridges a synchronous HTTP request/response model onto a webhook-driven
//! device cloud, and relays unsolicited device events to live subscribers.
//!
//! `GET /status/:id` issues a read against the device cloud. The value does
//! not come back in the response: the device cloud hands out an
//! async-response id and delivers the value later through the
//! `PUT /notification` callback. The bridge parks the request on that id in a
//! [`CorrelationTable`](callback_server::CorrelationTable) until the callback
//! arrives or the status timeout passes. Notifications the bridge never asked
//! for are decoded by resource schema and pushed to every `GET /live`
//! websocket.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use connector_bridge::{Bridge, BridgeConfig};
//! use connector_client::ConnectorClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::from_env()?;
//!     let client = ConnectorClient::with_base_url(&config.api_url, &config.token)?;
//!
//!     let bridge = Bridge::start(config, Arc::new(client)).await?;
//!     bridge.wait().await;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod commands;
pub mod config;
pub mod device_cloud;
mod error;
pub mod live;
pub mod logging;
pub mod relay;
pub mod routes;
pub mod schema;
pub mod status;
mod view;

pub use bridge::Bridge;
pub use commands::{CommandDispatcher, LiveCommand};
pub use config::BridgeConfig;
pub use device_cloud::DeviceCloud;
pub use error::{BridgeError, Result};
pub use logging::{init_logging, init_logging_from_env, LoggingMode};
pub use relay::{FanOutRelay, LiveEvent};
pub use schema::{EndpointSchema, PayloadDecoder, ResourceValue, SchemaRegistry};
pub use status::{StatusHandler, StatusReport};
