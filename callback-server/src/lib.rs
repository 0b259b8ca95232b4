//! Device cloud callback server with async-response correlation.
//!
//! This crate receives the notification callbacks of an mbed-Connector style
//! device cloud and turns them back into something request/response shaped.
//! It has no knowledge of endpoint schemas or of how events are presented.
//!
//! # Overview
//!
//! - [`CorrelationTable`]: one-shot waiters keyed by async-response id. A
//!   request registers a waiter after issuing a read and suspends until the
//!   matching callback entry arrives or its deadline passes.
//! - [`NotificationRouter`]: splits each callback document into async
//!   responses (resolved against the table) and unsolicited notifications
//!   (sent to a channel as [`NotificationPayload`]s).
//! - [`CallbackServer`]: warp server hosting `PUT /notification`, which always
//!   answers `200 OK` so the device cloud keeps the channel open.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use callback_server::{CallbackServer, CorrelationTable, NotificationPayload, NotificationRouter};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = CorrelationTable::new();
//!     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
//!     let router = Arc::new(NotificationRouter::new(table.clone(), tx));
//!
//!     let server = CallbackServer::new("0.0.0.0:6500".parse()?, router)?;
//!
//!     // After a read answered with {"async-response-id": "r1"}:
//!     let handle = table.register("r1");
//!     match table.wait(handle, Duration::from_secs(5)).await {
//!         Ok(payload) => println!("value bytes: {:?}", payload),
//!         Err(e) => println!("no value: {e}"),
//!     }
//!
//!     tokio::spawn(async move {
//!         while let Some(notification) = rx.recv().await {
//!             println!("{} {} changed", notification.endpoint_id, notification.path);
//!         }
//!     });
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Private Workspace Crate
//!
//! This crate is intended for internal use within the workspace and is not
//! published to crates.io.

pub mod correlation;
mod error;
pub mod payload;
pub mod router;
mod server;

pub use correlation::{CorrelationTable, WaiterHandle};
pub use error::{CallbackError, CorrelationError, ServerError};
pub use router::{NotificationPayload, NotificationRouter, RouteSummary};
pub use server::{notification_route, CallbackServer, NOTIFICATION_PATH};
