//! Wiring of the running bridge.
//!
//! [`Bridge`] owns the HTTP server and the background task that turns
//! unsolicited notifications into live events:
//!
//! ```text
//! PUT /notification ──► NotificationRouter ──┬──► CorrelationTable ──► GET /status/:id
//!                                            └──► notification task ──► FanOutRelay ──► GET /live
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use callback_server::{CallbackServer, CorrelationTable, NotificationPayload, NotificationRouter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::commands::CommandDispatcher;
use crate::config::BridgeConfig;
use crate::device_cloud::DeviceCloud;
use crate::error::Result;
use crate::relay::FanOutRelay;
use crate::routes::bridge_routes;
use crate::schema::SchemaRegistry;
use crate::status::StatusHandler;

/// A running bridge.
pub struct Bridge {
    server: CallbackServer,
    correlation: CorrelationTable,
    relay: FanOutRelay,
    dispatcher: CommandDispatcher,
    callback_url: String,
    background_tasks: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// Start the bridge with the default resource schemas.
    pub async fn start(config: BridgeConfig, cloud: Arc<dyn DeviceCloud>) -> Result<Self> {
        Self::start_with_schemas(config, cloud, SchemaRegistry::default()).await
    }

    /// Start the bridge.
    ///
    /// Binds `config.listen_addr`, starts routing callbacks and, when
    /// `config.register_callback` is set, registers the callback URL with the
    /// device cloud in the background. A failed registration is only logged;
    /// the device cloud may already know the URL.
    pub async fn start_with_schemas(
        config: BridgeConfig,
        cloud: Arc<dyn DeviceCloud>,
        schemas: SchemaRegistry,
    ) -> Result<Self> {
        config.validate()?;
        tracing::debug!(listen_addr = %config.listen_addr, api_url = %config.api_url, "Starting bridge");

        let schemas = Arc::new(schemas);
        let correlation = CorrelationTable::new();
        let relay = FanOutRelay::new(config.relay_capacity);
        let dispatcher = CommandDispatcher::new(Arc::clone(&cloud), relay.clone());
        let status = Arc::new(StatusHandler::new(
            Arc::clone(&cloud),
            correlation.clone(),
            config.status_timeout,
        ));

        let (notification_tx, notification_rx) = mpsc::unbounded_channel();
        let router = Arc::new(NotificationRouter::new(correlation.clone(), notification_tx));

        let routes = bridge_routes(status, Arc::clone(&schemas), relay.clone(), dispatcher.clone());
        let server = CallbackServer::with_routes(config.listen_addr, router, Some(routes))?;

        let mut background_tasks = vec![spawn_notification_relay(
            notification_rx,
            schemas,
            relay.clone(),
        )];

        // Port 0 resolves to the real port only after binding
        let callback_url = config
            .clone()
            .with_listen_addr(server.local_addr())
            .callback_url();

        if config.register_callback {
            background_tasks.push(spawn_callback_registration(cloud, callback_url.clone()));
        }

        tracing::info!(
            local_addr = %server.local_addr(),
            callback_url = %callback_url,
            "Bridge listening"
        );

        Ok(Self {
            server,
            correlation,
            relay,
            dispatcher,
            callback_url,
            background_tasks,
        })
    }

    /// Address the HTTP server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Local base URL, e.g. `http://127.0.0.1:6500`.
    pub fn base_url(&self) -> &str {
        self.server.base_url()
    }

    /// Callback URL registered with the device cloud.
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Waiters for outstanding status reads.
    pub fn correlation(&self) -> &CorrelationTable {
        &self.correlation
    }

    /// Relay feeding live subscribers.
    pub fn relay(&self) -> &FanOutRelay {
        &self.relay
    }

    /// Dispatcher for endpoint commands.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Stop serving and cancel background tasks.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down bridge");
        self.server.shutdown().await;
        for task in self.background_tasks {
            task.abort();
        }
    }

    /// Serve until the HTTP server exits.
    pub async fn wait(self) {
        self.server.wait().await;
        for task in self.background_tasks {
            task.abort();
        }
    }
}

/// Decode each notification by its resource schema and publish it.
fn spawn_notification_relay(
    mut receiver: mpsc::UnboundedReceiver<NotificationPayload>,
    schemas: Arc<SchemaRegistry>,
    relay: FanOutRelay,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = receiver.recv().await {
            match schemas.decode(&notification.path, &notification.payload) {
                Ok(value) => {
                    tracing::info!(
                        endpoint = %notification.endpoint_id,
                        path = %notification.path,
                        value = %value,
                        "New event"
                    );
                    relay.publish(&notification.endpoint_id, value);
                }
                Err(e) => tracing::warn!(
                    endpoint = %notification.endpoint_id,
                    path = %notification.path,
                    error = %e,
                    "Dropping undecodable notification"
                ),
            }
        }
        tracing::debug!("Notification channel closed");
    })
}

fn spawn_callback_registration(cloud: Arc<dyn DeviceCloud>, callback_url: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match cloud.register_callback(&callback_url).await {
            Ok(()) => tracing::info!(callback_url = %callback_url, "Registered notification callback"),
            Err(e) => tracing::warn!(
                callback_url = %callback_url,
                error = %e,
                "Failed to register notification callback"
            ),
        }
    })
}
