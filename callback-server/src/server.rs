//! HTTP server for receiving device cloud notification callbacks.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::error::ServerError;
use crate::router::NotificationRouter;

/// Path the device cloud is told to deliver callbacks to.
pub const NOTIFICATION_PATH: &str = "notification";

/// HTTP callback server for receiving device cloud notifications.
///
/// The `CallbackServer` binds to a local address and serves
/// `PUT /notification`, handing every body to a [`NotificationRouter`].
/// Additional routes (status pages, live updates) can be mounted next to it
/// with [`CallbackServer::with_routes`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, CorrelationTable, NotificationPayload, NotificationRouter};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
///     let router = Arc::new(NotificationRouter::new(CorrelationTable::new(), tx));
///
///     let server = CallbackServer::new("0.0.0.0:6500".parse().unwrap(), router)
///         .expect("Failed to create callback server");
///
///     println!("Register {} with the device cloud", server.notification_url());
///
///     while let Some(notification) = rx.recv().await {
///         println!("Event for endpoint: {}", notification.endpoint_id);
///     }
/// }
/// ```
pub struct CallbackServer {
    /// The address the server is bound to
    local_addr: SocketAddr,
    /// Base URL derived from the bound address
    base_url: String,
    /// Router handling callback bodies
    router: Arc<NotificationRouter>,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind and start a callback server serving only `PUT /notification`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(addr: SocketAddr, router: Arc<NotificationRouter>) -> Result<Self, ServerError> {
        Self::with_routes(addr, router, None)
    }

    /// Bind and start a callback server with additional routes.
    ///
    /// The notification route is matched first; `extra` is tried for any
    /// request it rejects.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to bind; port 0 picks a free port
    /// * `router` - Router handling callback bodies
    /// * `extra` - Optional additional routes served by the same listener
    pub fn with_routes(
        addr: SocketAddr,
        router: Arc<NotificationRouter>,
        extra: Option<BoxedFilter<(Response,)>>,
    ) -> Result<Self, ServerError> {
        let notify = notification_route(router.clone());
        let routes = match extra {
            Some(extra) => notify.or(extra).unify().boxed(),
            None => notify,
        };

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let (local_addr, server) = warp::serve(routes.recover(handle_rejection))
            .try_bind_with_graceful_shutdown(addr, async move {
                shutdown_rx.recv().await;
            })
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;

        tracing::info!(%local_addr, "Callback server listening");
        let server_handle = tokio::spawn(server);

        Ok(Self {
            local_addr,
            base_url: format!("http://{local_addr}"),
            router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the port the server is bound to.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Base URL of the bound listener, e.g. `http://0.0.0.0:6500`.
    ///
    /// This is the local view; deployments behind NAT or a proxy register a
    /// public URL with the device cloud instead.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Local URL of the notification endpoint.
    pub fn notification_url(&self) -> String {
        format!("{}/{}", self.base_url, NOTIFICATION_PATH)
    }

    /// Get a reference to the notification router.
    pub fn router(&self) -> &Arc<NotificationRouter> {
        &self.router
    }

    /// Shutdown the callback server gracefully.
    ///
    /// Sends a shutdown signal to the HTTP server and waits for it to
    /// complete any in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        tracing::info!(local_addr = %self.local_addr, "Callback server stopped");
    }

    /// Wait until the server task exits.
    pub async fn wait(mut self) {
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
    }
}

/// `PUT /notification`: route the body and always answer `200 OK`.
///
/// The device cloud drops the callback channel on any other status, so the
/// routing outcome is only logged.
pub fn notification_route(router: Arc<NotificationRouter>) -> BoxedFilter<(Response,)> {
    warp::put()
        .and(warp::path(NOTIFICATION_PATH))
        .and(warp::path::end())
        .and(warp::body::bytes())
        .map(move |body: bytes::Bytes| {
            tracing::debug!(body_len = body.len(), "Received callback");
            let summary = router.route_raw(&body);
            if summary.malformed {
                tracing::warn!("Answered malformed callback with 200 to keep channel alive");
            }
            warp::reply::with_status("OK", StatusCode::OK).into_response()
        })
        .boxed()
}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not found";
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed";
    } else {
        tracing::warn!(rejection = ?err, "Unhandled rejection");
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error";
    }

    Ok(warp::reply::with_status(message, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationTable;

    fn test_router() -> Arc<NotificationRouter> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Arc::new(NotificationRouter::new(CorrelationTable::new(), tx))
    }

    #[tokio::test]
    async fn test_notification_route_always_ok() {
        let route = notification_route(test_router());

        for body in [
            &br#"{"async-responses":[{"id":"r1","payload":"AAU="}]}"#[..],
            &b"{}"[..],
            &b"definitely not json"[..],
        ] {
            let response = warp::test::request()
                .method("PUT")
                .path("/notification")
                .body(body)
                .reply(&route)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.body(), "OK");
        }
    }

    #[tokio::test]
    async fn test_notification_route_rejects_other_methods() {
        let route = notification_route(test_router());

        let matched = warp::test::request()
            .method("GET")
            .path("/notification")
            .matches(&route)
            .await;
        assert!(!matched);
    }

    #[tokio::test]
    async fn test_callback_server_creation() {
        let server = CallbackServer::new("127.0.0.1:0".parse().unwrap(), test_router());
        let server = tokio_test::assert_ok!(server);

        assert_ne!(server.port(), 0);
        assert!(server.base_url().contains(&server.port().to_string()));
        assert!(server.notification_url().ends_with("/notification"));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_error() {
        let first = CallbackServer::new("127.0.0.1:0".parse().unwrap(), test_router()).unwrap();

        let second = CallbackServer::new(first.local_addr(), test_router());
        assert!(matches!(second, Err(ServerError::Bind(_))));

        first.shutdown().await;
    }
}
