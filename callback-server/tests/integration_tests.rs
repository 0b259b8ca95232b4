//! Integration tests for the callback server.
//!
//! These tests start a real HTTP server, send actual HTTP requests,
//! and verify end-to-end correlation and notification routing.

use std::sync::Arc;
use std::time::Duration;

use callback_server::{
    CallbackServer, CorrelationError, CorrelationTable, NotificationPayload, NotificationRouter,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use warp::Filter;

fn start_server() -> (
    CallbackServer,
    CorrelationTable,
    mpsc::UnboundedReceiver<NotificationPayload>,
) {
    let table = CorrelationTable::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let router = Arc::new(NotificationRouter::new(table.clone(), tx));
    let server = CallbackServer::new("127.0.0.1:0".parse().unwrap(), router)
        .expect("Failed to create callback server");
    (server, table, rx)
}

/// A waiter registered before the callback is resolved by it over HTTP.
#[tokio::test]
async fn test_async_response_resolves_waiter_end_to_end() {
    let (server, table, _rx) = start_server();
    let client = reqwest::Client::new();

    let handle = table.register("r1");
    let waiter = tokio::spawn(async move { handle.wait(Duration::from_secs(5)).await });

    let response = client
        .put(server.notification_url())
        .header("Content-Type", "application/json")
        .body(r#"{"async-responses":[{"id":"r1","status":200,"payload":"AAU="}]}"#)
        .send()
        .await
        .expect("Failed to send callback");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    let payload = waiter.await.unwrap().expect("Waiter should be resolved");
    assert_eq!(&payload[..], &[0x00, 0x05]);
    assert_eq!(table.pending_count(), 0);

    server.shutdown().await;
}

/// Unsolicited notifications reach the consumer channel in arrival order.
#[tokio::test]
async fn test_notifications_forwarded_in_order() {
    let (server, _table, mut rx) = start_server();
    let client = reqwest::Client::new();

    let response = client
        .put(server.notification_url())
        .body(
            r#"{"notifications":[
                {"ep":"device-1","path":"/3200/0/5501","payload":"AQI="},
                {"ep":"device-2","path":"/3200/0/5501","payload":"AAE="}
            ]}"#,
        )
        .send()
        .await
        .expect("Failed to send callback");
    assert_eq!(response.status(), 200);

    let first = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for notification")
        .expect("No notification received");
    let second = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for notification")
        .expect("No notification received");

    assert_eq!(first.endpoint_id, "device-1");
    assert_eq!(&first.payload[..], &[0x01, 0x02]);
    assert_eq!(second.endpoint_id, "device-2");

    server.shutdown().await;
}

/// Malformed, empty and late callbacks are all acknowledged with 200.
#[tokio::test]
async fn test_callback_always_acknowledged() {
    let (server, table, mut rx) = start_server();
    let client = reqwest::Client::new();

    for body in [
        "",
        "{}",
        "not json at all",
        r#"{"async-responses":"oops"}"#,
        r#"{"async-responses":[{"id":"never-registered","payload":"AAU="}]}"#,
        r#"{"notifications":[{"ep":"device-1","path":"/3200/0/5501"}]}"#,
    ] {
        let response = client
            .put(server.notification_url())
            .body(body)
            .send()
            .await
            .expect("Failed to send callback");
        assert_eq!(response.status(), 200, "body {body:?} should be acknowledged");
    }

    assert_eq!(table.pending_count(), 0);
    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

    server.shutdown().await;
}

/// A late callback after the waiter timed out is a harmless no-op.
#[tokio::test]
async fn test_late_callback_after_timeout() {
    let (server, table, _rx) = start_server();
    let client = reqwest::Client::new();

    let handle = table.register("r1");
    let result = handle.wait(Duration::from_millis(50)).await;
    assert!(matches!(result, Err(CorrelationError::Timeout { .. })));

    let response = client
        .put(server.notification_url())
        .body(r#"{"async-responses":[{"id":"r1","payload":"AAU="}]}"#)
        .send()
        .await
        .expect("Failed to send callback");
    assert_eq!(response.status(), 200);
    assert_eq!(table.pending_count(), 0);

    server.shutdown().await;
}

/// Concurrent callbacks for different ids each resolve their own waiter.
#[tokio::test]
async fn test_concurrent_callbacks_resolve_by_id() {
    let (server, table, _rx) = start_server();
    let client = reqwest::Client::new();
    let url = server.notification_url();

    let handles: Vec<_> = (0..5).map(|i| table.register(format!("r{i}"))).collect();

    let senders: Vec<_> = (0..5u8)
        .map(|i| {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                let payload = match i {
                    0 => "AAA=",
                    1 => "AAE=",
                    2 => "AAI=",
                    3 => "AAM=",
                    _ => "AAQ=",
                };
                client
                    .put(url)
                    .body(format!(
                        r#"{{"async-responses":[{{"id":"r{i}","payload":"{payload}"}}]}}"#
                    ))
                    .send()
                    .await
            })
        })
        .collect();

    for sender in senders {
        let response = sender.await.expect("Task failed").expect("HTTP request failed");
        assert_eq!(response.status(), 200);
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let payload = handle.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&payload[..], &[0x00, i as u8]);
    }

    server.shutdown().await;
}

/// Extra routes are served next to the notification endpoint.
#[tokio::test]
async fn test_extra_routes_and_unknown_paths() {
    let table = CorrelationTable::new();
    let (tx, _rx) = mpsc::unbounded_channel();
    let router = Arc::new(NotificationRouter::new(table, tx));

    let hello = warp::get()
        .and(warp::path::end())
        .map(|| warp::Reply::into_response("hello"))
        .boxed();
    let server = CallbackServer::with_routes("127.0.0.1:0".parse().unwrap(), router, Some(hello))
        .expect("Failed to create callback server");
    let client = reqwest::Client::new();

    let response = client.get(server.base_url()).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "hello");

    let response = client
        .get(format!("{}/nowhere", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}
