//! End-to-end tests for the bridge.
//!
//! Each test starts a real bridge on a free local port backed by an
//! in-memory device cloud, then drives it over HTTP the way a browser and
//! the device cloud would.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{put_callback, start_bridge, test_config, wait_until, Call, MockCloud};
use connector_bridge::{Bridge, LiveEvent, ResourceValue};
use tokio::time::timeout;

fn status_url(bridge: &Bridge, endpoint: &str) -> String {
    format!("{}/status/{}", bridge.base_url(), endpoint)
}

/// A status request parked on `r1` is answered by the matching callback.
#[tokio::test]
async fn test_status_resolved_by_async_response() {
    let cloud = Arc::new(MockCloud::new());
    let bridge = start_bridge(cloud.clone(), Duration::from_secs(5)).await;

    let request = tokio::spawn(reqwest::get(status_url(&bridge, "device-1")));

    let correlation = bridge.correlation().clone();
    assert!(wait_until(|| correlation.is_pending("r1")).await);

    let callback = put_callback(
        &bridge,
        r#"{"async-responses":[{"id":"r1","status":200,"payload":"AAU="}]}"#,
    )
    .await;
    assert_eq!(callback.status(), 200);

    let response = request.await.unwrap().expect("Status request failed");
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let page = response.text().await.unwrap();
    assert!(page.contains("<h1>device-1</h1>"));
    assert!(page.contains(r#"<span id="count">5</span>"#));

    // Subscription for later changes is requested in the background
    assert!(
        wait_until(|| cloud.calls().contains(&Call::Subscribe {
            endpoint: "device-1".to_string(),
            path: "/3200/0/5501".to_string(),
        }))
        .await
    );
    assert_eq!(
        cloud.calls()[0],
        Call::Read {
            endpoint: "device-1".to_string(),
            path: "/3200/0/5501".to_string(),
        }
    );
    assert_eq!(bridge.correlation().pending_count(), 0);

    bridge.shutdown().await;
}

/// Without a callback the request times out; a late callback changes nothing.
#[tokio::test]
async fn test_status_times_out_and_late_callback_is_ignored() {
    let cloud = Arc::new(MockCloud::new());
    let bridge = start_bridge(cloud.clone(), Duration::from_millis(200)).await;

    let response = reqwest::get(status_url(&bridge, "device-1")).await.unwrap();
    assert_eq!(response.status(), 504);
    let body = response.text().await.unwrap();
    assert!(body.contains("No response within"));
    assert!(body.contains("r1"));
    assert_eq!(bridge.correlation().pending_count(), 0);

    let late = put_callback(
        &bridge,
        r#"{"async-responses":[{"id":"r1","payload":"AAU="}]}"#,
    )
    .await;
    assert_eq!(late.status(), 200);
    assert_eq!(bridge.correlation().pending_count(), 0);

    // No subscription after a failed read
    assert!(!cloud
        .calls()
        .iter()
        .any(|call| matches!(call, Call::Subscribe { .. })));

    bridge.shutdown().await;
}

/// A rejected read is reported as a bad gateway without waiting.
#[tokio::test]
async fn test_upstream_rejection_is_bad_gateway() {
    let cloud = Arc::new(MockCloud::new().failing_reads(404));
    let bridge = start_bridge(cloud, Duration::from_secs(5)).await;

    let response = timeout(
        Duration::from_secs(2),
        reqwest::get(status_url(&bridge, "missing")),
    )
    .await
    .expect("Rejected read should not wait for a callback")
    .unwrap();

    assert_eq!(response.status(), 502);
    let body = response.text().await.unwrap();
    assert!(body.contains("Unexpected statusCode from device cloud: 404"));
    assert_eq!(bridge.correlation().pending_count(), 0);

    bridge.shutdown().await;
}

/// Unsolicited notifications are decoded by schema and reach every subscriber.
#[tokio::test]
async fn test_notification_reaches_live_subscribers() {
    let bridge = start_bridge(Arc::new(MockCloud::new()), Duration::from_secs(5)).await;
    let mut first = bridge.relay().subscribe();
    let mut second = bridge.relay().subscribe();

    let response = put_callback(
        &bridge,
        r#"{"notifications":[{"ep":"device-1","path":"/3200/0/5501","payload":"AQI="}]}"#,
    )
    .await;
    assert_eq!(response.status(), 200);

    let expected = LiveEvent {
        event: "device-1".to_string(),
        value: ResourceValue::Counter(258),
    };
    for subscriber in [&mut first, &mut second] {
        let event = timeout(Duration::from_secs(2), subscriber.recv())
            .await
            .expect("Timed out waiting for live event")
            .unwrap();
        assert_eq!(event, expected);
    }

    bridge.shutdown().await;
}

/// Notifications for paths without a schema are relayed as text.
#[tokio::test]
async fn test_notification_for_text_resource() {
    let bridge = start_bridge(Arc::new(MockCloud::new()), Duration::from_secs(5)).await;
    let mut subscriber = bridge.relay().subscribe();

    // "I2ZmMDAwMA==" is "#ff0000"
    put_callback(
        &bridge,
        r#"{"notifications":[
            {"ep":"device-1","path":"/3200/0/5501","payload":"AQ=="},
            {"ep":"device-2","path":"/Test5/0/D","payload":"I2ZmMDAwMA=="}
        ]}"#,
    )
    .await;

    // The 1-byte counter is dropped, its sibling still arrives
    let event = timeout(Duration::from_secs(2), subscriber.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event, "device-2");
    assert_eq!(event.value, ResourceValue::from("#ff0000"));

    bridge.shutdown().await;
}

/// Writes are echoed to subscribers even when the device cloud rejects them.
#[tokio::test]
async fn test_commands_echo_optimistically() {
    let cloud = Arc::new(MockCloud::new().failing_writes());
    let bridge = start_bridge(cloud.clone(), Duration::from_secs(5)).await;
    let mut subscriber = bridge.relay().subscribe();

    bridge.dispatcher().set_value("device-1", "#00ff00").await;
    bridge.dispatcher().set_pattern("device-1", "500:500").await;
    bridge.dispatcher().trigger_action("device-1").await;

    assert_eq!(
        subscriber.recv().await.unwrap().value,
        ResourceValue::from("#00ff00")
    );
    assert_eq!(
        subscriber.recv().await.unwrap().value,
        ResourceValue::from("500:500")
    );
    // trigger-action has no value to echo
    assert!(subscriber.try_recv().is_err());

    assert_eq!(
        cloud.calls(),
        vec![
            Call::Write {
                endpoint: "device-1".to_string(),
                path: "/Test5/0/D".to_string(),
                body: "#00ff00".to_string(),
            },
            Call::Write {
                endpoint: "device-1".to_string(),
                path: "/3201/0/5853".to_string(),
                body: "500:500".to_string(),
            },
            Call::Execute {
                endpoint: "device-1".to_string(),
                path: "/3201/0/5850".to_string(),
            },
        ]
    );

    bridge.shutdown().await;
}

/// The callback URL is registered once at startup.
#[tokio::test]
async fn test_callback_registered_at_startup() {
    let cloud = Arc::new(MockCloud::new());
    let config = test_config(Duration::from_secs(5))
        .with_register_callback(true)
        .with_callback_url("https://bridge.example.com/notification");

    let bridge = Bridge::start(config, cloud.clone()).await.unwrap();
    assert_eq!(bridge.callback_url(), "https://bridge.example.com/notification");

    assert!(
        wait_until(|| cloud.calls()
            == vec![Call::RegisterCallback {
                url: "https://bridge.example.com/notification".to_string(),
            }])
        .await
    );

    bridge.shutdown().await;
}

/// Without an explicit URL the callback points at the bound port.
#[tokio::test]
async fn test_default_callback_url_uses_bound_port() {
    let bridge = start_bridge(Arc::new(MockCloud::new()), Duration::from_secs(5)).await;

    assert_eq!(
        bridge.callback_url(),
        format!("http://127.0.0.1:{}/notification", bridge.local_addr().port())
    );

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_index_and_unknown_paths() {
    let bridge = start_bridge(Arc::new(MockCloud::new()), Duration::from_secs(5)).await;

    let index = reqwest::get(format!("{}/", bridge.base_url())).await.unwrap();
    assert_eq!(index.status(), 200);
    assert_eq!(index.text().await.unwrap(), "Hello from connector-bridge!");

    let missing = reqwest::get(format!("{}/nothing/here", bridge.base_url()))
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    bridge.shutdown().await;
}

/// A malformed callback leaves a parked status request untouched.
#[tokio::test]
async fn test_malformed_callback_does_not_disturb_pending_status() {
    let bridge = start_bridge(Arc::new(MockCloud::new()), Duration::from_secs(5)).await;

    let request = tokio::spawn(reqwest::get(status_url(&bridge, "device-1")));
    let correlation = bridge.correlation().clone();
    assert!(wait_until(|| correlation.is_pending("r1")).await);

    let garbage = put_callback(&bridge, "{not json").await;
    assert_eq!(garbage.status(), 200);
    assert!(bridge.correlation().is_pending("r1"));

    put_callback(
        &bridge,
        r#"{"async-responses":[{"id":"r1","payload":"AQI="}]}"#,
    )
    .await;

    let page = request.await.unwrap().unwrap().text().await.unwrap();
    assert!(page.contains(r#"<span id="count">258</span>"#));

    bridge.shutdown().await;
}
