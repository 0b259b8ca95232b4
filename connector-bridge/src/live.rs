//! Live-update websocket at `GET /live`.
//!
//! Every connection is one relay subscriber. Device events are pushed as
//! `{"event": "<endpoint id>", "value": <value>}` text frames; text frames
//! sent by the client are parsed as [`LiveCommand`]s and dispatched.

use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Reply};

use crate::commands::{CommandDispatcher, LiveCommand};
use crate::relay::FanOutRelay;

/// Path of the live-update websocket.
pub const LIVE_PATH: &str = "live";

/// `GET /live` websocket route.
pub fn live_route(relay: FanOutRelay, dispatcher: CommandDispatcher) -> BoxedFilter<(Response,)> {
    warp::get()
        .and(warp::path(LIVE_PATH))
        .and(warp::path::end())
        .and(warp::ws())
        .map(move |ws: Ws| {
            let relay = relay.clone();
            let dispatcher = dispatcher.clone();
            ws.on_upgrade(move |socket| serve_subscriber(socket, relay, dispatcher))
                .into_response()
        })
        .boxed()
}

async fn serve_subscriber(socket: WebSocket, relay: FanOutRelay, dispatcher: CommandDispatcher) {
    // Subscribe before anything else so no event published after the upgrade is missed
    let mut events = relay.subscribe();
    let (mut sink, mut stream) = socket.split();
    tracing::info!(subscribers = relay.subscriber_count(), "Live subscriber connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to encode live event");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::text(frame)).await {
                        tracing::debug!(error = %e, "Live subscriber went away");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Live subscriber lagging, dropped events");
                }
                Err(RecvError::Closed) => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(message)) if message.is_close() => break,
                Some(Ok(message)) => handle_frame(&message, &dispatcher),
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Live socket error");
                    break;
                }
                None => break,
            },
        }
    }

    let _ = sink.close().await;
    tracing::info!("Live subscriber disconnected");
}

fn handle_frame(message: &Message, dispatcher: &CommandDispatcher) {
    let Ok(text) = message.to_str() else {
        // ping/pong and binary frames carry no commands
        return;
    };

    match parse_command(text) {
        Some(command) => {
            tracing::debug!(endpoint = %command.endpoint_id(), "Live command received");
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch(command).await });
        }
        None => tracing::warn!(frame = %text, "Ignoring unrecognised live frame"),
    }
}

fn parse_command(text: &str) -> Option<LiveCommand> {
    serde_json::from_str(text).ok()
}
